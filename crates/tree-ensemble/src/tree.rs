//! Regression Tree
//!
//! A single tree grown on per-row gradient and hessian statistics. Split gain
//! is the second-order boosting gain
//! `0.5 * (G_l^2 / (H_l + lambda) + G_r^2 / (H_r + lambda) - G^2 / (H + lambda)) - gamma`
//! and leaf weight is `-G / (H + lambda)`. With `g = mean(y) - y`, `h = 1` and
//! no regularization this reduces to plain CART variance reduction, with each
//! leaf holding its mean minus `mean(y)`. The random forest uses it that way.

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;

/// Smallest accepted split gain, relative to the node's `sum(g^2 / h)`
const MIN_RELATIVE_GAIN: f64 = 1e-10;

/// Growth constraints for a regression tree
#[derive(Debug, Clone)]
pub struct TreeParams {
    /// Maximum depth (None = grow until leaves are pure or too small)
    pub max_depth: Option<usize>,
    /// Minimum rows a node needs before it is considered for splitting
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split
    pub min_samples_leaf: usize,
    /// Minimum hessian sum on each side of a split
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum gain required to make a split
    pub gamma: f64,
    /// Candidate features drawn per split (None = all)
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_child_weight: 0.0,
            reg_lambda: 0.0,
            gamma: 0.0,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct PendingNode {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
}

/// Fitted regression tree stored as a node arena (root at index 0)
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    split_counts: Vec<usize>,
    split_gains: Vec<f64>,
}

impl RegressionTree {
    /// Grow a tree over `rows` (repeats allowed, e.g. bootstrap samples),
    /// searching splits only on `features`.
    ///
    /// `grad` and `hess` are indexed by row number of `x`.
    pub fn grow(
        x: ArrayView2<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let n_features = x.ncols();
        let mut tree = Self {
            nodes: vec![Node::Leaf { value: 0.0 }],
            split_counts: vec![0; n_features],
            split_gains: vec![0.0; n_features],
        };

        let mut pending = vec![PendingNode {
            node: 0,
            rows: rows.to_vec(),
            depth: 0,
        }];

        while let Some(PendingNode { node, rows, depth }) = pending.pop() {
            let (g_sum, h_sum) = rows
                .iter()
                .fold((0.0, 0.0), |(g, h), &r| (g + grad[r], h + hess[r]));

            let splittable = params.max_depth.map_or(true, |max| depth < max)
                && rows.len() >= params.min_samples_split.max(2);

            let best = if splittable {
                let candidates = Self::candidate_features(features, params.max_features, rng);
                Self::find_best_split(x, grad, hess, &rows, &candidates, g_sum, h_sum, params)
            } else {
                None
            };

            let Some(split) = best else {
                tree.nodes[node] = Node::Leaf {
                    value: leaf_weight(g_sum, h_sum, params.reg_lambda),
                };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&r| x[[r, split.feature]] <= split.threshold);

            tree.split_counts[split.feature] += 1;
            tree.split_gains[split.feature] += split.gain;

            let left = tree.nodes.len();
            let right = left + 1;
            tree.nodes.push(Node::Leaf { value: 0.0 });
            tree.nodes.push(Node::Leaf { value: 0.0 });
            tree.nodes[node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            pending.push(PendingNode {
                node: right,
                rows: right_rows,
                depth: depth + 1,
            });
            pending.push(PendingNode {
                node: left,
                rows: left_rows,
                depth: depth + 1,
            });
        }

        tree
    }

    fn candidate_features(
        features: &[usize],
        max_features: Option<usize>,
        rng: &mut ChaCha8Rng,
    ) -> Vec<usize> {
        match max_features {
            Some(k) if k < features.len() => index::sample(rng, features.len(), k.max(1))
                .into_iter()
                .map(|i| features[i])
                .collect(),
            _ => features.to_vec(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn find_best_split(
        x: ArrayView2<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        candidates: &[usize],
        g_sum: f64,
        h_sum: f64,
        params: &TreeParams,
    ) -> Option<SplitCandidate> {
        let lambda = params.reg_lambda;
        let parent_score = score(g_sum, h_sum, lambda);
        let min_leaf = params.min_samples_leaf.max(1);
        let energy: f64 = rows
            .iter()
            .filter(|&&r| hess[r] > 0.0)
            .map(|&r| grad[r] * grad[r] / hess[r])
            .sum();
        let min_gain = MIN_RELATIVE_GAIN * energy;

        let mut best: Option<SplitCandidate> = None;
        let mut order = rows.to_vec();

        for &feature in candidates {
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut g_left = 0.0;
            let mut h_left = 0.0;

            for i in 0..order.len() - 1 {
                let row = order[i];
                g_left += grad[row];
                h_left += hess[row];

                let value = x[[row, feature]];
                let next = x[[order[i + 1], feature]];
                if value == next {
                    continue;
                }

                let n_left = i + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }

                let g_right = g_sum - g_left;
                let h_right = h_sum - h_left;
                if h_left < params.min_child_weight || h_right < params.min_child_weight {
                    continue;
                }

                let gain = 0.5
                    * (score(g_left, h_left, lambda) + score(g_right, h_right, lambda)
                        - parent_score)
                    - params.gamma;

                if gain > best.map_or(min_gain, |b| b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(value, next),
                        gain,
                    });
                }
            }
        }

        best
    }

    /// Predict a single row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Multiply every leaf value by `factor` (boosting shrinkage)
    pub fn shrink(&mut self, factor: f64) {
        for node in &mut self.nodes {
            if let Node::Leaf { value } = node {
                *value *= factor;
            }
        }
    }

    /// Number of splits made on each feature
    pub fn split_counts(&self) -> &[usize] {
        &self.split_counts
    }

    /// Total gain of the splits made on each feature
    pub fn split_gains(&self) -> &[f64] {
        &self.split_gains
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Depth of the deepest leaf (a lone root has depth 0)
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((left, depth + 1));
                    stack.push((right, depth + 1));
                }
            }
        }
        max_depth
    }

    /// True when the tree never split
    pub fn is_stump(&self) -> bool {
        self.nodes.len() == 1
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom > 0.0 {
        g * g / denom
    } else {
        0.0
    }
}

fn leaf_weight(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom > 0.0 {
        -g / denom
    } else {
        0.0
    }
}

/// Midpoint of two adjacent distinct values, never rounding up onto `high`
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low / 2.0 + high / 2.0;
    if mid < high {
        mid
    } else {
        low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::seeded_rng;
    use ndarray::{array, Array2};

    fn cart_stats(y: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (y.iter().map(|v| -v).collect(), vec![1.0; y.len()])
    }

    #[test]
    fn test_step_function() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let (grad, hess) = cart_stats(&y);
        let rows: Vec<usize> = (0..20).collect();

        let tree = RegressionTree::grow(
            x.view(),
            &grad,
            &hess,
            &rows,
            &[0],
            &TreeParams::default(),
            &mut seeded_rng(Some(1)),
        );

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.split_counts(), &[1]);
        assert!((tree.predict_row(array![3.0].view()) - 1.0).abs() < 1e-9);
        assert!((tree.predict_row(array![15.0].view()) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_target_is_stump() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i * (j + 1)) as f64);
        let (grad, hess) = cart_stats(&[3.0; 10]);
        let rows: Vec<usize> = (0..10).collect();

        let tree = RegressionTree::grow(
            x.view(),
            &grad,
            &hess,
            &rows,
            &[0, 1],
            &TreeParams::default(),
            &mut seeded_rng(Some(1)),
        );

        assert!(tree.is_stump());
        assert_eq!(tree.split_gains(), &[0.0, 0.0]);
        assert!((tree.predict_row(array![1.0, 1.0].view()) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_depth_respected() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let (grad, hess) = cart_stats(&y);
        let rows: Vec<usize> = (0..64).collect();
        let params = TreeParams {
            max_depth: Some(3),
            ..Default::default()
        };

        let tree = RegressionTree::grow(
            x.view(),
            &grad,
            &hess,
            &rows,
            &[0],
            &params,
            &mut seeded_rng(Some(1)),
        );

        assert_eq!(tree.depth(), 3);
        assert!(tree.n_leaves() <= 8);
    }

    #[test]
    fn test_ignores_noise_feature() {
        // Column 1 drives the target, column 0 is constant
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { 7.0 } else { i as f64 });
        let y: Vec<f64> = (0..30).map(|i| if i < 15 { 0.0 } else { 10.0 }).collect();
        let (grad, hess) = cart_stats(&y);
        let rows: Vec<usize> = (0..30).collect();

        let tree = RegressionTree::grow(
            x.view(),
            &grad,
            &hess,
            &rows,
            &[0, 1],
            &TreeParams::default(),
            &mut seeded_rng(Some(1)),
        );

        assert_eq!(tree.split_counts()[0], 0);
        assert!(tree.split_gains()[1] > 0.0);
    }

    #[test]
    fn test_shrink_scales_leaves() {
        let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let (grad, hess) = cart_stats(&[2.0, 2.0, 2.0, 2.0]);
        let rows: Vec<usize> = (0..4).collect();

        let mut tree = RegressionTree::grow(
            x.view(),
            &grad,
            &hess,
            &rows,
            &[0],
            &TreeParams::default(),
            &mut seeded_rng(Some(1)),
        );
        tree.shrink(0.5);

        assert!((tree.predict_row(array![0.0].view()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_midpoint_never_reaches_high() {
        let low = 1.0_f64;
        let high = f64::from_bits(low.to_bits() + 1);
        assert!(midpoint(low, high) < high);
        assert_eq!(midpoint(2.0, 4.0), 3.0);
    }
}
