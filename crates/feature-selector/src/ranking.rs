//! Importance Ranking

use serde::{Deserialize, Serialize};

/// A feature and the importance a model assigned to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Features ordered by importance, highest first.
///
/// Equal scores keep their original column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceRanking {
    entries: Vec<FeatureImportance>,
}

impl ImportanceRanking {
    /// Pair names with scores and sort descending (stable)
    ///
    /// `names` and `scores` are zipped; callers check lengths beforehand.
    /// Negative zero is stored as zero so it ties with `0.0`.
    pub fn new(names: &[String], scores: &[f64]) -> Self {
        let mut entries: Vec<FeatureImportance> = names
            .iter()
            .zip(scores)
            .map(|(name, &importance)| FeatureImportance {
                feature: name.clone(),
                importance: importance + 0.0,
            })
            .collect();
        entries.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Self { entries }
    }

    /// Ranked entries
    pub fn entries(&self) -> &[FeatureImportance] {
        &self.entries
    }

    /// Names of the first `n` features (all of them if fewer)
    pub fn top_n(&self, n: usize) -> Vec<String> {
        self.entries
            .iter()
            .take(n)
            .map(|e| e.feature.clone())
            .collect()
    }

    /// Number of ranked features
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is ranked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
