//! Feature Matrix and Target Vector

use std::collections::HashSet;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::SelectionError;

/// Numeric table with uniquely named columns (rows = samples)
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    /// Create a matrix; one name per column, names must be unique
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self, SelectionError> {
        if names.len() != values.ncols() {
            return Err(SelectionError::InvalidInput(format!(
                "{} column names for {} columns",
                names.len(),
                values.ncols()
            )));
        }

        if let Some(duplicate) = first_duplicate(&names) {
            return Err(SelectionError::InvalidInput(format!(
                "duplicate column name: {}",
                duplicate
            )));
        }

        Ok(Self { names, values })
    }

    /// Create a matrix from row-major samples
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self, SelectionError> {
        let n_cols = names.len();
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(SelectionError::InvalidInput(format!(
                "row {} has {} values, expected {}",
                idx,
                row.len(),
                n_cols
            )));
        }

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let values = Array2::from_shape_vec((rows.len(), n_cols), flat)
            .map_err(|e| SelectionError::InvalidInput(e.to_string()))?;
        Self::new(names, values)
    }

    /// Column names in column order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Underlying values
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Number of samples
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of features
    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    /// Position of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// New matrix holding only the named columns, in the given order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, SelectionError> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name.as_ref()).ok_or_else(|| {
                    SelectionError::InvalidInput(format!("unknown column: {}", name.as_ref()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let values = self.values.select(Axis(1), &indices);
        let names = indices.iter().map(|&i| self.names[i].clone()).collect();
        Self::new(names, values)
    }

    /// True when every value is finite
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

fn first_duplicate(names: &[String]) -> Option<&String> {
    let mut seen = HashSet::with_capacity(names.len());
    names.iter().find(|n| !seen.insert(n.as_str()))
}

/// Numeric labels, one per matrix row
#[derive(Debug, Clone, PartialEq)]
pub struct TargetVector {
    values: Array1<f64>,
}

impl TargetVector {
    /// Wrap target values
    pub fn new(values: Array1<f64>) -> Self {
        Self { values }
    }

    /// Underlying values
    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when there are no labels
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every value is finite
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl From<Vec<f64>> for TargetVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(Array1::from(values))
    }
}

impl From<Array1<f64>> for TargetVector {
    fn from(values: Array1<f64>) -> Self {
        Self::new(values)
    }
}
