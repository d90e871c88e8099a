//! Trained-model interface
//!
//! The regression model is an opaque collaborator: it receives a dense
//! matrix with named columns and returns one continuous prediction per row.

use std::path::PathBuf;

/// Dense row-major `f64` matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; its length must match the column count.
    pub fn push_row(&mut self, row: Vec<f64>) -> Result<(), ModelError> {
        if row.len() != self.columns.len() {
            return Err(ModelError::ShapeMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Reorder (and subset) columns to `names`. Every name must exist.
    pub fn select(&self, names: &[String]) -> Result<FeatureMatrix, ModelError> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| ModelError::UnknownFeature(n.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureMatrix {
            columns: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|&i| r[i]).collect())
                .collect(),
        })
    }
}

/// Model errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model artifact {}: {source}", .path.display())]
    ArtifactIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse model artifact: {0}")]
    ArtifactParse(#[from] serde_json::Error),
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("model expects unknown feature {0:?}")]
    UnknownFeature(String),
    #[error("row has {actual} values, matrix has {expected} columns")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("model returned {actual} predictions for {expected} rows")]
    PredictionCount { expected: usize, actual: usize },
    #[error("prediction failed: {0}")]
    Prediction(String),
}

/// A trained regressor predicting the next-day MDI of a session.
pub trait MdiRegressor: Send + Sync {
    /// Model name for logging
    fn name(&self) -> &str;

    /// Input columns in the order the model was trained on, when known.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// One prediction per matrix row.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> FeatureMatrix {
        let mut m = FeatureMatrix::new(vec!["a".into(), "b".into(), "c".into()]);
        m.push_row(vec![1.0, 2.0, 3.0]).unwrap();
        m.push_row(vec![4.0, 5.0, 6.0]).unwrap();
        m
    }

    #[test]
    fn test_select_reorders_and_subsets() {
        let selected = matrix().select(&["c".into(), "a".into()]).unwrap();
        assert_eq!(selected.columns(), ["c", "a"]);
        assert_eq!(selected.rows(), [vec![3.0, 1.0], vec![6.0, 4.0]]);
    }

    #[test]
    fn test_select_unknown_column_fails() {
        let err = matrix().select(&["z".into()]).unwrap_err();
        assert!(matches!(err, ModelError::UnknownFeature(ref n) if n == "z"));
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut m = matrix();
        assert!(matches!(
            m.push_row(vec![1.0]),
            Err(ModelError::ShapeMismatch { expected: 3, actual: 1 })
        ));
        assert_eq!(m.column("b"), Some(vec![2.0, 5.0]));
    }
}
