//! Linear regressor loaded from a JSON artifact
//!
//! Artifact format, as exported by the training side:
//!
//! ```json
//! {
//!   "name": "mdi_predictor_2d",
//!   "feature_names": ["Mdi", "TotalYield", "..."],
//!   "intercept": 0.12,
//!   "coefficients": [0.81, -0.002, "..."]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::model::{FeatureMatrix, MdiRegressor, ModelError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressor {
    #[serde(default = "default_name")]
    name: String,
    feature_names: Vec<String>,
    intercept: f64,
    coefficients: Vec<f64>,
}

fn default_name() -> String {
    "linear".to_string()
}

impl LinearRegressor {
    pub fn new(
        name: impl Into<String>,
        feature_names: Vec<String>,
        intercept: f64,
        coefficients: Vec<f64>,
    ) -> Result<Self, ModelError> {
        let model = Self {
            name: name.into(),
            feature_names,
            intercept,
            coefficients,
        };
        model.validate()?;
        Ok(model)
    }

    /// Load and validate an artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&contents)?;
        info!(
            path = %path.display(),
            model = %model.name,
            features = model.feature_names.len(),
            "Loaded regression model"
        );
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.len() != self.coefficients.len() {
            return Err(ModelError::InvalidArtifact(format!(
                "{} feature names but {} coefficients",
                self.feature_names.len(),
                self.coefficients.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::InvalidArtifact(
                "intercept and coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl MdiRegressor for LinearRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let indices = self
            .feature_names
            .iter()
            .map(|n| {
                features
                    .column_index(n)
                    .ok_or_else(|| ModelError::UnknownFeature(n.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(features
            .rows()
            .iter()
            .map(|row| {
                self.intercept
                    + indices
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(&i, w)| w * row[i])
                        .sum::<f64>()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ARTIFACT: &str = r#"{
        "name": "mdi_predictor_2d",
        "feature_names": ["Mdi", "Mdi_ma15"],
        "intercept": 0.5,
        "coefficients": [0.8, 0.1]
    }"#;

    #[test]
    fn test_predict_uses_columns_by_name() {
        let model = LinearRegressor::from_json(ARTIFACT).unwrap();
        // Columns deliberately in a different order than the artifact.
        let mut m = FeatureMatrix::new(vec!["Mdi_ma15".into(), "Extra".into(), "Mdi".into()]);
        m.push_row(vec![2.0, 99.0, 1.0]).unwrap();

        let preds = model.predict(&m).unwrap();
        assert_eq!(preds.len(), 1);
        assert!((preds[0] - (0.5 + 0.8 * 1.0 + 0.1 * 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let model = LinearRegressor::from_json(ARTIFACT).unwrap();
        let m = FeatureMatrix::new(vec!["Mdi".into()]);
        assert!(matches!(model.predict(&m), Err(ModelError::UnknownFeature(_))));
    }

    #[test]
    fn test_rejects_mismatched_artifact() {
        let err = LinearRegressor::from_json(
            r#"{"feature_names": ["Mdi"], "intercept": 0.0, "coefficients": [1.0, 2.0]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidArtifact(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ARTIFACT.as_bytes()).unwrap();

        let model = LinearRegressor::load(file.path()).unwrap();
        assert_eq!(model.name(), "mdi_predictor_2d");
        assert_eq!(model.feature_names().unwrap().len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = LinearRegressor::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, ModelError::ArtifactIo { .. }));
    }
}
