//! Inference Adapter
//!
//! Narrows the engineered rows to the new-session set, builds the model
//! input matrix, runs the regressor and scores each row with the logistic
//! probability model.

use std::collections::HashSet;

use tracing::debug;

use crate::ml_engine::{mastitis_probability, FeatureMatrix, MdiRegressor, ModelError};
use crate::types::{Feature, FeatureRow, ModelConfig, ScoredRow, SessionOid};

/// Keep only rows whose session id is in `new_oids`, preserving order.
pub fn select_new(rows: Vec<FeatureRow>, new_oids: &[SessionOid]) -> Vec<FeatureRow> {
    let wanted: HashSet<SessionOid> = new_oids.iter().copied().collect();
    rows.into_iter().filter(|r| wanted.contains(&r.oid())).collect()
}

/// Matrix in canonical feature order. Missing and NaN values become 0.0.
pub fn canonical_matrix(rows: &[FeatureRow]) -> Result<FeatureMatrix, ModelError> {
    let mut matrix = FeatureMatrix::new(
        Feature::CANONICAL_ORDER
            .iter()
            .map(|f| f.name().to_string())
            .collect(),
    );
    for row in rows {
        matrix.push_row(
            Feature::CANONICAL_ORDER
                .iter()
                .map(|&f| row.value(f).filter(|v| !v.is_nan()).unwrap_or(0.0))
                .collect(),
        )?;
    }
    Ok(matrix)
}

/// Model input: the canonical matrix, reordered to the model's declared
/// schema when it has one.
pub fn model_input(
    rows: &[FeatureRow],
    model: &dyn MdiRegressor,
) -> Result<FeatureMatrix, ModelError> {
    let matrix = canonical_matrix(rows)?;
    match model.feature_names() {
        Some(names) => matrix.select(names),
        None => Ok(matrix),
    }
}

/// Predict and score every row. Fails as a whole; no partial output.
pub fn score(
    rows: Vec<FeatureRow>,
    model: &dyn MdiRegressor,
    coefficients: &ModelConfig,
) -> Result<Vec<ScoredRow>, ModelError> {
    let input = model_input(&rows, model)?;
    let predictions = model.predict(&input)?;
    if predictions.len() != rows.len() {
        return Err(ModelError::PredictionCount {
            expected: rows.len(),
            actual: predictions.len(),
        });
    }
    debug!(model = model.name(), rows = rows.len(), "Model inference complete");

    Ok(rows
        .into_iter()
        .zip(predictions)
        .map(|(features, predicted_mdi)| {
            let probability =
                mastitis_probability(coefficients, features.metrics.mdi, Some(predicted_mdi));
            ScoredRow {
                features,
                predicted_mdi,
                probability,
            }
        })
        .collect())
}
