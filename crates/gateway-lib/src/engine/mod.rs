//! Prediction engines: alignment, scaling and model evaluation per model

mod classification;
mod regression;

pub use classification::{hypertension_label, ClassificationEngine};
pub use regression::{BpTarget, KnnRegressionEngine, Z_95};

use crate::error::{PredictionError, Result};
use crate::models::FeatureVector;
use crate::preprocessing::{FeatureAligner, ModelSchema, Scaler};

/// Capability shared by every engine: turn a request sample into the exact
/// vector its model was trained on.
pub trait PredictionEngine: Send + Sync {
    fn aligner(&self) -> &FeatureAligner;

    fn scaler(&self) -> Option<&Scaler>;

    fn schema(&self) -> &'static ModelSchema {
        self.aligner().schema()
    }

    fn model_name(&self) -> &'static str {
        self.schema().name
    }

    fn has_scaler(&self) -> bool {
        self.scaler().is_some()
    }

    /// Align to the trained order and, for raw input, z-score the numeric
    /// subset. Indicators and Sex are never scaled.
    fn align_and_scale(&self, sample: &FeatureVector, is_raw: bool) -> Result<Vec<f64>> {
        if is_raw && self.scaler().is_none() {
            return Err(PredictionError::ScalerUnavailable {
                model: self.model_name().to_string(),
            });
        }

        let mut values = self.aligner().align(sample)?;
        if let (true, Some(scaler)) = (is_raw, self.scaler()) {
            scaler.transform_in_place(&mut values, self.schema().feature_order)?;
        }
        Ok(values)
    }
}

/// Reject an engine whose artifacts disagree with the model's layout
fn check_artifacts(schema: &ModelSchema, n_features: usize, scaler: Option<&Scaler>) -> Result<()> {
    if n_features != schema.width() {
        return Err(PredictionError::load_failure(
            schema.name,
            format!(
                "model expects {} features, layout has {}",
                n_features,
                schema.width()
            ),
        ));
    }

    if let Some(scaler) = scaler {
        let fitted: Vec<&str> = scaler.features().iter().map(String::as_str).collect();
        if fitted != schema.scaled_features {
            return Err(PredictionError::load_failure(
                schema.name,
                format!(
                    "scaler fitted on {:?}, model scales {:?}",
                    fitted, schema.scaled_features
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{KNN_SYSTOLIC, RANDOM_FOREST};

    #[test]
    fn test_check_artifacts_width() {
        assert!(check_artifacts(&RANDOM_FOREST, 16, None).is_ok());
        let err = check_artifacts(&RANDOM_FOREST, 15, None).unwrap_err();
        assert_eq!(err.kind(), "model_load_failure");
    }

    #[test]
    fn test_check_artifacts_scaler_features() {
        let names: Vec<String> = KNN_SYSTOLIC
            .scaled_features
            .iter()
            .map(|s| s.to_string())
            .collect();
        let n = names.len();
        let scaler = Scaler::from_parts(names, vec![0.0; n], vec![1.0; n]).unwrap();
        assert!(check_artifacts(&KNN_SYSTOLIC, 15, Some(&scaler)).is_ok());
        assert!(check_artifacts(&RANDOM_FOREST, 16, Some(&scaler)).is_err());
    }
}
