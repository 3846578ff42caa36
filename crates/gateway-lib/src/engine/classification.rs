use super::{check_artifacts, PredictionEngine};
use crate::artifact::Classifier;
use crate::error::Result;
use crate::models::{ClassificationResult, FeatureVector};
use crate::preprocessing::{FeatureAligner, ModelSchema, Scaler};
use std::sync::Arc;

const LABELS: [(i64, &str); 4] = [
    (0, "Normal"),
    (1, "Prehypertension"),
    (2, "Stage 1 Hypertension"),
    (3, "Stage 2 Hypertension"),
];

const UNDETERMINED: &str = "Undetermined";

/// Human-readable label for a hypertension class id
pub fn hypertension_label(class_id: i64) -> &'static str {
    LABELS
        .iter()
        .find(|(id, _)| *id == class_id)
        .map(|(_, label)| *label)
        .unwrap_or(UNDETERMINED)
}

/// Hypertension stage classifier
pub struct ClassificationEngine {
    model: Arc<dyn Classifier>,
    scaler: Option<Scaler>,
    aligner: FeatureAligner,
}

impl ClassificationEngine {
    /// Fails with `ModelLoadFailure` when the model width or the scaler's
    /// features disagree with `schema`
    pub fn new(
        schema: &'static ModelSchema,
        model: Arc<dyn Classifier>,
        scaler: Option<Scaler>,
    ) -> Result<Self> {
        check_artifacts(schema, model.n_features(), scaler.as_ref())?;
        Ok(Self {
            model,
            scaler,
            aligner: FeatureAligner::new(schema),
        })
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.aligner = self.aligner.strict(strict);
        self
    }

    /// Class id and the probability the model assigns to it (0.0 when the
    /// model exposes no probabilities)
    pub fn predict(&self, sample: &FeatureVector, is_raw: bool) -> Result<(i64, f64)> {
        let x = self.align_and_scale(sample, is_raw)?;
        let prediction = self.model.predict(&x)?;
        Ok((prediction.class_id, prediction.probability.unwrap_or(0.0)))
    }

    pub fn classify(&self, sample: &FeatureVector, is_raw: bool) -> Result<ClassificationResult> {
        let (class_id, probability) = self.predict(sample, is_raw)?;
        Ok(ClassificationResult {
            class_id,
            label: hypertension_label(class_id).to_string(),
            probability,
        })
    }
}

impl PredictionEngine for ClassificationEngine {
    fn aligner(&self) -> &FeatureAligner {
        &self.aligner
    }

    fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }
}
