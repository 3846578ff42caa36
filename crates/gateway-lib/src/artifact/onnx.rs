//! ONNX classifier inference using tract
//!
//! Accepts classifiers exported with the probability output as a plain
//! tensor (zipmap disabled): output 0 is the label, output 1 holds the
//! per-class probabilities. Class ids are assumed to be `0..n_classes`.

use super::{ClassPrediction, Classifier};
use crate::error::{PredictionError, Result};
use anyhow::Context;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxClassifier {
    model: TractModel,
    n_features: usize,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    /// Parse and optimize an ONNX model with a `[1, n_features]` f32 input
    pub fn from_bytes(model_bytes: &[u8], n_features: usize) -> Result<Self> {
        let model = Self::load_model(model_bytes, n_features)
            .map_err(|e| PredictionError::InvalidInput(format!("{:#}", e)))?;
        Ok(Self { model, n_features })
    }

    fn load_model(model_bytes: &[u8], n_features: usize) -> TractResult<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, n_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    fn features_to_tensor(&self, x: &[f64]) -> TractResult<Tensor> {
        let data: Vec<f32> = x.iter().map(|v| *v as f32).collect();
        Ok(tract_ndarray::Array2::from_shape_vec((1, self.n_features), data)?.into())
    }

    fn run(&self, x: &[f64]) -> TractResult<ClassPrediction> {
        let input = self.features_to_tensor(x)?;
        let outputs = self.model.run(tvec!(input.into()))?;

        let label = outputs
            .first()
            .context("No label output from model")?
            .cast_to::<i64>()?
            .to_array_view::<i64>()?
            .iter()
            .next()
            .copied()
            .context("Empty label output")?;

        let probability = match outputs.get(1) {
            Some(proba) => {
                let proba = proba.cast_to::<f32>()?;
                let view = proba.to_array_view::<f32>()?;
                usize::try_from(label)
                    .ok()
                    .and_then(|i| view.iter().nth(i))
                    .map(|p| *p as f64)
            }
            None => None,
        };

        Ok(ClassPrediction {
            class_id: label,
            probability,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: &[f64]) -> Result<ClassPrediction> {
        if x.len() != self.n_features {
            return Err(PredictionError::DimensionMismatch {
                expected: self.n_features,
                actual: x.len(),
            });
        }

        let start = Instant::now();
        let prediction = self
            .run(x)
            .map_err(|e| PredictionError::Inference(format!("{:#}", e)))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(prediction)
    }
}
