//! Model artifacts and the inference traits they implement
//!
//! Artifacts are read once at startup. Each file may be accompanied by a
//! `<file>.sha256` sidecar; when present the digest must match.

mod forest;
mod knn;
mod onnx;

pub use forest::{DecisionTree, RandomForest};
pub use knn::{KnnRegressor, Weights};
pub use onnx::OnnxClassifier;

#[cfg(test)]
pub(crate) use forest::tests::stump;

use crate::error::{PredictionError, Result};
use crate::preprocessing::Scaler;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Label chosen by a classifier, with its probability when available
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassPrediction {
    pub class_id: i64,
    pub probability: Option<f64>,
}

pub trait Classifier: Send + Sync {
    /// Width of the input vector the model was trained on
    fn n_features(&self) -> usize;

    fn predict(&self, x: &[f64]) -> Result<ClassPrediction>;
}

pub trait Regressor: Send + Sync {
    fn n_features(&self) -> usize;

    /// Point prediction in the model's target space
    fn predict(&self, x: &[f64]) -> Result<f64>;
}

/// One training sample returned by a neighbor query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// Read access to the training set behind a neighbor-based model
pub trait NeighborIndex: Send + Sync {
    /// Neighbor count the model predicts with
    fn n_neighbors(&self) -> usize;

    fn k_neighbors(&self, x: &[f64], k: usize) -> Result<Vec<Neighbor>>;

    /// Training targets at the given sample indices
    fn training_targets(&self, indices: &[usize]) -> Result<Vec<f64>>;
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Read an artifact and verify it against its checksum sidecar if one exists
pub fn read_artifact(path: &Path, model: &str) -> Result<Vec<u8>> {
    let bytes = fs::read(path)
        .map_err(|e| PredictionError::load_failure(model, format!("{}: {}", path.display(), e)))?;

    let sidecar = sidecar_path(path);
    if sidecar.exists() {
        let contents = fs::read_to_string(&sidecar).map_err(|e| {
            PredictionError::load_failure(model, format!("{}: {}", sidecar.display(), e))
        })?;
        // sha256sum format: "<digest>  <filename>"
        let expected = contents.split_whitespace().next().unwrap_or_default();
        let computed = compute_checksum(&bytes);
        if !expected.eq_ignore_ascii_case(&computed) {
            return Err(PredictionError::load_failure(
                model,
                format!(
                    "checksum mismatch for {}: expected {}, got {}",
                    path.display(),
                    expected,
                    computed
                ),
            ));
        }
        info!(model, path = %path.display(), checksum = %computed, "Artifact checksum validated");
    }

    Ok(bytes)
}

/// Load a classifier; `.onnx` files go through tract, anything else is
/// parsed as a forest JSON export
pub fn load_classifier(path: &Path, model: &str, n_features: usize) -> Result<Arc<dyn Classifier>> {
    let bytes = read_artifact(path, model)?;
    let is_onnx = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false);

    let classifier: Arc<dyn Classifier> = if is_onnx {
        Arc::new(
            OnnxClassifier::from_bytes(&bytes, n_features)
                .map_err(|e| PredictionError::load_failure(model, e))?,
        )
    } else {
        Arc::new(
            RandomForest::from_json_slice(&bytes)
                .map_err(|e| PredictionError::load_failure(model, e))?,
        )
    };

    info!(model, path = %path.display(), "Classifier loaded");
    Ok(classifier)
}

pub fn load_knn(path: &Path, model: &str) -> Result<Arc<KnnRegressor>> {
    let bytes = read_artifact(path, model)?;
    let knn = KnnRegressor::from_json_slice(&bytes)
        .map_err(|e| PredictionError::load_failure(model, e))?;
    info!(
        model,
        path = %path.display(),
        samples = knn.n_samples(),
        n_neighbors = knn.n_neighbors(),
        "KNN regressor loaded"
    );
    Ok(Arc::new(knn))
}

/// Load a fitted scaler.
///
/// A missing file is not an error: the model then only serves normalized
/// input. A file that exists but cannot be parsed fails the model.
pub fn load_scaler(path: &Path, model: &str) -> Result<Option<Scaler>> {
    if !path.exists() {
        warn!(
            model,
            path = %path.display(),
            "Scaler not found, raw input will be rejected for this model"
        );
        return Ok(None);
    }

    let bytes = read_artifact(path, model)?;
    let scaler =
        Scaler::from_json_slice(&bytes).map_err(|e| PredictionError::load_failure(model, e))?;
    info!(model, path = %path.display(), features = scaler.features().len(), "Scaler loaded");
    Ok(Some(scaler))
}
