//! Holder of the three served engines
//!
//! Each engine lives in its own one-time cell. The first access (or
//! `warm_up`) loads it; a load failure is stored and reported on every
//! request for that model only.

use crate::artifact;
use crate::engine::{BpTarget, ClassificationEngine, KnnRegressionEngine, PredictionEngine};
use crate::error::{PredictionError, Result};
use crate::models::{ClassificationResult, FeatureVector, InputType, RegressionResult};
use crate::observability::{GatewayMetrics, StructuredLogger};
use crate::preprocessing::RANDOM_FOREST;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

/// Artifact locations for every served model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPaths {
    pub random_forest: PathBuf,
    pub random_forest_scaler: PathBuf,
    pub knn_systolic: PathBuf,
    pub knn_systolic_scaler: PathBuf,
    pub knn_diastolic: PathBuf,
    pub knn_diastolic_scaler: PathBuf,
}

impl ModelPaths {
    /// Default file names under `model_dir`
    pub fn in_dir(model_dir: impl AsRef<Path>) -> Self {
        let dir = model_dir.as_ref();
        Self {
            random_forest: dir.join("random_forest.json"),
            random_forest_scaler: dir.join("random_forest_scaler.json"),
            knn_systolic: dir.join("knn_systolic.json"),
            knn_systolic_scaler: dir.join("knn_systolic_scaler.json"),
            knn_diastolic: dir.join("knn_diastolic.json"),
            knn_diastolic_scaler: dir.join("knn_diastolic_scaler.json"),
        }
    }
}

/// Availability of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model: String,
    pub loaded: bool,
    pub scaler_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ModelRegistry {
    paths: Option<ModelPaths>,
    strict: bool,
    classifier: OnceLock<Result<ClassificationEngine>>,
    systolic: OnceLock<Result<KnnRegressionEngine>>,
    diastolic: OnceLock<Result<KnnRegressionEngine>>,
    metrics: GatewayMetrics,
    logger: StructuredLogger,
}

impl ModelRegistry {
    /// Registry that loads lazily from `paths`
    pub fn new(paths: ModelPaths, strict: bool, logger: StructuredLogger) -> Self {
        Self {
            paths: Some(paths),
            strict,
            classifier: OnceLock::new(),
            systolic: OnceLock::new(),
            diastolic: OnceLock::new(),
            metrics: GatewayMetrics::new(),
            logger,
        }
    }

    /// Registry over engines that were already built (or failed to build)
    pub fn from_engines(
        classifier: Result<ClassificationEngine>,
        systolic: Result<KnnRegressionEngine>,
        diastolic: Result<KnnRegressionEngine>,
    ) -> Self {
        let registry = Self {
            paths: None,
            strict: false,
            classifier: OnceLock::new(),
            systolic: OnceLock::new(),
            diastolic: OnceLock::new(),
            metrics: GatewayMetrics::new(),
            logger: StructuredLogger::new(env!("CARGO_PKG_NAME")),
        };
        let _ = registry.classifier.set(classifier);
        let _ = registry.systolic.set(systolic);
        let _ = registry.diastolic.set(diastolic);
        registry
    }

    /// Load every model now and report the outcome
    pub fn warm_up(&self) -> Vec<ModelStatus> {
        let _ = self.classifier();
        let _ = self.systolic();
        let _ = self.diastolic();
        self.status()
    }

    /// Per-model availability; models not yet accessed count as not loaded
    pub fn status(&self) -> Vec<ModelStatus> {
        vec![
            slot_status(RANDOM_FOREST.name, &self.classifier),
            slot_status(BpTarget::Systolic.schema().name, &self.systolic),
            slot_status(BpTarget::Diastolic.schema().name, &self.diastolic),
        ]
    }

    pub fn classify(&self, sample: &FeatureVector, is_raw: bool) -> Result<ClassificationResult> {
        let engine = self.classifier();
        self.observe(RANDOM_FOREST.name, is_raw, || {
            let result = engine?.classify(sample, is_raw)?;
            Ok((result.class_id as f64, result))
        })
    }

    pub fn regress_systolic(
        &self,
        sample: &FeatureVector,
        is_raw: bool,
    ) -> Result<RegressionResult> {
        self.regress(BpTarget::Systolic, sample, is_raw)
    }

    pub fn regress_diastolic(
        &self,
        sample: &FeatureVector,
        is_raw: bool,
    ) -> Result<RegressionResult> {
        self.regress(BpTarget::Diastolic, sample, is_raw)
    }

    fn regress(
        &self,
        target: BpTarget,
        sample: &FeatureVector,
        is_raw: bool,
    ) -> Result<RegressionResult> {
        let engine = match target {
            BpTarget::Systolic => self.systolic(),
            BpTarget::Diastolic => self.diastolic(),
        };
        self.observe(target.schema().name, is_raw, || {
            let result = engine?.predict(sample, is_raw)?;
            Ok((result.predicted_value_mmhg, result))
        })
    }

    /// Time one prediction and record its outcome
    fn observe<T>(
        &self,
        model: &str,
        is_raw: bool,
        predict: impl FnOnce() -> Result<(f64, T)>,
    ) -> Result<T> {
        let input_type = InputType::from_is_raw(is_raw).as_str();
        let start = Instant::now();

        match predict() {
            Ok((value, result)) => {
                let elapsed = start.elapsed().as_secs_f64();
                self.metrics.observe_prediction_latency(model, elapsed);
                self.metrics.inc_predictions(model, input_type);
                self.logger.log_prediction(model, input_type, value, elapsed);
                Ok(result)
            }
            Err(e) => {
                self.metrics.inc_prediction_errors(model, e.kind());
                Err(e)
            }
        }
    }

    fn classifier(&self) -> Result<&ClassificationEngine> {
        resolve(&self.classifier, || {
            self.record_load(RANDOM_FOREST.name, self.load_classifier())
        })
    }

    fn systolic(&self) -> Result<&KnnRegressionEngine> {
        resolve(&self.systolic, || {
            let target = BpTarget::Systolic;
            self.record_load(target.schema().name, self.load_knn(target))
        })
    }

    fn diastolic(&self) -> Result<&KnnRegressionEngine> {
        resolve(&self.diastolic, || {
            let target = BpTarget::Diastolic;
            self.record_load(target.schema().name, self.load_knn(target))
        })
    }

    fn paths(&self, model: &str) -> Result<&ModelPaths> {
        self.paths
            .as_ref()
            .ok_or_else(|| PredictionError::load_failure(model, "no artifact paths configured"))
    }

    fn load_classifier(&self) -> Result<ClassificationEngine> {
        let name = RANDOM_FOREST.name;
        let paths = self.paths(name)?;
        let model = artifact::load_classifier(&paths.random_forest, name, RANDOM_FOREST.width())?;
        let scaler = artifact::load_scaler(&paths.random_forest_scaler, name)?;
        Ok(ClassificationEngine::new(&RANDOM_FOREST, model, scaler)?.strict(self.strict))
    }

    fn load_knn(&self, target: BpTarget) -> Result<KnnRegressionEngine> {
        let name = target.schema().name;
        let paths = self.paths(name)?;
        let (model_path, scaler_path) = match target {
            BpTarget::Systolic => (&paths.knn_systolic, &paths.knn_systolic_scaler),
            BpTarget::Diastolic => (&paths.knn_diastolic, &paths.knn_diastolic_scaler),
        };

        let knn = artifact::load_knn(model_path, name)?;
        let scaler = artifact::load_scaler(scaler_path, name)?;
        Ok(KnnRegressionEngine::from_knn(target, knn, scaler)?
            .strict(self.strict)
            .with_logger(self.logger.clone()))
    }

    fn record_load<E: PredictionEngine>(&self, model: &str, loaded: Result<E>) -> Result<E> {
        match &loaded {
            Ok(engine) => {
                self.metrics.set_model_loaded(model, true);
                self.logger.log_model_loaded(model, engine.has_scaler());
            }
            Err(e) => {
                self.metrics.set_model_loaded(model, false);
                self.logger.log_model_load_failed(model, &e.to_string());
            }
        }
        loaded
    }
}

fn resolve<E>(slot: &OnceLock<Result<E>>, init: impl FnOnce() -> Result<E>) -> Result<&E> {
    slot.get_or_init(init).as_ref().map_err(Clone::clone)
}

fn slot_status<E: PredictionEngine>(model: &str, slot: &OnceLock<Result<E>>) -> ModelStatus {
    match slot.get() {
        Some(Ok(engine)) => ModelStatus {
            model: model.to_string(),
            loaded: true,
            scaler_loaded: engine.has_scaler(),
            error: None,
        },
        Some(Err(e)) => ModelStatus {
            model: model.to_string(),
            loaded: false,
            scaler_loaded: false,
            error: Some(e.to_string()),
        },
        None => ModelStatus {
            model: model.to_string(),
            loaded: false,
            scaler_loaded: false,
            error: None,
        },
    }
}
