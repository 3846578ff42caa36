use super::{check_artifacts, PredictionEngine};
use crate::artifact::{KnnRegressor, NeighborIndex, Regressor};
use crate::error::{PredictionError, Result};
use crate::models::{FeatureVector, RegressionResult};
use crate::observability::{GatewayMetrics, StructuredLogger};
use crate::preprocessing::{
    denormalize, population_std, FeatureAligner, ModelSchema, Scaler, KNN_DIASTOLIC, KNN_SYSTOLIC,
};
use std::sync::Arc;

/// Two-sided 95% normal quantile
pub const Z_95: f64 = 1.96;

/// Blood pressure reading a regression engine predicts.
///
/// Carries the frozen statistics the training targets were normalized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpTarget {
    Systolic,
    Diastolic,
}

impl BpTarget {
    pub fn mean(&self) -> f64 {
        match self {
            BpTarget::Systolic => 127.945205,
            BpTarget::Diastolic => 71.849315,
        }
    }

    pub fn std(&self) -> f64 {
        match self {
            BpTarget::Systolic => 20.377779,
            BpTarget::Diastolic => 11.111203,
        }
    }

    pub fn schema(&self) -> &'static ModelSchema {
        match self {
            BpTarget::Systolic => &KNN_SYSTOLIC,
            BpTarget::Diastolic => &KNN_DIASTOLIC,
        }
    }
}

/// KNN blood pressure regressor reporting a neighbor-based interval
pub struct KnnRegressionEngine {
    target: BpTarget,
    model: Arc<dyn Regressor>,
    index: Option<Arc<dyn NeighborIndex>>,
    scaler: Option<Scaler>,
    aligner: FeatureAligner,
    metrics: GatewayMetrics,
    logger: StructuredLogger,
}

impl KnnRegressionEngine {
    pub fn new(
        target: BpTarget,
        model: Arc<dyn Regressor>,
        index: Option<Arc<dyn NeighborIndex>>,
        scaler: Option<Scaler>,
    ) -> Result<Self> {
        let schema = target.schema();
        check_artifacts(schema, model.n_features(), scaler.as_ref())?;
        Ok(Self {
            target,
            model,
            index,
            scaler,
            aligner: FeatureAligner::new(schema),
            metrics: GatewayMetrics::new(),
            logger: StructuredLogger::new(env!("CARGO_PKG_NAME")),
        })
    }

    /// One KNN model serving both the prediction and the neighbor queries
    pub fn from_knn(
        target: BpTarget,
        knn: Arc<KnnRegressor>,
        scaler: Option<Scaler>,
    ) -> Result<Self> {
        Self::new(target, knn.clone(), Some(knn), scaler)
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.aligner = self.aligner.strict(strict);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn target(&self) -> BpTarget {
        self.target
    }

    pub fn predict(&self, sample: &FeatureVector, is_raw: bool) -> Result<RegressionResult> {
        let x = self.align_and_scale(sample, is_raw)?;

        let predicted_normalized = self.model.predict(&x)?;
        let predicted_value_mmhg =
            denormalize(predicted_normalized, self.target.mean(), self.target.std());

        let prediction_std_normalized = match self.neighbor_std(&x) {
            Ok(std) => std,
            Err(e) => {
                self.logger.log_neighbor_fallback(self.model_name(), &e.to_string());
                self.metrics.inc_neighbor_fallbacks(self.model_name());
                0.0
            }
        };
        let prediction_std_mmhg = prediction_std_normalized * self.target.std();
        let half_width = Z_95 * prediction_std_mmhg;

        Ok(RegressionResult {
            predicted_normalized,
            prediction_std_normalized,
            predicted_value_mmhg,
            prediction_std_mmhg,
            confidence_interval_lower: predicted_value_mmhg - half_width,
            confidence_interval_upper: predicted_value_mmhg + half_width,
        })
    }

    /// Population std of the normalized training targets of the k nearest
    /// training samples
    fn neighbor_std(&self, x: &[f64]) -> Result<f64> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| {
                PredictionError::NeighborQueryFailure("no neighbor index loaded".to_string())
            })?;

        let neighbors = index.k_neighbors(x, index.n_neighbors())?;
        let indices: Vec<usize> = neighbors.iter().map(|n| n.index).collect();
        let targets = index.training_targets(&indices)?;
        Ok(population_std(&targets))
    }
}

impl PredictionEngine for KnnRegressionEngine {
    fn aligner(&self) -> &FeatureAligner {
        &self.aligner
    }

    fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Neighbor, Weights};

    const WIDTH: usize = 15;

    /// Training rows spread along Age (index 1); targets follow Age
    fn knn(targets: [f64; 5]) -> Arc<KnnRegressor> {
        let fit_x = (0..5)
            .map(|i| {
                let mut row = vec![0.0; WIDTH];
                row[1] = i as f64;
                row
            })
            .collect();
        Arc::new(KnnRegressor::new(3, Weights::Uniform, fit_x, targets.to_vec()).unwrap())
    }

    fn systolic_scaler() -> Scaler {
        Scaler::from_parts(
            KNN_SYSTOLIC.scaled_features.iter().map(|s| s.to_string()).collect(),
            vec![45.0, 160.0, 65.0, 72.0, 75.0, 25.0],
            vec![10.0, 10.0, 12.0, 11.0, 10.0, 4.0],
        )
        .unwrap()
    }

    fn raw_sample() -> FeatureVector {
        FeatureVector::new()
            .with("Sex", 1.0)
            .with("Age", 55.0)
            .with("Height", 165.0)
            .with("Weight", 70.0)
            .with("Diastolic_BP", 85.0)
            .with("Heart_Rate", 75.0)
            .with("BMI", 25.7)
            .with("Diabetes_None", 1.0)
            .with("Cerebral_infarction_None", 1.0)
            .with("Cerebrovascular_None", 1.0)
    }

    struct BrokenIndex;

    impl NeighborIndex for BrokenIndex {
        fn n_neighbors(&self) -> usize {
            3
        }

        fn k_neighbors(&self, _x: &[f64], k: usize) -> Result<Vec<Neighbor>> {
            Ok((0..k)
                .map(|i| Neighbor {
                    index: 100 + i,
                    distance: 0.0,
                })
                .collect())
        }

        fn training_targets(&self, indices: &[usize]) -> Result<Vec<f64>> {
            Err(PredictionError::NeighborQueryFailure(format!(
                "indices {:?} out of range",
                indices
            )))
        }
    }

    #[test]
    fn test_systolic_scenario() {
        let model = knn([-1.0, 0.0, 0.5, 1.0, 2.0]);
        let engine =
            KnnRegressionEngine::from_knn(BpTarget::Systolic, model, Some(systolic_scaler()))
                .unwrap();
        let result = engine.predict(&raw_sample(), true).unwrap();

        // Age 55 scales to 1.0: neighbors are rows 1, 0, 2
        assert!((result.predicted_normalized - (-0.5 / 3.0)).abs() < 1e-12);
        let expected_mmhg = result.predicted_normalized * 20.377779 + 127.945205;
        assert!((result.predicted_value_mmhg - expected_mmhg).abs() < 1e-9);

        let expected_std = population_std(&[-1.0, 0.0, 0.5]);
        assert!((result.prediction_std_normalized - expected_std).abs() < 1e-12);
        assert!((result.prediction_std_mmhg - expected_std * 20.377779).abs() < 1e-9);

        assert!(result.confidence_interval_lower <= result.predicted_value_mmhg);
        assert!(result.predicted_value_mmhg <= result.confidence_interval_upper);
        let half = result.predicted_value_mmhg - result.confidence_interval_lower;
        assert!((half - 1.96 * result.prediction_std_mmhg).abs() < 1e-9);
    }

    #[test]
    fn test_zero_dispersion_collapses_interval() {
        let engine =
            KnnRegressionEngine::from_knn(BpTarget::Diastolic, knn([0.5; 5]), None).unwrap();
        let result = engine.predict(&FeatureVector::new().with("Age", 2.0), false).unwrap();

        assert_eq!(result.prediction_std_normalized, 0.0);
        assert_eq!(result.confidence_interval_lower, result.predicted_value_mmhg);
        assert_eq!(result.confidence_interval_upper, result.predicted_value_mmhg);
        assert!((result.predicted_value_mmhg - (0.5 * 11.111203 + 71.849315)).abs() < 1e-9);
    }

    #[test]
    fn test_extreme_input_keeps_interval_ordered() {
        let fit_x = (0..5)
            .map(|i| {
                let mut row = vec![0.0; WIDTH];
                row[1] = i as f64;
                row
            })
            .collect();
        let model = Arc::new(
            KnnRegressor::new(3, Weights::Distance, fit_x, vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap(),
        );
        let engine = KnnRegressionEngine::from_knn(BpTarget::Systolic, model, None).unwrap();

        let result = engine
            .predict(&FeatureVector::new().with("Age", 1e200), false)
            .unwrap();

        assert!(result.predicted_value_mmhg.is_finite());
        assert!(result.confidence_interval_lower <= result.predicted_value_mmhg);
        assert!(result.predicted_value_mmhg <= result.confidence_interval_upper);
    }

    #[test]
    fn test_neighbor_failure_falls_back_to_point_estimate() {
        let metrics = GatewayMetrics::new();
        let before = metrics.neighbor_fallbacks("knn_systolic");

        let model = knn([-1.0, 0.0, 0.5, 1.0, 2.0]);
        let index: Arc<dyn NeighborIndex> = Arc::new(BrokenIndex);
        let engine =
            KnnRegressionEngine::new(BpTarget::Systolic, model, Some(index), None).unwrap();
        let result = engine.predict(&FeatureVector::new().with("Age", 4.0), false).unwrap();

        assert_eq!(result.prediction_std_normalized, 0.0);
        assert_eq!(result.prediction_std_mmhg, 0.0);
        assert_eq!(result.confidence_interval_lower, result.predicted_value_mmhg);
        assert_eq!(result.confidence_interval_upper, result.predicted_value_mmhg);
        assert!(metrics.neighbor_fallbacks("knn_systolic") > before);
    }

    #[test]
    fn test_missing_index_falls_back() {
        let model = knn([0.0, 1.0, 2.0, 3.0, 4.0]);
        let engine = KnnRegressionEngine::new(BpTarget::Diastolic, model, None, None).unwrap();
        let result = engine.predict(&FeatureVector::new(), false).unwrap();
        assert_eq!(result.prediction_std_mmhg, 0.0);
        assert!((result.predicted_normalized - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_raw_without_scaler_fails() {
        let engine =
            KnnRegressionEngine::from_knn(BpTarget::Systolic, knn([0.0; 5]), None).unwrap();
        assert_eq!(
            engine.predict(&raw_sample(), true).unwrap_err(),
            PredictionError::ScalerUnavailable {
                model: "knn_systolic".to_string()
            }
        );
    }

    #[test]
    fn test_correlated_reading_is_scaled() {
        let engine = KnnRegressionEngine::from_knn(
            BpTarget::Systolic,
            knn([0.0; 5]),
            Some(systolic_scaler()),
        )
        .unwrap();
        let x = engine.align_and_scale(&raw_sample(), true).unwrap();
        // Diastolic_BP sits at index 4 in the systolic layout
        assert!((x[4] - 13.0 / 11.0).abs() < 1e-12);
        assert_eq!(x[0], 1.0);
    }

    #[test]
    fn test_mismatched_scaler_rejected() {
        let diastolic_err = KnnRegressionEngine::from_knn(
            BpTarget::Diastolic,
            knn([0.0; 5]),
            Some(systolic_scaler()),
        );
        assert!(matches!(diastolic_err, Err(PredictionError::ModelLoadFailure { .. })));
    }

    #[test]
    fn test_deterministic() {
        let model = knn([-1.0, 0.0, 0.5, 1.0, 2.0]);
        let engine =
            KnnRegressionEngine::from_knn(BpTarget::Systolic, model, Some(systolic_scaler()))
                .unwrap();
        let first = engine.predict(&raw_sample(), true).unwrap();
        for _ in 0..10 {
            assert_eq!(engine.predict(&raw_sample(), true).unwrap(), first);
        }
    }
}
