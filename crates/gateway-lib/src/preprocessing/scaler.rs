//! Per-feature z-score scaler
//!
//! Fit once offline from a reference raw dataset, persisted as JSON and
//! loaded read-only by the engines. Scaling is positional: the feature
//! order used at fit time must match the order used at transform time.

use crate::error::{PredictionError, Result};
use crate::models::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Ordered (feature, mean, scale) triples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    features: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    #[serde(default)]
    n_samples_seen: usize,
}

impl Scaler {
    /// Build a scaler from precomputed statistics
    pub fn from_parts(features: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = Self {
            features,
            mean,
            scale,
            n_samples_seen: 0,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Fit mean and population standard deviation (divide by N) per feature.
    ///
    /// A constant column gets scale 1.0 so transform never divides by zero.
    pub fn fit<S: AsRef<str>>(samples: &[FeatureVector], order: &[S]) -> Result<Self> {
        if samples.is_empty() {
            return Err(PredictionError::InvalidInput(
                "cannot fit scaler on an empty reference set".to_string(),
            ));
        }

        let mut features = Vec::with_capacity(order.len());
        let mut mean = Vec::with_capacity(order.len());
        let mut scale = Vec::with_capacity(order.len());

        for name in order {
            let name = name.as_ref();
            let column = samples
                .iter()
                .map(|s| {
                    s.get(name)
                        .ok_or_else(|| PredictionError::MissingFeature(name.to_string()))
                })
                .collect::<Result<Vec<f64>>>()?;

            let std = population_std(&column);
            features.push(name.to_string());
            mean.push(mean_of(&column));
            scale.push(if std == 0.0 { 1.0 } else { std });
        }

        Ok(Self {
            features,
            mean,
            scale,
            n_samples_seen: samples.len(),
        })
    }

    /// Parse and validate a persisted scaler
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let scaler: Scaler = serde_json::from_slice(bytes)
            .map_err(|e| PredictionError::InvalidInput(format!("malformed scaler: {}", e)))?;
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| PredictionError::InvalidInput(format!("{}: {}", path.display(), e)))?;
        Self::from_json_slice(&bytes)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self
            .to_json_pretty()
            .map_err(|e| PredictionError::InvalidInput(format!("failed to encode scaler: {}", e)))?;
        fs::write(path, json)
            .map_err(|e| PredictionError::InvalidInput(format!("{}: {}", path.display(), e)))
    }

    fn validate(&self) -> Result<()> {
        let n = self.features.len();
        if self.mean.len() != n || self.scale.len() != n {
            return Err(PredictionError::DimensionMismatch {
                expected: n,
                actual: self.mean.len().min(self.scale.len()),
            });
        }
        if let Some(i) = self.scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(PredictionError::InvalidInput(format!(
                "scale for '{}' must be finite and non-zero",
                self.features[i]
            )));
        }
        Ok(())
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Scale `sample` in the given order.
    ///
    /// `order` must be the fitted feature list and the sample must cover it.
    pub fn transform<S: AsRef<str>>(
        &self,
        sample: &FeatureVector,
        order: &[S],
    ) -> Result<Vec<f64>> {
        self.check_order(order)?;

        let values: Vec<f64> = order.iter().filter_map(|name| sample.get(name.as_ref())).collect();
        if values.len() != order.len() {
            return Err(PredictionError::DimensionMismatch {
                expected: order.len(),
                actual: values.len(),
            });
        }

        self.transform_values(&values)
    }

    /// Positional transform of an already ordered vector
    pub fn transform_values(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.len() {
            return Err(PredictionError::DimensionMismatch {
                expected: self.len(),
                actual: values.len(),
            });
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| normalize(*x, *m, *s))
            .collect())
    }

    /// Scale the slots of an aligned model vector that this scaler covers.
    ///
    /// `order` names every position of `values`; positions for features the
    /// scaler does not know (sex flag, indicators) are left untouched.
    pub fn transform_in_place<S: AsRef<str>>(&self, values: &mut [f64], order: &[S]) -> Result<()> {
        if values.len() != order.len() {
            return Err(PredictionError::DimensionMismatch {
                expected: order.len(),
                actual: values.len(),
            });
        }

        for (i, feature) in self.features.iter().enumerate() {
            let pos = order
                .iter()
                .position(|name| name.as_ref() == feature)
                .ok_or_else(|| PredictionError::MissingFeature(feature.clone()))?;
            values[pos] = normalize(values[pos], self.mean[i], self.scale[i]);
        }
        Ok(())
    }

    /// Undo scaling for a single value of the named feature
    pub fn inverse_transform(&self, value: f64, feature: &str) -> Result<f64> {
        let i = self
            .features
            .iter()
            .position(|f| f == feature)
            .ok_or_else(|| PredictionError::UnknownFeature(feature.to_string()))?;
        Ok(denormalize(value, self.mean[i], self.scale[i]))
    }

    fn check_order<S: AsRef<str>>(&self, order: &[S]) -> Result<()> {
        if order.len() != self.len() {
            return Err(PredictionError::DimensionMismatch {
                expected: self.len(),
                actual: order.len(),
            });
        }
        if self.features.iter().zip(order).any(|(expected, got)| expected != got.as_ref()) {
            return Err(PredictionError::DimensionMismatch {
                expected: self.len(),
                actual: order.len(),
            });
        }
        Ok(())
    }
}

/// z-score: `(value - mean) / std`
pub fn normalize(value: f64, mean: f64, std: f64) -> f64 {
    (value - mean) / std
}

/// Inverse z-score: `value * std + mean`
pub fn denormalize(value: f64, mean: f64, std: f64) -> f64 {
    value * std + mean
}

pub fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation dividing by N (no Bessel correction)
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_of(values);
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: [&str; 2] = ["Age", "Weight"];

    fn reference() -> Vec<FeatureVector> {
        vec![
            FeatureVector::new().with("Age", 40.0).with("Weight", 60.0),
            FeatureVector::new().with("Age", 50.0).with("Weight", 70.0),
            FeatureVector::new().with("Age", 60.0).with("Weight", 80.0),
        ]
    }

    #[test]
    fn test_fit_uses_population_std() {
        let scaler = Scaler::fit(&reference(), &ORDER).unwrap();
        assert_eq!(scaler.mean(), &[50.0, 70.0]);
        // sqrt(200 / 3), not sqrt(200 / 2)
        let expected = (200.0f64 / 3.0).sqrt();
        assert!((scaler.scale()[0] - expected).abs() < 1e-12);
        assert_eq!(scaler.n_samples_seen(), 3);
    }

    #[test]
    fn test_population_std_known_values() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std(&values) - 2.0).abs() < 1e-12);
        assert_eq!(population_std(&[]), 0.0);
        assert_eq!(population_std(&[3.5]), 0.0);
    }

    #[test]
    fn test_constant_column_gets_unit_scale() {
        let samples = vec![
            FeatureVector::new().with("Sex", 1.0),
            FeatureVector::new().with("Sex", 1.0),
        ];
        let scaler = Scaler::fit(&samples, &["Sex"]).unwrap();
        assert_eq!(scaler.scale(), &[1.0]);
        assert_eq!(scaler.transform_values(&[1.0]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_fit_rejects_empty_and_missing() {
        assert!(Scaler::fit(&[], &ORDER).is_err());
        let samples = vec![FeatureVector::new().with("Age", 1.0)];
        assert_eq!(
            Scaler::fit(&samples, &ORDER).unwrap_err(),
            PredictionError::MissingFeature("Weight".to_string())
        );
    }

    #[test]
    fn test_transform_in_given_order() {
        let scaler = Scaler::fit(&reference(), &ORDER).unwrap();
        let sample = FeatureVector::new().with("Age", 50.0).with("Weight", 80.0).with("Sex", 1.0);
        let scaled = scaler.transform(&sample, &ORDER).unwrap();
        assert_eq!(scaled[0], 0.0);
        assert!(scaled[1] > 1.0);
    }

    #[test]
    fn test_transform_missing_field_is_dimension_mismatch() {
        let scaler = Scaler::fit(&reference(), &ORDER).unwrap();
        let sample = FeatureVector::new().with("Age", 50.0);
        assert_eq!(
            scaler.transform(&sample, &ORDER).unwrap_err(),
            PredictionError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_transform_rejects_reordered_features() {
        let scaler = Scaler::fit(&reference(), &ORDER).unwrap();
        let sample = FeatureVector::new().with("Age", 50.0).with("Weight", 70.0);
        assert!(matches!(
            scaler.transform(&sample, &["Weight", "Age"]),
            Err(PredictionError::DimensionMismatch { expected: 2, actual: 2 })
        ));
        assert!(matches!(
            scaler.transform(&sample, &["Age"]),
            Err(PredictionError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_transform_in_place_skips_unscaled_slots() {
        let scaler = Scaler::fit(&reference(), &ORDER).unwrap();
        let order = ["Sex", "Age", "Diabetes_None", "Weight"];
        let mut values = vec![1.0, 50.0, 1.0, 70.0];
        scaler.transform_in_place(&mut values, &order).unwrap();
        assert_eq!(values, vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_transform_in_place_missing_slot() {
        let scaler = Scaler::fit(&reference(), &ORDER).unwrap();
        let mut values = vec![1.0, 50.0];
        let err = scaler.transform_in_place(&mut values, &["Sex", "Age"]).unwrap_err();
        assert_eq!(err, PredictionError::MissingFeature("Weight".to_string()));
    }

    #[test]
    fn test_json_round_trip_and_validation() {
        let scaler = Scaler::fit(&reference(), &ORDER).unwrap();
        let json = scaler.to_json_pretty().unwrap();
        let loaded = Scaler::from_json_slice(json.as_bytes()).unwrap();
        assert_eq!(loaded, scaler);

        let bad = br#"{"features": ["Age"], "mean": [1.0, 2.0], "scale": [1.0]}"#;
        assert!(Scaler::from_json_slice(bad).is_err());
        let zero = br#"{"features": ["Age"], "mean": [1.0], "scale": [0.0]}"#;
        assert!(Scaler::from_json_slice(zero).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scaler.json");
        let scaler = Scaler::fit(&reference(), &ORDER).unwrap();
        scaler.save(&path).unwrap();
        assert_eq!(Scaler::load(&path).unwrap(), scaler);
        assert!(Scaler::load(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_inverse_transform_unknown_feature() {
        let scaler = Scaler::fit(&reference(), &ORDER).unwrap();
        assert!(scaler.inverse_transform(0.0, "Height").is_err());
        assert_eq!(scaler.inverse_transform(0.0, "Age").unwrap(), 50.0);
    }

    mod properties {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn prop_normalize_round_trip(
                v in -1000.0f64..1000.0,
                m in -500.0f64..500.0,
                s in 0.01f64..100.0
            ) {
                let back = denormalize(normalize(v, m, s), m, s);
                prop_assert!((back - v).abs() <= 1e-9 * v.abs().max(1.0));
            }

            #[test]
            fn prop_scaler_round_trip(
                rows in prop::collection::vec((0.0f64..200.0, 30.0f64..150.0), 2..30),
                age in 0.0f64..120.0
            ) {
                let samples: Vec<FeatureVector> = rows
                    .iter()
                    .map(|(a, w)| FeatureVector::new().with("Age", *a).with("Weight", *w))
                    .collect();
                let scaler = Scaler::fit(&samples, &["Age", "Weight"]).unwrap();
                let sample = FeatureVector::new().with("Age", age).with("Weight", 70.0);
                let scaled = scaler.transform(&sample, &["Age", "Weight"]).unwrap();
                let back = scaler.inverse_transform(scaled[0], "Age").unwrap();
                prop_assert!((back - age).abs() < 1e-9 * age.abs().max(1.0));
            }
        }
    }
}
