//! Core data models for the prediction gateway

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One input sample: feature name to numeric value.
///
/// Holds both continuous readings (age, height, blood pressure, ...) and
/// 0/1 one-hot indicators. Order is not significant here; the aligner
/// produces the ordered vector a model consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: HashMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Whether request values are raw physical units or already z-scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Raw,
    Normalized,
}

impl InputType {
    pub fn from_is_raw(is_raw: bool) -> Self {
        if is_raw {
            InputType::Raw
        } else {
            InputType::Normalized
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Raw => "raw",
            InputType::Normalized => "normalized",
        }
    }
}

/// Hypertension classification output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub class_id: i64,
    pub label: String,
    pub probability: f64,
}

/// Blood pressure regression output with neighbor-based uncertainty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub predicted_normalized: f64,
    pub prediction_std_normalized: f64,
    #[serde(rename = "predicted_value_mmHg")]
    pub predicted_value_mmhg: f64,
    #[serde(rename = "prediction_std_mmHg")]
    pub prediction_std_mmhg: f64,
    pub confidence_interval_lower: f64,
    pub confidence_interval_upper: f64,
}
