//! Maps a sparse request sample onto a model's trained column order

use super::schema::ModelSchema;
use crate::error::{PredictionError, Result};
use crate::models::FeatureVector;
use std::collections::HashMap;

/// Produces the fully populated, ordered input vector for one model.
///
/// Rules, in order: rename external field names through the model's table,
/// fill every absent feature with 0, emit in trained column order. One-hot
/// exclusivity is the caller's concern.
#[derive(Debug, Clone, Copy)]
pub struct FeatureAligner {
    schema: &'static ModelSchema,
    strict: bool,
}

impl FeatureAligner {
    /// Permissive aligner: unknown fields are dropped
    pub fn new(schema: &'static ModelSchema) -> Self {
        Self {
            schema,
            strict: false,
        }
    }

    /// Fail with `UnknownFeature` instead of dropping unmatched fields
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn schema(&self) -> &'static ModelSchema {
        self.schema
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn align(&self, sample: &FeatureVector) -> Result<Vec<f64>> {
        let order = self.schema.feature_order;
        let mut slots: HashMap<&str, f64> = HashMap::with_capacity(order.len());
        let mut renamed: Vec<(&str, f64)> = Vec::new();

        for (name, value) in sample.iter() {
            let canonical = self.schema.canonical_name(name);
            if !order.iter().any(|f| *f == canonical) {
                if self.strict {
                    return Err(PredictionError::UnknownFeature(name.to_string()));
                }
                continue;
            }
            if canonical == name {
                slots.insert(canonical, value);
            } else {
                renamed.push((canonical, value));
            }
        }

        // A renamed short field wins over a trained-name field sent alongside it
        slots.extend(renamed);

        Ok(order
            .iter()
            .map(|feature| slots.get(*feature).copied().unwrap_or(0.0))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::schema::{KNN_SYSTOLIC, RANDOM_FOREST};
    use proptest::prelude::*;

    fn full_sample() -> FeatureVector {
        RANDOM_FOREST
            .feature_order
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, i as f64))
            .collect()
    }

    #[test]
    fn test_renames_short_indicator_names() {
        let aligner = FeatureAligner::new(&RANDOM_FOREST);
        let sample = FeatureVector::new()
            .with("Diabetes_Type2", 1.0)
            .with("Cerebrovascular_insuff", 1.0);
        let aligned = aligner.align(&sample).unwrap();

        let pos = |name: &str| RANDOM_FOREST.feature_order.iter().position(|f| *f == name).unwrap();
        assert_eq!(aligned[pos("Diabetes_Type 2 Diabetes")], 1.0);
        assert_eq!(
            aligned[pos("Cerebrovascular_disease_insufficiency of cerebral blood supply")],
            1.0
        );
    }

    #[test]
    fn test_missing_indicator_defaults_to_zero() {
        let aligner = FeatureAligner::new(&KNN_SYSTOLIC);
        let sample = FeatureVector::new().with("Age", 45.0).with("Diabetes_None", 1.0);
        let aligned = aligner.align(&sample).unwrap();

        assert_eq!(aligned.len(), KNN_SYSTOLIC.width());
        assert_eq!(aligned[1], 45.0);
        assert_eq!(aligned[7], 0.0); // Diabetes_Diabetes
        assert_eq!(aligned[8], 1.0); // Diabetes_None
    }

    #[test]
    fn test_unknown_fields_dropped_by_default() {
        let aligner = FeatureAligner::new(&KNN_SYSTOLIC);
        let sample = FeatureVector::new().with("is_raw", 1.0).with("Systolic_BP", 150.0);
        let aligned = aligner.align(&sample).unwrap();
        assert!(aligned.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_strict_mode_rejects_unknown_fields() {
        let aligner = FeatureAligner::new(&KNN_SYSTOLIC).strict(true);
        let sample = FeatureVector::new().with("Systolic_BP", 150.0);
        assert_eq!(
            aligner.align(&sample).unwrap_err(),
            PredictionError::UnknownFeature("Systolic_BP".to_string())
        );
    }

    #[test]
    fn test_renamed_field_overrides_trained_name() {
        let aligner = FeatureAligner::new(&RANDOM_FOREST);
        let sample = FeatureVector::new()
            .with("Diabetes_Type 2 Diabetes", 0.0)
            .with("Diabetes_Type2", 1.0);
        let aligned = aligner.align(&sample).unwrap();
        assert_eq!(aligned[10], 1.0);
    }

    #[test]
    fn test_full_sample_is_noop() {
        let aligner = FeatureAligner::new(&RANDOM_FOREST);
        let aligned = aligner.align(&full_sample()).unwrap();
        let expected: Vec<f64> = (0..RANDOM_FOREST.width()).map(|i| i as f64).collect();
        assert_eq!(aligned, expected);
    }

    proptest! {
        #[test]
        fn prop_align_ordered_vector_is_noop(
            values in prop::collection::vec(-10.0f64..10.0, 16)
        ) {
            let aligner = FeatureAligner::new(&RANDOM_FOREST).strict(true);
            let sample: FeatureVector = RANDOM_FOREST
                .feature_order
                .iter()
                .zip(&values)
                .map(|(name, v)| (*name, *v))
                .collect();
            let once = aligner.align(&sample).unwrap();
            prop_assert_eq!(&once, &values);

            let again: FeatureVector = RANDOM_FOREST
                .feature_order
                .iter()
                .zip(&once)
                .map(|(name, v)| (*name, *v))
                .collect();
            prop_assert_eq!(aligner.align(&again).unwrap(), once);
        }
    }
}
