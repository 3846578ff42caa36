//! Trained feature layouts for each served model
//!
//! Column order here is load-bearing: it is the order the models were
//! trained with and the order the scalers are applied against.

/// External request field name to trained column name.
///
/// The one-hot columns were produced by pandas `get_dummies` on the raw
/// category strings, so the trained names carry the full category text.
pub const INDICATOR_RENAMES: &[(&str, &str)] = &[
    ("Diabetes_Type2", "Diabetes_Type 2 Diabetes"),
    ("Cerebral_infarction_infarction", "Cerebral_infarction_cerebral infarction"),
    ("Cerebrovascular_None", "Cerebrovascular_disease_None"),
    ("Cerebrovascular_disease", "Cerebrovascular_disease_cerebrovascular disease"),
    (
        "Cerebrovascular_insuff",
        "Cerebrovascular_disease_insufficiency of cerebral blood supply",
    ),
];

/// Fixed layout of one model's input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSchema {
    /// Model identifier used in logs, metrics and health
    pub name: &'static str,
    /// Full input vector in trained column order
    pub feature_order: &'static [&'static str],
    /// Numeric subset scaled when input is raw, in scaler fit order
    pub scaled_features: &'static [&'static str],
    /// Per-model rename table applied before lookup
    pub renames: &'static [(&'static str, &'static str)],
}

impl ModelSchema {
    pub fn width(&self) -> usize {
        self.feature_order.len()
    }

    /// Trained name for an incoming field
    pub fn canonical_name<'a>(&self, name: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|(external, _)| *external == name)
            .map(|(_, internal)| *internal)
            .unwrap_or(name)
    }
}

pub const RANDOM_FOREST: ModelSchema = ModelSchema {
    name: "random_forest",
    feature_order: &[
        "Sex",
        "Age",
        "Height",
        "Weight",
        "Systolic_BP",
        "Diastolic_BP",
        "Heart_Rate",
        "BMI",
        "Diabetes_Diabetes",
        "Diabetes_None",
        "Diabetes_Type 2 Diabetes",
        "Cerebral_infarction_None",
        "Cerebral_infarction_cerebral infarction",
        "Cerebrovascular_disease_None",
        "Cerebrovascular_disease_cerebrovascular disease",
        "Cerebrovascular_disease_insufficiency of cerebral blood supply",
    ],
    scaled_features: &[
        "Age",
        "Height",
        "Weight",
        "Systolic_BP",
        "Diastolic_BP",
        "Heart_Rate",
        "BMI",
    ],
    renames: INDICATOR_RENAMES,
};

/// Predicts systolic BP; diastolic BP is an input
pub const KNN_SYSTOLIC: ModelSchema = ModelSchema {
    name: "knn_systolic",
    feature_order: &[
        "Sex",
        "Age",
        "Height",
        "Weight",
        "Diastolic_BP",
        "Heart_Rate",
        "BMI",
        "Diabetes_Diabetes",
        "Diabetes_None",
        "Diabetes_Type 2 Diabetes",
        "Cerebral_infarction_None",
        "Cerebral_infarction_cerebral infarction",
        "Cerebrovascular_disease_None",
        "Cerebrovascular_disease_cerebrovascular disease",
        "Cerebrovascular_disease_insufficiency of cerebral blood supply",
    ],
    scaled_features: &["Age", "Height", "Weight", "Diastolic_BP", "Heart_Rate", "BMI"],
    renames: INDICATOR_RENAMES,
};

/// Predicts diastolic BP; systolic BP is an input
pub const KNN_DIASTOLIC: ModelSchema = ModelSchema {
    name: "knn_diastolic",
    feature_order: &[
        "Sex",
        "Age",
        "Height",
        "Weight",
        "Systolic_BP",
        "Heart_Rate",
        "BMI",
        "Diabetes_Diabetes",
        "Diabetes_None",
        "Diabetes_Type 2 Diabetes",
        "Cerebral_infarction_None",
        "Cerebral_infarction_cerebral infarction",
        "Cerebrovascular_disease_None",
        "Cerebrovascular_disease_cerebrovascular disease",
        "Cerebrovascular_disease_insufficiency of cerebral blood supply",
    ],
    scaled_features: &["Age", "Height", "Weight", "Systolic_BP", "Heart_Rate", "BMI"],
    renames: INDICATOR_RENAMES,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(RANDOM_FOREST.width(), 16);
        assert_eq!(KNN_SYSTOLIC.width(), 15);
        assert_eq!(KNN_DIASTOLIC.width(), 15);
    }

    #[test]
    fn test_scaled_features_are_in_feature_order() {
        for schema in [RANDOM_FOREST, KNN_SYSTOLIC, KNN_DIASTOLIC] {
            for f in schema.scaled_features {
                assert!(schema.feature_order.contains(f), "{} missing {}", schema.name, f);
            }
            assert!(!schema.scaled_features.contains(&"Sex"));
        }
    }

    #[test]
    fn test_rename_targets_exist_in_every_model() {
        for schema in [RANDOM_FOREST, KNN_SYSTOLIC, KNN_DIASTOLIC] {
            for (_, internal) in schema.renames {
                assert!(schema.feature_order.contains(internal));
            }
        }
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(
            RANDOM_FOREST.canonical_name("Diabetes_Type2"),
            "Diabetes_Type 2 Diabetes"
        );
        assert_eq!(RANDOM_FOREST.canonical_name("Age"), "Age");
    }

    #[test]
    fn test_knn_models_exclude_their_target() {
        assert!(!KNN_SYSTOLIC.feature_order.contains(&"Systolic_BP"));
        assert!(!KNN_DIASTOLIC.feature_order.contains(&"Diastolic_BP"));
    }
}
