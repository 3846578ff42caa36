//! Random forest classifier loaded from an exported tree-array JSON
//!
//! Each tree uses the flat array layout of a fitted sklearn
//! `DecisionTreeClassifier.tree_`: node `i` is a leaf when
//! `children_left[i] == -1`, otherwise the sample goes left when
//! `x[feature[i]] <= threshold[i]`.

use super::{ClassPrediction, Classifier};
use crate::error::{PredictionError, Result};
use serde::{Deserialize, Serialize};

const LEAF: i64 = -1;

/// One decision tree in array form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights, `[n_nodes][n_classes]`
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> std::result::Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err(format!("tree arrays disagree on node count {}", n));
        }

        for i in 0..n {
            let (left, right) = (self.children_left[i], self.children_right[i]);
            if self.value[i].len() != n_classes {
                return Err(format!("node {} has {} class weights", i, self.value[i].len()));
            }
            if left == LEAF {
                continue;
            }
            let in_range = |c: i64| c > i as i64 && (c as usize) < n;
            if !in_range(left) || !in_range(right) {
                return Err(format!("node {} has invalid children ({}, {})", i, left, right));
            }
            if self.feature[i] < 0 || self.feature[i] as usize >= n_features {
                return Err(format!("node {} splits on feature {}", i, self.feature[i]));
            }
        }
        Ok(())
    }

    /// Leaf reached by `x`
    fn apply(&self, x: &[f64]) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let f = self.feature[node] as usize;
            // Thresholds were learned on float32 inputs
            let value = x[f] as f32 as f64;
            node = if value <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    /// Normalized class distribution at the leaf reached by `x`
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let weights = &self.value[self.apply(x)];
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter().map(|w| w / total).collect()
        } else {
            weights.clone()
        }
    }
}

/// Ensemble of decision trees voting by averaged leaf probabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub classes: Vec<i64>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(classes: Vec<i64>, n_features: usize, trees: Vec<DecisionTree>) -> Result<Self> {
        let forest = Self {
            classes,
            n_features,
            trees,
        };
        forest.validate()?;
        Ok(forest)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let forest: RandomForest = serde_json::from_slice(bytes)
            .map_err(|e| PredictionError::InvalidInput(format!("malformed forest: {}", e)))?;
        forest.validate()?;
        Ok(forest)
    }

    fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(PredictionError::InvalidInput("forest has no classes".to_string()));
        }
        if self.trees.is_empty() {
            return Err(PredictionError::InvalidInput("forest has no trees".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.classes.len())
                .map_err(|e| PredictionError::InvalidInput(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }

    /// Mean of per-tree leaf distributions, indexed like `classes`
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.n_features {
            return Err(PredictionError::DimensionMismatch {
                expected: self.n_features,
                actual: x.len(),
            });
        }

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(x)) {
                *acc += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        Ok(proba)
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: &[f64]) -> Result<ClassPrediction> {
        let proba = self.predict_proba(x)?;
        // First maximum wins, as with numpy argmax
        let (best, p) = proba
            .iter()
            .enumerate()
            .fold((0usize, f64::NEG_INFINITY), |(bi, bp), (i, &p)| {
                if p > bp {
                    (i, p)
                } else {
                    (bi, bp)
                }
            });

        Ok(ClassPrediction {
            class_id: self.classes[best],
            probability: Some(p),
        })
    }
}
