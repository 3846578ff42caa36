//! Brute-force k-nearest-neighbor regressor
//!
//! Stores the full (already normalized) training matrix and targets so the
//! serving path can both predict and inspect the targets of the neighbors
//! it used.

use super::{Neighbor, NeighborIndex, Regressor};
use crate::error::{PredictionError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Neighbor weighting used by `predict`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weights {
    #[default]
    Uniform,
    Distance,
}

fn default_p() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnRegressor {
    n_neighbors: usize,
    #[serde(default)]
    weights: Weights,
    /// Minkowski power (2 = euclidean, 1 = manhattan)
    #[serde(default = "default_p")]
    p: f64,
    fit_x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

impl KnnRegressor {
    pub fn new(
        n_neighbors: usize,
        weights: Weights,
        fit_x: Vec<Vec<f64>>,
        y: Vec<f64>,
    ) -> Result<Self> {
        let model = Self {
            n_neighbors,
            weights,
            p: default_p(),
            fit_x,
            y,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn with_p(mut self, p: f64) -> Result<Self> {
        self.p = p;
        self.validate()?;
        Ok(self)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let model: KnnRegressor = serde_json::from_slice(bytes)
            .map_err(|e| PredictionError::InvalidInput(format!("malformed knn model: {}", e)))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PredictionError::InvalidInput(msg));

        if self.fit_x.is_empty() {
            return invalid("knn model has no training samples".to_string());
        }
        if self.y.len() != self.fit_x.len() {
            return invalid(format!(
                "knn model has {} samples but {} targets",
                self.fit_x.len(),
                self.y.len()
            ));
        }
        let width = self.fit_x[0].len();
        if width == 0 || self.fit_x.iter().any(|row| row.len() != width) {
            return invalid("knn training rows must share a non-zero width".to_string());
        }
        if self.n_neighbors == 0 || self.n_neighbors > self.fit_x.len() {
            return invalid(format!(
                "n_neighbors {} outside 1..={}",
                self.n_neighbors,
                self.fit_x.len()
            ));
        }
        if !(self.p >= 1.0) {
            return invalid(format!("minkowski p must be >= 1, got {}", self.p));
        }
        Ok(())
    }

    pub fn n_samples(&self) -> usize {
        self.fit_x.len()
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let diffs = a.iter().zip(b).map(|(x, y)| (x - y).abs());
        if self.p == 2.0 {
            diffs.map(|d| d * d).sum::<f64>().sqrt()
        } else if self.p == 1.0 {
            diffs.sum()
        } else {
            diffs.map(|d| d.powf(self.p)).sum::<f64>().powf(1.0 / self.p)
        }
    }
}

impl NeighborIndex for KnnRegressor {
    fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Nearest first; equal distances keep training order
    fn k_neighbors(&self, x: &[f64], k: usize) -> Result<Vec<Neighbor>> {
        if x.len() != self.n_features() {
            return Err(PredictionError::DimensionMismatch {
                expected: self.n_features(),
                actual: x.len(),
            });
        }
        if k == 0 || k > self.n_samples() {
            return Err(PredictionError::NeighborQueryFailure(format!(
                "requested {} neighbors from {} samples",
                k,
                self.n_samples()
            )));
        }

        let mut neighbors: Vec<Neighbor> = self
            .fit_x
            .iter()
            .enumerate()
            .map(|(index, row)| Neighbor {
                index,
                distance: self.distance(x, row),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }

    fn training_targets(&self, indices: &[usize]) -> Result<Vec<f64>> {
        indices
            .iter()
            .map(|&i| {
                self.y.get(i).copied().ok_or_else(|| {
                    PredictionError::NeighborQueryFailure(format!(
                        "neighbor index {} outside {} training targets",
                        i,
                        self.y.len()
                    ))
                })
            })
            .collect()
    }
}

impl Regressor for KnnRegressor {
    fn n_features(&self) -> usize {
        self.fit_x[0].len()
    }

    fn predict(&self, x: &[f64]) -> Result<f64> {
        let neighbors = self.k_neighbors(x, self.n_neighbors)?;

        let uniform_mean =
            || neighbors.iter().map(|n| self.y[n.index]).sum::<f64>() / neighbors.len() as f64;

        match self.weights {
            Weights::Uniform => Ok(uniform_mean()),
            Weights::Distance => {
                // Exact matches take all the weight
                let exact: Vec<f64> = neighbors
                    .iter()
                    .filter(|n| n.distance == 0.0)
                    .map(|n| self.y[n.index])
                    .collect();
                if !exact.is_empty() {
                    return Ok(exact.iter().sum::<f64>() / exact.len() as f64);
                }

                let (weighted, total) = neighbors.iter().fold((0.0, 0.0), |(acc, w), n| {
                    let weight = 1.0 / n.distance;
                    (acc + weight * self.y[n.index], w + weight)
                });
                // Overflowed distances leave every weight at zero
                if total == 0.0 || !total.is_finite() {
                    return Ok(uniform_mean());
                }
                Ok(weighted / total)
            }
        }
    }
}
