//! Core library for the blood pressure prediction gateway
//!
//! This crate provides:
//! - Feature alignment and z-score scaling of request samples
//! - Portable model artifacts (random forest, KNN, ONNX) and their loaders
//! - Classification and KNN regression engines with neighbor-based intervals
//! - A model registry with per-model load failure isolation
//! - Health checks and observability

pub mod artifact;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod preprocessing;
pub mod registry;

pub use engine::{BpTarget, ClassificationEngine, KnnRegressionEngine, PredictionEngine};
pub use error::{PredictionError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{GatewayMetrics, StructuredLogger};
pub use preprocessing::{FeatureAligner, Scaler};
pub use registry::{ModelPaths, ModelRegistry, ModelStatus};
