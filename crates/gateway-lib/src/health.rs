//! Health check infrastructure for the prediction gateway
//!
//! Each served model is a component. A model whose artifacts failed to load
//! is unhealthy while the others keep serving, which leaves the gateway as a
//! whole degraded rather than down.

use crate::registry::ModelStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Unhealthy only when nothing is operational; any failed or degraded
    /// component otherwise degrades the whole
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        if components.is_empty() {
            return ComponentStatus::Healthy;
        }

        let operational = components
            .values()
            .filter(|h| h.status.is_operational())
            .count();

        if operational == 0 {
            ComponentStatus::Unhealthy
        } else if components
            .values()
            .all(|h| h.status == ComponentStatus::Healthy)
        {
            ComponentStatus::Healthy
        } else {
            ComponentStatus::Degraded
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking, one per served model
pub mod components {
    pub const RANDOM_FOREST: &str = "random_forest";
    pub const KNN_SYSTOLIC: &str = "knn_systolic";
    pub const KNN_DIASTOLIC: &str = "knn_diastolic";
}

/// Health registry for tracking component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record a model's load outcome. A model without its scaler still
    /// serves normalized input, so it counts as degraded.
    pub async fn record_load(&self, status: &ModelStatus) {
        let health = match (&status.error, status.scaler_loaded) {
            (Some(error), _) => ComponentHealth::unhealthy(error.clone()),
            (None, true) => ComponentHealth::healthy(),
            (None, false) => ComponentHealth::degraded("scaler not loaded; raw input is rejected"),
        };
        self.update(&status.model, health).await;
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once startup finished and at least one model can serve
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let any_serving = self
            .components
            .read()
            .await
            .values()
            .any(|h| h.status.is_operational());

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Gateway not yet initialized".to_string()),
            }
        } else if !any_serving {
            ReadinessResponse {
                ready: false,
                reason: Some("No model available".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}
