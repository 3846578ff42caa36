//! HTTP API: prediction endpoints, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gateway_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::GatewayMetrics,
    ClassificationResult, FeatureVector, InputType, ModelRegistry, PredictionError,
    RegressionResult,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub health_registry: HealthRegistry,
    pub metrics: GatewayMetrics,
}

impl AppState {
    pub fn new(
        registry: Arc<ModelRegistry>,
        health_registry: HealthRegistry,
        metrics: GatewayMetrics,
    ) -> Self {
        Self {
            registry,
            health_registry,
            metrics,
        }
    }
}

/// Error body: `{"detail": "...", "error_type": "..."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub error_type: String,
}

/// Request failure mapped onto an HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn validation(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                detail: detail.into(),
                error_type: "validation_error".to_string(),
            },
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(e: PredictionError) -> Self {
        let status = match &e {
            PredictionError::ModelLoadFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorResponse {
                detail: e.to_string(),
                error_type: e.kind().to_string(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(
                status = %self.status,
                error_type = %self.body.error_type,
                detail = %self.body.detail,
                "Prediction request failed"
            );
        }
        (self.status, Json(self.body)).into_response()
    }
}

fn default_one() -> i64 {
    1
}

/// Flags arrive as `1` or `1.0`; anything with a fraction is rejected
fn integral<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() && value.fract() == 0.0 {
        Ok(value as i64)
    } else {
        Err(serde::de::Error::custom(format!("expected an integer, got {}", value)))
    }
}

/// Hypertension classifier input; every field except `is_raw` is required
#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRequest {
    #[serde(default)]
    pub is_raw: bool,
    #[serde(deserialize_with = "integral")]
    pub Sex: i64,
    pub Age: f64,
    pub Height: f64,
    pub Weight: f64,
    pub Systolic_BP: f64,
    pub Diastolic_BP: f64,
    pub Heart_Rate: f64,
    pub BMI: f64,
    #[serde(deserialize_with = "integral")]
    pub Diabetes_Diabetes: i64,
    #[serde(deserialize_with = "integral")]
    pub Diabetes_None: i64,
    #[serde(deserialize_with = "integral")]
    pub Diabetes_Type2: i64,
    #[serde(deserialize_with = "integral")]
    pub Cerebral_infarction_None: i64,
    #[serde(deserialize_with = "integral")]
    pub Cerebral_infarction_infarction: i64,
    #[serde(deserialize_with = "integral")]
    pub Cerebrovascular_None: i64,
    #[serde(deserialize_with = "integral")]
    pub Cerebrovascular_disease: i64,
    #[serde(deserialize_with = "integral")]
    pub Cerebrovascular_insuff: i64,
}

/// Indicator fields of the KNN requests; absent groups default to "None"
#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnIndicators {
    #[serde(default)]
    #[serde(deserialize_with = "integral")]
    pub Diabetes_Diabetes: i64,
    #[serde(default = "default_one")]
    #[serde(deserialize_with = "integral")]
    pub Diabetes_None: i64,
    #[serde(default)]
    #[serde(deserialize_with = "integral")]
    pub Diabetes_Type2: i64,
    #[serde(default = "default_one")]
    #[serde(deserialize_with = "integral")]
    pub Cerebral_infarction_None: i64,
    #[serde(default)]
    #[serde(deserialize_with = "integral")]
    pub Cerebral_infarction_infarction: i64,
    #[serde(default = "default_one")]
    #[serde(deserialize_with = "integral")]
    pub Cerebrovascular_None: i64,
    #[serde(default)]
    #[serde(deserialize_with = "integral")]
    pub Cerebrovascular_disease: i64,
    #[serde(default)]
    #[serde(deserialize_with = "integral")]
    pub Cerebrovascular_insuff: i64,
}

/// Systolic regressor input; diastolic BP is a feature
#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystolicRequest {
    #[serde(default)]
    pub is_raw: bool,
    #[serde(deserialize_with = "integral")]
    pub Sex: i64,
    pub Age: f64,
    pub Height: f64,
    pub Weight: f64,
    pub Diastolic_BP: f64,
    pub Heart_Rate: f64,
    pub BMI: f64,
    #[serde(flatten)]
    pub indicators: KnnIndicators,
}

/// Diastolic regressor input; systolic BP is a feature
#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiastolicRequest {
    #[serde(default)]
    pub is_raw: bool,
    #[serde(deserialize_with = "integral")]
    pub Sex: i64,
    pub Age: f64,
    pub Height: f64,
    pub Weight: f64,
    pub Systolic_BP: f64,
    pub Heart_Rate: f64,
    pub BMI: f64,
    #[serde(flatten)]
    pub indicators: KnnIndicators,
}

fn check_flag(name: &str, value: i64) -> Result<f64, ApiError> {
    if value == 0 || value == 1 {
        Ok(value as f64)
    } else {
        Err(ApiError::validation(format!("{} must be 0 or 1, got {}", name, value)))
    }
}

/// Builds the engine sample from numeric fields and 0/1 flags
struct SampleBuilder {
    sample: FeatureVector,
}

impl SampleBuilder {
    fn new() -> Self {
        Self {
            sample: FeatureVector::new(),
        }
    }

    fn value(mut self, name: &str, value: f64) -> Result<Self, ApiError> {
        if !value.is_finite() {
            return Err(ApiError::validation(format!("{} must be a finite number", name)));
        }
        self.sample.insert(name, value);
        Ok(self)
    }

    fn flag(mut self, name: &str, value: i64) -> Result<Self, ApiError> {
        self.sample.insert(name, check_flag(name, value)?);
        Ok(self)
    }

    fn indicators(self, ind: &KnnIndicators) -> Result<Self, ApiError> {
        self.flag("Diabetes_Diabetes", ind.Diabetes_Diabetes)?
            .flag("Diabetes_None", ind.Diabetes_None)?
            .flag("Diabetes_Type2", ind.Diabetes_Type2)?
            .flag("Cerebral_infarction_None", ind.Cerebral_infarction_None)?
            .flag("Cerebral_infarction_infarction", ind.Cerebral_infarction_infarction)?
            .flag("Cerebrovascular_None", ind.Cerebrovascular_None)?
            .flag("Cerebrovascular_disease", ind.Cerebrovascular_disease)?
            .flag("Cerebrovascular_insuff", ind.Cerebrovascular_insuff)
    }

    fn build(self) -> FeatureVector {
        self.sample
    }
}

impl RandomForestRequest {
    pub fn to_sample(&self) -> Result<FeatureVector, ApiError> {
        Ok(SampleBuilder::new()
            .flag("Sex", self.Sex)?
            .value("Age", self.Age)?
            .value("Height", self.Height)?
            .value("Weight", self.Weight)?
            .value("Systolic_BP", self.Systolic_BP)?
            .value("Diastolic_BP", self.Diastolic_BP)?
            .value("Heart_Rate", self.Heart_Rate)?
            .value("BMI", self.BMI)?
            .flag("Diabetes_Diabetes", self.Diabetes_Diabetes)?
            .flag("Diabetes_None", self.Diabetes_None)?
            .flag("Diabetes_Type2", self.Diabetes_Type2)?
            .flag("Cerebral_infarction_None", self.Cerebral_infarction_None)?
            .flag("Cerebral_infarction_infarction", self.Cerebral_infarction_infarction)?
            .flag("Cerebrovascular_None", self.Cerebrovascular_None)?
            .flag("Cerebrovascular_disease", self.Cerebrovascular_disease)?
            .flag("Cerebrovascular_insuff", self.Cerebrovascular_insuff)?
            .build())
    }
}

impl SystolicRequest {
    pub fn to_sample(&self) -> Result<FeatureVector, ApiError> {
        Ok(SampleBuilder::new()
            .flag("Sex", self.Sex)?
            .value("Age", self.Age)?
            .value("Height", self.Height)?
            .value("Weight", self.Weight)?
            .value("Diastolic_BP", self.Diastolic_BP)?
            .value("Heart_Rate", self.Heart_Rate)?
            .value("BMI", self.BMI)?
            .indicators(&self.indicators)?
            .build())
    }
}

impl DiastolicRequest {
    pub fn to_sample(&self) -> Result<FeatureVector, ApiError> {
        Ok(SampleBuilder::new()
            .flag("Sex", self.Sex)?
            .value("Age", self.Age)?
            .value("Height", self.Height)?
            .value("Weight", self.Weight)?
            .value("Systolic_BP", self.Systolic_BP)?
            .value("Heart_Rate", self.Heart_Rate)?
            .value("BMI", self.BMI)?
            .indicators(&self.indicators)?
            .build())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub prediction: i64,
    pub label: String,
    pub probability: f64,
    pub model_type: String,
}

impl From<ClassificationResult> for ClassificationResponse {
    fn from(result: ClassificationResult) -> Self {
        Self {
            prediction: result.class_id,
            label: result.label,
            probability: result.probability,
            model_type: "Random Forest".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BpPredictionResponse {
    #[serde(flatten)]
    pub result: RegressionResult,
    pub input_type: InputType,
    pub model_type: String,
}

/// Availability summary served at `/` and `/health`
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: ComponentStatus,
    pub message: String,
    pub models: BTreeMap<String, String>,
}

fn model_description(model: &str) -> &'static str {
    match model {
        "random_forest" => "Hypertension Classification",
        "knn_systolic" => "Systolic BP Prediction",
        "knn_diastolic" => "Diastolic BP Prediction",
        _ => "Prediction",
    }
}

async fn service_status(State(state): State<Arc<AppState>>) -> Json<ServiceStatus> {
    let health = state.health_registry.health().await;
    let models = state
        .registry
        .status()
        .into_iter()
        .map(|s| {
            let availability = if s.loaded {
                format!("available - {}", model_description(&s.model))
            } else {
                match s.error {
                    Some(error) => format!("unavailable - {}", error),
                    None => "not loaded".to_string(),
                }
            };
            (s.model, availability)
        })
        .collect();

    Json(ServiceStatus {
        status: health.status,
        message: format!("Blood Pressure Prediction Gateway v{} is running", GATEWAY_VERSION),
        models,
    })
}

async fn predict_random_forest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RandomForestRequest>, JsonRejection>,
) -> Result<Json<ClassificationResponse>, ApiError> {
    let Json(request) = payload?;
    let sample = request.to_sample()?;
    let result = state.registry.classify(&sample, request.is_raw)?;
    Ok(Json(result.into()))
}

async fn predict_systolic(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SystolicRequest>, JsonRejection>,
) -> Result<Json<BpPredictionResponse>, ApiError> {
    let Json(request) = payload?;
    let sample = request.to_sample()?;
    let result = state.registry.regress_systolic(&sample, request.is_raw)?;
    Ok(Json(BpPredictionResponse {
        result,
        input_type: InputType::from_is_raw(request.is_raw),
        model_type: "knn_systolic".to_string(),
    }))
}

async fn predict_diastolic(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DiastolicRequest>, JsonRejection>,
) -> Result<Json<BpPredictionResponse>, ApiError> {
    let Json(request) = payload?;
    let sample = request.to_sample()?;
    let result = state.registry.regress_diastolic(&sample, request.is_raw)?;
    Ok(Json(BpPredictionResponse {
        result,
        input_type: InputType::from_is_raw(request.is_raw),
        model_type: "knn_diastolic".to_string(),
    }))
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Some models still serve
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("failed to encode metrics: {}", e).into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(service_status))
        .route("/health", get(service_status))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/random-forest/predict", post(predict_random_forest))
        .route("/api/v1/knn/predict/systolic", post(predict_systolic))
        .route("/api/v1/knn/predict/diastolic", post(predict_diastolic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server
pub async fn serve(addr: String, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knn_request_indicator_defaults() {
        let request: SystolicRequest = serde_json::from_str(
            r#"{"Sex": 1, "Age": 45, "Height": 152, "Weight": 63, "Diastolic_BP": 89, "Heart_Rate": 97, "BMI": 27.27}"#,
        )
        .unwrap();
        assert!(!request.is_raw);

        let sample = request.to_sample().unwrap();
        assert_eq!(sample.get("Diabetes_None"), Some(1.0));
        assert_eq!(sample.get("Cerebral_infarction_None"), Some(1.0));
        assert_eq!(sample.get("Cerebrovascular_None"), Some(1.0));
        assert_eq!(sample.get("Diabetes_Type2"), Some(0.0));
        assert_eq!(sample.len(), 15);
    }

    #[test]
    fn test_flag_validation() {
        let request: DiastolicRequest = serde_json::from_str(
            r#"{"Sex": 2, "Age": 45, "Height": 152, "Weight": 63, "Systolic_BP": 161, "Heart_Rate": 97, "BMI": 27.27}"#,
        )
        .unwrap();
        let err = request.to_sample().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.body.detail.contains("Sex"));
    }

    #[test]
    fn test_integral_float_flags_accepted() {
        let request: SystolicRequest = serde_json::from_str(
            r#"{"Sex": 1.0, "Age": 45, "Height": 152, "Weight": 63, "Diastolic_BP": 89, "Heart_Rate": 97, "BMI": 27.27, "Diabetes_None": 0.0, "Diabetes_Type2": 1.0}"#,
        )
        .unwrap();
        let sample = request.to_sample().unwrap();
        assert_eq!(sample.get("Sex"), Some(1.0));
        assert_eq!(sample.get("Diabetes_None"), Some(0.0));
        assert_eq!(sample.get("Diabetes_Type2"), Some(1.0));

        let fractional = serde_json::from_str::<SystolicRequest>(
            r#"{"Sex": 0.5, "Age": 45, "Height": 152, "Weight": 63, "Diastolic_BP": 89, "Heart_Rate": 97, "BMI": 27.27}"#,
        );
        assert!(fractional.is_err());
    }

    #[test]
    fn test_error_mapping() {
        let unavailable: ApiError = PredictionError::load_failure("knn_systolic", "missing").into();
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.body.error_type, "model_load_failure");

        let client: ApiError = PredictionError::ScalerUnavailable {
            model: "random_forest".to_string(),
        }
        .into();
        assert_eq!(client.status, StatusCode::BAD_REQUEST);

        let server: ApiError = PredictionError::Inference("tract failed".to_string()).into();
        assert_eq!(server.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
