//! API client for the prediction gateway

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the prediction gateway
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Gateway errors carry {detail, error_type}; fall back to the raw body
            match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => {
                    anyhow::bail!("API error ({}, {}): {}", status, err.error_type, err.detail)
                }
                Err(_) => anyhow::bail!("API error ({}): {}", status, body),
            }
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn classify(&self, sample: &serde_json::Value) -> Result<ClassificationResponse> {
        self.post("api/v1/random-forest/predict", sample).await
    }

    pub async fn predict_systolic(&self, sample: &serde_json::Value) -> Result<BpPrediction> {
        self.post("api/v1/knn/predict/systolic", sample).await
    }

    pub async fn predict_diastolic(&self, sample: &serde_json::Value) -> Result<BpPrediction> {
        self.post("api/v1/knn/predict/diastolic", sample).await
    }

    pub async fn status(&self) -> Result<ServiceStatus> {
        self.get("health").await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub error_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub prediction: i64,
    pub label: String,
    pub probability: f64,
    pub model_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpPrediction {
    pub predicted_normalized: f64,
    pub prediction_std_normalized: f64,
    #[serde(rename = "predicted_value_mmHg")]
    pub predicted_value_mmhg: f64,
    #[serde(rename = "prediction_std_mmHg")]
    pub prediction_std_mmhg: f64,
    pub confidence_interval_lower: f64,
    pub confidence_interval_upper: f64,
    pub input_type: String,
    pub model_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub message: String,
    pub models: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_classify_posts_sample() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/random-forest/predict")
            .match_body(mockito::Matcher::PartialJson(json!({"is_raw": true, "Age": 45.0})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"prediction":3,"label":"Stage 2 Hypertension","probability":0.75,"model_type":"Random Forest"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result = client
            .classify(&json!({"is_raw": true, "Age": 45.0}))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.prediction, 3);
        assert_eq!(result.label, "Stage 2 Hypertension");
    }

    #[tokio::test]
    async fn test_bp_prediction_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/knn/predict/diastolic")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "predicted_normalized": 0.5,
                    "prediction_std_normalized": 0.1,
                    "predicted_value_mmHg": 77.4,
                    "prediction_std_mmHg": 1.1,
                    "confidence_interval_lower": 75.2,
                    "confidence_interval_upper": 79.6,
                    "input_type": "normalized",
                    "model_type": "knn_diastolic"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result = client.predict_diastolic(&json!({})).await.unwrap();

        assert_eq!(result.predicted_value_mmhg, 77.4);
        assert_eq!(result.input_type, "normalized");
        assert!(result.confidence_interval_lower <= result.confidence_interval_upper);
    }

    #[tokio::test]
    async fn test_gateway_error_detail_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/knn/predict/systolic")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"detail":"Failed to load model 'knn_systolic': missing","error_type":"model_load_failure"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.predict_systolic(&json!({})).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("model_load_failure"));
        assert!(message.contains("knn_systolic"));
    }

    #[tokio::test]
    async fn test_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"degraded","message":"2 of 3 models available","models":{"knn_diastolic":"unavailable - missing"}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let status = client.status().await.unwrap();
        assert_eq!(status.status, "degraded");
        assert_eq!(status.models.len(), 1);
    }

    #[test]
    fn test_invalid_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
