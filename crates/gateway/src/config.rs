//! Gateway configuration

use anyhow::{Context, Result};
use gateway_lib::ModelPaths;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file read when `GATEWAY_CONFIG_FILE` is unset
pub const DEFAULT_CONFIG_FILE: &str = "config/gateway.toml";

const ENV_PREFIX: &str = "GATEWAY";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Instance name used in structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory the artifact paths below are relative to
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Classifier artifact; `.onnx` is loaded through tract
    #[serde(default = "default_random_forest_model")]
    pub random_forest_model: PathBuf,

    #[serde(default = "default_random_forest_scaler")]
    pub random_forest_scaler: PathBuf,

    #[serde(default = "default_knn_systolic_model")]
    pub knn_systolic_model: PathBuf,

    #[serde(default = "default_knn_systolic_scaler")]
    pub knn_systolic_scaler: PathBuf,

    #[serde(default = "default_knn_diastolic_model")]
    pub knn_diastolic_model: PathBuf,

    #[serde(default = "default_knn_diastolic_scaler")]
    pub knn_diastolic_scaler: PathBuf,

    /// Reject request fields that no model input matches
    #[serde(default)]
    pub strict_features: bool,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "bp-gateway".to_string())
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_random_forest_model() -> PathBuf {
    PathBuf::from("random_forest.json")
}

fn default_random_forest_scaler() -> PathBuf {
    PathBuf::from("random_forest_scaler.json")
}

fn default_knn_systolic_model() -> PathBuf {
    PathBuf::from("knn_systolic.json")
}

fn default_knn_systolic_scaler() -> PathBuf {
    PathBuf::from("knn_systolic_scaler.json")
}

fn default_knn_diastolic_model() -> PathBuf {
    PathBuf::from("knn_diastolic.json")
}

fn default_knn_diastolic_scaler() -> PathBuf {
    PathBuf::from("knn_diastolic_scaler.json")
}

impl GatewayConfig {
    /// Load configuration from the config file and `GATEWAY_*` environment
    pub fn load() -> Result<Self> {
        let file = std::env::var("GATEWAY_CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&file), ENV_PREFIX)
    }

    /// Environment variables override the file; a missing file is fine
    pub fn load_from(file: &Path, env_prefix: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(file).required(false))
            .add_source(config::Environment::with_prefix(env_prefix))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", file.display()))?;

        config
            .try_deserialize()
            .context("Invalid gateway configuration")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Artifact paths resolved against `model_dir`; absolute paths are kept
    pub fn model_paths(&self) -> ModelPaths {
        let resolve = |p: &PathBuf| self.model_dir.join(p);
        ModelPaths {
            random_forest: resolve(&self.random_forest_model),
            random_forest_scaler: resolve(&self.random_forest_scaler),
            knn_systolic: resolve(&self.knn_systolic_model),
            knn_systolic_scaler: resolve(&self.knn_systolic_scaler),
            knn_diastolic: resolve(&self.knn_diastolic_model),
            knn_diastolic_scaler: resolve(&self.knn_diastolic_scaler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Prefix no test environment sets
    const TEST_PREFIX: &str = "BPG_CONFIG_TEST_UNSET";

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config =
            GatewayConfig::load_from(&dir.path().join("absent.toml"), TEST_PREFIX).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.model_dir, PathBuf::from("models"));
        assert!(!config.strict_features);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.model_paths(), ModelPaths::in_dir("models"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gateway.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
port = 9100
model_dir = "/srv/models"
random_forest_model = "forest.onnx"
knn_diastolic_scaler = "/etc/bp/diastolic_scaler.json"
strict_features = true
log_format = "pretty"
"#
        )
        .unwrap();

        let config = GatewayConfig::load_from(&path, TEST_PREFIX).unwrap();
        assert_eq!(config.port, 9100);
        assert!(config.strict_features);
        assert_eq!(config.log_format, LogFormat::Pretty);

        let paths = config.model_paths();
        assert_eq!(paths.random_forest, PathBuf::from("/srv/models/forest.onnx"));
        assert_eq!(paths.knn_systolic, PathBuf::from("/srv/models/knn_systolic.json"));
        assert_eq!(
            paths.knn_diastolic_scaler,
            PathBuf::from("/etc/bp/diastolic_scaler.json")
        );
    }

    #[test]
    fn test_invalid_value_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "port = \"not a port\"\n").unwrap();
        assert!(GatewayConfig::load_from(&path, TEST_PREFIX).is_err());
    }
}
