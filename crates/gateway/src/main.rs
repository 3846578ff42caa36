//! Blood pressure prediction gateway
//!
//! Serves a hypertension classifier and two KNN blood pressure regressors
//! over HTTP. Models load once at startup; a model whose artifacts are
//! missing or corrupt answers 503 while the others keep serving.

use anyhow::Result;
use bp_gateway::{
    api,
    config::{GatewayConfig, LogFormat},
};
use gateway_lib::{
    health::HealthRegistry,
    observability::{GatewayMetrics, StructuredLogger},
    ModelRegistry,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so it can pick the log format
    let config = GatewayConfig::load()?;
    init_tracing(config.log_format);

    info!(
        instance = %config.instance_name,
        model_dir = %config.model_dir.display(),
        "Starting bp-gateway"
    );

    let metrics = GatewayMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);

    // Load every model up front; failures stay isolated to their model
    let registry = Arc::new(ModelRegistry::new(
        config.model_paths(),
        config.strict_features,
        logger.clone(),
    ));
    let warm = registry.clone();
    let statuses = tokio::task::spawn_blocking(move || warm.warm_up()).await?;

    let health_registry = HealthRegistry::new();
    for status in &statuses {
        health_registry.record_load(status).await;
    }

    let app_state = Arc::new(api::AppState::new(registry, health_registry.clone(), metrics));

    // Mark gateway as ready after initialization
    health_registry.set_ready(true).await;

    let bind_addr = config.bind_addr();
    logger.log_startup(GATEWAY_VERSION, &bind_addr);

    let api_handle = tokio::spawn(api::serve(bind_addr, app_state));

    tokio::select! {
        result = api_handle => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
        }
    }

    Ok(())
}
