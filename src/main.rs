//! Heart Risk Service - Main Entry Point
//!
//! Serves the classifier pages, scores submitted forms with the ONNX
//! models, and records primary-classifier results on chain.

use anyhow::{Context, Result};
use heart_risk_service::{
    config::AppConfig,
    ledger::PredictionRecorder,
    metrics::{MetricsReporter, ServiceMetrics},
    models::inference::InferenceEngine,
    telemetry,
    web::{self, AppState},
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    telemetry::init(&config.logging)?;

    info!("Starting Heart Risk Service");
    info!(
        "Risk tiers: MEDIUM > {:.1}%, HIGH > {:.1}%",
        config.risk.medium, config.risk.high
    );

    let metrics = Arc::new(ServiceMetrics::new());

    let engine = InferenceEngine::new(&config.models)?;
    info!(
        "Inference engine initialized with {} models: {:?}",
        engine.model_count(),
        engine.model_names()
    );

    let recorder = if config.blockchain.enabled {
        Some(PredictionRecorder::connect(&config.blockchain).await?)
    } else {
        warn!("Blockchain recording disabled; predictions will not be stored on chain");
        None
    };

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = Arc::new(AppState::new(&config, engine, recorder, metrics.clone()));
    let app = web::router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
