//! HTTP routes for the classifier pages

pub mod handlers;
pub mod templates;

use crate::config::AppConfig;
use crate::feature_extractor::FeatureExtractor;
use crate::ledger::PredictionRecorder;
use crate::metrics::ServiceMetrics;
use crate::models::InferenceEngine;
use crate::types::patient::IdentityQuery;
use crate::types::prediction::{ModelKind, RiskThresholds};
use axum::extract::{Form, Query, State};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// State shared by every handler
pub struct AppState {
    pub engine: InferenceEngine,
    pub features: FeatureExtractor,
    pub recorder: Option<PredictionRecorder>,
    pub thresholds: RiskThresholds,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        engine: InferenceEngine,
        recorder: Option<PredictionRecorder>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            engine,
            features: FeatureExtractor::new(),
            recorder,
            thresholds: config.risk.clone(),
            metrics,
        }
    }
}

/// Build the application router.
///
/// Each classifier gets a `GET /show<slug>` form page and a
/// `POST /predict<slug>` endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics));

    for kind in ModelKind::ALL {
        router = router
            .route(
                &kind.show_path(),
                get(
                    move |state: State<Arc<AppState>>, Query(query): Query<IdentityQuery>| {
                        handlers::show_form(state, kind, query)
                    },
                ),
            )
            .route(
                &kind.predict_path(),
                post(
                    move |state: State<Arc<AppState>>, form: Form<Vec<(String, String)>>| {
                        handlers::predict(state, kind, form)
                    },
                ),
            );
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
