//! Route handlers

use crate::error::{Result, ServiceError};
use crate::types::patient::{IdentityQuery, PatientForm};
use crate::types::prediction::{ModelKind, Prediction};
use crate::web::templates::{ClassifierTemplate, IndexTemplate, OutcomeView};
use crate::web::AppState;
use axum::extract::{Form, Query, State};
use axum::Json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub async fn health() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<crate::metrics::MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

pub async fn home(Query(query): Query<IdentityQuery>) -> IndexTemplate {
    info!(hh_number = %query.hh_number, patient_address = %query.patient_address, "Home page requested");
    IndexTemplate::new(query.hh_number, query.patient_address)
}

/// Empty classifier form
pub async fn show_form(
    State(state): State<Arc<AppState>>,
    kind: ModelKind,
    query: IdentityQuery,
) -> ClassifierTemplate {
    ClassifierTemplate {
        model: kind,
        feature_names: state.features.feature_names(),
        hh_number: query.hh_number,
        patient_address: query.patient_address,
        outcome: None,
    }
}

/// Score a submitted form with one classifier.
///
/// Only the primary classifier requires a patient identity and records
/// its result on the ledger; ledger failures are logged, never returned.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    kind: ModelKind,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<ClassifierTemplate> {
    let form = PatientForm::new(fields);

    let identity = if kind.records_on_ledger() {
        match form.identity() {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(model = %kind, error = %e, "Rejected submission");
                state.metrics.record_rejection();
                return Err(e.into());
            }
        }
    } else {
        None
    };

    let features = state.features.extract(&form).map_err(|e| {
        warn!(model = %kind, error = %e, "Rejected submission");
        state.metrics.record_rejection();
        ServiceError::from(e)
    })?;

    let start = Instant::now();
    let probability = state.engine.predict(kind, features).await.map_err(|e| {
        error!(model = %kind, error = %e, "Inference failed");
        state.metrics.record_inference_error();
        ServiceError::Inference(e)
    })?;

    let prediction = Prediction::from_probability(kind, probability, &state.thresholds);
    state.metrics.record_prediction(
        kind,
        start.elapsed(),
        prediction.probability,
        prediction.risk_level,
    );

    info!(
        prediction_id = %prediction.prediction_id,
        model = %kind,
        probability = prediction.probability,
        risk_level = %prediction.risk_level,
        "Prediction computed"
    );

    if let (Some(identity), Some(recorder)) = (&identity, &state.recorder) {
        match recorder
            .store_prediction(&identity.hh_number, &prediction, &identity.patient_address)
            .await
        {
            Ok(receipt) => {
                state.metrics.record_ledger_write(true);
                info!(
                    prediction_id = %prediction.prediction_id,
                    hh_number = %identity.hh_number,
                    tx_hash = %receipt.transaction_hash,
                    "Prediction stored on chain"
                );
            }
            Err(e) => {
                state.metrics.record_ledger_write(false);
                error!(
                    prediction_id = %prediction.prediction_id,
                    hh_number = %identity.hh_number,
                    error = %e,
                    "Error storing prediction on chain"
                );
            }
        }
    }

    let (hh_number, patient_address) = match identity {
        Some(identity) => (identity.hh_number, identity.patient_address),
        None => Default::default(),
    };

    Ok(ClassifierTemplate {
        model: kind,
        feature_names: state.features.feature_names(),
        hh_number,
        patient_address,
        outcome: Some(OutcomeView::from(&prediction)),
    })
}
