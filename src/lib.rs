//! Heart Disease Risk Service Library
//!
//! Scores patient health forms with pre-trained classifiers and records
//! the result against the patient's on-chain registration.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod telemetry;
pub mod types;
pub mod web;

pub use config::AppConfig;
pub use error::ServiceError;
pub use feature_extractor::FeatureExtractor;
pub use ledger::PredictionRecorder;
pub use models::inference::InferenceEngine;
pub use types::{patient::PatientForm, prediction::Prediction};
