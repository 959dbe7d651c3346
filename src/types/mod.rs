//! Type definitions for the heart risk service

pub mod patient;
pub mod prediction;

pub use patient::{IdentityError, IdentityQuery, PatientForm, PatientIdentity};
pub use prediction::{ModelKind, Prediction, RiskLevel, RiskThresholds};
