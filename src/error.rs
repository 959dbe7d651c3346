//! Request-level errors returned as plain-text responses

use crate::feature_extractor::FeatureError;
use crate::types::patient::IdentityError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Features(#[from] FeatureError),

    #[error("Prediction failed: {0}")]
    Inference(anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Identity(_) | ServiceError::Features(_) => StatusCode::BAD_REQUEST,
            ServiceError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
