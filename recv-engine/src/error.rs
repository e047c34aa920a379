//! Error types for recv-engine

use crate::services::{AnalysisError, CameraError, OrderApiError, PredictionError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Engine-level errors for capture, ledger, and reconciliation logic
#[derive(Debug, Error)]
pub enum EngineError {
    /// No active supplier selected for the session
    #[error("No active supplier selected")]
    NoActiveSupplier,

    /// The active catalog holds no materials
    #[error("Catalog is empty for the active supplier")]
    EmptyCatalog,

    /// A capture flow is already running
    #[error("A capture is already in progress")]
    CaptureInProgress,

    /// Operation requires a different engine state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No loaded order references the given product
    #[error("No loaded order references product {0}")]
    MissingOrderReference(i64),

    /// Material id not present in the active catalog
    #[error("Material {0} not found in the active catalog")]
    UnknownMaterial(i64),

    /// Supplier code not present in the day's orders
    #[error("Supplier {0} not found in the loaded orders")]
    UnknownSupplier(String),

    /// Ledger index out of range
    #[error("Ledger index {0} out of range")]
    IndexOutOfRange(usize),

    /// Ledger holds no measurements
    #[error("Ledger is empty")]
    EmptyLedger,

    /// Missing disposition for a material in the finalize batch
    #[error("No disposition assigned for material {0}")]
    MissingDisposition(i64),

    /// Image acquisition failed (camera collaborator)
    #[error("Image capture failed: {0}")]
    Capture(#[from] CameraError),

    /// Remote persistence of a measurement or batch failed
    #[error("Order system error: {0}")]
    Persistence(#[from] OrderApiError),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g., capture already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream service failure (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Engine error, mapped per variant
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// recv-common error
    #[error("Common error: {0}")]
    Common(#[from] recv_common::Error),
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<OrderApiError> for ApiError {
    fn from(err: OrderApiError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Engine(ref err) => {
                let status = match err {
                    EngineError::CaptureInProgress => StatusCode::CONFLICT,
                    EngineError::InvalidState(_) => StatusCode::CONFLICT,
                    EngineError::IndexOutOfRange(_)
                    | EngineError::UnknownMaterial(_)
                    | EngineError::UnknownSupplier(_)
                    | EngineError::MissingOrderReference(_) => StatusCode::NOT_FOUND,
                    EngineError::NoActiveSupplier
                    | EngineError::EmptyCatalog
                    | EngineError::EmptyLedger
                    | EngineError::MissingDisposition(_) => StatusCode::BAD_REQUEST,
                    EngineError::Capture(_) | EngineError::Persistence(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                (status, "ENGINE_ERROR", err.to_string())
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
