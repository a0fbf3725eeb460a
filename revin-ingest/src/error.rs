//! Error types for revin-ingest
//!
//! - `ApiError`: request-level failures, returned before any stream is opened
//! - `PipelineError`: fatal run failures, reported as the terminal `error` event

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
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

/// Fatal pipeline failures
///
/// Per-record classification failures are not represented here; they are
/// absorbed by the enrichment scheduler and surface only as degraded labels.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No encoding/format produced parseable, content-bearing rows
    #[error("Unable to decode file: {reason}")]
    Decode { reason: String },

    /// A required field could not be resolved on the first record
    #[error(
        "Required column '{field}' not found. Available columns: {}",
        available_columns.join(", ")
    )]
    Schema {
        field: String,
        available_columns: Vec<String>,
    },

    /// A required field resolved but is empty on a later row
    #[error("Row {row} has an empty '{field}' value")]
    EmptyRequiredValue { field: String, row: usize },

    /// The outbound event channel is gone (client disconnected)
    #[error("Event stream closed by consumer")]
    StreamWrite,
}

impl PipelineError {
    pub fn decode(reason: impl Into<String>) -> Self {
        PipelineError::Decode {
            reason: reason.into(),
        }
    }

    /// Machine-readable code carried in the `error` event
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Decode { .. } => "decode_error",
            PipelineError::Schema { .. } | PipelineError::EmptyRequiredValue { .. } => {
                "schema_error"
            }
            PipelineError::StreamWrite => "stream_write_error",
        }
    }
}

/// Result type for pipeline stages
pub type PipelineResult<T> = Result<T, PipelineError>;
