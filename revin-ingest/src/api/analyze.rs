//! Upload endpoint
//!
//! POST /analyze with a multipart body:
//! - `file`: the review export (required)
//! - `kind`: "csv" / "xlsx" / ... (optional, otherwise taken from the file name)
//!
//! Request problems are answered with a plain JSON error. Once the upload is
//! accepted the response is an NDJSON stream fed by a run on its own task.

use crate::error::{ApiError, ApiResult};
use crate::models::FileKind;
use crate::workflow::{RunOutcome, Upload};
use crate::AppState;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use revin_common::ndjson::ndjson_response;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Events buffered between the run and the HTTP body
const EVENT_CHANNEL_CAPACITY: usize = 32;

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut declared_kind: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("kind") => {
                declared_kind = Some(field.text().await.map_err(multipart_error)?);
            }
            other => {
                debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("missing 'file' field".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("uploaded file is empty".to_string()));
    }

    let kind = FileKind::detect(declared_kind.as_deref(), file_name.as_deref()).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "unsupported file type '{}'; expected delimited text (csv) or a spreadsheet (xlsx)",
            declared_kind
                .as_deref()
                .or(file_name.as_deref())
                .unwrap_or("")
        ))
    })?;

    info!(
        file = file_name.as_deref().unwrap_or("<unnamed>"),
        kind = ?kind,
        bytes = bytes.len(),
        "Upload accepted"
    );

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let upload = Upload {
        file_name,
        kind,
        bytes,
    };

    let pipeline = state.pipeline.clone();
    let last_error = state.last_error.clone();
    tokio::spawn(async move {
        if let RunOutcome::Failed(err) = pipeline.run(upload, tx).await {
            *last_error.write().await = Some(err.to_string());
        }
    });

    Ok(ndjson_response(rx))
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}
