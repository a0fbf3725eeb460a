//! Newline-delimited JSON (NDJSON) event streaming
//!
//! The producer side turns a channel of [`PipelineEvent`]s into a chunked
//! HTTP body, one JSON object per line, written as soon as each event arrives.
//! The consumer side ([`NdjsonDecoder`]) reassembles lines from arbitrary
//! chunk boundaries, since a stream may end with the connection rather than
//! at a tidy document boundary.

use crate::events::PipelineEvent;
use crate::{Error, Result};
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Content type of the analysis stream
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Serialize one event as a single NDJSON line (with trailing newline)
pub fn encode_line(event: &PipelineEvent) -> Result<Bytes> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Build a streaming body that forwards events from `rx` until the sender is dropped
pub fn ndjson_body(mut rx: mpsc::Receiver<PipelineEvent>) -> Body {
    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match encode_line(&event) {
                Ok(line) => {
                    debug!("NDJSON: forwarding {} event", event.event_type());
                    yield Ok::<Bytes, Infallible>(line);
                }
                Err(e) => {
                    warn!("NDJSON: failed to serialize {} event: {}", event.event_type(), e);
                }
            }
        }
        debug!("NDJSON: event channel closed, ending stream");
    };

    Body::from_stream(stream)
}

/// Wrap an event channel in a complete HTTP response
pub fn ndjson_response(rx: mpsc::Receiver<PipelineEvent>) -> Response {
    (
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        ndjson_body(rx),
    )
        .into_response()
}

/// Incremental NDJSON decoder for stream consumers
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every event completed by it
    ///
    /// Blank lines are skipped. A line that is not a valid event is an error.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<PipelineEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line[..line.len() - 1])? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flush whatever is left once the connection has ended
    ///
    /// A trailing line without a newline is still a complete event if it parses.
    pub fn finish(self) -> Result<Option<PipelineEvent>> {
        parse_line(&self.buffer)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<PipelineEvent>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| Error::InvalidInput(format!("NDJSON line is not UTF-8: {}", e)))?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}
