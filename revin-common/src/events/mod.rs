//! Event types for the analysis stream
//!
//! A run produces any number of `progress` events followed by exactly one
//! terminal event (`result` or `error`). Events are serialized as
//! `{"type": ..., "data": ...}` objects, one per NDJSON line.

mod analysis_types;

pub use analysis_types::{AnalysisResult, FeedbackRecord, Keyword, Sentiment, Summary};

use serde::{Deserialize, Serialize};

/// Analysis stream event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PipelineEvent {
    /// Incremental progress milestone
    Progress(ProgressData),

    /// Terminal: completed analysis
    Result(AnalysisResult),

    /// Terminal: the run failed
    Error(ErrorData),
}

/// Payload of a `progress` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressData {
    /// Overall progress, 0-100
    pub percentage: u8,
    /// Human-readable description of the milestone
    pub message: String,
}

/// Payload of an `error` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Machine-readable error class ("decode_error", "schema_error", ...)
    pub code: String,
    /// Human-readable reason
    pub message: String,
}

impl PipelineEvent {
    pub fn progress(percentage: u8, message: impl Into<String>) -> Self {
        PipelineEvent::Progress(ProgressData {
            percentage,
            message: message.into(),
        })
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineEvent::Error(ErrorData {
            code: code.into(),
            message: message.into(),
        })
    }

    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::Progress(_) => "progress",
            PipelineEvent::Result(_) => "result",
            PipelineEvent::Error(_) => "error",
        }
    }

    /// True for the events that end a run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineEvent::Progress(_))
    }
}
