//! # Revin Common Library
//!
//! Shared code for the review-insight services:
//! - Event types for the analysis stream (PipelineEvent and the result payload)
//! - NDJSON encoding/decoding of that stream
//! - Bootstrap TOML configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod ndjson;

pub use error::{Error, Result};
