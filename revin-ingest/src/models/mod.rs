//! Data models for revin-ingest
//!
//! - `RawRecord`: one decoded source row, column names untrusted
//! - `NormalizedRecord`: canonical fields after schema resolution
//! - `Enrichment`: classification outcome attached to a normalized record

pub mod normalized_record;
pub mod raw_record;

pub use normalized_record::{Enrichment, NormalizedRecord, DEFAULT_CATEGORY, UNKNOWN};
pub use raw_record::{FileKind, RawRecord, RawValue};
