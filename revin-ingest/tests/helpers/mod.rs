//! Test Helper Utilities
//!
//! Shared utilities for testing revin-ingest
#![allow(dead_code)]

pub mod classifiers;
pub mod multipart;
pub mod workbook;

// Re-export commonly used items
pub use classifiers::{KeywordClassifier, ScriptedClassifier};
pub use multipart::{analyze_request, collect_events, MultipartPart};
pub use workbook::{build_xlsx, Cell};
