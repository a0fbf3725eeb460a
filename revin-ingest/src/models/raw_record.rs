//! Decoded source rows

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Declared kind of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// CSV/TSV and other delimited text
    DelimitedText,
    /// XLSX/XLS/ODS workbook
    Spreadsheet,
}

impl FileKind {
    /// Determine the kind from an explicit declaration, falling back to the file name
    ///
    /// Returns `None` for anything that is neither delimited text nor a spreadsheet.
    pub fn detect(declared: Option<&str>, file_name: Option<&str>) -> Option<Self> {
        if let Some(declared) = declared.map(str::trim).filter(|d| !d.is_empty()) {
            return match declared.to_lowercase().as_str() {
                "csv" | "tsv" | "text" | "delimited" | "delimited_text" => {
                    Some(FileKind::DelimitedText)
                }
                "xlsx" | "xls" | "xlsm" | "ods" | "spreadsheet" => Some(FileKind::Spreadsheet),
                _ => None,
            };
        }

        let extension = file_name?.rsplit_once('.')?.1.to_lowercase();
        match extension.as_str() {
            "csv" | "tsv" | "txt" => Some(FileKind::DelimitedText),
            "xlsx" | "xls" | "xlsm" | "ods" => Some(FileKind::Spreadsheet),
            _ => None,
        }
    }
}

/// One cell value as it came out of the source file
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    /// Native spreadsheet date (or converted date serial)
    Date(NaiveDateTime),
    Empty,
}

impl RawValue {
    /// Text cell, collapsing whitespace-only text to `Empty`
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawValue::Empty)
    }

    /// Display form used when a field wants a string
    ///
    /// Whole numbers render without a fractional part ("5", not "5.0");
    /// dates render as YYYY-MM-DD.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) => Some(s.trim().to_string()),
            RawValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            RawValue::Date(dt) => Some(dt.format("%Y-%m-%d").to_string()),
            RawValue::Empty => None,
        }
    }
}

/// One source row: column name → value, in source column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// 0-based data row index in the source file
    pub index: usize,
    fields: Vec<(String, RawValue)>,
}

impl RawRecord {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: RawValue) {
        self.fields.push((column.into(), value));
    }

    /// Column names in source order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    /// First value stored under `column` (exact match)
    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when the row carries no data at all (blank line / empty sheet row)
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.is_empty())
    }
}
