//! Schema resolution: map arbitrary source columns onto canonical fields
//!
//! Each canonical field has a prioritized list of case-insensitive substring
//! terms. A field resolves to the first column containing the highest-priority
//! term that matches anything, so a file with both "評論日期" and "日期" picks
//! "評論日期" for the date. A column is skipped when another field matches it
//! with a longer term. Content and rating are required; everything else falls
//! back to a default.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{NormalizedRecord, RawRecord, RawValue, DEFAULT_CATEGORY, UNKNOWN};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use revin_common::events::Sentiment;
use std::collections::HashMap;
use tracing::{debug, info};

pub const COMPANY_TERMS: &[&str] = &["公司", "company", "brand", "品牌", "應用程式", "app"];
pub const CONTENT_TERMS: &[&str] = &[
    "評論內容",
    "review content",
    "內容",
    "content",
    "comment",
    "feedback",
    "評論",
    "意見",
    "建議",
];
pub const RATING_TERMS: &[&str] = &[
    "用戶評分", "評分", "rating", "score", "分數", "星級", "stars", "star",
];
pub const DATE_TERMS: &[&str] = &["評論日期", "建立日期", "日期", "date", "時間", "time"];
pub const DEVICE_TERMS: &[&str] = &["裝置", "device", "platform", "平台", "系統"];
pub const CATEGORY_TERMS: &[&str] = &["分類", "category", "類型", "type"];
pub const KEYWORD_TERMS: &[&str] = &["關鍵詞", "關鍵字", "keywords", "keyword", "tags", "標籤"];
pub const SENTIMENT_TERMS: &[&str] = &["情感", "sentiment", "情緒"];

/// Fields the pipeline needs from every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Company,
    Content,
    Rating,
    Date,
    Device,
    Category,
    Keywords,
    Sentiment,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Company,
        CanonicalField::Content,
        CanonicalField::Rating,
        CanonicalField::Date,
        CanonicalField::Device,
        CanonicalField::Category,
        CanonicalField::Keywords,
        CanonicalField::Sentiment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Company => "company",
            CanonicalField::Content => "content",
            CanonicalField::Rating => "rating",
            CanonicalField::Date => "date",
            CanonicalField::Device => "device",
            CanonicalField::Category => "category",
            CanonicalField::Keywords => "keywords",
            CanonicalField::Sentiment => "sentiment",
        }
    }

    pub fn default_terms(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::Company => COMPANY_TERMS,
            CanonicalField::Content => CONTENT_TERMS,
            CanonicalField::Rating => RATING_TERMS,
            CanonicalField::Date => DATE_TERMS,
            CanonicalField::Device => DEVICE_TERMS,
            CanonicalField::Category => CATEGORY_TERMS,
            CanonicalField::Keywords => KEYWORD_TERMS,
            CanonicalField::Sentiment => SENTIMENT_TERMS,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, CanonicalField::Content | CanonicalField::Rating)
    }
}

/// True if the column name contains any of the terms (case-insensitive)
pub fn column_matches(column: &str, terms: &[&str]) -> bool {
    let column = column.to_lowercase();
    terms.iter().any(|term| column.contains(&term.to_lowercase()))
}

/// Heuristic column-name resolver
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    terms: HashMap<CanonicalField, Vec<String>>,
    today: NaiveDate,
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaResolver {
    /// Resolver with the built-in term lists
    pub fn new() -> Self {
        let terms = CanonicalField::ALL
            .iter()
            .map(|field| {
                let terms = field
                    .default_terms()
                    .iter()
                    .map(|t| t.to_lowercase())
                    .collect();
                (*field, terms)
            })
            .collect();

        Self {
            terms,
            today: Local::now().date_naive(),
        }
    }

    /// Replace the term list for one field (priority order)
    pub fn with_terms(mut self, field: CanonicalField, terms: &[&str]) -> Self {
        self.terms
            .insert(field, terms.iter().map(|t| t.to_lowercase()).collect());
        self
    }

    /// Fix the date used when a row has none
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Find the column (and its value) that resolves `field` in this record
    pub fn find_column<'r>(
        &self,
        record: &'r RawRecord,
        field: CanonicalField,
    ) -> Option<(&'r str, &'r RawValue)> {
        let terms = self.terms.get(&field)?;
        let columns: Vec<(String, &'r str)> = record
            .columns()
            .map(|c| (c.to_lowercase(), c))
            .collect();

        terms.iter().find_map(|term| {
            let specificity = term.chars().count();
            columns
                .iter()
                .find(|(lower, _)| {
                    lower.contains(term.as_str()) && !self.claimed_by_other(field, lower, specificity)
                })
                .and_then(|(_, original)| record.get(original).map(|v| (*original, v)))
        })
    }

    /// A column belongs to the field whose matching term is longest, so
    /// "評論日期" is a date column even though it contains "評論"
    fn claimed_by_other(&self, field: CanonicalField, lower: &str, specificity: usize) -> bool {
        self.terms
            .iter()
            .filter(|(other, _)| **other != field)
            .flat_map(|(_, terms)| terms.iter())
            .any(|term| term.chars().count() > specificity && lower.contains(term.as_str()))
    }

    /// Fail fast if a required field cannot be resolved on the first record
    pub fn check_required(&self, first: &RawRecord) -> PipelineResult<()> {
        for field in CanonicalField::ALL.iter().filter(|f| f.is_required()) {
            let resolved = self.find_column(first, *field);
            let usable = match (field, resolved) {
                (_, None) => false,
                (CanonicalField::Content, Some((_, value))) => {
                    value.as_text().map_or(false, |t| !t.is_empty())
                }
                (_, Some(_)) => true,
            };

            if !usable {
                return Err(PipelineError::Schema {
                    field: field.name().to_string(),
                    available_columns: first.columns().map(str::to_string).collect(),
                });
            }

            if let Some((column, _)) = resolved {
                info!(field = field.name(), column = column, "Resolved required column");
            }
        }
        Ok(())
    }

    /// Normalize every record, checking required fields on the first
    pub fn resolve_all(&self, records: &[RawRecord]) -> PipelineResult<Vec<NormalizedRecord>> {
        let Some(first) = records.first() else {
            return Ok(Vec::new());
        };
        self.check_required(first)?;
        records.iter().map(|r| self.resolve(r)).collect()
    }

    /// Normalize one record
    pub fn resolve(&self, record: &RawRecord) -> PipelineResult<NormalizedRecord> {
        let text_of = |field: CanonicalField| -> Option<String> {
            self.find_column(record, field)
                .and_then(|(_, v)| v.as_text())
                .filter(|t| !t.is_empty())
        };

        let content = text_of(CanonicalField::Content).ok_or_else(|| {
            PipelineError::EmptyRequiredValue {
                field: CanonicalField::Content.name().to_string(),
                row: record.index,
            }
        })?;

        let rating = match self.find_column(record, CanonicalField::Rating) {
            Some((_, RawValue::Number(n))) if n.is_finite() => *n,
            Some((_, RawValue::Text(t))) => parse_rating(t),
            _ => 0.0,
        };

        let date = match self.find_column(record, CanonicalField::Date) {
            Some((_, RawValue::Date(dt))) => dt.format("%Y-%m-%d").to_string(),
            Some((_, RawValue::Text(t))) if !t.trim().is_empty() => {
                let original = t.trim();
                match parse_date(original) {
                    Some(date) => date.format("%Y-%m-%d").to_string(),
                    None => {
                        debug!(row = record.index, value = original, "Keeping unparsable date");
                        original.to_string()
                    }
                }
            }
            Some((_, value @ RawValue::Number(_))) => value.as_text().unwrap_or_default(),
            _ => self.today.format("%Y-%m-%d").to_string(),
        };

        let category = text_of(CanonicalField::Category)
            .map(|t| split_list(&t))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_CATEGORY.to_string()]);

        Ok(NormalizedRecord {
            index: record.index,
            company: text_of(CanonicalField::Company).unwrap_or_else(|| UNKNOWN.to_string()),
            date,
            content,
            rating,
            device: text_of(CanonicalField::Device).unwrap_or_else(|| UNKNOWN.to_string()),
            category,
            sentiment: text_of(CanonicalField::Sentiment)
                .map(|t| Sentiment::from_label(&t))
                .unwrap_or_default(),
            keywords: text_of(CanonicalField::Keywords)
                .map(|t| split_list(&t))
                .unwrap_or_default(),
        })
    }
}

/// Split a list cell on ASCII and full-width commas
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the leading numeric prefix of a rating ("4.5 stars" → 4.5), 0 if none
pub fn parse_rating(value: &str) -> f64 {
    let value = value.trim();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (i, c) in value.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }

    if !seen_digit {
        return 0.0;
    }
    value[..end]
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%Y年%m月%d日",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Best-effort date parse; `None` means "keep the original text"
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        })
}
