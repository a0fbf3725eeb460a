//! Result payload types carried by the terminal `result` event

use serde::{Deserialize, Serialize};

/// Sentiment label attached to one feedback record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    /// No label could be obtained (classification skipped or degraded)
    #[default]
    Unlabeled,
}

impl Sentiment {
    /// Map a free-form label onto a sentiment
    ///
    /// Accepts classifier labels ("POSITIVE", "LABEL_2", "4 stars") as well as
    /// the values people type into a sentiment column ("正面", "neg").
    /// Anything unrecognised maps to `Unlabeled`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return Sentiment::Unlabeled;
        }

        // "1 star" .. "5 stars"
        if label.contains("star") {
            if let Some(stars) = label.chars().find(|c| c.is_ascii_digit()) {
                return match stars {
                    '1' | '2' => Sentiment::Negative,
                    '3' => Sentiment::Neutral,
                    '4' | '5' => Sentiment::Positive,
                    _ => Sentiment::Unlabeled,
                };
            }
        }

        match label.as_str() {
            "label_0" => return Sentiment::Negative,
            "label_1" => return Sentiment::Neutral,
            "label_2" => return Sentiment::Positive,
            _ => {}
        }

        if label.contains("pos") || label.contains("正面") {
            Sentiment::Positive
        } else if label.contains("neg") || label.contains("負面") {
            Sentiment::Negative
        } else if label.contains("neu") || label.contains("中性") {
            Sentiment::Neutral
        } else {
            Sentiment::Unlabeled
        }
    }
}

/// One normalized, annotated feedback row as delivered to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    /// Stable identifier derived from the source row index ("review-<n>")
    pub id: String,
    pub company: String,
    /// YYYY-MM-DD, or the original cell text if it could not be parsed
    pub date: String,
    pub content: String,
    pub rating: f64,
    pub device: String,
    pub category: Vec<String>,
    pub sentiment: Sentiment,
    pub keywords: Vec<String>,
}

/// Keyword frequency entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub count: usize,
}

/// Aggregate statistics over one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_count: usize,
    pub average_rating: f64,
    pub positive_ratio: f64,
    pub neutral_ratio: f64,
    pub negative_ratio: f64,
}

/// Complete analysis result (payload of the `result` event)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub feedbacks: Vec<FeedbackRecord>,
    pub keywords: Vec<Keyword>,
    pub summary: Summary,
}
