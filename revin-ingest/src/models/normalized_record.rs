//! Canonical feedback records

use revin_common::events::{FeedbackRecord, Sentiment};

/// Placeholder for optional text fields that could not be resolved
pub const UNKNOWN: &str = "unknown";

/// Category used when neither the file nor the classifier supplies one
pub const DEFAULT_CATEGORY: &str = "general";

/// One feedback row mapped onto canonical fields
///
/// Created by the schema resolver; afterwards only `sentiment` and `category`
/// change, through [`NormalizedRecord::apply_enrichment`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// 0-based data row index in the source file
    pub index: usize,
    pub company: String,
    pub date: String,
    pub content: String,
    pub rating: f64,
    pub device: String,
    pub category: Vec<String>,
    pub sentiment: Sentiment,
    pub keywords: Vec<String>,
}

impl NormalizedRecord {
    /// Attach classification labels
    ///
    /// Only labels the classifier actually produced are written; a degraded
    /// field keeps whatever the resolver put there (file value or default).
    pub fn apply_enrichment(&mut self, enrichment: &Enrichment) {
        if let Some(sentiment) = enrichment.sentiment {
            self.sentiment = sentiment;
        }
        if let Some(category) = &enrichment.category {
            self.category = category.clone();
        }
    }

    /// Wire form with a stable row-derived id
    pub fn into_feedback(self) -> FeedbackRecord {
        FeedbackRecord {
            id: format!("review-{}", self.index),
            company: self.company,
            date: self.date,
            content: self.content,
            rating: self.rating,
            device: self.device,
            category: self.category,
            sentiment: self.sentiment,
            keywords: self.keywords,
        }
    }
}

/// Outcome of enriching one record
///
/// `None` means that half of the classification degraded to the fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub sentiment: Option<Sentiment>,
    pub category: Option<Vec<String>>,
}

impl Enrichment {
    /// The fallback used when classification is skipped or fails outright
    pub fn fallback() -> Self {
        Self::default()
    }

    pub fn is_degraded(&self) -> bool {
        self.sentiment.is_none() || self.category.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> NormalizedRecord {
        NormalizedRecord {
            index: 3,
            company: UNKNOWN.to_string(),
            date: "2024-01-15".to_string(),
            content: "很好用".to_string(),
            rating: 5.0,
            device: UNKNOWN.to_string(),
            category: vec!["billing".to_string()],
            sentiment: Sentiment::Neutral,
            keywords: vec![],
        }
    }

    #[test]
    fn test_fallback_keeps_resolved_labels() {
        let mut record = record();
        record.apply_enrichment(&Enrichment::fallback());
        assert_eq!(record.sentiment, Sentiment::Neutral);
        assert_eq!(record.category, vec!["billing"]);
        assert!(Enrichment::fallback().is_degraded());
    }

    #[test]
    fn test_degraded_fields_keep_resolved_values() {
        let mut record = record();
        record.apply_enrichment(&Enrichment {
            sentiment: Some(Sentiment::Positive),
            category: None,
        });
        assert_eq!(record.sentiment, Sentiment::Positive);
        assert_eq!(record.category, vec!["billing"]);
    }

    #[test]
    fn test_feedback_id_uses_row_index() {
        let feedback = record().into_feedback();
        assert_eq!(feedback.id, "review-3");
        assert_eq!(feedback.rating, 5.0);
    }
}
