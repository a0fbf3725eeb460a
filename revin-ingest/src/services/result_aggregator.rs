//! Result aggregation: keyword frequencies and the summary block

use crate::models::NormalizedRecord;
use revin_common::events::{AnalysisResult, Keyword, Sentiment, Summary};
use std::collections::BTreeMap;

/// Count keyword occurrences across all records
///
/// Sorted by count, highest first. Ties are ordered by word so the list does
/// not depend on record order.
pub fn keyword_frequencies(records: &[NormalizedRecord]) -> Vec<Keyword> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for word in records.iter().flat_map(|r| r.keywords.iter()) {
        let word = word.trim();
        if !word.is_empty() {
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    let mut keywords: Vec<Keyword> = counts
        .into_iter()
        .map(|(word, count)| Keyword {
            word: word.to_string(),
            count,
        })
        .collect();
    keywords.sort_by(|a, b| b.count.cmp(&a.count));
    keywords
}

/// Totals and sentiment ratios
///
/// Records without a sentiment label count as neutral, so the three ratios
/// always sum to 1 when there is at least one record.
pub fn summarize(records: &[NormalizedRecord]) -> Summary {
    let total = records.len();
    if total == 0 {
        return Summary {
            total_count: 0,
            average_rating: 0.0,
            positive_ratio: 0.0,
            neutral_ratio: 0.0,
            negative_ratio: 0.0,
        };
    }

    let (mut positive, mut negative) = (0usize, 0usize);
    for record in records {
        match record.sentiment {
            Sentiment::Positive => positive += 1,
            Sentiment::Negative => negative += 1,
            Sentiment::Neutral | Sentiment::Unlabeled => {}
        }
    }
    let neutral = total - positive - negative;
    let total_f = total as f64;

    Summary {
        total_count: total,
        average_rating: records.iter().map(|r| r.rating).sum::<f64>() / total_f,
        positive_ratio: positive as f64 / total_f,
        neutral_ratio: neutral as f64 / total_f,
        negative_ratio: negative as f64 / total_f,
    }
}

/// Build the terminal result, keeping records in their original order
pub fn aggregate(mut records: Vec<NormalizedRecord>) -> AnalysisResult {
    records.sort_by_key(|r| r.index);
    let keywords = keyword_frequencies(&records);
    let summary = summarize(&records);

    AnalysisResult {
        feedbacks: records.into_iter().map(NormalizedRecord::into_feedback).collect(),
        keywords,
        summary,
    }
}
