//! Text classification client
//!
//! Two hosted scoring endpoints are used, one for sentiment and one for topic
//! category. Both accept `{"inputs": "<text>"}` and answer with a list of
//! `{label, score}` pairs (sometimes nested one level per input). The label
//! with the highest score wins.
//!
//! Only "model loading / overloaded" (HTTP 503) is reported as transient;
//! every other failure is permanent and is not retried by the scheduler.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use revin_common::config::ClassifierConfig;
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("revin-ingest/", env!("CARGO_PKG_VERSION"));

/// Which classification to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassificationKind {
    Sentiment,
    Category,
}

impl ClassificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationKind::Sentiment => "sentiment",
            ClassificationKind::Category => "category",
        }
    }
}

/// Classification failure
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The endpoint is temporarily unable to serve (retryable)
    #[error("Classifier unavailable (HTTP {status}): {message}")]
    Transient { status: u16, message: String },

    /// Anything else: auth, bad request, network, malformed response
    #[error("Classification failed: {0}")]
    Permanent(String),
}

impl ClassifyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClassifyError::Transient { .. })
    }
}

/// Seam between the scheduler and whatever produces labels
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Return the top label for `text`
    async fn classify(&self, kind: ClassificationKind, text: &str)
        -> Result<String, ClassifyError>;
}

/// One scored label
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoringResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl ScoringResponse {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            ScoringResponse::Nested(outer) => outer.into_iter().next().unwrap_or_default(),
            ScoringResponse::Flat(scores) => scores,
        }
    }
}

/// Highest-scoring label (first one on ties)
pub fn top_label(scores: &[LabelScore]) -> Option<&LabelScore> {
    scores.iter().fold(None, |best: Option<&LabelScore>, candidate| match best {
        Some(b) if b.score >= candidate.score => Some(b),
        _ => Some(candidate),
    })
}

/// Cut `text` to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Classifier backed by the hosted inference endpoints
pub struct HttpClassifier {
    client: Client,
    sentiment_url: String,
    category_url: String,
    api_token: String,
    max_input_chars: usize,
    /// Shared by both endpoints
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig, api_token: String) -> revin_common::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| revin_common::Error::Internal(format!("HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            revin_common::Error::Config("classifier.requests_per_second must be > 0".to_string())
        })?;

        Ok(Self {
            client,
            sentiment_url: config.sentiment_url.clone(),
            category_url: config.category_url.clone(),
            api_token,
            max_input_chars: config.max_input_chars,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    fn url_for(&self, kind: ClassificationKind) -> &str {
        match kind {
            ClassificationKind::Sentiment => &self.sentiment_url,
            ClassificationKind::Category => &self.category_url,
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        kind: ClassificationKind,
        text: &str,
    ) -> Result<String, ClassifyError> {
        self.rate_limiter.until_ready().await;

        let input = truncate_chars(text, self.max_input_chars);
        tracing::debug!(
            kind = kind.as_str(),
            chars = input.chars().count(),
            "Requesting classification"
        );

        let response = self
            .client
            .post(self.url_for(kind))
            .bearer_auth(&self.api_token)
            .json(&json!({ "inputs": input }))
            .send()
            .await
            .map_err(|e| ClassifyError::Permanent(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            let message = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Transient {
                status: status.as_u16(),
                message,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Permanent(format!(
                "{} returned {}: {}",
                kind.as_str(),
                status,
                body
            )));
        }

        let scores = response
            .json::<ScoringResponse>()
            .await
            .map_err(|e| ClassifyError::Permanent(format!("unexpected response: {}", e)))?
            .into_scores();

        top_label(&scores)
            .map(|best| best.label.clone())
            .ok_or_else(|| ClassifyError::Permanent("empty score list".to_string()))
    }
}
