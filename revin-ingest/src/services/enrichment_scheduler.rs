//! Enrichment scheduling: bounded concurrency with capped exponential backoff
//!
//! Every classification call must hold one of `concurrency` permits. The
//! permit is released as soon as the call returns, so a task waiting out a
//! backoff never occupies a slot; when it retries it queues for a permit
//! again behind whatever was submitted in the meantime (the semaphore is
//! FIFO-fair).
//!
//! Enrichment never fails: a record whose classification cannot be obtained
//! gets the fallback labels and the run continues.

use crate::models::Enrichment;
use crate::services::classifier_client::{ClassificationKind, Classifier};
use futures::future::join_all;
use revin_common::config::SchedulerConfig;
use revin_common::events::Sentiment;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info_span, warn, Instrument};

/// Retry schedule for transient classification failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `min(base * 2^attempt, cap)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

impl From<&SchedulerConfig> for RetryPolicy {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            base: Duration::from_millis(config.retry_base_ms),
            cap: Duration::from_millis(config.retry_cap_ms),
            max_retries: config.max_retries,
        }
    }
}

/// Runs classification for many records under a global concurrency ceiling
///
/// One scheduler is shared by every run in the process, so the ceiling holds
/// across concurrent uploads too.
pub struct EnrichmentScheduler {
    classifier: Arc<dyn Classifier>,
    permits: Arc<Semaphore>,
    concurrency: usize,
    policy: RetryPolicy,
}

impl EnrichmentScheduler {
    pub fn new(classifier: Arc<dyn Classifier>, concurrency: usize, policy: RetryPolicy) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            classifier,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            policy,
        }
    }

    pub fn from_config(classifier: Arc<dyn Classifier>, config: &SchedulerConfig) -> Self {
        Self::new(classifier, config.concurrency, RetryPolicy::from(config))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Enrich a batch of texts; output is index-aligned with `contents`
    pub async fn enrich_all(&self, contents: &[String]) -> Vec<Enrichment> {
        let rows: Vec<(usize, &str)> = contents
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.as_str()))
            .collect();
        self.enrich_rows(&rows).await
    }

    /// Like [`enrich_all`](Self::enrich_all), tagging log lines with each source row
    pub async fn enrich_rows(&self, rows: &[(usize, &str)]) -> Vec<Enrichment> {
        join_all(
            rows.iter()
                .map(|(row, content)| self.enrich_one(content).instrument(info_span!("record", row))),
        )
        .await
    }

    /// Sentiment and category for one text
    pub async fn enrich_one(&self, content: &str) -> Enrichment {
        let (sentiment, category) = tokio::join!(
            self.classify_with_retry(ClassificationKind::Sentiment, content),
            self.classify_with_retry(ClassificationKind::Category, content),
        );

        let sentiment = sentiment.and_then(|label| match Sentiment::from_label(&label) {
            Sentiment::Unlabeled => {
                debug!(label = %label, "Unrecognised sentiment label");
                None
            }
            sentiment => Some(sentiment),
        });

        let category = category
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .map(|label| vec![label]);

        Enrichment {
            sentiment,
            category,
        }
    }

    /// One classification, retried on transient failures
    ///
    /// `None` means the call degraded (permanent failure or retries exhausted).
    async fn classify_with_retry(&self, kind: ClassificationKind, text: &str) -> Option<String> {
        let mut attempt = 0u32;
        loop {
            let outcome = {
                let Ok(_permit) = self.permits.acquire().await else {
                    warn!(kind = kind.as_str(), "Scheduler closed, skipping classification");
                    return None;
                };
                self.classifier.classify(kind, text).await
            };

            match outcome {
                Ok(label) => {
                    if attempt > 0 {
                        debug!(kind = kind.as_str(), attempt, "Classification succeeded after retry");
                    }
                    return Some(label);
                }
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        kind = kind.as_str(),
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "Classifier unavailable, will retry after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        kind = kind.as_str(),
                        retries = attempt,
                        error = %err,
                        "Enrichment failed, using fallback label"
                    );
                    return None;
                }
            }
        }
    }
}
