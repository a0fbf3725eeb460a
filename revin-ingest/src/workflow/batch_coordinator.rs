//! Batch coordination for enrichment
//!
//! Records are enriched in fixed-size batches. After each batch the progress
//! moves through the 40-70% band. A pacing delay separates one batch's
//! completion from the next batch's submission.

use crate::error::PipelineResult;
use crate::models::{Enrichment, NormalizedRecord};
use crate::services::{EnrichmentScheduler, ProgressEmitter};
use revin_common::config::PipelineSettings;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Progress at the start of the enrichment band
pub const ENRICH_START_PERCENT: u8 = 40;
/// Width of the enrichment band
pub const ENRICH_SPAN_PERCENT: u8 = 30;

/// `floor(40 + processed / total * 30)`
pub fn batch_percentage(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return ENRICH_START_PERCENT + ENRICH_SPAN_PERCENT;
    }
    let processed = processed.min(total);
    let offset = processed * ENRICH_SPAN_PERCENT as usize / total;
    ENRICH_START_PERCENT + offset as u8
}

/// Counters for one enrichment pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batches: usize,
    /// Records where at least one label fell back
    pub degraded: usize,
}

/// Splits records into batches and runs each through the scheduler
pub struct BatchCoordinator {
    scheduler: Option<Arc<EnrichmentScheduler>>,
    batch_size: usize,
    batch_delay: Duration,
}

impl BatchCoordinator {
    /// `scheduler = None` means no classifier credential: labels are skipped
    pub fn new(scheduler: Option<Arc<EnrichmentScheduler>>, settings: &PipelineSettings) -> Self {
        Self {
            scheduler,
            batch_size: settings.batch_size.max(1),
            batch_delay: Duration::from_millis(settings.batch_delay_ms),
        }
    }

    pub fn enrichment_enabled(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Enrich `records` in place, emitting one progress event per batch
    pub async fn enrich(
        &self,
        records: &mut [NormalizedRecord],
        emitter: &mut ProgressEmitter,
    ) -> PipelineResult<BatchStats> {
        let total = records.len();
        let mut stats = BatchStats::default();
        let mut processed = 0usize;

        for batch in records.chunks_mut(self.batch_size) {
            if stats.batches > 0 && self.enrichment_enabled() && !self.batch_delay.is_zero() {
                debug!(delay_ms = self.batch_delay.as_millis() as u64, "Pacing before next batch");
                tokio::time::sleep(self.batch_delay).await;
            }

            let enrichments = match &self.scheduler {
                Some(scheduler) => {
                    let rows: Vec<(usize, &str)> =
                        batch.iter().map(|r| (r.index, r.content.as_str())).collect();
                    scheduler.enrich_rows(&rows).await
                }
                None => vec![Enrichment::fallback(); batch.len()],
            };

            for (record, enrichment) in batch.iter_mut().zip(&enrichments) {
                if self.enrichment_enabled() && enrichment.is_degraded() {
                    stats.degraded += 1;
                }
                record.apply_enrichment(enrichment);
            }

            stats.batches += 1;
            processed += batch.len();
            debug!(batch = stats.batches, processed, total, "Batch complete");
            let verb = if self.enrichment_enabled() { "Classified" } else { "Processed" };
            emitter
                .emit(
                    batch_percentage(processed, total),
                    format!("{} {}/{} reviews", verb, processed, total),
                )
                .await?;
        }

        info!(
            records = total,
            batches = stats.batches,
            degraded = stats.degraded,
            "Enrichment finished"
        );
        Ok(stats)
    }
}
