//! Progress reporting onto the run's event stream

use crate::error::{PipelineError, PipelineResult};
use revin_common::events::PipelineEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// Writes progress events for one run
///
/// Percentages must never go down within a run. The terminal event is sent
/// through [`ProgressEmitter::finish`], which consumes the emitter so nothing
/// can follow it.
pub struct ProgressEmitter {
    tx: mpsc::Sender<PipelineEvent>,
    last_percentage: u8,
}

impl ProgressEmitter {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self {
            tx,
            last_percentage: 0,
        }
    }

    pub fn last_percentage(&self) -> u8 {
        self.last_percentage
    }

    /// Send one progress milestone
    pub async fn emit(&mut self, percentage: u8, message: impl Into<String>) -> PipelineResult<()> {
        debug_assert!(
            percentage >= self.last_percentage,
            "progress went backwards: {} -> {}",
            self.last_percentage,
            percentage
        );
        let percentage = percentage.min(100);
        let message = message.into();
        debug!(percentage, message = %message, "Progress");

        self.tx
            .send(PipelineEvent::progress(percentage, message))
            .await
            .map_err(|_| PipelineError::StreamWrite)?;
        self.last_percentage = percentage;
        Ok(())
    }

    /// Send the terminal `result` or `error` event
    pub async fn finish(self, event: PipelineEvent) -> PipelineResult<()> {
        debug_assert!(event.is_terminal(), "finish() requires a terminal event");
        self.tx
            .send(event)
            .await
            .map_err(|_| PipelineError::StreamWrite)
    }
}
