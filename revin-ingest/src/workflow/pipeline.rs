//! Analysis run orchestration
//!
//! One run turns one uploaded file into an event stream:
//!
//! | %      | Stage                                     |
//! |--------|-------------------------------------------|
//! | 5      | upload received                           |
//! | 30     | file decoded into raw rows                |
//! | 35     | columns resolved, records normalized      |
//! | 40-70  | one event per enrichment batch            |
//! | 85     | aggregating                               |
//! | 100    | done, followed by the `result` event      |
//!
//! Any fatal failure ends the run with a single `error` event instead. If the
//! consumer goes away mid-run the pipeline stops at the next write.

use crate::error::{PipelineError, PipelineResult};
use crate::models::FileKind;
use crate::services::result_aggregator::aggregate;
use crate::services::{FileDecoder, ProgressEmitter, SchemaResolver};
use crate::workflow::batch_coordinator::BatchCoordinator;
use chrono::{Local, NaiveDate};
use revin_common::events::{AnalysisResult, PipelineEvent};
use tokio::sync::mpsc;
use tracing::{dispatcher, error, info, info_span, warn, Dispatch, Instrument, Span};
use uuid::Uuid;

/// One uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub kind: FileKind,
    pub bytes: Vec<u8>,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        records: usize,
        degraded: usize,
    },
    /// Terminal `error` event was delivered
    Failed(PipelineError),
    /// Consumer closed the stream before the terminal event
    Disconnected,
}

/// Pipeline for a single service instance; shared by all runs
pub struct Pipeline {
    decoder: FileDecoder,
    resolver: SchemaResolver,
    coordinator: BatchCoordinator,
    /// Fixed "today" for rows without a date (tests); `None` = local date per run
    today: Option<NaiveDate>,
}

impl Pipeline {
    pub fn new(decoder: FileDecoder, resolver: SchemaResolver, coordinator: BatchCoordinator) -> Self {
        Self {
            decoder,
            resolver,
            coordinator,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn enrichment_enabled(&self) -> bool {
        self.coordinator.enrichment_enabled()
    }

    /// Execute one run, writing every event to `tx`
    pub async fn run(&self, upload: Upload, tx: mpsc::Sender<PipelineEvent>) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.run_inner(upload, tx).instrument(span).await
    }

    async fn run_inner(&self, upload: Upload, tx: mpsc::Sender<PipelineEvent>) -> RunOutcome {
        info!(
            file = upload.file_name.as_deref().unwrap_or("<unnamed>"),
            kind = ?upload.kind,
            bytes = upload.bytes.len(),
            "Analysis run started"
        );
        let mut emitter = ProgressEmitter::new(tx);

        let outcome = self.execute(upload, &mut emitter).await;
        match outcome {
            Ok((result, degraded)) => {
                let records = result.feedbacks.len();
                match emitter.finish(PipelineEvent::Result(result)).await {
                    Ok(()) => {
                        info!(records, degraded, "Analysis run completed");
                        RunOutcome::Completed { records, degraded }
                    }
                    Err(_) => {
                        warn!("Consumer disconnected before the result was delivered");
                        RunOutcome::Disconnected
                    }
                }
            }
            Err(PipelineError::StreamWrite) => {
                warn!("Consumer disconnected, run abandoned");
                RunOutcome::Disconnected
            }
            Err(err) => {
                error!(code = err.code(), error = %err, "Analysis run failed");
                let event = PipelineEvent::error(err.code(), err.to_string());
                if emitter.finish(event).await.is_err() {
                    warn!("Consumer disconnected before the error was delivered");
                    return RunOutcome::Disconnected;
                }
                RunOutcome::Failed(err)
            }
        }
    }

    async fn execute(
        &self,
        upload: Upload,
        emitter: &mut ProgressEmitter,
    ) -> PipelineResult<(AnalysisResult, usize)> {
        let Upload {
            file_name,
            kind,
            bytes,
        } = upload;

        emitter
            .emit(
                5,
                format!(
                    "Received {} ({})",
                    file_name.as_deref().unwrap_or("upload"),
                    format_bytes(bytes.len())
                ),
            )
            .await?;

        // Spreadsheet parsing is CPU-bound; the blocking thread logs under this run
        let decoder = self.decoder.clone();
        let span = Span::current();
        let dispatch = dispatcher::get_default(Dispatch::clone);
        let raw = tokio::task::spawn_blocking(move || {
            dispatcher::with_default(&dispatch, || span.in_scope(|| decoder.decode(&bytes, kind)))
        })
        .await
        .map_err(|e| PipelineError::decode(format!("decoder task failed: {}", e)))??;
        emitter.emit(30, format!("Parsed {} rows", raw.len())).await?;

        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let mut records = self.resolver.clone().with_today(today).resolve_all(&raw)?;
        drop(raw);

        let resolved_message = if self.enrichment_enabled() {
            format!("Resolved columns for {} reviews", records.len())
        } else {
            warn!("No classifier credential, records keep their fallback labels");
            format!(
                "Resolved columns for {} reviews; classification disabled (no classifier credential)",
                records.len()
            )
        };
        emitter.emit(35, resolved_message).await?;

        let stats = self.coordinator.enrich(&mut records, emitter).await?;

        emitter.emit(85, "Aggregating results").await?;
        let result = aggregate(records);
        emitter.emit(100, "Analysis complete").await?;

        Ok((result, stats.degraded))
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let b = bytes as f64;
    if b >= MIB {
        format!("{:.1} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revin_common::config::PipelineSettings;
    use std::sync::{Arc, Mutex};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::Layer;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            FileDecoder::default(),
            SchemaResolver::new(),
            BatchCoordinator::new(None, &PipelineSettings::default()),
        )
        .with_today(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    fn upload(text: &str) -> Upload {
        Upload {
            file_name: Some("reviews.csv".to_string()),
            kind: FileKind::DelimitedText,
            bytes: text.as_bytes().to_vec(),
        }
    }

    async fn collect(mut rx: mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[tokio::test]
    async fn test_run_milestones_and_single_terminal() {
        let (tx, rx) = mpsc::channel(64);
        let outcome = pipeline()
            .run(upload("content,rating\ngreat,5\nslow,2\n"), tx)
            .await;
        assert!(matches!(outcome, RunOutcome::Completed { records: 2, degraded: 0 }));

        let events = collect(rx).await;
        let percentages: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress(p) => Some(p.percentage),
                _ => None,
            })
            .collect();
        assert_eq!(percentages, vec![5, 30, 35, 70, 85, 100]);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().unwrap().is_terminal());

        let PipelineEvent::Result(result) = events.last().unwrap() else {
            panic!("expected result event");
        };
        assert_eq!(result.feedbacks[0].date, "2024-03-01");
        assert_eq!(result.summary.total_count, 2);
    }

    #[tokio::test]
    async fn test_missing_content_column_ends_with_schema_error() {
        let (tx, rx) = mpsc::channel(64);
        let outcome = pipeline().run(upload("title,stars\nhello,5\n"), tx).await;
        assert!(matches!(outcome, RunOutcome::Failed(PipelineError::Schema { .. })));

        let events = collect(rx).await;
        let PipelineEvent::Error(data) = events.last().unwrap() else {
            panic!("expected error event");
        };
        assert_eq!(data.code, "schema_error");
        assert!(data.message.contains("title"));
        assert!(!events.iter().any(|e| e.event_type() == "result"));
    }

    #[tokio::test]
    async fn test_undecodable_file_ends_with_decode_error() {
        let (tx, rx) = mpsc::channel(64);
        let upload = Upload {
            file_name: Some("reviews.xlsx".to_string()),
            kind: FileKind::Spreadsheet,
            bytes: b"definitely not a workbook".to_vec(),
        };
        let outcome = pipeline().run(upload, tx).await;
        assert!(matches!(outcome, RunOutcome::Failed(PipelineError::Decode { .. })));

        let events = collect(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], PipelineEvent::progress(5, "Received reviews.xlsx (25 B)"));
        assert_eq!(events[1].event_type(), "error");
    }

    #[tokio::test]
    async fn test_disconnected_consumer_stops_run() {
        let (tx, rx) = mpsc::channel(64);
        drop(rx);
        let outcome = pipeline().run(upload("content,rating\ngreat,5\n"), tx).await;
        assert!(matches!(outcome, RunOutcome::Disconnected));
    }

    /// Records, per event, its target and whether it was emitted inside a `run` span
    #[derive(Clone, Default)]
    struct RunScopeRecorder {
        events: Arc<Mutex<Vec<(String, bool)>>>,
    }

    impl<S> Layer<S> for RunScopeRecorder
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let in_run = ctx
                .event_scope(event)
                .map(|scope| scope.from_root().any(|span| span.name() == "run"))
                .unwrap_or(false);
            self.events
                .lock()
                .unwrap()
                .push((event.metadata().target().to_string(), in_run));
        }
    }

    #[tokio::test]
    async fn test_every_log_line_carries_the_run_span() {
        let recorder = RunScopeRecorder::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(recorder.clone()),
        );

        let (tx, rx) = mpsc::channel(64);
        pipeline().run(upload("content,rating\ngreat,5\n"), tx).await;
        collect(rx).await;

        let events = recorder.events.lock().unwrap().clone();
        assert!(events
            .iter()
            .any(|(target, _)| target.ends_with("services::file_decoder")));
        let outside: Vec<&String> = events
            .iter()
            .filter(|(_, in_run)| !in_run)
            .map(|(target, _)| target)
            .collect();
        assert!(outside.is_empty(), "events outside the run span: {:?}", outside);
    }

    #[tokio::test]
    async fn test_disabled_classification_is_announced() {
        let (tx, rx) = mpsc::channel(64);
        pipeline().run(upload("content,rating\ngreat,5\n"), tx).await;

        let events = collect(rx).await;
        let announced = events.iter().any(|e| match e {
            PipelineEvent::Progress(p) => p.percentage == 35 && p.message.contains("classification disabled"),
            _ => false,
        });
        assert!(announced);
    }
}
