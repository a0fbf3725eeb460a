//! Pipeline stages
//!
//! decode → resolve → enrich (batched) → aggregate, with progress reported
//! between stages.

pub mod classifier_client;
pub mod enrichment_scheduler;
pub mod file_decoder;
pub mod progress_emitter;
pub mod result_aggregator;
pub mod schema_resolver;

pub use classifier_client::{
    ClassificationKind, Classifier, ClassifyError, HttpClassifier, LabelScore,
};
pub use enrichment_scheduler::{EnrichmentScheduler, RetryPolicy};
pub use file_decoder::FileDecoder;
pub use progress_emitter::ProgressEmitter;
pub use schema_resolver::{CanonicalField, SchemaResolver};
