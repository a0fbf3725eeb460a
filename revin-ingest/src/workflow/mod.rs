//! Run-level workflow: batching and end-to-end orchestration

pub mod batch_coordinator;
pub mod pipeline;

pub use batch_coordinator::{batch_percentage, BatchCoordinator, BatchStats};
pub use pipeline::{Pipeline, RunOutcome, Upload};
