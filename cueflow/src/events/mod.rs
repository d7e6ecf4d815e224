//! Event sinks for run and batch observability.
//!
//! Sinks are injected into each runner and batch executor at construction.
//! There is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A run started.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// A run reached its terminal status.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// A stage started.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage succeeded.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// A stage was skipped.
pub const STAGE_SKIPPED: &str = "stage.skipped";
/// A batch started.
pub const BATCH_STARTED: &str = "batch.started";
/// One batch item finished.
pub const BATCH_ITEM_COMPLETED: &str = "batch.item_completed";
/// A batch finished.
pub const BATCH_COMPLETED: &str = "batch.completed";
