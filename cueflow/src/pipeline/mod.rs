//! Pipeline execution: the single-input runner and the batch executor.

mod batch;
mod runner;

#[cfg(test)]
mod integration_tests;

pub use batch::{discover_inputs, BatchExecutor, BatchSummary, DEFAULT_PATTERN};
pub use runner::{PipelineRunner, REASON_DISABLED, REASON_NOT_AVAILABLE, REASON_NOT_IMPLEMENTED};
