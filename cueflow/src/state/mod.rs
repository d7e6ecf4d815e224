//! Live execution state for a runner.
//!
//! The tracker is the single source of truth for where a run is. Readers get
//! copies ([`ExecutionStateTracker::snapshot`]) or immutable shared snapshots
//! through a [`StateObserver`]; neither can change tracker internals.

mod snapshot;
mod tracker;

pub use snapshot::{ExecutionState, ExecutionSummary, StateObserver};
pub use tracker::ExecutionStateTracker;
