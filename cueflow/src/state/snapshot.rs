//! Execution state snapshots and the read-only observer handle.

use crate::core::{PipelineStage, StageResult, StageStatus};
use crate::utils::Timestamp;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Run id of the tracked run.
    pub run_id: Option<Uuid>,
    /// Bumped on every tracker mutation.
    pub version: u64,
    /// Input being processed.
    pub input_id: Option<String>,
    /// Stage currently executing.
    pub current_stage: Option<PipelineStage>,
    /// Sub-item currently executing.
    pub current_sub_item: Option<String>,
    /// Index of the current sub-item.
    pub current_sub_item_index: Option<usize>,
    /// Number of sub-items in the input.
    pub total_sub_items: usize,
    /// Sub-items that made it through Decide.
    pub sub_items_completed: usize,
    /// Overall status.
    pub status: StageStatus,
    /// When the run started.
    pub started_at: Option<Timestamp>,
    /// When the run ended.
    pub completed_at: Option<Timestamp>,
    /// Stage results so far, in execution order.
    pub stage_results: Vec<StageResult>,
    /// Most recent stage error.
    pub last_error: Option<String>,
    /// Output artifact locations.
    pub output_paths: BTreeMap<String, PathBuf>,
}

impl ExecutionState {
    /// Returns true once the run has reached `Success` or `Failed`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some() && self.status.is_terminal()
    }

    /// Derives the summary counts.
    #[must_use]
    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary::from_state(self)
    }
}

/// Derived counts for observability.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Input being processed.
    pub input_id: Option<String>,
    /// Overall status.
    pub status: StageStatus,
    /// Stage currently executing.
    pub current_stage: Option<PipelineStage>,
    /// Sub-items that made it through Decide.
    pub sub_items_processed: usize,
    /// Number of sub-items in the input.
    pub total_sub_items: usize,
    /// Count of `Success` stage results.
    pub stages_succeeded: usize,
    /// Count of `Failed` stage results.
    pub stages_failed: usize,
    /// Count of `Skipped` stage results.
    pub stages_skipped: usize,
    /// Most recent stage error.
    pub last_error: Option<String>,
}

impl ExecutionSummary {
    /// Computes the summary of a state.
    #[must_use]
    pub fn from_state(state: &ExecutionState) -> Self {
        let count = |status: StageStatus| {
            state
                .stage_results
                .iter()
                .filter(|r| r.status() == status)
                .count()
        };

        Self {
            input_id: state.input_id.clone(),
            status: state.status,
            current_stage: state.current_stage,
            sub_items_processed: state.sub_items_completed,
            total_sub_items: state.total_sub_items,
            stages_succeeded: count(StageStatus::Success),
            stages_failed: count(StageStatus::Failed),
            stages_skipped: count(StageStatus::Skipped),
            last_error: state.last_error.clone(),
        }
    }
}

/// Cloneable, thread-safe read handle on a tracker's state.
///
/// The tracker mutates the live state in place. [`StateObserver::snapshot`]
/// freezes it into an immutable `Arc` once per version, so a reader keeps a
/// consistent view for as long as it holds on to it.
#[derive(Debug, Clone, Default)]
pub struct StateObserver {
    shared: Arc<RwLock<Published>>,
}

#[derive(Debug, Default)]
struct Published {
    live: ExecutionState,
    frozen: Option<Arc<ExecutionState>>,
}

impl StateObserver {
    /// Applies a mutation and bumps the version.
    pub(crate) fn update<R>(&self, mutate: impl FnOnce(&mut ExecutionState) -> R) -> R {
        let mut published = self.shared.write();
        let out = mutate(&mut published.live);
        published.live.version += 1;
        published.frozen = None;
        out
    }

    /// Reads the live state without copying it.
    pub(crate) fn read<R>(&self, inspect: impl FnOnce(&ExecutionState) -> R) -> R {
        inspect(&self.shared.read().live)
    }

    /// Returns the latest state as an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ExecutionState> {
        if let Some(frozen) = &self.shared.read().frozen {
            return Arc::clone(frozen);
        }
        let mut guard = self.shared.write();
        let published = &mut *guard;
        let live = &published.live;
        Arc::clone(
            published
                .frozen
                .get_or_insert_with(|| Arc::new(live.clone())),
        )
    }

    /// Returns the latest summary.
    #[must_use]
    pub fn summary(&self) -> ExecutionSummary {
        self.read(ExecutionState::summary)
    }

    /// Returns the current version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.read(|state| state.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summary_counts() {
        let state = ExecutionState {
            input_id: Some("script.txt".to_string()),
            status: StageStatus::Running,
            total_sub_items: 2,
            sub_items_completed: 1,
            stage_results: vec![
                StageResult::success(PipelineStage::Parse, None, 0.1),
                StageResult::failed(PipelineStage::Enrich, "model down", 0.1),
                StageResult::success(PipelineStage::Retrieve, None, 0.1),
                StageResult::skipped(PipelineStage::Simulate, "Disabled by configuration"),
            ],
            last_error: Some("model down".to_string()),
            ..ExecutionState::default()
        };

        let summary = state.summary();
        assert_eq!(
            summary,
            ExecutionSummary {
                input_id: Some("script.txt".to_string()),
                status: StageStatus::Running,
                current_stage: None,
                sub_items_processed: 1,
                total_sub_items: 2,
                stages_succeeded: 2,
                stages_failed: 1,
                stages_skipped: 1,
                last_error: Some("model down".to_string()),
            }
        );
    }

    #[test]
    fn test_summary_is_pure() {
        let state = ExecutionState::default();
        assert_eq!(state.summary(), state.summary());
        assert_eq!(state.summary().status, StageStatus::Pending);
    }

    #[test]
    fn test_observer_keeps_old_snapshot() {
        let observer = StateObserver::default();
        observer.update(|state| state.input_id = Some("a.txt".to_string()));
        let held = observer.snapshot();

        observer.update(|state| state.status = StageStatus::Running);

        assert_eq!(held.version, 1);
        assert_eq!(held.status, StageStatus::Pending);
        assert_eq!(observer.version(), 2);
        assert_eq!(observer.summary().status, StageStatus::Running);
        assert_eq!(observer.snapshot().input_id.as_deref(), Some("a.txt"));
    }

    #[test]
    fn test_snapshot_is_frozen_once_per_version() {
        let observer = StateObserver::default();
        let first = observer.snapshot();
        assert!(Arc::ptr_eq(&first, &observer.snapshot()));

        observer.update(|state| state.total_sub_items = 3);
        let second = observer.snapshot();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.total_sub_items, 0);
        assert_eq!(second.total_sub_items, 3);
    }
}
