//! Execution state tracker for a single runner.

use super::{ExecutionState, ExecutionSummary, StateObserver};
use crate::core::{PipelineStage, StageOutcome, StageResult, StageStatus};
use crate::utils::{elapsed_seconds, now_utc};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

/// Records where a run is and what has happened so far.
///
/// Owned by exactly one runner and mutated only by it. The state itself
/// lives behind the [`StateObserver`]; a mutation only bumps the version, and
/// readers freeze a copy on demand.
#[derive(Debug, Default)]
pub struct ExecutionStateTracker {
    stage_started: Option<(PipelineStage, Instant)>,
    observer: StateObserver,
}

impl ExecutionStateTracker {
    /// Creates a tracker in the `Pending` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the state with a fresh `Running` one.
    pub fn start_run(&mut self, input_id: impl Into<String>, total_sub_items: usize, run_id: Uuid) {
        let input_id = input_id.into();
        self.stage_started = None;
        self.observer.update(|state| {
            *state = ExecutionState {
                run_id: Some(run_id),
                version: state.version,
                input_id: Some(input_id),
                total_sub_items,
                status: StageStatus::Running,
                started_at: Some(now_utc()),
                ..ExecutionState::default()
            };
        });
    }

    /// Marks a stage as running and starts its clock.
    pub fn start_stage(&mut self, stage: PipelineStage) {
        self.stage_started = Some((stage, Instant::now()));
        self.observer.update(|state| state.current_stage = Some(stage));
    }

    /// Ends a stage and appends its result.
    ///
    /// Duration is measured from the matching [`Self::start_stage`]; without
    /// one it is zero. A `Failed` outcome marks the state `Failed`.
    pub fn complete_stage(&mut self, stage: PipelineStage, outcome: StageOutcome) -> StageResult {
        let duration = match self.stage_started.take() {
            Some((started, at)) if started == stage => elapsed_seconds(at),
            _ => 0.0,
        };

        self.observer.update(|state| {
            if let StageOutcome::Failed(message) = &outcome {
                state.status = StageStatus::Failed;
                state.last_error = Some(message.clone());
            }
            let result = tag_sub_item(state, StageResult::from_outcome(stage, outcome, duration));
            state.stage_results.push(result.clone());
            result
        })
    }

    /// Appends a `Skipped` result. Does not touch the overall status.
    pub fn skip_stage(&mut self, stage: PipelineStage, reason: impl Into<String>) -> StageResult {
        if matches!(self.stage_started, Some((started, _)) if started == stage) {
            self.stage_started = None;
        }
        let reason = reason.into();
        self.observer.update(|state| {
            let result = tag_sub_item(state, StageResult::skipped(stage, reason));
            state.stage_results.push(result.clone());
            result
        })
    }

    /// Points progress at a sub-item.
    pub fn set_current_sub_item(&mut self, id: impl Into<String>, index: usize) {
        let id = id.into();
        self.observer.update(|state| {
            state.current_sub_item = Some(id);
            state.current_sub_item_index = Some(index);
        });
    }

    /// Counts the current sub-item as processed.
    pub fn complete_sub_item(&mut self) {
        self.observer.update(|state| state.sub_items_completed += 1);
    }

    /// Sets the sub-item count once it is known.
    pub fn set_total_sub_items(&mut self, total: usize) {
        self.observer.update(|state| state.total_sub_items = total);
    }

    /// Records an output artifact location.
    pub fn add_output_path(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        let (key, path) = (key.into(), path.into());
        self.observer.update(|state| {
            state.output_paths.insert(key, path);
        });
    }

    /// Sets the terminal status and clears the stage pointer.
    pub fn complete_run(&mut self, status: StageStatus) {
        self.stage_started = None;
        self.observer.update(|state| {
            state.status = status;
            state.completed_at = Some(now_utc());
            state.current_stage = None;
        });
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ExecutionState {
        self.observer.read(ExecutionState::clone)
    }

    /// Returns the derived counts.
    #[must_use]
    pub fn summary(&self) -> ExecutionSummary {
        self.observer.read(ExecutionState::summary)
    }

    /// Returns a read handle that follows this tracker.
    #[must_use]
    pub fn observer(&self) -> StateObserver {
        self.observer.clone()
    }
}

fn tag_sub_item(state: &ExecutionState, result: StageResult) -> StageResult {
    match (&state.current_sub_item, result.stage().is_per_sub_item()) {
        (Some(id), true) => result.with_sub_item(id.clone()),
        _ => result,
    }
}
