//! Test assertions for run results.

use crate::core::{PipelineStage, RunResult, StageStatus};

/// Asserts that the run finished `Success`.
pub fn assert_run_succeeded(result: &RunResult) {
    assert!(
        result.is_success(),
        "Expected success, got status: {:?} (error: {:?})",
        result.final_status(),
        result.error()
    );
}

/// Asserts that the run finished `Failed` with an error containing `needle`.
pub fn assert_run_failed(result: &RunResult, needle: &str) {
    assert_eq!(
        result.final_status(),
        StageStatus::Failed,
        "Expected failure, got status: {:?}",
        result.final_status()
    );
    let error = result.error().unwrap_or_default();
    assert!(
        error.contains(needle),
        "Expected error containing '{needle}', got '{error}'"
    );
}

/// Asserts the exact sequence of `(stage, status)` pairs in a run.
pub fn assert_stage_sequence(result: &RunResult, expected: &[(PipelineStage, StageStatus)]) {
    let actual: Vec<_> = result
        .stage_results()
        .iter()
        .map(|r| (r.stage(), r.status()))
        .collect();
    assert_eq!(actual, expected, "Stage sequence mismatch");
}

/// Asserts the status of every result recorded for `stage`.
pub fn assert_stage_status(result: &RunResult, stage: PipelineStage, expected: &[StageStatus]) {
    let actual: Vec<_> = result.results_for(stage).map(|r| r.status()).collect();
    assert_eq!(
        actual, expected,
        "Unexpected statuses for stage {stage}"
    );
}

/// Asserts that stage results never go backwards in the locked order.
pub fn assert_locked_order(result: &RunResult) {
    let positions: Vec<_> = result
        .stage_results()
        .iter()
        .filter(|r| !r.stage().is_per_sub_item())
        .map(|r| r.stage().position())
        .collect();
    assert!(
        positions.windows(2).all(|w| w[0] <= w[1]),
        "Whole-input stages out of order: {positions:?}"
    );
}
