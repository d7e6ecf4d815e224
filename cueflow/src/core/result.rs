//! Per-stage and per-run result records.

use super::{PipelineStage, StageClass, StageStatus};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Small structured summary of a stage output. Never the full payload.
pub type OutputSummary = BTreeMap<String, serde_json::Value>;

/// Output key under which the run report path is recorded.
pub const RUN_REPORT_KEY: &str = "run_report";

/// How a stage ended, as reported to the state tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// The stage succeeded, optionally with a summary.
    Success(Option<OutputSummary>),
    /// The stage failed with an error message.
    Failed(String),
    /// The stage did not run.
    Skipped(String),
}

impl StageOutcome {
    /// The status this outcome maps to.
    #[must_use]
    pub const fn status(&self) -> StageStatus {
        match self {
            Self::Success(_) => StageStatus::Success,
            Self::Failed(_) => StageStatus::Failed,
            Self::Skipped(_) => StageStatus::Skipped,
        }
    }
}

/// Immutable record of one stage execution.
///
/// `error` is set only for `Failed`, `output` only for `Success` and
/// `skip_reason` only for `Skipped`. The constructors are the only way to
/// build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    stage: PipelineStage,
    status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<OutputSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skip_reason: Option<String>,
    duration_seconds: f64,
}

impl StageResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(stage: PipelineStage, output: Option<OutputSummary>, duration_seconds: f64) -> Self {
        Self {
            stage,
            status: StageStatus::Success,
            sub_item: None,
            output,
            error: None,
            skip_reason: None,
            duration_seconds,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(stage: PipelineStage, error: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            sub_item: None,
            output: None,
            error: Some(error.into()),
            skip_reason: None,
            duration_seconds,
        }
    }

    /// Creates a skipped result. Skipped stages take no time.
    #[must_use]
    pub fn skipped(stage: PipelineStage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            sub_item: None,
            output: None,
            error: None,
            skip_reason: Some(reason.into()),
            duration_seconds: 0.0,
        }
    }

    /// Builds a result from a tracker outcome.
    #[must_use]
    pub fn from_outcome(stage: PipelineStage, outcome: StageOutcome, duration_seconds: f64) -> Self {
        match outcome {
            StageOutcome::Success(output) => Self::success(stage, output, duration_seconds),
            StageOutcome::Failed(error) => Self::failed(stage, error, duration_seconds),
            StageOutcome::Skipped(reason) => Self::skipped(stage, reason),
        }
    }

    /// Tags the result with the sub-item it was produced for.
    #[must_use]
    pub fn with_sub_item(mut self, sub_item: impl Into<String>) -> Self {
        self.sub_item = Some(sub_item.into());
        self
    }

    /// The stage.
    #[must_use]
    pub const fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// The status.
    #[must_use]
    pub const fn status(&self) -> StageStatus {
        self.status
    }

    /// The sub-item id, for per-sub-item stages.
    #[must_use]
    pub fn sub_item(&self) -> Option<&str> {
        self.sub_item.as_deref()
    }

    /// The output summary.
    #[must_use]
    pub const fn output(&self) -> Option<&OutputSummary> {
        self.output.as_ref()
    }

    /// The error message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The skip reason.
    #[must_use]
    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// Error message or skip reason, whichever applies.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.error().or_else(|| self.skip_reason())
    }

    /// Duration in seconds.
    #[must_use]
    pub const fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }
}

/// Aggregate result of one run.
///
/// Owned by the runner while the run is in flight and handed to the caller
/// afterwards. `final_status` is monotonic: once `Failed`, it stays `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    run_id: Uuid,
    input_id: String,
    stage_results: Vec<StageResult>,
    duration_seconds: f64,
    final_status: StageStatus,
    #[serde(default)]
    output_paths: BTreeMap<String, PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<Timestamp>,
}

impl RunResult {
    /// Starts a new result in the `Running` state.
    #[must_use]
    pub fn new(input_id: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            run_id,
            input_id: input_id.into(),
            stage_results: Vec::new(),
            duration_seconds: 0.0,
            final_status: StageStatus::Running,
            output_paths: BTreeMap::new(),
            error: None,
            started_at: now_utc(),
            completed_at: None,
        }
    }

    /// A terminal `Failed` result for an input that produced no run at all.
    #[must_use]
    pub fn failed_placeholder(input_id: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(input_id, crate::utils::generate_uuid());
        result.abort(error);
        result.mark_complete();
        result
    }

    /// Appends a stage result. A `Failed` result of a `Required` stage fails the run.
    pub fn push_stage(&mut self, result: StageResult, class: StageClass) {
        self.duration_seconds += result.duration_seconds();
        if result.status().is_failure() && class == StageClass::Required {
            self.final_status = StageStatus::Failed;
            if self.error.is_none() {
                self.error = result.error().map(str::to_string);
            }
        }
        self.stage_results.push(result);
    }

    /// Marks the run as hard-aborted.
    pub fn abort(&mut self, message: impl Into<String>) {
        self.final_status = StageStatus::Failed;
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }

    /// Records an output artifact location.
    pub fn record_output_path(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.output_paths.insert(key.into(), path.into());
    }

    /// Moves the run to its terminal status. Idempotent.
    pub fn mark_complete(&mut self) {
        if !self.final_status.is_failure() {
            self.final_status = StageStatus::Success;
        }
        if self.completed_at.is_none() {
            self.completed_at = Some(now_utc());
        }
    }

    /// Writes the result as pretty JSON to `<dir>/run_<run_id>.json`.
    pub fn write_report(&self, dir: &Path) -> Result<PathBuf, crate::errors::CueflowError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("run_{}.json", self.run_id));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// The run id.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The input identifier.
    #[must_use]
    pub fn input_id(&self) -> &str {
        &self.input_id
    }

    /// Stage results in execution order.
    #[must_use]
    pub fn stage_results(&self) -> &[StageResult] {
        &self.stage_results
    }

    /// Results recorded for one stage.
    pub fn results_for(&self, stage: PipelineStage) -> impl Iterator<Item = &StageResult> {
        self.stage_results.iter().filter(move |r| r.stage() == stage)
    }

    /// Sum of stage durations, in seconds.
    #[must_use]
    pub const fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// The run status.
    #[must_use]
    pub const fn final_status(&self) -> StageStatus {
        self.final_status
    }

    /// Returns true if the run ended in `Success`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.final_status.is_success()
    }

    /// Output artifact locations.
    #[must_use]
    pub const fn output_paths(&self) -> &BTreeMap<String, PathBuf> {
        &self.output_paths
    }

    /// The run-level error message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When the run started.
    #[must_use]
    pub const fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// When the run reached its terminal status.
    #[must_use]
    pub const fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }
}
