//! Batch execution over many inputs.
//!
//! Every input gets its own [`PipelineRunner`] and state tracker. Only the
//! configuration, the collaborators and the event sink are shared. Results
//! come back index-aligned with the inputs, whatever order the runs finish in.

use super::PipelineRunner;
use crate::config::{BatchOptions, PipelineConfiguration};
use crate::core::RunResult;
use crate::errors::ConfigurationError;
use crate::events::{EventSink, BATCH_COMPLETED, BATCH_ITEM_COMPLETED, BATCH_STARTED};
use crate::stages::StageSet;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Default file pattern for [`BatchExecutor::run_directory`].
pub const DEFAULT_PATTERN: &str = "*.txt";

/// Aggregate counts over a set of run results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of results.
    pub total: usize,
    /// Results with `Success` status.
    pub successful: usize,
    /// Results with any other status.
    pub failed: usize,
    /// `successful / total`, or 0 for an empty batch.
    pub success_rate: f64,
    /// Sum of run durations.
    pub total_duration_seconds: f64,
    /// Mean run duration, or 0 for an empty batch.
    pub average_duration_seconds: f64,
}

/// Runs the pipeline over collections of inputs.
#[derive(Clone)]
pub struct BatchExecutor {
    config: Arc<PipelineConfiguration>,
    stages: StageSet,
    sink: Arc<dyn EventSink>,
}

impl BatchExecutor {
    /// Creates an executor. Fails if the configuration is invalid.
    pub fn new(
        config: Arc<PipelineConfiguration>,
        stages: StageSet,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            stages,
            sink,
        })
    }

    /// Runs one input on a fresh runner.
    pub fn run_one(&self, input: &str) -> RunResult {
        match PipelineRunner::new(
            Arc::clone(&self.config),
            self.stages.clone(),
            Arc::clone(&self.sink),
        ) {
            Ok(mut runner) => runner.run(input),
            Err(err) => RunResult::failed_placeholder(input, err.to_string()),
        }
    }

    /// Runs all inputs, sequentially or with up to `max_workers` at once.
    ///
    /// The output has one result per input, at the input's index. A crashed
    /// worker leaves a `Failed` placeholder at its index only.
    pub async fn run_batch(&self, inputs: Vec<String>, options: &BatchOptions) -> Vec<RunResult> {
        let total = inputs.len();
        info!(
            total,
            concurrent = options.is_concurrent(),
            max_workers = options.max_workers(),
            "Batch started"
        );
        self.sink
            .emit(
                BATCH_STARTED,
                Some(json!({
                    "total": total,
                    "concurrent": options.is_concurrent(),
                    "max_workers": options.max_workers(),
                })),
            )
            .await;

        let results = if options.is_concurrent() {
            self.run_concurrent(inputs, options.max_workers()).await
        } else {
            self.run_sequential(inputs).await
        };

        let summary = Self::summarize(&results);
        info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            total_duration_seconds = summary.total_duration_seconds,
            "Batch completed"
        );
        self.sink
            .emit(BATCH_COMPLETED, serde_json::to_value(&summary).ok())
            .await;
        results
    }

    /// Runs every file in `dir` matching `pattern` (default `*.txt`), in sorted order.
    ///
    /// A missing directory, an invalid pattern or no matches give an empty result.
    pub async fn run_directory(
        &self,
        dir: impl AsRef<Path>,
        pattern: Option<&str>,
        options: &BatchOptions,
    ) -> Vec<RunResult> {
        let dir = dir.as_ref();
        let pattern = pattern.unwrap_or(DEFAULT_PATTERN);
        let inputs = discover_inputs(dir, pattern);
        if inputs.is_empty() {
            warn!(dir = %dir.display(), pattern, "No inputs found");
            return Vec::new();
        }
        self.run_batch(inputs, options).await
    }

    /// Aggregates results. Pure; an empty slice gives all zeroes.
    #[must_use]
    pub fn summarize(results: &[RunResult]) -> BatchSummary {
        let total = results.len();
        let successful = results.iter().filter(|r| r.is_success()).count();
        let total_duration_seconds: f64 = results.iter().map(RunResult::duration_seconds).sum();

        #[allow(clippy::cast_precision_loss)]
        let (success_rate, average_duration_seconds) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                successful as f64 / total as f64,
                total_duration_seconds / total as f64,
            )
        };

        BatchSummary {
            total,
            successful,
            failed: total - successful,
            success_rate,
            total_duration_seconds,
            average_duration_seconds,
        }
    }

    async fn run_sequential(&self, inputs: Vec<String>) -> Vec<RunResult> {
        let total = inputs.len();
        let mut results = Vec::with_capacity(total);
        for (index, input) in inputs.into_iter().enumerate() {
            let result = self.spawn_run(input).await;
            self.item_completed(index, total, &result).await;
            results.push(result);
        }
        results
    }

    async fn run_concurrent(&self, inputs: Vec<String>, max_workers: usize) -> Vec<RunResult> {
        let total = inputs.len();
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut join_set: JoinSet<(usize, RunResult)> = JoinSet::new();
        let mut slots: Vec<Option<RunResult>> = vec![None; total];

        for (index, input) in inputs.iter().enumerate() {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    error!(index, error = %err, "Worker pool closed");
                    slots[index] = Some(RunResult::failed_placeholder(
                        input.clone(),
                        format!("Worker pool closed: {err}"),
                    ));
                    continue;
                }
            };

            let executor = self.clone();
            let input = input.clone();
            join_set.spawn(async move {
                let _permit = permit;
                (index, executor.spawn_run(input).await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    self.item_completed(index, total, &result).await;
                    slots[index] = Some(result);
                }
                Err(join_err) => error!(error = %join_err, "Batch worker task failed"),
            }
        }

        slots
            .into_iter()
            .zip(inputs)
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| {
                    RunResult::failed_placeholder(input, "Worker terminated without a result")
                })
            })
            .collect()
    }

    /// Runs one input on a blocking thread, containing a worker crash.
    async fn spawn_run(&self, input: String) -> RunResult {
        let executor = self.clone();
        let input_id = input.clone();
        match tokio::task::spawn_blocking(move || executor.run_one(&input)).await {
            Ok(result) => result,
            Err(join_err) => {
                error!(input = %input_id, error = %join_err, "Batch worker crashed");
                RunResult::failed_placeholder(input_id, format!("Worker crashed: {join_err}"))
            }
        }
    }

    async fn item_completed(&self, index: usize, total: usize, result: &RunResult) {
        info!(
            index,
            total,
            input = %result.input_id(),
            status = %result.final_status(),
            duration_seconds = result.duration_seconds(),
            "Batch item completed"
        );
        self.sink
            .emit(
                BATCH_ITEM_COMPLETED,
                Some(json!({
                    "index": index,
                    "total": total,
                    "input": result.input_id(),
                    "status": result.final_status(),
                    "duration_seconds": result.duration_seconds(),
                })),
            )
            .await;
    }
}

/// Lists files in `dir` matching a glob `pattern`, sorted lexicographically.
#[must_use]
pub fn discover_inputs(dir: &Path, pattern: &str) -> Vec<String> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "Input directory does not exist");
        return Vec::new();
    }

    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let paths = match glob::glob(&full_pattern) {
        Ok(paths) => paths,
        Err(err) => {
            warn!(pattern, error = %err, "Invalid input pattern");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = paths
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
        .into_iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect()
}
