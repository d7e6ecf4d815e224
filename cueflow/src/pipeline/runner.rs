//! The single-input pipeline runner.
//!
//! Executes the locked stage sequence for one input:
//!
//! ```text
//! parse -> for each scene: [enrich -> retrieve -> decide] -> simulate -> evaluate -> execute_hardware
//! ```
//!
//! Faults are classified by [`StagePolicy`]. A hard abort stops the sequence
//! and is turned into a `Failed` [`RunResult`]; nothing escapes [`PipelineRunner::run`].

use crate::config::{ExecutionFlags, PipelineConfiguration};
use crate::contracts::check_decision;
use crate::core::{
    Annotation, DecisionArtifact, OutputSummary, PipelineStage, RunResult, SceneRecord,
    StageOutcome, StageStatus, RUN_REPORT_KEY,
};
use crate::errors::{ConfigurationError, PipelineFault, StageFault};
use crate::events::{
    EventSink, PIPELINE_COMPLETED, PIPELINE_STARTED, STAGE_COMPLETED, STAGE_FAILED,
    STAGE_SKIPPED, STAGE_STARTED,
};
use crate::stages::{FaultResolution, StageContext, StagePolicy, StageSet, SubItemRef};
use crate::state::{ExecutionState, ExecutionStateTracker, ExecutionSummary, StateObserver};
use crate::utils::generate_uuid;
use serde_json::json;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Skip reason for a stage turned off in configuration.
pub const REASON_DISABLED: &str = "Disabled by configuration";
/// Skip reason for an optional collaborator that was not provided.
pub const REASON_NOT_AVAILABLE: &str = "Module not available";
/// Skip reason for the hardware stage.
pub const REASON_NOT_IMPLEMENTED: &str = "Not implemented";

/// Runs the pipeline for one input at a time.
///
/// Owns its state tracker. A new run replaces the previous state; readers
/// holding an older snapshot keep it unchanged.
pub struct PipelineRunner {
    config: Arc<PipelineConfiguration>,
    stages: StageSet,
    sink: Arc<dyn EventSink>,
    policy: StagePolicy,
    flags: Arc<ExecutionFlags>,
    tracker: ExecutionStateTracker,
}

impl PipelineRunner {
    /// Creates a runner. Fails if the configuration is invalid.
    pub fn new(
        config: Arc<PipelineConfiguration>,
        stages: StageSet,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            policy: StagePolicy::from_config(&config),
            flags: Arc::new(config.flags.clone()),
            config,
            stages,
            sink,
            tracker: ExecutionStateTracker::new(),
        })
    }

    /// Runs the pipeline over one input and returns the complete result.
    ///
    /// The input is handed to the parser untouched; for directory batches it
    /// is the file path.
    pub fn run(&mut self, input: &str) -> RunResult {
        let run_id = generate_uuid();
        let span = info_span!("pipeline_run", %run_id, input = %input);
        let _enter = span.enter();

        self.tracker.start_run(input, 0, run_id);
        let mut result = RunResult::new(input, run_id);
        info!("Pipeline started");
        self.sink.try_emit(
            PIPELINE_STARTED,
            Some(json!({"run_id": run_id.to_string(), "input": input})),
        );

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.execute(input, run_id, &mut result)));
        let fault = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(fault)) => Some(fault),
            Err(payload) => Some(PipelineFault::Unclassified(
                StageFault::from_panic(payload.as_ref()).to_string(),
            )),
        };
        if let Some(fault) = fault {
            error!(error = %fault, stage = ?fault.stage(), "Pipeline aborted");
            result.abort(fault.to_string());
        }

        result.mark_complete();
        self.write_report(&mut result);
        self.tracker.complete_run(result.final_status());

        info!(
            status = %result.final_status(),
            duration_seconds = result.duration_seconds(),
            stages = result.stage_results().len(),
            "Pipeline completed"
        );
        self.sink.try_emit(
            PIPELINE_COMPLETED,
            Some(json!({
                "run_id": run_id.to_string(),
                "input": input,
                "status": result.final_status(),
                "duration_seconds": result.duration_seconds(),
                "error": result.error(),
            })),
        );
        result
    }

    /// Returns a copy of the current execution state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.tracker.snapshot()
    }

    /// Returns the derived execution summary.
    #[must_use]
    pub fn summary(&self) -> ExecutionSummary {
        self.tracker.summary()
    }

    /// Returns a thread-safe read handle on the execution state.
    #[must_use]
    pub fn observer(&self) -> StateObserver {
        self.tracker.observer()
    }

    /// The shared configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfiguration {
        &self.config
    }

    fn execute(
        &mut self,
        input: &str,
        run_id: Uuid,
        result: &mut RunResult,
    ) -> Result<(), PipelineFault> {
        let base = StageContext::new(run_id, input, PipelineStage::Parse, Arc::clone(&self.flags));

        let scenes = self.run_parse(&base, input, result)?;
        let total = scenes.len();
        self.tracker.set_total_sub_items(total);

        let mut artifacts = Vec::with_capacity(total);
        for (index, mut scene) in scenes.into_iter().enumerate() {
            if scene.id.trim().is_empty() {
                scene.id = SceneRecord::fallback_id(index);
            }
            self.tracker.set_current_sub_item(scene.id.clone(), index);
            debug!(scene_id = %scene.id, index, total, "Processing scene");

            let ctx = base.clone().with_sub_item(SubItemRef {
                id: scene.id.clone(),
                index,
                total,
            });

            self.run_enrich(&ctx, &mut scene, result)?;
            let context = self.run_retrieve(&ctx, &scene, result)?;
            let artifact = self.run_decide(&ctx, &scene, &context, result)?;
            artifacts.push(artifact);
            self.tracker.complete_sub_item();
        }

        let artifacts = &artifacts;
        let simulator = self.stages.simulator.as_provided().cloned();
        self.run_consumer(
            &base.for_stage(PipelineStage::Simulate),
            self.config.enable_simulation,
            simulator.map(|s| move |ctx: &StageContext| s.simulate(ctx, artifacts)),
            result,
        )?;

        let evaluator = self.stages.evaluator.as_provided().cloned();
        self.run_consumer(
            &base.for_stage(PipelineStage::Evaluate),
            self.config.enable_evaluation,
            evaluator.map(|e| move |ctx: &StageContext| e.evaluate(ctx, artifacts)),
            result,
        )?;

        if self.config.enable_hardware {
            self.skip(PipelineStage::ExecuteHardware, REASON_NOT_IMPLEMENTED, result);
        }
        Ok(())
    }

    fn run_parse(
        &mut self,
        ctx: &StageContext,
        input: &str,
        result: &mut RunResult,
    ) -> Result<Vec<SceneRecord>, PipelineFault> {
        let stage = PipelineStage::Parse;
        self.begin(ctx);
        let parser = Arc::clone(&self.stages.parser);
        let scenes = self.required(stage, invoke(|| parser.parse(ctx, input)), result)?;

        info!(scene_count = scenes.len(), "Parsed input");
        self.record(
            stage,
            StageOutcome::Success(Some(summary("scene_count", scenes.len()))),
            result,
        );
        Ok(scenes)
    }

    fn run_enrich(
        &mut self,
        ctx: &StageContext,
        scene: &mut SceneRecord,
        result: &mut RunResult,
    ) -> Result<(), PipelineFault> {
        let Some(enricher) = self.stages.enricher.as_provided().cloned() else {
            scene.annotation.get_or_insert_with(Annotation::neutral);
            self.skip(PipelineStage::Enrich, REASON_NOT_AVAILABLE, result);
            return Ok(());
        };

        let ctx = ctx.for_stage(PipelineStage::Enrich);
        self.begin(&ctx);
        match invoke(|| enricher.enrich(&ctx, scene)) {
            Ok(annotation) => {
                self.record(
                    PipelineStage::Enrich,
                    StageOutcome::Success(Some(summary("emotion", annotation.primary.as_str()))),
                    result,
                );
                scene.annotation = Some(annotation);
            }
            Err(fault) => {
                warn!(scene_id = %scene.id, error = %fault, "Enrichment failed, using neutral annotation");
                if self.handle_fault(PipelineStage::Enrich, &fault, result)? == FaultResolution::Degrade {
                    scene.annotation = Some(Annotation::neutral());
                }
            }
        }
        Ok(())
    }

    fn run_retrieve(
        &mut self,
        ctx: &StageContext,
        scene: &SceneRecord,
        result: &mut RunResult,
    ) -> Result<String, PipelineFault> {
        let stage = PipelineStage::Retrieve;
        let ctx = ctx.for_stage(stage);
        self.begin(&ctx);
        let retriever = Arc::clone(&self.stages.retriever);
        let context = self.required(stage, invoke(|| retriever.retrieve(&ctx, scene)), result)?;

        self.record(
            stage,
            StageOutcome::Success(Some(summary("context_length", context.chars().count()))),
            result,
        );
        Ok(context)
    }

    fn run_decide(
        &mut self,
        ctx: &StageContext,
        scene: &SceneRecord,
        context: &str,
        result: &mut RunResult,
    ) -> Result<DecisionArtifact, PipelineFault> {
        let stage = PipelineStage::Decide;
        let ctx = ctx.for_stage(stage);
        self.begin(&ctx);
        let decider = Arc::clone(&self.stages.decider);
        let artifact = self.required(stage, invoke(|| decider.decide(&ctx, scene, context)), result)?;

        if let Err(violation) = check_decision(&artifact) {
            error!(scene_id = %scene.id, %violation, "Decision contract violated");
            self.record(stage, StageOutcome::Failed(violation.to_string()), result);
            return Err(PipelineFault::ContractViolation { stage, violation });
        }

        self.record(
            stage,
            StageOutcome::Success(Some(summary("groups_count", artifact.groups.len()))),
            result,
        );
        Ok(artifact)
    }

    fn run_consumer<F>(
        &mut self,
        ctx: &StageContext,
        enabled: bool,
        consumer: Option<F>,
        result: &mut RunResult,
    ) -> Result<(), PipelineFault>
    where
        F: FnOnce(&StageContext) -> Result<(), StageFault>,
    {
        let stage = ctx.stage;
        if !enabled {
            self.skip(stage, REASON_DISABLED, result);
            return Ok(());
        }
        let Some(consume) = consumer else {
            self.skip(stage, REASON_NOT_AVAILABLE, result);
            return Ok(());
        };

        self.begin(ctx);
        match invoke(|| consume(ctx)) {
            Ok(()) => self.record(stage, StageOutcome::Success(None), result),
            Err(fault) => {
                warn!(stage = %stage, error = %fault, "Optional stage did not complete");
                self.handle_fault(stage, &fault, result)?;
            }
        }
        Ok(())
    }

    /// Unwraps a required stage call, aborting the run on a fault.
    fn required<T>(
        &mut self,
        stage: PipelineStage,
        outcome: Result<T, StageFault>,
        result: &mut RunResult,
    ) -> Result<T, PipelineFault> {
        match outcome {
            Ok(value) => Ok(value),
            Err(fault) => {
                self.handle_fault(stage, &fault, result)?;
                Err(PipelineFault::hard(stage, fault.to_string()))
            }
        }
    }

    /// Records a fault as the policy dictates. Returns `Err` when the run must stop.
    fn handle_fault(
        &mut self,
        stage: PipelineStage,
        fault: &StageFault,
        result: &mut RunResult,
    ) -> Result<FaultResolution, PipelineFault> {
        let resolution = self.policy.resolve(stage, fault);
        match &resolution {
            FaultResolution::Skip(reason) => self.skip(stage, reason.clone(), result),
            FaultResolution::Abort | FaultResolution::Degrade | FaultResolution::Continue => {
                self.record(stage, StageOutcome::Failed(fault.to_string()), result);
            }
        }
        if resolution.is_abort() {
            return Err(PipelineFault::hard(stage, fault.to_string()));
        }
        Ok(resolution)
    }

    fn begin(&mut self, ctx: &StageContext) {
        self.tracker.start_stage(ctx.stage);
        debug!(stage = %ctx.stage, "Stage started");
        self.sink.try_emit(
            STAGE_STARTED,
            Some(json!({
                "run_id": ctx.run_id.to_string(),
                "stage": ctx.stage,
                "sub_item": ctx.sub_item.as_ref().map(|s| s.id.clone()),
            })),
        );
    }

    fn skip(&mut self, stage: PipelineStage, reason: impl Into<String>, result: &mut RunResult) {
        self.record(stage, StageOutcome::Skipped(reason.into()), result);
    }

    fn record(&mut self, stage: PipelineStage, outcome: StageOutcome, result: &mut RunResult) {
        let stage_result = match outcome {
            StageOutcome::Skipped(reason) => self.tracker.skip_stage(stage, reason),
            outcome => self.tracker.complete_stage(stage, outcome),
        };

        let (event, payload) = match stage_result.status() {
            StageStatus::Success => (
                STAGE_COMPLETED,
                json!({
                    "stage": stage,
                    "sub_item": stage_result.sub_item(),
                    "duration_seconds": stage_result.duration_seconds(),
                    "output": stage_result.output(),
                }),
            ),
            StageStatus::Failed => {
                warn!(stage = %stage, error = ?stage_result.error(), "Stage failed");
                (
                    STAGE_FAILED,
                    json!({
                        "stage": stage,
                        "sub_item": stage_result.sub_item(),
                        "class": self.policy.class_of(stage),
                        "error": stage_result.error(),
                    }),
                )
            }
            _ => {
                info!(stage = %stage, reason = ?stage_result.skip_reason(), "Stage skipped");
                (
                    STAGE_SKIPPED,
                    json!({"stage": stage, "reason": stage_result.skip_reason()}),
                )
            }
        };
        self.sink.try_emit(event, Some(payload));

        result.push_stage(stage_result, self.policy.class_of(stage));
    }

    fn write_report(&mut self, result: &mut RunResult) {
        let Some(dir) = self.config.output_dir.as_deref() else {
            return;
        };
        match result.write_report(dir) {
            Ok(path) => {
                info!(path = %path.display(), "Run report written");
                self.tracker.add_output_path(RUN_REPORT_KEY, path.clone());
                result.record_output_path(RUN_REPORT_KEY, path);
            }
            Err(err) => warn!(dir = %dir.display(), error = %err, "Failed to write run report"),
        }
    }
}

/// Calls a collaborator, turning a panic into a fault.
fn invoke<T>(call: impl FnOnce() -> Result<T, StageFault>) -> Result<T, StageFault> {
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(StageFault::from_panic(payload.as_ref())))
}

fn summary(key: &str, value: impl Into<serde_json::Value>) -> OutputSummary {
    let mut map = OutputSummary::new();
    map.insert(key.to_string(), value.into());
    map
}
