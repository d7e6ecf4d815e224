//! Test fixtures for pipeline testing.

use std::sync::Arc;

use super::mocks::{
    RecordingEvaluator, RecordingSimulator, ScriptedDecider, ScriptedEnricher, ScriptedParser,
    ScriptedRetriever,
};
use crate::config::PipelineConfiguration;
use crate::core::{Annotation, DecisionArtifact, GroupDecision, RunResult, SceneRecord};
use crate::errors::ConfigurationError;
use crate::events::CollectingEventSink;
use crate::pipeline::{BatchExecutor, PipelineRunner};
use crate::stages::StageSet;

/// Builds a scene with an annotation.
#[must_use]
pub fn annotated_scene(id: &str, emotion: &str, confidence: f64) -> SceneRecord {
    SceneRecord::new(id, format!("{id} text")).with_annotation(Annotation::new(emotion, confidence))
}

/// Builds a decision artifact from `(group_id, intensity)` pairs.
#[must_use]
pub fn decision(scene_id: &str, groups: &[(&str, f64)]) -> DecisionArtifact {
    groups
        .iter()
        .fold(DecisionArtifact::new(scene_id), |artifact, (id, intensity)| {
            artifact.with_group(GroupDecision::new(*id, *intensity))
        })
}

/// Wires scripted collaborators into runners and executors.
///
/// Every collaborator is shared, so its call counts can be inspected after a
/// run. Events go to a [`CollectingEventSink`].
#[derive(Debug)]
pub struct TestHarness {
    /// The parser.
    pub parser: Arc<ScriptedParser>,
    /// The enricher, if provided.
    pub enricher: Option<Arc<ScriptedEnricher>>,
    /// The retriever.
    pub retriever: Arc<ScriptedRetriever>,
    /// The decider.
    pub decider: Arc<ScriptedDecider>,
    /// The simulator, if provided.
    pub simulator: Option<Arc<RecordingSimulator>>,
    /// The evaluator, if provided.
    pub evaluator: Option<Arc<RecordingEvaluator>>,
    /// Configuration handed to every runner.
    pub config: PipelineConfiguration,
    /// Collected events.
    pub sink: Arc<CollectingEventSink>,
}

impl TestHarness {
    /// Creates a harness whose parser yields `scene_count` scenes.
    ///
    /// Only the mandatory collaborators are provided.
    #[must_use]
    pub fn new(scene_count: usize) -> Self {
        Self {
            parser: Arc::new(ScriptedParser::with_scene_count(scene_count)),
            enricher: None,
            retriever: Arc::new(ScriptedRetriever::new()),
            decider: Arc::new(ScriptedDecider::new()),
            simulator: None,
            evaluator: None,
            config: PipelineConfiguration::new(),
            sink: Arc::new(CollectingEventSink::new()),
        }
    }

    /// Creates a harness with every optional collaborator provided.
    #[must_use]
    pub fn full(scene_count: usize) -> Self {
        Self::new(scene_count)
            .with_enricher(ScriptedEnricher::default())
            .with_simulator(RecordingSimulator::new())
            .with_evaluator(RecordingEvaluator::new())
    }

    /// Replaces the parser.
    #[must_use]
    pub fn with_parser(mut self, parser: ScriptedParser) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Provides an enricher.
    #[must_use]
    pub fn with_enricher(mut self, enricher: ScriptedEnricher) -> Self {
        self.enricher = Some(Arc::new(enricher));
        self
    }

    /// Replaces the retriever.
    #[must_use]
    pub fn with_retriever(mut self, retriever: ScriptedRetriever) -> Self {
        self.retriever = Arc::new(retriever);
        self
    }

    /// Replaces the decider.
    #[must_use]
    pub fn with_decider(mut self, decider: ScriptedDecider) -> Self {
        self.decider = Arc::new(decider);
        self
    }

    /// Provides a simulator.
    #[must_use]
    pub fn with_simulator(mut self, simulator: RecordingSimulator) -> Self {
        self.simulator = Some(Arc::new(simulator));
        self
    }

    /// Provides an evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: RecordingEvaluator) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Adjusts the configuration.
    #[must_use]
    pub fn configure(mut self, f: impl FnOnce(PipelineConfiguration) -> PipelineConfiguration) -> Self {
        self.config = f(self.config);
        self
    }

    /// Builds the stage set from the current collaborators.
    pub fn stage_set(&self) -> Result<StageSet, ConfigurationError> {
        let mut builder = StageSet::builder()
            .parser(Arc::clone(&self.parser))
            .retriever(Arc::clone(&self.retriever))
            .decider(Arc::clone(&self.decider));
        if let Some(enricher) = &self.enricher {
            builder = builder.enricher(Arc::clone(enricher));
        }
        if let Some(simulator) = &self.simulator {
            builder = builder.simulator(Arc::clone(simulator));
        }
        if let Some(evaluator) = &self.evaluator {
            builder = builder.evaluator(Arc::clone(evaluator));
        }
        builder.build()
    }

    /// Builds a runner.
    pub fn runner(&self) -> Result<PipelineRunner, ConfigurationError> {
        PipelineRunner::new(
            Arc::new(self.config.clone()),
            self.stage_set()?,
            self.sink.clone(),
        )
    }

    /// Builds a batch executor.
    pub fn executor(&self) -> Result<BatchExecutor, ConfigurationError> {
        BatchExecutor::new(
            Arc::new(self.config.clone()),
            self.stage_set()?,
            self.sink.clone(),
        )
    }

    /// Runs one input on a fresh runner.
    pub fn run(&self, input: &str) -> Result<RunResult, ConfigurationError> {
        Ok(self.runner()?.run(input))
    }
}
