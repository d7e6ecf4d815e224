//! Scripted collaborators for testing.
//!
//! Each collaborator counts its calls and fails on the sub-item indices it
//! was told to fail on. All of them are `Send + Sync` so a single instance
//! can back a concurrent batch.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::{Annotation, DecisionArtifact, GroupDecision, SceneRecord};
use crate::errors::StageFault;
use crate::stages::{Decider, Enricher, Evaluator, Parser, Retriever, Simulator, StageContext};

fn sub_item_index(ctx: &StageContext) -> Option<usize> {
    ctx.sub_item.as_ref().map(|s| s.index)
}

/// A parser that returns a fixed list of scenes.
#[derive(Debug, Default)]
pub struct ScriptedParser {
    scenes: Vec<SceneRecord>,
    failure: Option<String>,
    failing_inputs: BTreeSet<String>,
    calls: AtomicUsize,
}

impl ScriptedParser {
    /// Returns the given scenes for every input.
    #[must_use]
    pub fn new(scenes: Vec<SceneRecord>) -> Self {
        Self {
            scenes,
            ..Self::default()
        }
    }

    /// Returns `count` scenes with ids `s0`, `s1`, ...
    #[must_use]
    pub fn with_scene_count(count: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| SceneRecord::new(format!("s{i}"), format!("scene {i} text")))
                .collect(),
        )
    }

    /// Fails every call with the message.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Fails only when the raw input equals `input`.
    #[must_use]
    pub fn fail_on_input(mut self, input: impl Into<String>) -> Self {
        self.failing_inputs.insert(input.into());
        self
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Parser for ScriptedParser {
    fn parse(&self, _ctx: &StageContext, input: &str) -> Result<Vec<SceneRecord>, StageFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(StageFault::raised(message.clone()));
        }
        if self.failing_inputs.contains(input) {
            return Err(StageFault::raised(format!("malformed input: {input}")));
        }
        Ok(self.scenes.clone())
    }
}

/// An enricher that labels every scene with the same emotion.
#[derive(Debug)]
pub struct ScriptedEnricher {
    annotation: Annotation,
    fail_on: BTreeSet<usize>,
    calls: AtomicUsize,
}

impl Default for ScriptedEnricher {
    fn default() -> Self {
        Self::new(Annotation::new("joy", 0.9))
    }
}

impl ScriptedEnricher {
    /// Returns the annotation for every scene.
    #[must_use]
    pub fn new(annotation: Annotation) -> Self {
        Self {
            annotation,
            fail_on: BTreeSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails on the sub-item at `index`.
    #[must_use]
    pub fn fail_on(mut self, index: usize) -> Self {
        self.fail_on.insert(index);
        self
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Enricher for ScriptedEnricher {
    fn enrich(&self, ctx: &StageContext, scene: &SceneRecord) -> Result<Annotation, StageFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if sub_item_index(ctx).is_some_and(|i| self.fail_on.contains(&i)) {
            return Err(StageFault::raised(format!("enrichment failed for {}", scene.id)));
        }
        Ok(self.annotation.clone())
    }
}

/// A retriever that echoes the scene id back as context.
#[derive(Debug, Default)]
pub struct ScriptedRetriever {
    fail_on: BTreeSet<usize>,
    calls: AtomicUsize,
}

impl ScriptedRetriever {
    /// Creates a retriever that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails on the sub-item at `index`.
    #[must_use]
    pub fn fail_on(mut self, index: usize) -> Self {
        self.fail_on.insert(index);
        self
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Retriever for ScriptedRetriever {
    fn retrieve(&self, ctx: &StageContext, scene: &SceneRecord) -> Result<String, StageFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if sub_item_index(ctx).is_some_and(|i| self.fail_on.contains(&i)) {
            return Err(StageFault::raised(format!("retrieval failed for {}", scene.id)));
        }
        Ok(format!("context for {}", scene.id))
    }
}

/// A decider that emits one lighting group per scene.
///
/// Intensity comes from the per-index override if any, otherwise from the
/// scene annotation: neutral scenes get the low default, others the high one.
#[derive(Debug)]
pub struct ScriptedDecider {
    intensity: f64,
    neutral_intensity: f64,
    overrides: Vec<(usize, f64)>,
    missing_group_id_on: BTreeSet<usize>,
    seen: Mutex<Vec<SceneRecord>>,
}

impl Default for ScriptedDecider {
    fn default() -> Self {
        Self {
            intensity: 0.8,
            neutral_intensity: 0.3,
            overrides: Vec::new(),
            missing_group_id_on: BTreeSet::new(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedDecider {
    /// Creates a decider with the default intensities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `intensity` for the sub-item at `index`.
    #[must_use]
    pub fn with_intensity_at(mut self, index: usize, intensity: f64) -> Self {
        self.overrides.push((index, intensity));
        self
    }

    /// Emits a group without an id for the sub-item at `index`.
    #[must_use]
    pub fn missing_group_id_at(mut self, index: usize) -> Self {
        self.missing_group_id_on.insert(index);
        self
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.seen.lock().len()
    }

    /// Returns the scenes as they reached the decider.
    #[must_use]
    pub fn seen_scenes(&self) -> Vec<SceneRecord> {
        self.seen.lock().clone()
    }
}

impl Decider for ScriptedDecider {
    fn decide(
        &self,
        ctx: &StageContext,
        scene: &SceneRecord,
        _context: &str,
    ) -> Result<DecisionArtifact, StageFault> {
        self.seen.lock().push(scene.clone());
        let index = sub_item_index(ctx);

        let fallback = match &scene.annotation {
            Some(annotation) if !annotation.is_neutral() => self.intensity,
            _ => self.neutral_intensity,
        };
        let intensity = self
            .overrides
            .iter()
            .rev()
            .find(|(i, _)| Some(*i) == index)
            .map_or(fallback, |(_, value)| *value);

        let group_id = match index {
            Some(i) if self.missing_group_id_on.contains(&i) => "",
            _ => "key_light",
        };
        Ok(DecisionArtifact::new(scene.id.clone()).with_group(GroupDecision::new(group_id, intensity)))
    }
}

/// How a recording consumer should end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConsumerBehavior {
    /// Return success.
    #[default]
    Succeed,
    /// Return a raised fault with the message.
    Fail(String),
    /// Report that the backing module is unavailable.
    Unavailable(String),
}

impl ConsumerBehavior {
    fn outcome(&self) -> Result<(), StageFault> {
        match self {
            Self::Succeed => Ok(()),
            Self::Fail(message) => Err(StageFault::raised(message.clone())),
            Self::Unavailable(module) => Err(StageFault::unavailable(module.clone())),
        }
    }
}

/// A simulator that records the artifact batches it received.
#[derive(Debug, Default)]
pub struct RecordingSimulator {
    behavior: ConsumerBehavior,
    received: Mutex<Vec<Vec<DecisionArtifact>>>,
}

impl RecordingSimulator {
    /// Creates a simulator that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a simulator that ends with `behavior`.
    #[must_use]
    pub fn with_behavior(behavior: ConsumerBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.received.lock().len()
    }

    /// Returns the artifacts from every call.
    #[must_use]
    pub fn received(&self) -> Vec<Vec<DecisionArtifact>> {
        self.received.lock().clone()
    }
}

impl Simulator for RecordingSimulator {
    fn simulate(&self, _ctx: &StageContext, artifacts: &[DecisionArtifact]) -> Result<(), StageFault> {
        self.received.lock().push(artifacts.to_vec());
        self.behavior.outcome()
    }
}

/// An evaluator that records the artifact batches it received.
#[derive(Debug, Default)]
pub struct RecordingEvaluator {
    behavior: ConsumerBehavior,
    received: Mutex<Vec<Vec<DecisionArtifact>>>,
}

impl RecordingEvaluator {
    /// Creates an evaluator that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an evaluator that ends with `behavior`.
    #[must_use]
    pub fn with_behavior(behavior: ConsumerBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.received.lock().len()
    }

    /// Returns the artifacts from every call.
    #[must_use]
    pub fn received(&self) -> Vec<Vec<DecisionArtifact>> {
        self.received.lock().clone()
    }
}

impl Evaluator for RecordingEvaluator {
    fn evaluate(&self, _ctx: &StageContext, artifacts: &[DecisionArtifact]) -> Result<(), StageFault> {
        self.received.lock().push(artifacts.to_vec());
        self.behavior.outcome()
    }
}
