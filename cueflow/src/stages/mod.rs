//! Stage collaborator traits and the injected stage set.
//!
//! Stage implementations are black boxes. The runner only sees these
//! narrow, synchronous interfaces and whether they returned a fault.
//! Calls may block; batch execution moves whole runs onto blocking threads.

mod policy;

pub use policy::{FaultResolution, StagePolicy};

use crate::config::ExecutionFlags;
use crate::core::{Annotation, DecisionArtifact, PipelineStage, SceneRecord};
use crate::errors::{ConfigurationError, StageFault};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Position of the sub-item currently being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubItemRef {
    /// Sub-item id.
    pub id: String,
    /// Zero-based index.
    pub index: usize,
    /// Number of sub-items in the run.
    pub total: usize,
}

/// Read-only context handed to every collaborator call.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// The run this call belongs to.
    pub run_id: Uuid,
    /// The input being processed.
    pub input_id: String,
    /// The stage being executed.
    pub stage: PipelineStage,
    /// The sub-item, for per-sub-item stages.
    pub sub_item: Option<SubItemRef>,
    /// Execution flags, passed through uninterpreted.
    pub flags: Arc<ExecutionFlags>,
}

impl StageContext {
    /// Creates a context for a whole-input stage.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        input_id: impl Into<String>,
        stage: PipelineStage,
        flags: Arc<ExecutionFlags>,
    ) -> Self {
        Self {
            run_id,
            input_id: input_id.into(),
            stage,
            sub_item: None,
            flags,
        }
    }

    /// Returns a copy scoped to another stage.
    #[must_use]
    pub fn for_stage(&self, stage: PipelineStage) -> Self {
        Self {
            stage,
            ..self.clone()
        }
    }

    /// Returns a copy scoped to a sub-item.
    #[must_use]
    pub fn with_sub_item(mut self, sub_item: SubItemRef) -> Self {
        self.sub_item = Some(sub_item);
        self
    }
}

/// Splits a raw input into ordered scenes.
#[cfg_attr(test, mockall::automock)]
pub trait Parser: Send + Sync {
    /// Parses the raw input. Fails on malformed input.
    fn parse(&self, ctx: &StageContext, input: &str) -> Result<Vec<SceneRecord>, StageFault>;
}

/// Annotates a scene.
#[cfg_attr(test, mockall::automock)]
pub trait Enricher: Send + Sync {
    /// Produces the annotation for one scene.
    fn enrich(&self, ctx: &StageContext, scene: &SceneRecord) -> Result<Annotation, StageFault>;
}

/// Fetches decision context for a scene.
#[cfg_attr(test, mockall::automock)]
pub trait Retriever: Send + Sync {
    /// Returns an opaque context blob for the decider.
    fn retrieve(&self, ctx: &StageContext, scene: &SceneRecord) -> Result<String, StageFault>;
}

/// Produces the decision artifact for a scene.
#[cfg_attr(test, mockall::automock)]
pub trait Decider: Send + Sync {
    /// Decides on one enriched scene given its retrieved context.
    fn decide(
        &self,
        ctx: &StageContext,
        scene: &SceneRecord,
        context: &str,
    ) -> Result<DecisionArtifact, StageFault>;
}

/// Consumes all decision artifacts for simulation or visualization.
#[cfg_attr(test, mockall::automock)]
pub trait Simulator: Send + Sync {
    /// Runs the simulation. The return value carries only success or fault.
    fn simulate(&self, ctx: &StageContext, artifacts: &[DecisionArtifact])
        -> Result<(), StageFault>;
}

/// Observes all decision artifacts (metrics and trace logging).
#[cfg_attr(test, mockall::automock)]
pub trait Evaluator: Send + Sync {
    /// Runs the evaluation.
    fn evaluate(&self, ctx: &StageContext, artifacts: &[DecisionArtifact])
        -> Result<(), StageFault>;
}

macro_rules! forward_through_arc {
    ($($trait:ident::$method:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        $(
            impl<T: $trait + ?Sized> $trait for Arc<T> {
                fn $method(&self, $($arg: $ty),*) -> $ret {
                    (**self).$method($($arg),*)
                }
            }
        )*
    };
}

// Lets callers keep a handle on a collaborator they inject.
forward_through_arc! {
    Parser::parse(ctx: &StageContext, input: &str) -> Result<Vec<SceneRecord>, StageFault>;
    Enricher::enrich(ctx: &StageContext, scene: &SceneRecord) -> Result<Annotation, StageFault>;
    Retriever::retrieve(ctx: &StageContext, scene: &SceneRecord) -> Result<String, StageFault>;
    Decider::decide(ctx: &StageContext, scene: &SceneRecord, context: &str) -> Result<DecisionArtifact, StageFault>;
    Simulator::simulate(ctx: &StageContext, artifacts: &[DecisionArtifact]) -> Result<(), StageFault>;
    Evaluator::evaluate(ctx: &StageContext, artifacts: &[DecisionArtifact]) -> Result<(), StageFault>;
}

/// An optional collaborator.
pub enum Capability<T: ?Sized> {
    /// An implementation was injected.
    Provided(Arc<T>),
    /// No implementation exists in this deployment.
    NotProvided,
}

impl<T: ?Sized> Capability<T> {
    /// Returns the implementation, if provided.
    #[must_use]
    pub fn as_provided(&self) -> Option<&Arc<T>> {
        match self {
            Self::Provided(inner) => Some(inner),
            Self::NotProvided => None,
        }
    }

    /// Returns true if an implementation was injected.
    #[must_use]
    pub const fn is_provided(&self) -> bool {
        matches!(self, Self::Provided(_))
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Provided(inner) => Self::Provided(Arc::clone(inner)),
            Self::NotProvided => Self::NotProvided,
        }
    }
}

impl<T: ?Sized> Default for Capability<T> {
    fn default() -> Self {
        Self::NotProvided
    }
}

impl<T: ?Sized> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provided(_) => write!(f, "Provided"),
            Self::NotProvided => write!(f, "NotProvided"),
        }
    }
}

/// The collaborators for one pipeline, injected at construction.
#[derive(Clone)]
pub struct StageSet {
    pub(crate) parser: Arc<dyn Parser>,
    pub(crate) enricher: Capability<dyn Enricher>,
    pub(crate) retriever: Arc<dyn Retriever>,
    pub(crate) decider: Arc<dyn Decider>,
    pub(crate) simulator: Capability<dyn Simulator>,
    pub(crate) evaluator: Capability<dyn Evaluator>,
}

impl StageSet {
    /// Starts building a stage set.
    #[must_use]
    pub fn builder() -> StageSetBuilder {
        StageSetBuilder::default()
    }

    /// Returns true if an implementation is injected for the stage.
    #[must_use]
    pub const fn provides(&self, stage: PipelineStage) -> bool {
        match stage {
            PipelineStage::Parse | PipelineStage::Retrieve | PipelineStage::Decide => true,
            PipelineStage::Enrich => self.enricher.is_provided(),
            PipelineStage::Simulate => self.simulator.is_provided(),
            PipelineStage::Evaluate => self.evaluator.is_provided(),
            PipelineStage::ExecuteHardware => false,
        }
    }
}

impl fmt::Debug for StageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSet")
            .field("enricher", &self.enricher)
            .field("simulator", &self.simulator)
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}

/// Builder for [`StageSet`].
///
/// Parser, retriever and decider are mandatory. The rest default to
/// [`Capability::NotProvided`].
#[derive(Default)]
pub struct StageSetBuilder {
    parser: Option<Arc<dyn Parser>>,
    enricher: Capability<dyn Enricher>,
    retriever: Option<Arc<dyn Retriever>>,
    decider: Option<Arc<dyn Decider>>,
    simulator: Capability<dyn Simulator>,
    evaluator: Capability<dyn Evaluator>,
}

impl StageSetBuilder {
    /// Sets the parser.
    #[must_use]
    pub fn parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// Sets the enricher.
    #[must_use]
    pub fn enricher(mut self, enricher: impl Enricher + 'static) -> Self {
        self.enricher = Capability::Provided(Arc::new(enricher));
        self
    }

    /// Sets the retriever.
    #[must_use]
    pub fn retriever(mut self, retriever: impl Retriever + 'static) -> Self {
        self.retriever = Some(Arc::new(retriever));
        self
    }

    /// Sets the decider.
    #[must_use]
    pub fn decider(mut self, decider: impl Decider + 'static) -> Self {
        self.decider = Some(Arc::new(decider));
        self
    }

    /// Sets the simulator.
    #[must_use]
    pub fn simulator(mut self, simulator: impl Simulator + 'static) -> Self {
        self.simulator = Capability::Provided(Arc::new(simulator));
        self
    }

    /// Sets the evaluator.
    #[must_use]
    pub fn evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Capability::Provided(Arc::new(evaluator));
        self
    }

    /// Builds the stage set.
    pub fn build(self) -> Result<StageSet, ConfigurationError> {
        let missing = |name: &str| {
            ConfigurationError::new(format!("no {name} provided; the {name} stage is required"))
                .with_field(name)
        };

        Ok(StageSet {
            parser: self.parser.ok_or_else(|| missing("parser"))?,
            enricher: self.enricher,
            retriever: self.retriever.ok_or_else(|| missing("retriever"))?,
            decider: self.decider.ok_or_else(|| missing("decider"))?,
            simulator: self.simulator,
            evaluator: self.evaluator,
        })
    }
}
