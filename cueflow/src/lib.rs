//! # Cueflow
//!
//! Deterministic orchestration core for the script-to-cue pipeline.
//!
//! Cueflow drives a fixed sequence of stages over an input script and turns
//! each scene into a lighting decision:
//!
//! - **Locked stage order**: parse, then per scene enrich, retrieve and decide,
//!   then simulate, evaluate and hardware execution
//! - **Failure policy**: required stages abort the run, optional stages degrade
//!   or are skipped
//! - **Decision contract**: every decision artifact is checked before it is used
//! - **Live state**: a tracker publishes immutable snapshots while a run executes
//! - **Batch execution**: sequential or bounded-concurrency runs with
//!   index-aligned results and per-input isolation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cueflow::prelude::*;
//! use std::sync::Arc;
//!
//! let stages = StageSet::builder()
//!     .parser(MyParser::new())
//!     .retriever(MyRetriever::new())
//!     .decider(MyDecider::new())
//!     .build()?;
//!
//! let config = Arc::new(PipelineConfiguration::new().with_env_overrides()?);
//! let mut runner = PipelineRunner::new(config, stages, Arc::new(LoggingEventSink::default()))?;
//! let result = runner.run("scripts/act_one.txt");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod state;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BatchOptions, ExecutionFlags, PipelineConfiguration};
    pub use crate::core::{
        Annotation, DecisionArtifact, GroupDecision, PipelineStage, RunResult, SceneRecord,
        StageClass, StageResult, StageStatus,
    };
    pub use crate::errors::{
        ConfigurationError, ContractViolation, CueflowError, PipelineFault, StageFault,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{BatchExecutor, BatchSummary, PipelineRunner};
    pub use crate::stages::{
        Capability, Decider, Enricher, Evaluator, Parser, Retriever, Simulator, StageContext,
        StageSet,
    };
    pub use crate::state::{ExecutionState, ExecutionSummary, StateObserver};
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
