//! Core domain model types for cueflow.
//!
//! This module contains the value types shared by every layer:
//! - Stage status, class and identity enums
//! - Scene and decision artifact types
//! - Stage and run result records

mod artifact;
mod result;
#[cfg(test)]
mod result_tests;
mod status;

pub use artifact::{Annotation, DecisionArtifact, GroupDecision, GroupParameters, SceneRecord};
pub use result::{OutputSummary, RunResult, StageOutcome, StageResult, RUN_REPORT_KEY};
pub use status::{PipelineStage, StageClass, StageStatus};
