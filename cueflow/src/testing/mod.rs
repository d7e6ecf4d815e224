//! Testing utilities for cueflow pipelines.
//!
//! This module provides:
//! - Scripted collaborators with call tracking
//! - Assertions over run results
//! - A harness that wires collaborators into runners and executors

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_locked_order, assert_run_failed, assert_run_succeeded, assert_stage_sequence,
    assert_stage_status,
};
pub use fixtures::{annotated_scene, decision, TestHarness};
pub use mocks::{
    ConsumerBehavior, RecordingEvaluator, RecordingSimulator, ScriptedDecider, ScriptedEnricher,
    ScriptedParser, ScriptedRetriever,
};
