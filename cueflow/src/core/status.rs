//! Stage status, stage class and the locked stage identities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a stage or of a whole run.
///
/// A run moves `Pending -> Running -> {Success, Failed}`; a stage may also
/// end in `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not yet started.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Completed successfully.
    Success,
    /// Failed.
    Failed,
    /// Not executed (disabled, unavailable or not implemented).
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }

    /// Returns true if the status is `Success`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the status is `Failed`.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// How a stage failure affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageClass {
    /// A failure aborts the whole run.
    Required,
    /// A failure is recorded and the run continues.
    #[default]
    Optional,
}

impl fmt::Display for StageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

/// One step of the locked pipeline sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Script parsing and scene extraction.
    Parse,
    /// Per-scene annotation (emotion analysis).
    Enrich,
    /// Per-scene retrieval of decision context.
    Retrieve,
    /// Per-scene decision artifact generation.
    Decide,
    /// Simulation / visualization over all artifacts.
    Simulate,
    /// Evaluation and trace logging over all artifacts.
    Evaluate,
    /// Hardware execution. Declared, never implemented.
    ExecuteHardware,
}

impl PipelineStage {
    /// The fixed execution order. Enrich, Retrieve and Decide repeat per sub-item.
    pub const LOCKED_ORDER: [Self; 7] = [
        Self::Parse,
        Self::Enrich,
        Self::Retrieve,
        Self::Decide,
        Self::Simulate,
        Self::Evaluate,
        Self::ExecuteHardware,
    ];

    /// Stable stage name used in results, events and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Enrich => "enrich",
            Self::Retrieve => "retrieve",
            Self::Decide => "decide",
            Self::Simulate => "simulate",
            Self::Evaluate => "evaluate",
            Self::ExecuteHardware => "execute_hardware",
        }
    }

    /// Returns true for the stages that run once per sub-item.
    #[must_use]
    pub const fn is_per_sub_item(&self) -> bool {
        matches!(self, Self::Enrich | Self::Retrieve | Self::Decide)
    }

    /// Position of the stage in [`Self::LOCKED_ORDER`].
    #[must_use]
    pub fn position(&self) -> usize {
        Self::LOCKED_ORDER
            .iter()
            .position(|stage| stage == self)
            .unwrap_or(Self::LOCKED_ORDER.len())
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Success.to_string(), "success");
        assert_eq!(StageStatus::Failed.to_string(), "failed");
        assert_eq!(StageStatus::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Success.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Skipped).unwrap();
        assert_eq!(json, r#""skipped""#);

        let deserialized: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageStatus::Skipped);
    }

    #[test]
    fn test_stage_class_default_is_optional() {
        assert_eq!(StageClass::default(), StageClass::Optional);
        assert_eq!(StageClass::Required.to_string(), "required");
    }

    #[test]
    fn test_locked_order_positions() {
        assert_eq!(PipelineStage::Parse.position(), 0);
        assert!(PipelineStage::Retrieve.position() < PipelineStage::Decide.position());
        assert!(PipelineStage::Decide.position() < PipelineStage::Simulate.position());
        assert_eq!(PipelineStage::ExecuteHardware.position(), 6);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::ExecuteHardware.to_string(), "execute_hardware");
        assert!(PipelineStage::Enrich.is_per_sub_item());
        assert!(!PipelineStage::Simulate.is_per_sub_item());
    }
}
