//! Error types for the cueflow orchestrator.
//!
//! Faults are split by where they are raised: collaborators return
//! [`StageFault`], the decision boundary produces [`ContractViolation`], and
//! the runner carries hard aborts internally as [`PipelineFault`]. None of
//! these escape a run; they end up as `Failed` results.

use crate::core::PipelineStage;
use thiserror::Error;

/// The crate-level error type for operations outside a run.
#[derive(Debug, Error)]
pub enum CueflowError {
    /// Invalid configuration or options.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fault reported by a stage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageFault {
    /// The collaborator ran and failed.
    #[error("{0}")]
    Raised(String),

    /// The collaborator is present but cannot run in this environment.
    #[error("Module not available: {0}")]
    Unavailable(String),

    /// The collaborator is declared but has no implementation yet.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// The collaborator panicked.
    #[error("Stage panicked: {0}")]
    Panicked(String),
}

impl StageFault {
    /// Creates a raised fault.
    #[must_use]
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised(message.into())
    }

    /// Creates an unavailable fault.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a not-implemented fault.
    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    /// Builds a fault from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }

    /// Returns true if the fault means the stage could not run at all.
    #[must_use]
    pub const fn is_absence(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::NotImplemented(_))
    }
}

impl From<anyhow::Error> for StageFault {
    fn from(err: anyhow::Error) -> Self {
        Self::Raised(format!("{err:#}"))
    }
}

/// A violation of the decision artifact contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    /// A group has an empty identifier.
    #[error("Missing group_id in decision group {group_index}")]
    MissingGroupId {
        /// Position of the group in the artifact.
        group_index: usize,
    },

    /// A group intensity lies outside `[0, 1]`.
    #[error("Intensity {value} out of range [0, 1] for group '{group_id}'")]
    IntensityOutOfRange {
        /// Position of the group in the artifact.
        group_index: usize,
        /// The group identifier.
        group_id: String,
        /// The offending value.
        value: f64,
    },
}

/// A fault that aborts the current run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineFault {
    /// A required stage failed.
    #[error("Hard failure in {stage}: {message}")]
    HardFailure {
        /// The failing stage.
        stage: PipelineStage,
        /// The failure message.
        message: String,
    },

    /// The decision artifact broke its contract.
    #[error("Contract violation in {stage}: {violation}")]
    ContractViolation {
        /// The stage whose output was checked.
        stage: PipelineStage,
        /// The violation.
        violation: ContractViolation,
    },

    /// A fault outside any stage boundary.
    #[error("Unclassified failure: {0}")]
    Unclassified(String),
}

impl PipelineFault {
    /// Creates a hard failure.
    #[must_use]
    pub fn hard(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self::HardFailure {
            stage,
            message: message.into(),
        }
    }

    /// Returns the stage the fault is attributed to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::HardFailure { stage, .. } | Self::ContractViolation { stage, .. } => {
                Some(*stage)
            }
            Self::Unclassified(_) => None,
        }
    }
}

/// Error raised for invalid configuration, before any run starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Configuration error: {message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The offending field, if known.
    pub field: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// Sets the offending field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}
