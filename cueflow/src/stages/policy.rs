//! Failure classification for the locked stage sequence.
//!
//! | Stage            | Class    | Fault                                  |
//! |------------------|----------|----------------------------------------|
//! | parse            | required | abort                                  |
//! | enrich           | optional | substitute neutral annotation          |
//! | retrieve         | required | abort                                  |
//! | decide           | required | abort (includes contract violations)   |
//! | simulate         | optional | absent: skip, raised: record failure   |
//! | evaluate         | config   | absent: skip, raised: class decides    |
//! | execute_hardware | optional | always skip                            |

use crate::config::PipelineConfiguration;
use crate::core::{PipelineStage, StageClass};
use crate::errors::StageFault;
use serde::{Deserialize, Serialize};

/// What the runner does with a stage fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultResolution {
    /// Record `Failed` and abort the run.
    Abort,
    /// Record `Failed`, substitute the default value and continue.
    Degrade,
    /// Record `Failed` and continue.
    Continue,
    /// Record `Skipped` with the given reason and continue.
    Skip(String),
}

impl FaultResolution {
    /// Returns true if the run must stop.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Abort)
    }
}

/// The classification lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StagePolicy {
    evaluation_class: StageClass,
}

impl StagePolicy {
    /// Creates a policy with the given class for the evaluate stage.
    #[must_use]
    pub const fn new(evaluation_class: StageClass) -> Self {
        Self { evaluation_class }
    }

    /// Builds the policy from configuration.
    #[must_use]
    pub const fn from_config(config: &PipelineConfiguration) -> Self {
        Self::new(config.evaluation_class)
    }

    /// The class of a stage.
    #[must_use]
    pub const fn class_of(&self, stage: PipelineStage) -> StageClass {
        match stage {
            PipelineStage::Parse | PipelineStage::Retrieve | PipelineStage::Decide => {
                StageClass::Required
            }
            PipelineStage::Evaluate => self.evaluation_class,
            PipelineStage::Enrich | PipelineStage::Simulate | PipelineStage::ExecuteHardware => {
                StageClass::Optional
            }
        }
    }

    /// Decides what a fault in `stage` means for the run.
    #[must_use]
    pub fn resolve(&self, stage: PipelineStage, fault: &StageFault) -> FaultResolution {
        match stage {
            PipelineStage::Parse | PipelineStage::Retrieve | PipelineStage::Decide => {
                FaultResolution::Abort
            }
            PipelineStage::Enrich => FaultResolution::Degrade,
            PipelineStage::ExecuteHardware => FaultResolution::Skip(fault.to_string()),
            PipelineStage::Simulate | PipelineStage::Evaluate => {
                if fault.is_absence() {
                    FaultResolution::Skip(fault.to_string())
                } else if self.class_of(stage) == StageClass::Required {
                    FaultResolution::Abort
                } else {
                    FaultResolution::Continue
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_stages_abort_on_any_fault() {
        let policy = StagePolicy::default();
        for stage in [PipelineStage::Parse, PipelineStage::Retrieve, PipelineStage::Decide] {
            assert_eq!(policy.class_of(stage), StageClass::Required);
            assert!(policy.resolve(stage, &StageFault::raised("x")).is_abort());
            assert!(policy.resolve(stage, &StageFault::Panicked("x".into())).is_abort());
            assert!(policy.resolve(stage, &StageFault::unavailable("x")).is_abort());
        }
    }

    #[test]
    fn test_enrich_degrades() {
        let policy = StagePolicy::default();
        assert_eq!(policy.class_of(PipelineStage::Enrich), StageClass::Optional);
        assert_eq!(
            policy.resolve(PipelineStage::Enrich, &StageFault::raised("model down")),
            FaultResolution::Degrade
        );
    }

    #[test]
    fn test_optional_consumers() {
        let policy = StagePolicy::default();
        assert_eq!(
            policy.resolve(PipelineStage::Simulate, &StageFault::raised("gpu lost")),
            FaultResolution::Continue
        );
        assert_eq!(
            policy.resolve(PipelineStage::Simulate, &StageFault::unavailable("renderer")),
            FaultResolution::Skip("Module not available: renderer".to_string())
        );
        assert_eq!(
            policy.resolve(PipelineStage::Evaluate, &StageFault::not_implemented("metrics")),
            FaultResolution::Skip("Not implemented: metrics".to_string())
        );
    }

    #[test]
    fn test_required_evaluation() {
        let config = PipelineConfiguration::new().with_evaluation_class(StageClass::Required);
        let policy = StagePolicy::from_config(&config);

        assert_eq!(policy.class_of(PipelineStage::Evaluate), StageClass::Required);
        assert!(policy
            .resolve(PipelineStage::Evaluate, &StageFault::raised("trace sink full"))
            .is_abort());
        assert!(matches!(
            policy.resolve(PipelineStage::Evaluate, &StageFault::unavailable("metrics")),
            FaultResolution::Skip(_)
        ));
    }

    #[test]
    fn test_hardware_always_skips() {
        let policy = StagePolicy::default();
        assert!(matches!(
            policy.resolve(PipelineStage::ExecuteHardware, &StageFault::raised("x")),
            FaultResolution::Skip(_)
        ));
    }
}
