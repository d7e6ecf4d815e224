//! The decision artifact contract.
//!
//! This is the only schema check the runner performs on collaborator
//! output. Every group needs a non-empty `group_id` (whitespace counts as
//! content), and its intensity must lie in `[0.0, 1.0]`. NaN is out of range.

use crate::core::DecisionArtifact;
use crate::errors::ContractViolation;

/// Lowest permitted intensity.
pub const MIN_INTENSITY: f64 = 0.0;
/// Highest permitted intensity.
pub const MAX_INTENSITY: f64 = 1.0;

/// Checks a decision artifact, returning the first violation found.
pub fn check_decision(artifact: &DecisionArtifact) -> Result<(), ContractViolation> {
    for (group_index, group) in artifact.groups.iter().enumerate() {
        if group.group_id.is_empty() {
            return Err(ContractViolation::MissingGroupId { group_index });
        }

        let value = group.parameters.intensity;
        if !(MIN_INTENSITY..=MAX_INTENSITY).contains(&value) {
            return Err(ContractViolation::IntensityOutOfRange {
                group_index,
                group_id: group.group_id.clone(),
                value,
            });
        }
    }
    Ok(())
}
