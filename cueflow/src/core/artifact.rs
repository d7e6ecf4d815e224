//! Sub-item and decision artifact types exchanged with stage collaborators.
//!
//! The orchestrator only reads the fields it needs (ids, group ids and
//! intensities). Everything else rides along in the flattened `extra` maps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One scene produced by the parser.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Scene identifier. May be empty; the runner assigns a positional id.
    #[serde(default)]
    pub id: String,

    /// Raw scene text.
    #[serde(default)]
    pub content: String,

    /// Annotation attached by the enricher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,

    /// Collaborator-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SceneRecord {
    /// Creates a scene with an id and content.
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            annotation: None,
            extra: Map::new(),
        }
    }

    /// Attaches an annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Adds a collaborator-specific field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The positional id used when the parser leaves `id` empty.
    #[must_use]
    pub fn fallback_id(index: usize) -> String {
        format!("scene_{index:03}")
    }
}

/// Emotion annotation attached to a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Primary label, e.g. "tense".
    pub primary: String,

    /// Confidence in `[0, 1]`.
    pub confidence: f64,

    /// Collaborator-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    /// Creates an annotation.
    #[must_use]
    pub fn new(primary: impl Into<String>, confidence: f64) -> Self {
        Self {
            primary: primary.into(),
            confidence,
            extra: Map::new(),
        }
    }

    /// The default substituted when enrichment fails or is not provided.
    #[must_use]
    pub fn neutral() -> Self {
        Self::new("neutral", 0.0)
    }

    /// Returns true if this is the neutral default.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.primary == "neutral" && self.confidence.abs() < f64::EPSILON
    }
}

/// The per-scene decision produced by the decider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecisionArtifact {
    /// The scene this decision belongs to.
    #[serde(default)]
    pub scene_id: String,

    /// Ordered decision groups.
    #[serde(default)]
    pub groups: Vec<GroupDecision>,

    /// Collaborator-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DecisionArtifact {
    /// Creates an empty artifact for a scene.
    #[must_use]
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            groups: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Appends a group.
    #[must_use]
    pub fn with_group(mut self, group: GroupDecision) -> Self {
        self.groups.push(group);
        self
    }
}

/// One group (unit) in a decision artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDecision {
    /// Group identifier. Must be non-empty.
    #[serde(default)]
    pub group_id: String,

    /// Numeric parameters.
    pub parameters: GroupParameters,

    /// Optional transition description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Value>,
}

impl GroupDecision {
    /// Creates a group with the given intensity.
    #[must_use]
    pub fn new(group_id: impl Into<String>, intensity: f64) -> Self {
        Self {
            group_id: group_id.into(),
            parameters: GroupParameters::new(intensity),
            transition: None,
        }
    }

    /// Sets the transition.
    #[must_use]
    pub fn with_transition(mut self, transition: Value) -> Self {
        self.transition = Some(transition);
        self
    }
}

/// Parameters of a decision group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupParameters {
    /// Intensity. Must lie in `[0, 1]`.
    pub intensity: f64,

    /// Other parameters (color, focus, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GroupParameters {
    /// Creates parameters with an intensity.
    #[must_use]
    pub fn new(intensity: f64) -> Self {
        Self {
            intensity,
            extra: Map::new(),
        }
    }
}
