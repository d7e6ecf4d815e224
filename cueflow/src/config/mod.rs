//! Pipeline and batch configuration.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (`CUEFLOW_OUTPUT_DIR`, `CUEFLOW_DEMO_MODE`, `CUEFLOW_USE_LLM`)
//! 2. JSON config file
//! 3. Defaults
//!
//! Configuration decides whether a stage runs, never how it computes. The
//! execution flags are handed to collaborators untouched.

use crate::core::StageClass;
use crate::errors::{ConfigurationError, CueflowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the output directory.
pub const ENV_OUTPUT_DIR: &str = "CUEFLOW_OUTPUT_DIR";
/// Environment variable overriding `flags.demo_mode`.
pub const ENV_DEMO_MODE: &str = "CUEFLOW_DEMO_MODE";
/// Environment variable overriding `flags.use_llm`.
pub const ENV_USE_LLM: &str = "CUEFLOW_USE_LLM";

/// Default number of concurrent batch workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Flags passed through to stage collaborators without interpretation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionFlags {
    /// Run collaborators in demo mode.
    #[serde(default)]
    pub demo_mode: bool,
    /// Allow collaborators to call a language model.
    #[serde(default)]
    pub use_llm: bool,
    /// Any other collaborator-specific flags.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Immutable configuration shared by every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    /// Run the simulate stage.
    #[serde(default = "default_true")]
    pub enable_simulation: bool,
    /// Run the evaluate stage.
    #[serde(default = "default_true")]
    pub enable_evaluation: bool,
    /// Record the hardware stage (always skipped).
    #[serde(default)]
    pub enable_hardware: bool,
    /// Failure class of the evaluate stage.
    #[serde(default)]
    pub evaluation_class: StageClass,
    /// Flags for collaborators.
    #[serde(default)]
    pub flags: ExecutionFlags,
    /// Where run reports are written. No reports when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfiguration {
    fn default() -> Self {
        Self {
            enable_simulation: true,
            enable_evaluation: true,
            enable_hardware: false,
            evaluation_class: StageClass::Optional,
            flags: ExecutionFlags::default(),
            output_dir: None,
        }
    }
}

impl PipelineConfiguration {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, CueflowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CueflowError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Applies `CUEFLOW_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigurationError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup(ENV_DEMO_MODE) {
            self.flags.demo_mode = parse_flag(ENV_DEMO_MODE, &value)?;
        }
        if let Some(value) = lookup(ENV_USE_LLM) {
            self.flags.use_llm = parse_flag(ENV_USE_LLM, &value)?;
        }
        Ok(self)
    }

    /// Enables or disables the simulate stage.
    #[must_use]
    pub fn with_simulation(mut self, enabled: bool) -> Self {
        self.enable_simulation = enabled;
        self
    }

    /// Enables or disables the evaluate stage.
    #[must_use]
    pub fn with_evaluation(mut self, enabled: bool) -> Self {
        self.enable_evaluation = enabled;
        self
    }

    /// Enables or disables the hardware stage record.
    #[must_use]
    pub fn with_hardware(mut self, enabled: bool) -> Self {
        self.enable_hardware = enabled;
        self
    }

    /// Sets the failure class of the evaluate stage.
    #[must_use]
    pub fn with_evaluation_class(mut self, class: StageClass) -> Self {
        self.evaluation_class = class;
        self
    }

    /// Sets the collaborator flags.
    #[must_use]
    pub fn with_flags(mut self, flags: ExecutionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the report output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Checks the configuration before any run starts.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some(dir) = &self.output_dir {
            if dir.as_os_str().is_empty() {
                return Err(
                    ConfigurationError::new("output_dir must not be empty").with_field("output_dir")
                );
            }
            if dir.exists() && !dir.is_dir() {
                return Err(ConfigurationError::new(format!(
                    "output_dir {} exists and is not a directory",
                    dir.display()
                ))
                .with_field("output_dir"));
            }
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigurationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(
            ConfigurationError::new(format!("{key}: expected a boolean, got '{other}'"))
                .with_field(key),
        ),
    }
}

/// How a batch is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    concurrent: bool,
    max_workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrent: true,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl BatchOptions {
    /// One input at a time, in order.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            concurrent: false,
            max_workers: 1,
        }
    }

    /// Up to `max_workers` inputs at a time.
    pub fn concurrent(max_workers: usize) -> Result<Self, ConfigurationError> {
        if max_workers == 0 {
            return Err(
                ConfigurationError::new("max_workers must be at least 1").with_field("max_workers")
            );
        }
        Ok(Self {
            concurrent: true,
            max_workers,
        })
    }

    /// Returns true for concurrent dispatch.
    #[must_use]
    pub const fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    /// Upper bound on simultaneous runs.
    #[must_use]
    pub const fn max_workers(&self) -> usize {
        self.max_workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfiguration::default();
        assert!(config.enable_simulation);
        assert!(config.enable_evaluation);
        assert!(!config.enable_hardware);
        assert_eq!(config.evaluation_class, StageClass::Optional);
        assert!(config.output_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = PipelineConfiguration::from_json_str(
            r#"{"enable_simulation": false, "flags": {"demo_mode": true, "style": "noir"}}"#,
        )
        .unwrap();

        assert!(!config.enable_simulation);
        assert!(config.enable_evaluation);
        assert!(config.flags.demo_mode);
        assert!(!config.flags.use_llm);
        assert_eq!(
            config.flags.extra.get("style"),
            Some(&serde_json::json!("noir"))
        );
    }

    #[test]
    fn test_from_json_evaluation_class() {
        let config =
            PipelineConfiguration::from_json_str(r#"{"evaluation_class": "required"}"#).unwrap();
        assert_eq!(config.evaluation_class, StageClass::Required);
    }

    #[test]
    fn test_from_json_invalid() {
        let err = PipelineConfiguration::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, CueflowError::Serialization(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cueflow.json");
        std::fs::write(&path, r#"{"enable_hardware": true}"#).unwrap();

        let config = PipelineConfiguration::from_file(&path).unwrap();
        assert!(config.enable_hardware);

        let missing = PipelineConfiguration::from_file(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(CueflowError::Io(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_OUTPUT_DIR, "/tmp/cueflow-out"),
            (ENV_DEMO_MODE, "yes"),
            (ENV_USE_LLM, "0"),
        ]
        .into_iter()
        .collect();

        let config = PipelineConfiguration::new()
            .with_flags(ExecutionFlags {
                use_llm: true,
                ..ExecutionFlags::default()
            })
            .with_overrides_from(|key| vars.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/cueflow-out")));
        assert!(config.flags.demo_mode);
        assert!(!config.flags.use_llm);
    }

    #[test]
    fn test_override_rejects_bad_flag() {
        let err = PipelineConfiguration::new()
            .with_overrides_from(|key| (key == ENV_USE_LLM).then(|| "maybe".to_string()))
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some(ENV_USE_LLM));
    }

    #[test]
    fn test_validate_output_dir() {
        let empty = PipelineConfiguration::new().with_output_dir("");
        assert!(empty.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.json");
        std::fs::write(&file, "{}").unwrap();
        assert!(PipelineConfiguration::new().with_output_dir(&file).validate().is_err());

        assert!(PipelineConfiguration::new()
            .with_output_dir(dir.path())
            .validate()
            .is_ok());
        assert!(PipelineConfiguration::new()
            .with_output_dir(dir.path().join("not-yet-created"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_batch_options() {
        assert!(!BatchOptions::sequential().is_concurrent());

        let options = BatchOptions::concurrent(2).unwrap();
        assert!(options.is_concurrent());
        assert_eq!(options.max_workers(), 2);

        assert_eq!(BatchOptions::default().max_workers(), DEFAULT_MAX_WORKERS);
        assert!(BatchOptions::concurrent(0).is_err());
    }
}
