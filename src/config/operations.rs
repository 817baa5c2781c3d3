//! Config loading, validation, and serialization.

use super::model::Config;
use super::types::AgentProfile;
use crate::error::{BakeoffError, Result};
use crate::workspace::is_valid_branch_component;
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            BakeoffError::ConfigError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, or the defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| BakeoffError::ConfigError(format!("failed to parse YAML: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| BakeoffError::ConfigError(format!("failed to serialize config: {}", e)))
    }

    /// Validate config values.
    ///
    /// - `fan_out`, `task_timeout_seconds`, `judge_timeout_seconds` must be positive
    /// - `branch_prefix` must be a single valid branch path component
    /// - agent commands must be non-empty
    /// - `base_ref` and `workspaces_dir` must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.fan_out == 0 {
            return Err(BakeoffError::ConfigError(
                "fan_out must be greater than 0".to_string(),
            ));
        }

        if self.task_timeout_seconds == 0 {
            return Err(BakeoffError::ConfigError(
                "task_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.judge_timeout_seconds == 0 {
            return Err(BakeoffError::ConfigError(
                "judge_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if !is_valid_branch_component(&self.branch_prefix) {
            return Err(BakeoffError::ConfigError(format!(
                "branch_prefix '{}' is not a valid branch component (use letters, digits, '-' or '_')",
                self.branch_prefix
            )));
        }

        if self.base_ref.trim().is_empty() {
            return Err(BakeoffError::ConfigError(
                "base_ref must not be empty".to_string(),
            ));
        }

        if self.workspaces_dir.trim().is_empty() {
            return Err(BakeoffError::ConfigError(
                "workspaces_dir must not be empty".to_string(),
            ));
        }

        validate_profile("implementer", &self.implementer)?;
        if let Some(judge) = &self.judge {
            validate_profile("judge", judge)?;
        }

        Ok(())
    }
}

fn validate_profile(role: &str, profile: &AgentProfile) -> Result<()> {
    if profile.command.trim().is_empty() {
        return Err(BakeoffError::ConfigError(format!(
            "{}.command must not be empty",
            role
        )));
    }
    if profile.timeout_seconds == Some(0) {
        return Err(BakeoffError::ConfigError(format!(
            "{}.timeout_seconds must be greater than 0",
            role
        )));
    }
    Ok(())
}
