//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for a bakeoff run.
///
/// This struct represents the contents of `.bakeoff/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Run shape
    // =========================================================================
    /// Number of independent attempts per run.
    #[serde(default = "default_fan_out")]
    pub fan_out: u32,

    /// Revision every attempt branches from.
    #[serde(default = "default_base_ref")]
    pub base_ref: String,

    /// First component of every attempt branch (`{prefix}/{request_id}/task-{n}`).
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    /// Where attempt workspaces are created (relative to the repo root).
    #[serde(default = "default_workspaces_dir")]
    pub workspaces_dir: String,

    /// Commit each completed attempt's edits onto its branch.
    #[serde(default = "default_true")]
    pub commit_task_changes: bool,

    // =========================================================================
    // Agents
    // =========================================================================
    /// Bounded wait for each implementation attempt.
    #[serde(default = "default_task_timeout_seconds")]
    pub task_timeout_seconds: u64,

    /// Bounded wait for the judge.
    #[serde(default = "default_judge_timeout_seconds")]
    pub judge_timeout_seconds: u64,

    /// Agent used for implementation attempts.
    pub implementer: AgentProfile,

    /// Agent used for judging; defaults to the implementer profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge: Option<AgentProfile>,

    /// Prompt template overrides.
    pub prompts: PromptOverrides,

    // =========================================================================
    // Publication
    // =========================================================================
    pub publish: PublishSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fan_out: default_fan_out(),
            base_ref: default_base_ref(),
            branch_prefix: default_branch_prefix(),
            workspaces_dir: default_workspaces_dir(),
            commit_task_changes: default_true(),
            task_timeout_seconds: default_task_timeout_seconds(),
            judge_timeout_seconds: default_judge_timeout_seconds(),
            implementer: AgentProfile::default(),
            judge: None,
            prompts: PromptOverrides::default(),
            publish: PublishSettings::default(),
        }
    }
}

impl Config {
    /// The profile the judge runs with.
    pub fn judge_profile(&self) -> &AgentProfile {
        self.judge.as_ref().unwrap_or(&self.implementer)
    }
}
