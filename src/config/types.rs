//! Configuration types and defaults for bakeoff.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How to launch a code-generation (or judge) agent.
///
/// `command` is a template; placeholders are substituted before the string
/// is split with shell quoting rules:
///
/// - `{prompt_file}` - Absolute path to the rendered prompt
/// - `{workdir}` - Directory the agent works in
/// - `{label}` - `task-<n>` or `judge`
/// - `{can_write}`, `{can_execute_shell}`, `{can_fetch_network}` - `true`/`false`
///
/// The prompt is also written to the process's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Command template.
    #[serde(default = "default_agent_command")]
    pub command: String,

    /// Environment passed to the agent process (credentials live here,
    /// never in the orchestrator's own environment lookups).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    /// Per-profile timeout override in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            environment: BTreeMap::new(),
            timeout_seconds: None,
        }
    }
}

impl AgentProfile {
    /// The timeout for this profile, falling back to `default_seconds`.
    pub fn effective_timeout(&self, default_seconds: u64) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(default_seconds))
    }
}

/// Optional replacements for the built-in prompt templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptOverrides {
    /// Template given to each implementation attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,

    /// Template given to the judge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
}

/// Draft change request publication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Whether to push the winning branch and open a draft change request.
    pub enabled: bool,

    /// Remote the winning branch is pushed to.
    pub remote: String,

    /// Custom publication command template (`{title}`, `{body}`, `{branch}`).
    /// When unset the `gh` CLI is used. Its last stdout line is the URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            remote: default_remote(),
            command: None,
        }
    }
}

pub(crate) fn default_agent_command() -> String {
    "claude -p --output-format stream-json --verbose".to_string()
}
pub(crate) fn default_fan_out() -> u32 {
    3
}
pub(crate) fn default_base_ref() -> String {
    "HEAD".to_string()
}
pub(crate) fn default_branch_prefix() -> String {
    "bakeoff".to_string()
}
pub(crate) fn default_workspaces_dir() -> String {
    ".bakeoff/workspaces".to_string()
}
pub(crate) fn default_task_timeout_seconds() -> u64 {
    1800
}
pub(crate) fn default_judge_timeout_seconds() -> u64 {
    600
}
pub(crate) fn default_remote() -> String {
    "origin".to_string()
}
pub(crate) fn default_true() -> bool {
    true
}
