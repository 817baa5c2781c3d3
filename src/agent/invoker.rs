//! The agent invocation boundary.
//!
//! An agent is anything that takes a prompt, a working directory and a set of
//! permissions and produces a lazy stream of events ending in exactly one
//! terminal event. The orchestrator only acts on the terminal event; progress
//! events are traced and dropped.

use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Capabilities granted to one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentPermissions {
    pub can_write: bool,
    pub can_execute_shell: bool,
    pub can_fetch_network: bool,
}

impl AgentPermissions {
    /// Full access inside an isolated workspace.
    pub fn implementer() -> Self {
        Self {
            can_write: true,
            can_execute_shell: true,
            can_fetch_network: true,
        }
    }

    /// The judge only reads the canonical repository.
    pub fn read_only() -> Self {
        Self {
            can_write: false,
            can_execute_shell: false,
            can_fetch_network: false,
        }
    }
}

/// One agent call.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub prompt: String,
    pub working_directory: PathBuf,
    pub permissions: AgentPermissions,
    /// Bounded wait; expiry is reported as a terminal error event.
    pub timeout: Duration,
    /// `task-<n>` or `judge`. Used for prompt file names and log fields.
    pub label: String,
    /// Run directory where invocation artifacts (rendered prompts) go.
    pub artifacts_dir: PathBuf,
}

/// An event emitted by a running agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Progress(Value),
    Success { result: String },
    Error { detail: String },
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AgentEvent::Progress(_))
    }

    /// Interpret one line of newline-delimited JSON agent output.
    ///
    /// Recognized terminal shapes:
    ///
    /// - `{"type": "success", "result": ...}`
    /// - `{"type": "error", "detail": ...}` (or `message`)
    /// - `{"type": "result", "subtype": "success", "result": ...}`, the
    ///   stream-json summary line; any other subtype, or `is_error: true`,
    ///   is an error
    ///
    /// Other typed objects are progress. Lines without a `type` (plain text,
    /// or JSON the agent printed as output) are progress text and end up in
    /// the transcript.
    pub fn from_line(line: &str) -> AgentEvent {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => return AgentEvent::Progress(Value::String(line.to_string())),
        };

        let text = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);

        match value.get("type").and_then(Value::as_str) {
            Some("success") => AgentEvent::Success {
                result: text("result").unwrap_or_default(),
            },
            Some("error") => AgentEvent::Error {
                detail: text("detail")
                    .or_else(|| text("message"))
                    .unwrap_or_else(|| "agent reported an error".to_string()),
            },
            Some("result") => {
                let is_error = value
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let subtype = value.get("subtype").and_then(Value::as_str);
                if subtype == Some("success") && !is_error {
                    AgentEvent::Success {
                        result: text("result").unwrap_or_default(),
                    }
                } else {
                    AgentEvent::Error {
                        detail: text("result")
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| {
                                format!("agent finished with '{}'", subtype.unwrap_or("unknown"))
                            }),
                    }
                }
            }
            Some(_) => AgentEvent::Progress(value),
            None => AgentEvent::Progress(Value::String(line.to_string())),
        }
    }
}

/// Lazy event sequence returned by an invocation.
pub type AgentEventStream = Box<dyn Iterator<Item = AgentEvent> + Send>;

/// Something that can run an agent.
///
/// `invoke` returning `Err` means the agent could not be started at all; an
/// agent that starts and then fails reports it as a terminal error event.
pub trait AgentInvoker: Send + Sync {
    fn invoke(&self, request: &AgentRequest) -> Result<AgentEventStream>;
}

/// The terminal result of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Success(String),
    Failure(String),
}

/// Drain `events` until the first terminal event.
///
/// A stream that ends without one is a failure.
pub fn await_terminal(events: AgentEventStream, label: &str) -> AgentOutcome {
    for event in events {
        match event {
            AgentEvent::Progress(value) => debug!(agent = label, event = %value, "agent progress"),
            AgentEvent::Success { result } => return AgentOutcome::Success(result),
            AgentEvent::Error { detail } => return AgentOutcome::Failure(detail),
        }
    }
    AgentOutcome::Failure("agent stream ended without a terminal event".to_string())
}
