//! Run event log.
//!
//! Every run appends NDJSON events (one JSON object per line) to
//! `.bakeoff/runs/{request_id}/events.ndjson`:
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`run_started`, `task_finished`, ...)
//! - `actor`: `user@HOST`
//! - `task`: optional task id
//! - `details`: action-specific object
//!
//! The log is an observer. A run never fails because an event could not be
//! written; [`EventLog::record`] downgrades write errors to a warning.

use crate::error::{BakeoffError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    RunStarted,
    Provisioned,
    TaskStarted,
    TaskFinished,
    Decision,
    Promoted,
    PublicationFailed,
    Reclaimed,
    RunFinished,
}

/// An event record for the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// When the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// Who ran the orchestrator (e.g., `user@HOST`).
    pub actor: String,

    /// Task id for task-specific events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<u32>,

    /// Freeform details object.
    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time and actor.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor_string(),
            task: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach a task id.
    pub fn with_task(mut self, task_id: u32) -> Self {
        self.task = Some(task_id);
        self
    }

    /// Set the details object.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize to a single NDJSON line (no trailing newline).
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| BakeoffError::UserError(format!("failed to serialize event: {}", e)))
    }
}

/// `user@host` of the current process.
pub(crate) fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append-only event sink for one run.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, creating the file and its directory on first use.
    ///
    /// Each append is a single `write` on an `O_APPEND` handle, so concurrent
    /// task threads never interleave within a line.
    pub fn append(&self, event: &Event) -> Result<()> {
        let mut line = event.to_ndjson_line()?;
        line.push('\n');

        if let Some(dir) = self.path.parent()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| {
                BakeoffError::UserError(format!(
                    "failed to create events directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                BakeoffError::UserError(format!(
                    "failed to open events file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        file.write_all(line.as_bytes()).map_err(|e| {
            BakeoffError::UserError(format!(
                "failed to write event to '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Append an event, logging instead of failing.
    pub fn record(&self, event: Event) {
        if let Err(e) = self.append(&event) {
            warn!(action = ?event.action, error = %e, "failed to record run event");
        }
    }

    /// Read back every event in the log.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            BakeoffError::UserError(format!(
                "failed to read events file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    BakeoffError::UserError(format!("malformed event line: {}", e))
                })
            })
            .collect()
    }
}
