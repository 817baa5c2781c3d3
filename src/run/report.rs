//! The run summary handed back to the caller.

use crate::decision::Decision;
use crate::error::{BakeoffError, Result};
use crate::exit_codes;
use crate::promote::Publication;
use crate::run::model::{RunPhase, Task, TaskStatus, TerminalState};
use crate::workspace::ReclaimOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub id: u32,
    pub branch: String,
    pub workspace: PathBuf,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            branch: task.branch.clone(),
            workspace: task.workspace.clone(),
            status: task.status(),
            output: task.output().map(String::from),
            failure_reason: task.failure_reason().map(String::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded {
        winner_task_id: u32,
        winning_branch: String,
        publication: Publication,
    },
    Failed {
        phase: RunPhase,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_response: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub request_id: String,
    pub feature_request: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub terminal_state: TerminalState,
    pub tasks: Vec<TaskSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    pub outcome: RunOutcome,
    pub reclamation: Vec<ReclaimOutcome>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded { .. })
    }

    /// Process exit code for this report.
    ///
    /// Provisioning and promotion failures are repository failures; anything
    /// else that fails a run is a run failure.
    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            RunOutcome::Succeeded { .. } => exit_codes::SUCCESS,
            RunOutcome::Failed { phase, .. } => match phase {
                RunPhase::Provisioning | RunPhase::Promoting => exit_codes::GIT_FAILURE,
                _ => exit_codes::RUN_FAILURE,
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BakeoffError::UserError(format!("failed to serialize run report: {}", e)))
    }

    /// Human-readable summary for the terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {}", self.request_id);
        let _ = writeln!(out);

        for task in &self.tasks {
            let detail = match task.status {
                TaskStatus::Failed => format!(" ({})", task.failure_reason.as_deref().unwrap_or("")),
                _ => String::new(),
            };
            let _ = writeln!(out, "  task {}  {:<9}  {}{}", task.id, task.status, task.branch, detail);
        }
        let _ = writeln!(out);

        if let Some(decision) = &self.decision {
            let _ = writeln!(
                out,
                "Judge picked task {} (quality {}, completeness {}, via {})",
                decision.winning_task_id,
                decision.quality_score,
                decision.completeness_score,
                decision.extraction_strategy
            );
            if !decision.reasoning.is_empty() {
                let _ = writeln!(out, "  {}", decision.reasoning);
            }
        }

        match &self.outcome {
            RunOutcome::Succeeded {
                winning_branch,
                publication,
                ..
            } => {
                let _ = writeln!(out, "Succeeded: {} is checked out", winning_branch);
                match publication {
                    Publication::Opened { url } => {
                        let _ = writeln!(out, "Draft change request: {}", url);
                    }
                    Publication::Failed { reason } => {
                        let _ = writeln!(out, "Warning: publication failed: {}", reason);
                        let _ = writeln!(out, "  The branch exists locally and can be published manually.");
                    }
                    Publication::Skipped => {}
                }
            }
            RunOutcome::Failed {
                phase,
                reason,
                raw_response,
            } => {
                let _ = writeln!(out, "Failed during {}: {}", phase, reason);
                if let Some(raw) = raw_response {
                    let _ = writeln!(out, "\nJudge response:\n{}", raw);
                }
            }
        }

        let unclean: Vec<_> = self.reclamation.iter().filter(|r| !r.is_clean()).collect();
        let _ = writeln!(
            out,
            "Reclaimed {} of {} workspaces",
            self.reclamation.len() - unclean.len(),
            self.reclamation.len()
        );
        for outcome in unclean {
            let _ = writeln!(
                out,
                "  task {}: {}",
                outcome.task_id,
                outcome.errors.join("; ")
            );
        }

        out
    }
}
