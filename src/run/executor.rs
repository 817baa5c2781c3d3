//! Drives one attempt to a terminal status.

use crate::agent::{AgentInvoker, AgentOutcome, AgentPermissions, AgentRequest, await_terminal};
use crate::context::STATE_DIR;
use crate::fs::atomic_write_file;
use crate::prompt::implementation_prompt;
use crate::run::model::{Task, TaskStatus};
use crate::workspace::commit_all_changes;
use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// File written into each workspace once its task is terminal.
pub const RESULT_FILE: &str = "result.json";

/// Runs an implementation attempt inside its workspace.
///
/// Never returns an error: every failure becomes the task's failure reason.
pub struct TaskExecutor<'a> {
    pub agent: &'a dyn AgentInvoker,
    pub feature_request: &'a str,
    pub fan_out: u32,
    pub timeout: Duration,
    /// Run directory for rendered prompts.
    pub artifacts_dir: &'a Path,
    pub implementation_template: Option<&'a str>,
    /// Commit the attempt's edits onto its branch when it completes.
    pub commit_changes: bool,
}

impl TaskExecutor<'_> {
    pub fn execute(&self, task: &mut Task) {
        let started = Instant::now();
        let outcome = self.attempt(task);

        // Transitions only fail when the task was already terminal; keep the
        // first terminal state in that case.
        let transition = match outcome {
            Ok(output) => task.complete(output),
            Err(reason) => task.fail(reason),
        };
        if let Err(e) = transition {
            warn!(task = task.id, error = %e, "ignored late task transition");
        }

        match task.status() {
            TaskStatus::Completed => info!(task = task.id, "task completed"),
            _ => warn!(
                task = task.id,
                reason = task.failure_reason().unwrap_or_default(),
                "task failed"
            ),
        }

        write_result_artifact(task, started.elapsed());
    }

    /// Settle a task whose attempt panicked: it fails and still gets its
    /// result artifact.
    pub fn fail_panicked(&self, task: &mut Task, elapsed: Duration) {
        if let Err(e) = task.fail("attempt panicked") {
            warn!(task = task.id, error = %e, "ignored late task transition");
        }
        warn!(task = task.id, "attempt panicked");
        write_result_artifact(task, elapsed);
    }

    fn attempt(&self, task: &mut Task) -> Result<String, String> {
        let prompt = implementation_prompt(
            self.implementation_template,
            self.feature_request,
            task.id,
            self.fan_out,
            &task.branch,
        )
        .map_err(|e| e.to_string())?;

        task.start().map_err(|e| e.to_string())?;
        let label = format!("task-{}", task.id);
        debug!(task = task.id, workspace = %task.workspace.display(), "starting agent");

        let request = AgentRequest {
            prompt,
            working_directory: task.workspace.clone(),
            permissions: AgentPermissions::implementer(),
            timeout: self.timeout,
            label: label.clone(),
            artifacts_dir: self.artifacts_dir.to_path_buf(),
        };

        let events = self.agent.invoke(&request).map_err(|e| e.to_string())?;
        let output = match await_terminal(events, &label) {
            AgentOutcome::Success(output) => output,
            AgentOutcome::Failure(detail) => return Err(detail),
        };

        if self.commit_changes {
            let message = format!("bakeoff: {}\n\n{}", label, first_line(self.feature_request));
            match commit_all_changes(&task.workspace, &message) {
                Ok(true) => debug!(task = task.id, "committed attempt changes"),
                Ok(false) => debug!(task = task.id, "attempt left no changes to commit"),
                Err(e) => return Err(format!("failed to commit attempt changes: {}", e)),
            }
        }

        Ok(output)
    }
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

/// Path of a task's result artifact.
pub fn result_artifact_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join(RESULT_FILE)
}

/// Best-effort: a missing artifact never changes the task's status.
fn write_result_artifact(task: &Task, duration: Duration) {
    let path = result_artifact_path(&task.workspace);
    let artifact = json!({
        "task_id": task.id,
        "branch": task.branch,
        "status": task.status(),
        "output": task.output(),
        "failure_reason": task.failure_reason(),
        "duration_ms": duration.as_millis() as u64,
        "finished_at": Utc::now(),
    });

    let written = serde_json::to_string_pretty(&artifact)
        .map_err(|e| e.to_string())
        .and_then(|content| atomic_write_file(&path, &content).map_err(|e| e.to_string()));
    if let Err(e) = written {
        warn!(task = task.id, path = %path.display(), error = %e, "failed to write result artifact");
    }
}
