//! Run and task state.
//!
//! Transitions are guarded: a task only moves forward
//! (`Pending -> Running -> Completed | Failed`) and a terminal task never
//! changes again.

use crate::decision::Decision;
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task {task_id} cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub task_id: u32,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// One attempt, bound to its own workspace and branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: u32,
    pub branch: String,
    pub workspace: PathBuf,
    status: TaskStatus,
    /// Present iff `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    /// Present iff `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
}

impl Task {
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            id: workspace.task_id,
            branch: workspace.branch.clone(),
            workspace: workspace.path.clone(),
            status: TaskStatus::Pending,
            output: None,
            failure_reason: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Running, &[TaskStatus::Pending])
    }

    pub fn complete(&mut self, output: String) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Completed, &[TaskStatus::Running])?;
        self.output = Some(output);
        Ok(())
    }

    /// A task can fail before it starts (e.g. its prompt could not be rendered).
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Failed, &[TaskStatus::Pending, TaskStatus::Running])?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus, from: &[TaskStatus]) -> Result<(), InvalidTransition> {
        if !from.contains(&self.status) {
            return Err(InvalidTransition {
                task_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Coordinator state machine phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Initialized,
    Provisioning,
    Executing,
    Deciding,
    Promoting,
    Reclaiming,
    Terminal,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Initialized => "initialized",
            RunPhase::Provisioning => "provisioning",
            RunPhase::Executing => "executing",
            RunPhase::Deciding => "deciding",
            RunPhase::Promoting => "promoting",
            RunPhase::Reclaiming => "reclaiming",
            RunPhase::Terminal => "terminal",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunStateError {
    #[error("a decision was already recorded for this run")]
    DecisionAlreadySet,

    #[error("run cannot succeed without a decision")]
    NoDecision,

    #[error("winner {0} is not a completed task of this run")]
    WinnerNotCompleted(u32),

    #[error("run is already terminal")]
    AlreadyTerminal,
}

/// One orchestration from a feature request to a promoted winner or failure.
#[derive(Debug, Clone)]
pub struct Run {
    pub request_id: String,
    pub feature_request: String,
    pub created_at: DateTime<Utc>,
    pub fan_out: u32,
    pub tasks: Vec<Task>,
    decision: Option<Decision>,
    winner_task_id: Option<u32>,
    terminal_state: TerminalState,
}

impl Run {
    pub fn new(request_id: &str, feature_request: &str, fan_out: u32) -> Self {
        Self {
            request_id: request_id.to_string(),
            feature_request: feature_request.to_string(),
            created_at: Utc::now(),
            fan_out,
            tasks: Vec::new(),
            decision: None,
            winner_task_id: None,
            terminal_state: TerminalState::Running,
        }
    }

    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    pub fn winner_task_id(&self) -> Option<u32> {
        self.winner_task_id
    }

    pub fn terminal_state(&self) -> TerminalState {
        self.terminal_state
    }

    pub fn completed_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Completed)
    }

    /// Record the decision. It is immutable once set.
    pub fn record_decision(&mut self, decision: Decision) -> Result<(), RunStateError> {
        if self.decision.is_some() {
            return Err(RunStateError::DecisionAlreadySet);
        }
        self.decision = Some(decision);
        Ok(())
    }

    /// Mark the run succeeded with the decided winner.
    pub fn succeed(&mut self) -> Result<u32, RunStateError> {
        if self.terminal_state != TerminalState::Running {
            return Err(RunStateError::AlreadyTerminal);
        }
        let winner = self
            .decision
            .as_ref()
            .map(|d| d.winning_task_id)
            .ok_or(RunStateError::NoDecision)?;
        if !self.completed_tasks().any(|t| t.id == winner) {
            return Err(RunStateError::WinnerNotCompleted(winner));
        }
        self.winner_task_id = Some(winner);
        self.terminal_state = TerminalState::Succeeded;
        Ok(winner)
    }

    pub fn fail(&mut self) {
        if self.terminal_state == TerminalState::Running {
            self.terminal_state = TerminalState::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ExtractionStrategy;

    fn task(id: u32) -> Task {
        Task::new(&Workspace {
            task_id: id,
            branch: format!("bakeoff/r1/task-{}", id),
            path: PathBuf::from(format!("/ws/r1/task-{}", id)),
        })
    }

    fn decision(winner: u32) -> Decision {
        Decision {
            winning_task_id: winner,
            reasoning: String::new(),
            quality_score: 1.0,
            completeness_score: 1.0,
            extraction_strategy: ExtractionStrategy::Direct,
        }
    }

    #[test]
    fn test_task_happy_path() {
        let mut t = task(1);
        assert_eq!(t.status(), TaskStatus::Pending);
        t.start().unwrap();
        assert!(!t.status().is_terminal());
        t.complete("done".to_string()).unwrap();
        assert_eq!(t.status(), TaskStatus::Completed);
        assert!(t.status().is_terminal());
        assert_eq!(t.output(), Some("done"));
        assert_eq!(t.failure_reason(), None);
    }

    #[test]
    fn test_terminal_task_is_immutable() {
        let mut t = task(1);
        t.start().unwrap();
        t.fail("boom").unwrap();

        assert!(t.complete("late".to_string()).is_err());
        assert!(t.fail("again").is_err());
        assert!(t.start().is_err());
        assert_eq!(t.failure_reason(), Some("boom"));
        assert_eq!(t.output(), None);
    }

    #[test]
    fn test_cannot_complete_without_running() {
        let mut t = task(2);
        let err = t.complete("x".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "task 2 cannot move from pending to completed");
        t.fail("prompt error").unwrap();
        assert_eq!(t.status(), TaskStatus::Failed);
    }

    #[test]
    fn test_run_succeeds_only_with_completed_winner() {
        let mut run = Run::new("r1", "x", 2);
        run.tasks = vec![task(1), task(2)];
        run.tasks[0].start().unwrap();
        run.tasks[0].fail("no").unwrap();
        run.tasks[1].start().unwrap();
        run.tasks[1].complete("ok".to_string()).unwrap();

        assert_eq!(run.succeed(), Err(RunStateError::NoDecision));

        run.record_decision(decision(1)).unwrap();
        assert_eq!(run.succeed(), Err(RunStateError::WinnerNotCompleted(1)));
        assert_eq!(
            run.record_decision(decision(2)),
            Err(RunStateError::DecisionAlreadySet)
        );
        assert_eq!(run.terminal_state(), TerminalState::Running);
    }

    #[test]
    fn test_run_success() {
        let mut run = Run::new("r1", "x", 1);
        run.tasks = vec![task(1)];
        run.tasks[0].start().unwrap();
        run.tasks[0].complete("ok".to_string()).unwrap();
        run.record_decision(decision(1)).unwrap();

        assert_eq!(run.succeed(), Ok(1));
        assert_eq!(run.terminal_state(), TerminalState::Succeeded);
        assert_eq!(run.winner_task_id(), Some(1));

        run.fail();
        assert_eq!(run.terminal_state(), TerminalState::Succeeded);
    }
}
