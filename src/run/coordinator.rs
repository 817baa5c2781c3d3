//! The run state machine.
//!
//! `Initialized -> Provisioning -> Executing -> Deciding -> Promoting ->
//! Reclaiming -> Terminal`. Any phase may abort to Reclaiming, which runs on
//! every path before the run is reported.

use crate::agent::AgentInvoker;
use crate::config::Config;
use crate::context::RepoContext;
use crate::decision::DecisionEngine;
use crate::error::{BakeoffError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::lock::RunLock;
use crate::promote::{ChangeRequestPublisher, Promotion, Publication, change_request, promote};
use crate::prompt::Candidate;
use crate::run::executor::TaskExecutor;
use crate::run::model::{Run, RunPhase, Task};
use crate::run::report::{RunOutcome, RunReport, TaskSummary};
use crate::workspace::{Workspace, WorkspacePlan, provision_workspaces, reclaim_workspaces};
use chrono::Utc;
use serde_json::json;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info};

/// The external parties a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub implementer: &'a dyn AgentInvoker,
    pub judge: &'a dyn AgentInvoker,
    /// `None` skips publication.
    pub publisher: Option<&'a dyn ChangeRequestPublisher>,
}

/// Why a run ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub phase: RunPhase,
    pub reason: String,
    /// Verbatim judge response for decision failures.
    pub raw_response: Option<String>,
}

impl RunFailure {
    fn new(phase: RunPhase, reason: impl Into<String>) -> Self {
        Self {
            phase,
            reason: reason.into(),
            raw_response: None,
        }
    }

    fn from_error(phase: RunPhase, err: BakeoffError) -> Self {
        match err {
            BakeoffError::DecisionError {
                reason,
                raw_response,
            } => Self {
                phase,
                reason,
                raw_response: (!raw_response.is_empty()).then_some(raw_response),
            },
            other => Self::new(phase, other.to_string()),
        }
    }
}

/// Run one feature request end to end.
///
/// Holds the request id's run lock for the whole run; a concurrent run with
/// the same id fails with `LockError` before touching the repository. Every
/// other failure is reported through the returned [`RunReport`].
pub fn execute_run(
    ctx: &RepoContext,
    config: &Config,
    request_id: &str,
    feature_request: &str,
    agents: Collaborators<'_>,
) -> Result<RunReport> {
    let _lock = RunLock::acquire(&ctx.run_lock_path(request_id), request_id)?;
    let coordinator = Coordinator::new(ctx, config, request_id, feature_request, agents);
    Ok(coordinator.run())
}

pub struct Coordinator<'a> {
    ctx: &'a RepoContext,
    config: &'a Config,
    agents: Collaborators<'a>,
    events: EventLog,
    phase: RunPhase,
    run: Run,
    workspaces: Vec<Workspace>,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        ctx: &'a RepoContext,
        config: &'a Config,
        request_id: &str,
        feature_request: &str,
        agents: Collaborators<'a>,
    ) -> Self {
        Self {
            ctx,
            config,
            agents,
            events: EventLog::new(ctx.events_file(request_id)),
            phase: RunPhase::Initialized,
            run: Run::new(request_id, feature_request, config.fan_out),
            workspaces: Vec::new(),
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!(from = %self.phase, to = %phase, "run phase");
        self.phase = phase;
    }

    /// Drive the state machine to `Terminal` and report.
    pub fn run(mut self) -> RunReport {
        info!(
            request_id = %self.run.request_id,
            fan_out = self.run.fan_out,
            "run started"
        );
        self.events.record(Event::new(EventAction::RunStarted).with_details(json!({
            "request_id": self.run.request_id,
            "fan_out": self.run.fan_out,
            "feature_request": self.run.feature_request,
        })));

        let result = self.drive();
        if let Err(failure) = &result {
            error!(phase = %failure.phase, reason = %failure.reason, "run failed");
        }

        // Reclaiming runs on every path. The decided winner is kept even if
        // its promotion failed, so the chosen branch survives.
        self.enter(RunPhase::Reclaiming);
        let keep = self.run.decision().map(|d| d.winning_task_id);
        let reclamation = reclaim_workspaces(&self.ctx.repo_root, &self.workspaces, keep);
        for outcome in &reclamation {
            self.events.record(
                Event::new(EventAction::Reclaimed)
                    .with_task(outcome.task_id)
                    .with_details(json!(outcome)),
            );
        }

        let outcome = match result {
            Ok(promotion) => match self.run.succeed() {
                Ok(winner) => RunOutcome::Succeeded {
                    winner_task_id: winner,
                    winning_branch: promotion.branch,
                    publication: promotion.publication,
                },
                Err(e) => {
                    self.run.fail();
                    RunOutcome::Failed {
                        phase: RunPhase::Promoting,
                        reason: e.to_string(),
                        raw_response: None,
                    }
                }
            },
            Err(failure) => {
                self.run.fail();
                RunOutcome::Failed {
                    phase: failure.phase,
                    reason: failure.reason,
                    raw_response: failure.raw_response,
                }
            }
        };
        self.enter(RunPhase::Terminal);

        let report = RunReport {
            request_id: self.run.request_id.clone(),
            feature_request: self.run.feature_request.clone(),
            created_at: self.run.created_at,
            finished_at: Utc::now(),
            terminal_state: self.run.terminal_state(),
            tasks: self.run.tasks.iter().map(TaskSummary::from).collect(),
            decision: self.run.decision().cloned(),
            outcome,
            reclamation,
        };

        self.events.record(Event::new(EventAction::RunFinished).with_details(json!({
            "terminal_state": report.terminal_state,
            "outcome": report.outcome,
        })));
        info!(
            request_id = %report.request_id,
            terminal_state = ?report.terminal_state,
            "run finished"
        );
        report
    }

    fn drive(&mut self) -> std::result::Result<Promotion, RunFailure> {
        self.provision()?;
        self.execute_tasks()?;
        self.decide()?;
        self.promote()
    }

    fn provision(&mut self) -> std::result::Result<(), RunFailure> {
        self.enter(RunPhase::Provisioning);
        let plan = WorkspacePlan {
            repo_root: self.ctx.repo_root.clone(),
            workspaces_dir: self.ctx.workspaces_dir(&self.config.workspaces_dir),
            branch_prefix: self.config.branch_prefix.clone(),
            request_id: self.run.request_id.clone(),
            base_ref: self.config.base_ref.clone(),
            fan_out: self.run.fan_out,
        };

        let result = provision_workspaces(&plan, &mut self.workspaces);
        // Tasks exist for whatever was created, so reclamation sees them.
        self.run.tasks = self.workspaces.iter().map(Task::new).collect();
        result.map_err(|e| RunFailure::from_error(RunPhase::Provisioning, e))?;

        self.events.record(Event::new(EventAction::Provisioned).with_details(json!({
            "base_ref": plan.base_ref,
            "workspaces": self.workspaces,
        })));
        Ok(())
    }

    fn execute_tasks(&mut self) -> std::result::Result<(), RunFailure> {
        self.enter(RunPhase::Executing);
        let run_dir = self.ctx.run_dir(&self.run.request_id);
        let implementer = self.config.implementer.clone();
        let executor = TaskExecutor {
            agent: self.agents.implementer,
            feature_request: &self.run.feature_request,
            fan_out: self.run.fan_out,
            timeout: implementer.effective_timeout(self.config.task_timeout_seconds),
            artifacts_dir: &run_dir,
            implementation_template: self.config.prompts.implementation.as_deref(),
            commit_changes: self.config.commit_task_changes,
        };
        let events = &self.events;
        let pending = self.run.tasks.clone();
        let started = Instant::now();

        // Full barrier: every attempt reaches a terminal status before the
        // judge sees anything. A panicking attempt becomes a failed task.
        let finished: Vec<Task> = thread::scope(|scope| {
            let handles: Vec<_> = pending
                .iter()
                .cloned()
                .map(|mut task| {
                    let executor = &executor;
                    scope.spawn(move || {
                        events.record(Event::new(EventAction::TaskStarted).with_task(task.id));
                        executor.execute(&mut task);
                        events.record(task_finished(&task));
                        task
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(pending.iter())
                .map(|(handle, original)| {
                    handle.join().unwrap_or_else(|_| {
                        let mut task = original.clone();
                        executor.fail_panicked(&mut task, started.elapsed());
                        events.record(task_finished(&task));
                        task
                    })
                })
                .collect()
        });

        self.run.tasks = finished;

        if self.run.completed_tasks().next().is_none() {
            let reasons = self
                .run
                .tasks
                .iter()
                .map(|t| {
                    format!(
                        "task {}: {}",
                        t.id,
                        t.failure_reason().unwrap_or("unknown failure")
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RunFailure::new(
                RunPhase::Executing,
                format!("all {} attempts failed ({})", self.run.tasks.len(), reasons),
            ));
        }
        Ok(())
    }

    fn decide(&mut self) -> std::result::Result<(), RunFailure> {
        self.enter(RunPhase::Deciding);
        let candidates: Vec<Candidate> = self
            .run
            .completed_tasks()
            .map(|t| Candidate {
                task_id: t.id,
                branch: t.branch.clone(),
                output: t.output().unwrap_or_default().to_string(),
            })
            .collect();

        let judge_timeout = self
            .config
            .judge_profile()
            .effective_timeout(self.config.judge_timeout_seconds);
        let engine = DecisionEngine::new(
            self.agents.judge,
            self.ctx.repo_root.clone(),
            self.ctx.run_dir(&self.run.request_id),
            judge_timeout,
        )
        .with_review_template(self.config.prompts.review.clone());

        let decision = engine
            .decide(&self.run.feature_request, &candidates)
            .map_err(|e| RunFailure::from_error(RunPhase::Deciding, e))?;

        self.events.record(
            Event::new(EventAction::Decision)
                .with_task(decision.winning_task_id)
                .with_details(json!(decision)),
        );
        self.run
            .record_decision(decision)
            .map_err(|e| RunFailure::new(RunPhase::Deciding, e.to_string()))
    }

    fn promote(&mut self) -> std::result::Result<Promotion, RunFailure> {
        self.enter(RunPhase::Promoting);
        let decision = self
            .run
            .decision()
            .cloned()
            .ok_or_else(|| RunFailure::new(RunPhase::Promoting, "no decision recorded"))?;

        let winner = self
            .workspaces
            .iter()
            .find(|w| w.task_id == decision.winning_task_id)
            .cloned()
            .ok_or_else(|| {
                RunFailure::new(
                    RunPhase::Promoting,
                    format!("no workspace for task {}", decision.winning_task_id),
                )
            })?;

        let request = change_request(
            &self.run.feature_request,
            &self.run.request_id,
            &winner.branch,
            &decision,
        );
        let promotion = promote(&self.ctx.repo_root, &winner, &request, self.agents.publisher)
            .map_err(|e| RunFailure::from_error(RunPhase::Promoting, e))?;

        let action = match promotion.publication {
            Publication::Failed { .. } => EventAction::PublicationFailed,
            _ => EventAction::Promoted,
        };
        self.events.record(
            Event::new(action)
                .with_task(winner.task_id)
                .with_details(json!(promotion)),
        );
        Ok(promotion)
    }
}

fn task_finished(task: &Task) -> Event {
    Event::new(EventAction::TaskFinished)
        .with_task(task.id)
        .with_details(json!({
            "status": task.status(),
            "failure_reason": task.failure_reason(),
        }))
}
