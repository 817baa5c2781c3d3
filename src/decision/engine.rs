//! Judge invocation and verdict validation.

use crate::agent::{AgentInvoker, AgentOutcome, AgentPermissions, AgentRequest, await_terminal};
use crate::decision::verdict::{ExtractionStrategy, parse_verdict};
use crate::error::{BakeoffError, Result};
use crate::prompt::{Candidate, review_prompt};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// The judge's validated choice. Produced once per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub winning_task_id: u32,
    pub reasoning: String,
    pub quality_score: f64,
    pub completeness_score: f64,
    pub extraction_strategy: ExtractionStrategy,
}

impl Decision {
    /// Parse a judge response and check the winner is one of `completed`.
    ///
    /// Any failure is a `DecisionError` carrying `response` verbatim. The
    /// winner is never guessed or coerced.
    pub fn from_response(response: &str, completed: &[u32]) -> Result<Self> {
        let verdict =
            parse_verdict(response).map_err(|e| BakeoffError::decision(e.to_string(), response))?;

        if !completed.contains(&verdict.winning_task_id) {
            return Err(BakeoffError::decision(
                format!(
                    "judge named task {} which is not a completed attempt (completed: {})",
                    verdict.winning_task_id,
                    format_ids(completed)
                ),
                response,
            ));
        }

        Ok(Self {
            winning_task_id: verdict.winning_task_id,
            reasoning: verdict.reasoning,
            quality_score: verdict.quality_score,
            completeness_score: verdict.completeness_score,
            extraction_strategy: verdict.strategy,
        })
    }
}

fn format_ids(ids: &[u32]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Runs the judge once over the completed attempts.
pub struct DecisionEngine<'a> {
    judge: &'a dyn AgentInvoker,
    /// The canonical repository; the judge reads but never writes it.
    repo_root: PathBuf,
    artifacts_dir: PathBuf,
    timeout: Duration,
    review_template: Option<String>,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(
        judge: &'a dyn AgentInvoker,
        repo_root: PathBuf,
        artifacts_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            judge,
            repo_root,
            artifacts_dir,
            timeout,
            review_template: None,
        }
    }

    pub fn with_review_template(mut self, template: Option<String>) -> Self {
        self.review_template = template;
        self
    }

    /// Ask the judge to pick among `candidates`.
    pub fn decide(&self, feature_request: &str, candidates: &[Candidate]) -> Result<Decision> {
        if candidates.is_empty() {
            return Err(BakeoffError::decision(
                "no completed attempts to review",
                "",
            ));
        }

        let prompt = review_prompt(self.review_template.as_deref(), feature_request, candidates)?;
        let request = AgentRequest {
            prompt,
            working_directory: self.repo_root.clone(),
            permissions: AgentPermissions::read_only(),
            timeout: self.timeout,
            label: "judge".to_string(),
            artifacts_dir: self.artifacts_dir.clone(),
        };

        let ids: Vec<u32> = candidates.iter().map(|c| c.task_id).collect();
        info!(candidates = %format_ids(&ids), "invoking judge");

        let events = self.judge.invoke(&request).map_err(|e| {
            BakeoffError::decision(format!("judge could not be started: {}", e), "")
        })?;

        let response = match await_terminal(events, &request.label) {
            AgentOutcome::Success(text) => text,
            AgentOutcome::Failure(detail) => {
                return Err(BakeoffError::decision(
                    format!("judge failed: {}", detail),
                    "",
                ));
            }
        };
        debug!(response_len = response.len(), "judge responded");

        let decision = Decision::from_response(&response, &ids)?;
        info!(
            winner = decision.winning_task_id,
            quality = decision.quality_score,
            completeness = decision.completeness_score,
            strategy = %decision.extraction_strategy,
            "judge verdict accepted"
        );
        Ok(decision)
    }
}
