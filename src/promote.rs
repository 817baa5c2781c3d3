//! Promotion of the winning attempt and draft change request publication.
//!
//! Promotion checks the winning branch out in the canonical repository. The
//! winner's workspace is released first because git will not check out a
//! branch that another worktree has checked out. Publication is optional and
//! its failure never fails the run; the branch is the durable result.

use crate::agent::template::render_with;
use crate::config::PublishSettings;
use crate::decision::Decision;
use crate::error::{BakeoffError, Result};
use crate::git::run_git;
use crate::workspace::{Workspace, checkout_branch, remove_workspace};
use serde::Serialize;
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

const TITLE_MAX_CHARS: usize = 72;

/// What to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    pub title: String,
    pub body: String,
    /// Source branch of the change request.
    pub branch: String,
}

/// Opens draft change requests (pull requests, merge requests, ...).
pub trait ChangeRequestPublisher: Send + Sync {
    /// Open a draft and return its URL.
    fn open_draft(&self, repo_root: &Path, request: &ChangeRequest) -> Result<String>;
}

/// Result of the publication step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Publication {
    Opened { url: String },
    Failed { reason: String },
    Skipped,
}

/// A completed promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Promotion {
    pub winner_task_id: u32,
    pub branch: String,
    pub publication: Publication,
}

/// Check out the winner's branch in `repo_root`, then publish it.
///
/// Failing to check out the branch is a `PromotionError`; publication
/// problems are reported in [`Promotion::publication`] instead.
pub fn promote(
    repo_root: &Path,
    winner: &Workspace,
    request: &ChangeRequest,
    publisher: Option<&dyn ChangeRequestPublisher>,
) -> Result<Promotion> {
    remove_workspace(repo_root, &winner.path).map_err(|e| {
        BakeoffError::PromotionError(format!(
            "failed to release workspace of task {}: {}",
            winner.task_id, e
        ))
    })?;

    checkout_branch(repo_root, &winner.branch).map_err(|e| {
        BakeoffError::PromotionError(format!(
            "winning branch '{}' could not be checked out: {}",
            winner.branch, e
        ))
    })?;
    info!(task = winner.task_id, branch = %winner.branch, "winning branch checked out");

    let publication = match publisher {
        None => Publication::Skipped,
        Some(publisher) => match publisher.open_draft(repo_root, request) {
            Ok(url) => {
                info!(url = %url, "opened draft change request");
                Publication::Opened { url }
            }
            Err(e) => {
                warn!(branch = %winner.branch, error = %e, "publication failed; branch is still promoted");
                Publication::Failed {
                    reason: e.to_string(),
                }
            }
        },
    };

    Ok(Promotion {
        winner_task_id: winner.task_id,
        branch: winner.branch.clone(),
        publication,
    })
}

/// Build the change request for a decided run.
pub fn change_request(
    feature_request: &str,
    request_id: &str,
    branch: &str,
    decision: &Decision,
) -> ChangeRequest {
    let first_line = feature_request
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("feature request");
    let title = if first_line.chars().count() > TITLE_MAX_CHARS {
        let cut: String = first_line.chars().take(TITLE_MAX_CHARS - 3).collect();
        format!("{}...", cut.trim_end())
    } else {
        first_line.to_string()
    };

    let reasoning = if decision.reasoning.is_empty() {
        "_The judge gave no reasoning._"
    } else {
        decision.reasoning.as_str()
    };

    let body = format!(
        "## Feature request\n\n{}\n\n\
         ## Selection\n\n\
         Task {} was selected from run `{}`.\n\n\
         | Quality | Completeness |\n\
         |---|---|\n\
         | {} | {} |\n\n\
         ### Judge reasoning\n\n{}\n",
        feature_request.trim(),
        decision.winning_task_id,
        request_id,
        decision.quality_score,
        decision.completeness_score,
        reasoning
    );

    ChangeRequest {
        title,
        body,
        branch: branch.to_string(),
    }
}

/// Pushes the branch and opens a draft with the `gh` CLI, or with a custom
/// command template (`{title}`, `{body}`, `{branch}`, `{remote}`).
#[derive(Debug, Clone)]
pub struct GhCliPublisher {
    remote: String,
    command: Option<String>,
}

impl GhCliPublisher {
    pub fn new(settings: &PublishSettings) -> Self {
        Self {
            remote: settings.remote.clone(),
            command: settings.command.clone(),
        }
    }

    fn push(&self, repo_root: &Path, branch: &str) -> Result<()> {
        let remotes = run_git(repo_root, &["remote"])?;
        if !remotes.lines().contains(&self.remote.as_str()) {
            return Err(BakeoffError::GitError(format!(
                "remote '{}' does not exist.\n\n\
                 To fix this, either:\n\
                 1. Set publish.remote in .bakeoff/config.yaml\n\
                 2. Add the remote: git remote add {} <url>",
                self.remote, self.remote
            )));
        }

        run_git(repo_root, &["push", "-u", &self.remote, branch]).map_err(|e| {
            BakeoffError::GitError(format!(
                "failed to push '{}' to '{}': {}",
                branch, self.remote, e
            ))
        })?;
        Ok(())
    }

    fn argv(&self, request: &ChangeRequest) -> Result<Vec<String>> {
        let Some(template) = &self.command else {
            return Ok([
                "gh",
                "pr",
                "create",
                "--draft",
                "--title",
                request.title.as_str(),
                "--body",
                request.body.as_str(),
                "--head",
                request.branch.as_str(),
            ]
            .iter()
            .map(|s| s.to_string())
            .collect());
        };

        let rendered = render_with(template, |name| {
            let value = match name {
                "title" => &request.title,
                "body" => &request.body,
                "branch" => &request.branch,
                "remote" => &self.remote,
                _ => return None,
            };
            Some(shell_words::quote(value).into_owned())
        })
        .map_err(|e| BakeoffError::ConfigError(format!("publish.command: {}", e)))?;

        let args = shell_words::split(&rendered).map_err(|e| {
            BakeoffError::ConfigError(format!("failed to parse publish.command: {}", e))
        })?;
        if args.is_empty() {
            return Err(BakeoffError::ConfigError(
                "publish.command is empty".to_string(),
            ));
        }
        Ok(args)
    }
}

impl ChangeRequestPublisher for GhCliPublisher {
    fn open_draft(&self, repo_root: &Path, request: &ChangeRequest) -> Result<String> {
        self.push(repo_root, &request.branch)?;

        let args = self.argv(request)?;
        let output = Command::new(&args[0])
            .args(&args[1..])
            .current_dir(repo_root)
            .output()
            .map_err(|e| {
                BakeoffError::UserError(format!(
                    "failed to run publication command '{}': {}",
                    args[0], e
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BakeoffError::UserError(format!(
                "publication command '{}' failed ({}): {}",
                args[0],
                output.status,
                stderr.trim()
            )));
        }

        stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .map(String::from)
            .ok_or_else(|| {
                BakeoffError::UserError(format!(
                    "publication command '{}' printed no URL",
                    args[0]
                ))
            })
    }
}
