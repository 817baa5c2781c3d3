//! Best-effort teardown of attempt workspaces and branches.
//!
//! Each workspace is reclaimed independently. A failure is recorded on that
//! workspace's [`ReclaimOutcome`] and the loop moves on, so one stuck
//! directory never blocks cleanup of its siblings.

use crate::error::{BakeoffError, Result};
use crate::git::run_git;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::branch::delete_branch;
use super::provision::Workspace;
use super::worktree::{list_worktrees, normalize, remove_workspace};

/// What happened when one task's workspace and branch were torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReclaimOutcome {
    pub task_id: u32,
    pub branch: String,
    pub workspace: PathBuf,
    pub workspace_removed: bool,
    pub branch_deleted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ReclaimOutcome {
    /// Both the workspace and the branch are gone.
    pub fn is_clean(&self) -> bool {
        self.workspace_removed && self.branch_deleted
    }
}

/// Remove one workspace, then its branch.
///
/// The branch is deleted even when the directory could not be removed; git
/// refuses to delete a branch still checked out in a registered worktree,
/// and that refusal is recorded like any other failure.
pub fn reclaim_workspace(repo_root: &Path, workspace: &Workspace) -> ReclaimOutcome {
    let mut outcome = ReclaimOutcome {
        task_id: workspace.task_id,
        branch: workspace.branch.clone(),
        workspace: workspace.path.clone(),
        workspace_removed: false,
        branch_deleted: false,
        errors: Vec::new(),
    };

    match remove_workspace(repo_root, &workspace.path) {
        Ok(()) => outcome.workspace_removed = true,
        Err(e) => outcome.errors.push(e.to_string()),
    }

    match delete_branch(repo_root, &workspace.branch) {
        Ok(()) => outcome.branch_deleted = true,
        Err(e) => outcome.errors.push(e.to_string()),
    }

    if outcome.is_clean() {
        debug!(task = workspace.task_id, branch = %workspace.branch, "reclaimed workspace");
    } else {
        warn!(
            task = workspace.task_id,
            branch = %workspace.branch,
            errors = ?outcome.errors,
            "workspace only partially reclaimed"
        );
    }

    outcome
}

/// Reclaim every workspace except `keep` (the promoted task, if any).
pub fn reclaim_workspaces(
    repo_root: &Path,
    workspaces: &[Workspace],
    keep: Option<u32>,
) -> Vec<ReclaimOutcome> {
    workspaces
        .iter()
        .filter(|ws| Some(ws.task_id) != keep)
        .map(|ws| reclaim_workspace(repo_root, ws))
        .collect()
}

/// Tally of what [`purge_stale_workspaces`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub worktrees_removed: Vec<PathBuf>,
    pub branches_deleted: Vec<String>,
    /// Per-item failures; purging continues past them.
    pub errors: Vec<String>,
}

/// Remove every worktree located under `root_dir`, the branch each one had
/// checked out, and then `root_dir` itself.
///
/// Branches without a worktree (a promoted winner, whose workspace was
/// released during promotion) are left alone.
pub fn purge_stale_workspaces(repo_root: &Path, root_dir: &Path) -> Result<PurgeSummary> {
    let mut summary = PurgeSummary::default();
    let root = normalize(root_dir);

    for wt in list_worktrees(repo_root)? {
        if !normalize(&wt.path).starts_with(&root) {
            continue;
        }

        match remove_workspace(repo_root, &wt.path) {
            Ok(()) => summary.worktrees_removed.push(wt.path.clone()),
            Err(e) => {
                summary.errors.push(e.to_string());
                continue;
            }
        }

        if let Some(branch) = wt.branch {
            match delete_branch(repo_root, &branch) {
                Ok(()) => summary.branches_deleted.push(branch),
                Err(e) => summary.errors.push(e.to_string()),
            }
        }
    }

    if root_dir.exists() {
        std::fs::remove_dir_all(root_dir).map_err(|e| {
            BakeoffError::GitError(format!(
                "failed to delete workspaces directory '{}': {}",
                root_dir.display(),
                e
            ))
        })?;
    }
    run_git(repo_root, &["worktree", "prune"])?;

    Ok(summary)
}
