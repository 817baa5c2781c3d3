//! Workspace provisioning for one run.

use crate::error::{BakeoffError, Result};
use crate::git::resolve_commit;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::branch::{create_branch, delete_branch};
use super::naming::{task_branch_name, task_workspace_path};
use super::worktree::{add_worktree, remove_workspace};

/// Everything needed to lay out a run's workspaces.
#[derive(Debug, Clone)]
pub struct WorkspacePlan {
    /// Canonical repository.
    pub repo_root: PathBuf,
    /// Absolute directory that holds `{request_id}/task-{n}` workspaces.
    pub workspaces_dir: PathBuf,
    pub branch_prefix: String,
    pub request_id: String,
    /// Revision every attempt starts from.
    pub base_ref: String,
    pub fan_out: u32,
}

impl WorkspacePlan {
    pub fn branch_for(&self, task_id: u32) -> String {
        task_branch_name(&self.branch_prefix, &self.request_id, task_id)
    }

    pub fn path_for(&self, task_id: u32) -> PathBuf {
        task_workspace_path(&self.workspaces_dir, &self.request_id, task_id)
    }

    /// Directory holding every workspace of this run.
    pub fn run_root(&self) -> PathBuf {
        self.workspaces_dir.join(&self.request_id)
    }
}

/// An isolated working copy bound to one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub task_id: u32,
    pub branch: String,
    pub path: PathBuf,
}

/// Provision `plan.fan_out` fresh workspaces, all from the same base commit.
///
/// Leftovers from an earlier run with the same request id are purged first.
/// A purge failure is only logged; if it matters, the branch or worktree
/// creation that follows fails and names the real problem. Each workspace is pushed onto `created` as soon as its branch exists, so
/// on error the caller still holds everything that needs reclaiming.
///
/// Every failure surfaces as `BakeoffError::ProvisionError`.
pub fn provision_workspaces(plan: &WorkspacePlan, created: &mut Vec<Workspace>) -> Result<()> {
    let repo_root = plan.repo_root.as_path();

    purge_run(plan);

    let run_root = plan.run_root();
    std::fs::create_dir_all(&run_root).map_err(|e| {
        BakeoffError::ProvisionError(format!(
            "failed to create workspace directory '{}': {}",
            run_root.display(),
            e
        ))
    })?;

    let base_sha = resolve_commit(repo_root, &plan.base_ref).map_err(|_| {
        BakeoffError::ProvisionError(format!(
            "base ref '{}' does not resolve to a commit",
            plan.base_ref
        ))
    })?;
    debug!(base_ref = %plan.base_ref, base_sha = %base_sha, "resolved base commit");

    for task_id in 1..=plan.fan_out {
        let branch = plan.branch_for(task_id);
        let path = plan.path_for(task_id);

        create_branch(repo_root, &branch, &base_sha).map_err(provision_error)?;
        created.push(Workspace {
            task_id,
            branch: branch.clone(),
            path: path.clone(),
        });

        add_worktree(repo_root, &path, &branch).map_err(provision_error)?;
        debug!(task = task_id, branch = %branch, path = %path.display(), "workspace ready");
    }

    info!(
        request_id = %plan.request_id,
        fan_out = plan.fan_out,
        base_sha = %base_sha,
        "provisioned workspaces"
    );
    Ok(())
}

/// Remove this run's deterministic names left behind by an earlier attempt.
///
/// Returns the failures, each already logged.
fn purge_run(plan: &WorkspacePlan) -> Vec<String> {
    let repo_root = plan.repo_root.as_path();
    let mut failures = Vec::new();

    for task_id in 1..=plan.fan_out {
        let steps = [
            remove_workspace(repo_root, &plan.path_for(task_id)),
            delete_branch(repo_root, &plan.branch_for(task_id)),
        ];
        for err in steps.into_iter().filter_map(|r| r.err()) {
            warn!(task = task_id, error = %err, "could not purge stale state");
            failures.push(err.to_string());
        }
    }

    let run_root = plan.run_root();
    if run_root.exists() {
        match super::reclaim::purge_stale_workspaces(repo_root, &run_root) {
            Ok(summary) => {
                for err in summary.errors {
                    warn!(error = %err, "could not purge stale workspace");
                    failures.push(err);
                }
            }
            Err(e) => {
                warn!(path = %run_root.display(), error = %e, "could not purge stale workspaces");
                failures.push(e.to_string());
            }
        }
    }
    failures
}

fn provision_error(e: BakeoffError) -> BakeoffError {
    match e {
        BakeoffError::ProvisionError(_) => e,
        BakeoffError::GitError(msg) => BakeoffError::ProvisionError(msg),
        other => BakeoffError::ProvisionError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::run_git;
    use crate::test_support::create_test_repo;
    use crate::workspace::{branch_exists, list_worktrees};
    use std::path::Path;

    fn plan(repo: &Path, fan_out: u32) -> WorkspacePlan {
        WorkspacePlan {
            repo_root: repo.to_path_buf(),
            workspaces_dir: repo.join(".bakeoff/workspaces"),
            branch_prefix: "bakeoff".to_string(),
            request_id: "r1".to_string(),
            base_ref: "HEAD".to_string(),
            fan_out,
        }
    }

    #[test]
    fn test_provisions_fan_out_workspaces_from_one_base() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let plan = plan(repo, 3);
        let mut created = Vec::new();

        provision_workspaces(&plan, &mut created).unwrap();

        assert_eq!(created.len(), 3);
        let head = resolve_commit(repo, "HEAD").unwrap();
        for (i, ws) in created.iter().enumerate() {
            let id = i as u32 + 1;
            assert_eq!(ws.task_id, id);
            assert_eq!(ws.branch, format!("bakeoff/r1/task-{}", id));
            assert!(ws.path.ends_with(format!("r1/task-{}", id)));
            assert!(ws.path.join("README.md").exists());
            assert_eq!(resolve_commit(repo, &ws.branch).unwrap(), head);
        }
        assert_eq!(list_worktrees(repo).unwrap().len(), 4);
    }

    #[test]
    fn test_reprovision_purges_stale_state() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let plan = plan(repo, 2);

        let mut first = Vec::new();
        provision_workspaces(&plan, &mut first).unwrap();
        std::fs::write(first[0].path.join("stale.txt"), "old").unwrap();
        std::fs::create_dir_all(plan.run_root().join("task-7")).unwrap();

        let mut second = Vec::new();
        provision_workspaces(&plan, &mut second).unwrap();

        assert_eq!(second.len(), 2);
        assert!(!second[0].path.join("stale.txt").exists());
        assert!(!plan.run_root().join("task-7").exists());
        assert_eq!(list_worktrees(repo).unwrap().len(), 3);
    }

    #[test]
    fn test_unresolvable_base_ref_creates_nothing() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let mut plan = plan(repo, 2);
        plan.base_ref = "does-not-exist".to_string();
        let mut created = Vec::new();

        let err = provision_workspaces(&plan, &mut created).unwrap_err();

        assert!(matches!(err, BakeoffError::ProvisionError(_)));
        assert!(err.to_string().contains("does-not-exist"));
        assert!(created.is_empty());
        assert!(!branch_exists(repo, "bakeoff/r1/task-1"));
    }

    #[test]
    fn test_partial_failure_reports_created_workspaces() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        // A ref under task-2/ makes `git branch bakeoff/r1/task-2` fail.
        run_git(repo, &["branch", "bakeoff/r1/task-2/blocker"]).unwrap();
        let plan = plan(repo, 3);
        let mut created = Vec::new();

        let err = provision_workspaces(&plan, &mut created).unwrap_err();

        assert!(matches!(err, BakeoffError::ProvisionError(_)));
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].task_id, 1);
        assert!(created[0].path.exists());
    }

    #[test]
    fn test_purge_failure_is_not_fatal_and_creation_names_the_problem() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let plan = plan(repo, 2);

        // A stale task branch checked out in the canonical repo cannot be deleted.
        run_git(repo, &["checkout", "-b", "bakeoff/r1/task-1"]).unwrap();

        let failures = purge_run(&plan);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("failed to delete branch 'bakeoff/r1/task-1'"));

        let mut created = Vec::new();
        let err = provision_workspaces(&plan, &mut created).unwrap_err();

        assert!(matches!(err, BakeoffError::ProvisionError(_)));
        assert!(err.to_string().contains("failed to create branch 'bakeoff/r1/task-1'"));
        assert!(created.is_empty());
    }

    #[test]
    fn test_unpurgeable_run_directory_is_reported() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let plan = plan(repo, 1);

        // A leftover run directory that is a file cannot be purged as a directory.
        std::fs::create_dir_all(&plan.workspaces_dir).unwrap();
        std::fs::write(plan.run_root(), "not a directory").unwrap();

        let failures = purge_run(&plan);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("failed to delete workspaces directory"));

        let mut created = Vec::new();
        let err = provision_workspaces(&plan, &mut created).unwrap_err();
        assert!(err.to_string().contains("failed to create workspace directory"));
    }
}
