//! Implementation of the `bakeoff clean` command.
//!
//! Removes what interrupted runs leave behind:
//! - attempt worktrees under the configured workspaces directory, and the
//!   branch each one had checked out
//! - leftover run locks
//!
//! Branches without a workspace (promoted winners) are never touched.

use crate::cli::CleanArgs;
use crate::config::Config;
use crate::context::RepoContext;
use crate::error::{BakeoffError, Result};
use crate::lock::clear_lock;
use crate::workspace::{
    PurgeSummary, list_branches, normalize_request_id, purge_stale_workspaces,
};
use std::fs;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct CleanupResult {
    purge: PurgeSummary,
    /// Request ids whose run lock was removed.
    locks_cleared: Vec<String>,
    /// Attempt branches left in place because no workspace uses them.
    kept_branches: Vec<String>,
}

/// Execute the `bakeoff clean` command.
pub fn cmd_clean(args: CleanArgs) -> Result<()> {
    let ctx = RepoContext::resolve()?;
    let config = Config::load_or_default(ctx.config_path())?;

    let result = clean(&ctx, &config, args.request_id.as_deref())?;

    let removed = result.purge.worktrees_removed.len()
        + result.purge.branches_deleted.len()
        + result.locks_cleared.len();
    if removed == 0 && result.purge.errors.is_empty() {
        println!("Nothing to clean.");
        return Ok(());
    }

    println!("Cleanup complete:");
    for path in &result.purge.worktrees_removed {
        println!("  removed workspace {}", path.display());
    }
    for branch in &result.purge.branches_deleted {
        println!("  deleted branch    {}", branch);
    }
    for request_id in &result.locks_cleared {
        println!("  cleared lock      {}", request_id);
    }
    if !result.kept_branches.is_empty() {
        println!();
        println!("Kept {} promoted branch(es):", result.kept_branches.len());
        for branch in &result.kept_branches {
            println!("  {}", branch);
        }
    }
    if !result.purge.errors.is_empty() {
        println!();
        println!("Skipped {} item(s):", result.purge.errors.len());
        for error in &result.purge.errors {
            println!("  - {}", error);
        }
    }

    Ok(())
}

fn clean(ctx: &RepoContext, config: &Config, request_id: Option<&str>) -> Result<CleanupResult> {
    let request_id = request_id
        .map(|raw| {
            normalize_request_id(raw).ok_or_else(|| {
                BakeoffError::UserError(format!("request id '{}' has no usable characters", raw))
            })
        })
        .transpose()?;

    let workspaces_root = ctx.workspaces_dir(&config.workspaces_dir);
    let target = match &request_id {
        Some(id) => workspaces_root.join(id),
        None => workspaces_root,
    };

    let mut result = CleanupResult::default();
    if target.exists() {
        result.purge = purge_stale_workspaces(&ctx.repo_root, &target)?;
    }
    for error in &result.purge.errors {
        warn!(error = %error, "cleanup step failed");
    }

    let branch_prefix = match &request_id {
        Some(id) => format!("{}/{}/", config.branch_prefix, id),
        None => format!("{}/", config.branch_prefix),
    };
    result.kept_branches = list_branches(&ctx.repo_root, &branch_prefix)?;

    let lock_ids = match request_id {
        Some(id) => vec![id],
        None => run_ids(ctx),
    };
    for id in lock_ids {
        if clear_lock(&ctx.run_lock_path(&id))? {
            info!(request_id = %id, "cleared run lock");
            result.locks_cleared.push(id);
        }
    }

    Ok(result)
}

/// Request ids that have a run directory.
fn run_ids(ctx: &RepoContext) -> Vec<String> {
    let Ok(entries) = fs::read_dir(&ctx.runs_dir) else {
        return Vec::new();
    };
    let mut ids: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .collect();
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::RunLock;
    use crate::test_support::{DirGuard, create_test_repo, git};
    use crate::workspace::{
        WorkspacePlan, branch_exists, list_worktrees, provision_workspaces,
    };
    use serial_test::serial;

    fn provision(ctx: &RepoContext, request_id: &str, fan_out: u32) {
        let plan = WorkspacePlan {
            repo_root: ctx.repo_root.clone(),
            workspaces_dir: ctx.workspaces_dir(".bakeoff/workspaces"),
            branch_prefix: "bakeoff".to_string(),
            request_id: request_id.to_string(),
            base_ref: "HEAD".to_string(),
            fan_out,
        };
        provision_workspaces(&plan, &mut Vec::new()).unwrap();
    }

    fn leave_lock(ctx: &RepoContext, request_id: &str) {
        let lock = RunLock::acquire(&ctx.run_lock_path(request_id), request_id).unwrap();
        // Simulate a crashed run that never released its lock.
        std::mem::forget(lock);
    }

    #[test]
    fn test_clean_all_runs() {
        let temp_dir = create_test_repo();
        let ctx = RepoContext::for_root(temp_dir.path().canonicalize().unwrap());
        provision(&ctx, "a", 2);
        provision(&ctx, "b", 1);
        leave_lock(&ctx, "a");
        // A promoted winner: a branch with no workspace.
        git(&ctx.repo_root, &["branch", "bakeoff/old/task-1"]);

        let result = clean(&ctx, &Config::default(), None).unwrap();

        assert_eq!(result.purge.worktrees_removed.len(), 3);
        assert_eq!(result.purge.branches_deleted.len(), 3);
        assert!(result.purge.errors.is_empty());
        assert_eq!(result.locks_cleared, vec!["a".to_string()]);
        assert_eq!(list_worktrees(&ctx.repo_root).unwrap().len(), 1);
        assert!(!branch_exists(&ctx.repo_root, "bakeoff/a/task-1"));
        assert!(branch_exists(&ctx.repo_root, "bakeoff/old/task-1"));
        assert_eq!(result.kept_branches, vec!["bakeoff/old/task-1".to_string()]);
        assert!(!ctx.run_lock_path("a").exists());
    }

    #[test]
    fn test_clean_single_run_leaves_others() {
        let temp_dir = create_test_repo();
        let ctx = RepoContext::for_root(temp_dir.path().canonicalize().unwrap());
        provision(&ctx, "a", 1);
        provision(&ctx, "b", 1);
        leave_lock(&ctx, "b");

        let result = clean(&ctx, &Config::default(), Some("A")).unwrap();

        assert_eq!(result.purge.branches_deleted, vec!["bakeoff/a/task-1".to_string()]);
        assert!(result.locks_cleared.is_empty());
        assert!(result.kept_branches.is_empty());
        assert!(branch_exists(&ctx.repo_root, "bakeoff/b/task-1"));
        assert!(ctx.run_lock_path("b").exists());
    }

    #[test]
    fn test_clean_nothing_and_bad_request_id() {
        let temp_dir = create_test_repo();
        let ctx = RepoContext::for_root(temp_dir.path().canonicalize().unwrap());

        let result = clean(&ctx, &Config::default(), None).unwrap();
        assert!(result.purge.worktrees_removed.is_empty());
        assert!(result.locks_cleared.is_empty());

        assert!(matches!(
            clean(&ctx, &Config::default(), Some("???")),
            Err(BakeoffError::UserError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_cmd_clean_from_repo() {
        let temp_dir = create_test_repo();
        let ctx = RepoContext::for_root(temp_dir.path().canonicalize().unwrap());
        provision(&ctx, "r1", 2);
        let _guard = DirGuard::new(temp_dir.path());

        cmd_clean(CleanArgs { request_id: None }).unwrap();

        assert!(!branch_exists(&ctx.repo_root, "bakeoff/r1/task-1"));
        assert!(!branch_exists(&ctx.repo_root, "bakeoff/r1/task-2"));
    }
}
