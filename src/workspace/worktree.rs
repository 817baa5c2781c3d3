//! Worktree creation, listing, removal and snapshot commits.

use crate::context::STATE_DIR;
use crate::error::{BakeoffError, Result};
use crate::git::run_git;
use std::path::{Path, PathBuf};

/// Information about an existing worktree.
#[derive(Debug, Clone)]
pub struct ExistingWorktree {
    /// Path to the worktree.
    pub path: PathBuf,
    /// Branch the worktree is on.
    pub branch: Option<String>,
    /// HEAD commit SHA.
    pub head_sha: String,
}

/// List all worktrees in the repository, main worktree first.
pub fn list_worktrees<P: AsRef<Path>>(repo_root: P) -> Result<Vec<ExistingWorktree>> {
    let output = run_git(repo_root, &["worktree", "list", "--porcelain"])?;

    let mut worktrees = Vec::new();
    let mut current_path: Option<PathBuf> = None;
    let mut current_head: Option<String> = None;
    let mut current_branch: Option<String> = None;

    for line in output.stdout.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let (Some(path), Some(head)) = (current_path.take(), current_head.take()) {
                worktrees.push(ExistingWorktree {
                    path,
                    branch: current_branch.take(),
                    head_sha: head,
                });
            }
            current_branch = None;
            current_path = Some(PathBuf::from(path));
        } else if let Some(sha) = line.strip_prefix("HEAD ") {
            current_head = Some(sha.to_string());
        } else if let Some(branch_ref) = line.strip_prefix("branch ") {
            current_branch = branch_ref.strip_prefix("refs/heads/").map(String::from);
        } else if line == "detached" {
            current_branch = None;
        }
    }

    if let (Some(path), Some(head)) = (current_path, current_head) {
        worktrees.push(ExistingWorktree {
            path,
            branch: current_branch,
            head_sha: head,
        });
    }

    Ok(worktrees)
}

/// Add a worktree at `worktree_path` checking out the existing `branch`.
///
/// Creates the parent directory first.
pub fn add_worktree<P: AsRef<Path>>(repo_root: P, worktree_path: &Path, branch: &str) -> Result<()> {
    let worktree_str = worktree_path.to_string_lossy();

    if let Some(parent) = worktree_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            BakeoffError::GitError(format!(
                "failed to create workspaces directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    run_git(repo_root, &["worktree", "add", &worktree_str, branch]).map_err(|e| {
        BakeoffError::GitError(format!(
            "failed to create worktree at '{}' for branch '{}': {}",
            worktree_str, branch, e
        ))
    })?;

    Ok(())
}

/// Remove a workspace directory and its worktree registration.
///
/// Idempotent: a path that is neither registered nor present on disk is a
/// no-op. Directories git does not know about are deleted directly.
pub fn remove_workspace<P: AsRef<Path>>(repo_root: P, worktree_path: &Path) -> Result<()> {
    let repo_root = repo_root.as_ref();

    if is_registered(repo_root, worktree_path)? {
        let worktree_str = worktree_path.to_string_lossy();
        run_git(repo_root, &["worktree", "remove", "--force", &worktree_str]).map_err(|e| {
            BakeoffError::GitError(format!(
                "failed to remove worktree at '{}': {}",
                worktree_str, e
            ))
        })?;
    }

    if worktree_path.exists() {
        std::fs::remove_dir_all(worktree_path).map_err(|e| {
            BakeoffError::GitError(format!(
                "failed to delete workspace directory '{}': {}",
                worktree_path.display(),
                e
            ))
        })?;
    }

    // Drops administrative entries for worktrees deleted behind git's back.
    run_git(repo_root, &["worktree", "prune"])?;
    Ok(())
}

fn is_registered(repo_root: &Path, worktree_path: &Path) -> Result<bool> {
    let target = normalize(worktree_path);
    Ok(list_worktrees(repo_root)?
        .iter()
        .any(|wt| normalize(&wt.path) == target))
}

/// Canonicalize when possible so `/tmp` vs `/private/tmp` style aliases match.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Stage and commit everything in a workspace except bakeoff's own state.
///
/// Returns `Ok(false)` when there was nothing to commit.
pub fn commit_all_changes<P: AsRef<Path>>(worktree_path: P, message: &str) -> Result<bool> {
    let worktree_path = worktree_path.as_ref();
    let exclude = format!(":(exclude){}", STATE_DIR);

    run_git(worktree_path, &["add", "-A", "--", ".", &exclude])?;

    let staged = run_git(worktree_path, &["diff", "--cached", "--name-only"])?;
    if staged.is_empty() {
        return Ok(false);
    }

    run_git(worktree_path, &["commit", "-m", message])?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::resolve_commit;
    use crate::test_support::create_test_repo;
    use crate::workspace::branch::create_branch;
    use std::fs;

    #[test]
    fn test_add_and_list_worktree() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let head = resolve_commit(repo, "HEAD").unwrap();
        create_branch(repo, "bakeoff/r1/task-1", &head).unwrap();

        let wt_path = repo.join(".bakeoff/workspaces/r1/task-1");
        add_worktree(repo, &wt_path, "bakeoff/r1/task-1").unwrap();
        assert!(wt_path.join("README.md").exists());

        let worktrees = list_worktrees(repo).unwrap();
        assert_eq!(worktrees.len(), 2);
        assert_eq!(worktrees[0].branch.as_deref(), Some("main"));
        assert_eq!(worktrees[1].branch.as_deref(), Some("bakeoff/r1/task-1"));
        assert_eq!(worktrees[1].head_sha, head);
    }

    #[test]
    fn test_remove_workspace_is_idempotent() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let head = resolve_commit(repo, "HEAD").unwrap();
        create_branch(repo, "b1", &head).unwrap();

        let wt_path = repo.join("ws").join("task-1");
        add_worktree(repo, &wt_path, "b1").unwrap();
        fs::write(wt_path.join("dirty.txt"), "uncommitted\n").unwrap();

        remove_workspace(repo, &wt_path).unwrap();
        assert!(!wt_path.exists());
        assert_eq!(list_worktrees(repo).unwrap().len(), 1);

        remove_workspace(repo, &wt_path).unwrap();
    }

    #[test]
    fn test_remove_workspace_deletes_unregistered_directory() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let stray = repo.join("ws").join("task-9");
        fs::create_dir_all(&stray).unwrap();
        fs::write(stray.join("leftover.txt"), "x").unwrap();

        remove_workspace(repo, &stray).unwrap();
        assert!(!stray.exists());
    }

    #[test]
    fn test_remove_workspace_after_manual_delete() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let head = resolve_commit(repo, "HEAD").unwrap();
        create_branch(repo, "b1", &head).unwrap();
        let wt_path = repo.join("ws").join("task-1");
        add_worktree(repo, &wt_path, "b1").unwrap();

        fs::remove_dir_all(&wt_path).unwrap();
        remove_workspace(repo, &wt_path).unwrap();
        assert_eq!(list_worktrees(repo).unwrap().len(), 1);
    }

    #[test]
    fn test_commit_all_changes() {
        let temp_dir = create_test_repo();
        let repo = temp_dir.path();
        let head = resolve_commit(repo, "HEAD").unwrap();
        create_branch(repo, "b1", &head).unwrap();
        let wt_path = repo.join("ws").join("task-1");
        add_worktree(repo, &wt_path, "b1").unwrap();

        assert!(!commit_all_changes(&wt_path, "nothing").unwrap());

        fs::write(wt_path.join("feature.rs"), "fn main() {}\n").unwrap();
        fs::create_dir_all(wt_path.join(".bakeoff")).unwrap();
        fs::write(wt_path.join(".bakeoff/result.json"), "{}").unwrap();

        assert!(commit_all_changes(&wt_path, "bakeoff: task-1").unwrap());

        let files = run_git(&wt_path, &["show", "--name-only", "--format=", "HEAD"]).unwrap();
        assert_eq!(files.lines(), vec!["feature.rs"]);
        assert_ne!(resolve_commit(repo, "b1").unwrap(), head);
    }
}
