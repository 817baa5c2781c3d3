//! Branch operations (create, check existence, delete, checkout).

use crate::error::{BakeoffError, Result};
use crate::git::run_git;
use std::path::Path;

/// Check if a branch exists locally.
pub fn branch_exists<P: AsRef<Path>>(repo_root: P, branch: &str) -> bool {
    run_git(
        repo_root,
        &["rev-parse", "--verify", "--quiet", &format!("refs/heads/{}", branch)],
    )
    .is_ok()
}

/// Create a new branch at `base_sha`.
pub fn create_branch<P: AsRef<Path>>(repo_root: P, branch: &str, base_sha: &str) -> Result<()> {
    run_git(repo_root, &["branch", branch, base_sha]).map_err(|e| {
        BakeoffError::GitError(format!(
            "failed to create branch '{}' at {}: {}",
            branch, base_sha, e
        ))
    })?;
    Ok(())
}

/// Force-delete a branch. Deleting a branch that does not exist succeeds.
///
/// Attempt branches are never merged anywhere, so `-D` is the only delete
/// that can work.
pub fn delete_branch<P: AsRef<Path>>(repo_root: P, branch: &str) -> Result<()> {
    let repo_root = repo_root.as_ref();
    if !branch_exists(repo_root, branch) {
        return Ok(());
    }

    run_git(repo_root, &["branch", "-D", branch]).map_err(|e| {
        BakeoffError::GitError(format!("failed to delete branch '{}': {}", branch, e))
    })?;
    Ok(())
}

/// Check out `branch` in the repository at `repo_root`.
pub fn checkout_branch<P: AsRef<Path>>(repo_root: P, branch: &str) -> Result<()> {
    run_git(repo_root, &["checkout", branch]).map_err(|e| {
        BakeoffError::GitError(format!("failed to check out branch '{}': {}", branch, e))
    })?;
    Ok(())
}

/// List local branches under `prefix` (e.g. `bakeoff/r1/`).
pub fn list_branches<P: AsRef<Path>>(repo_root: P, prefix: &str) -> Result<Vec<String>> {
    let pattern = format!("refs/heads/{}", prefix.trim_end_matches('/'));
    let output = run_git(
        repo_root,
        &["for-each-ref", "--format=%(refname:short)", &pattern],
    )?;
    Ok(output.lines().into_iter().map(String::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::resolve_commit;
    use crate::test_support::{create_test_repo, current_branch};

    #[test]
    fn test_create_and_delete_branch() {
        let temp_dir = create_test_repo();
        let path = temp_dir.path();
        let head = resolve_commit(path, "HEAD").unwrap();

        assert!(!branch_exists(path, "bakeoff/r1/task-1"));
        create_branch(path, "bakeoff/r1/task-1", &head).unwrap();
        assert!(branch_exists(path, "bakeoff/r1/task-1"));

        delete_branch(path, "bakeoff/r1/task-1").unwrap();
        assert!(!branch_exists(path, "bakeoff/r1/task-1"));
    }

    #[test]
    fn test_delete_missing_branch_is_ok() {
        let temp_dir = create_test_repo();
        delete_branch(temp_dir.path(), "never-existed").unwrap();
    }

    #[test]
    fn test_create_existing_branch_fails() {
        let temp_dir = create_test_repo();
        let path = temp_dir.path();
        let head = resolve_commit(path, "HEAD").unwrap();

        create_branch(path, "dup", &head).unwrap();
        let err = create_branch(path, "dup", &head).unwrap_err();
        assert!(matches!(err, BakeoffError::GitError(_)));
    }

    #[test]
    fn test_checkout_branch() {
        let temp_dir = create_test_repo();
        let path = temp_dir.path();
        let head = resolve_commit(path, "HEAD").unwrap();
        create_branch(path, "feature", &head).unwrap();

        checkout_branch(path, "feature").unwrap();
        assert_eq!(current_branch(path), "feature");

        assert!(checkout_branch(path, "missing").is_err());
    }

    #[test]
    fn test_list_branches_by_prefix() {
        let temp_dir = create_test_repo();
        let path = temp_dir.path();
        let head = resolve_commit(path, "HEAD").unwrap();
        for name in ["bakeoff/r1/task-1", "bakeoff/r1/task-2", "bakeoff/r2/task-1"] {
            create_branch(path, name, &head).unwrap();
        }

        let mut r1 = list_branches(path, "bakeoff/r1/").unwrap();
        r1.sort();
        assert_eq!(r1, vec!["bakeoff/r1/task-1", "bakeoff/r1/task-2"]);

        assert_eq!(list_branches(path, "bakeoff").unwrap().len(), 3);
        assert!(list_branches(path, "other").unwrap().is_empty());
    }
}
