//! Git command runner for bakeoff.
//!
//! Wraps the `git` binary with captured stdout/stderr and structured error
//! handling. Every repository operation in the crate goes through here.

use crate::error::{BakeoffError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Result of a successful git command execution.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Returns true if stdout is empty.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
    }

    /// Returns stdout lines.
    pub fn lines(&self) -> Vec<&str> {
        if self.stdout.is_empty() {
            Vec::new()
        } else {
            self.stdout.lines().collect()
        }
    }
}

/// Run a git command in `cwd`.
///
/// Returns `Err(BakeoffError::GitError)` on a non-zero exit, carrying the
/// subcommand name, exit code and stderr (or stdout when stderr is empty).
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Result<GitOutput> {
    let cwd = cwd.as_ref();
    let subcommand = args.first().copied().unwrap_or("");

    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .map_err(|e| {
            BakeoffError::GitError(format!("failed to execute git {}: {}", subcommand, e))
        })?;

    let git_output = GitOutput::from_output(&output);

    if output.status.success() {
        Ok(git_output)
    } else {
        let exit_code = output.status.code().unwrap_or(-1);
        let message = if git_output.stderr.is_empty() {
            git_output.stdout
        } else {
            git_output.stderr
        };

        Err(BakeoffError::GitError(format!(
            "git {} failed (exit code {}): {}",
            subcommand, exit_code, message
        )))
    }
}

/// Get the repository root directory using `git rev-parse --show-toplevel`.
///
/// Outside a repository this is a user error (exit 1), not a git failure.
pub fn get_repo_root<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    let output = Command::new("git")
        .current_dir(cwd.as_ref())
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .map_err(|e| {
            BakeoffError::UserError(format!("failed to execute git: {} (is git installed?)", e))
        })?;

    let git_output = GitOutput::from_output(&output);
    if output.status.success() {
        return Ok(PathBuf::from(git_output.stdout));
    }

    if git_output.stderr.contains("not a git repository") {
        Err(BakeoffError::UserError(
            "not inside a git repository. Run bakeoff from within the repository to modify."
                .to_string(),
        ))
    } else {
        Err(BakeoffError::UserError(format!(
            "git rev-parse failed: {}",
            git_output.stderr
        )))
    }
}

/// Get the path to the main worktree (the original clone location).
///
/// From inside a linked worktree this still returns the main checkout,
/// which is where promotion must happen.
pub fn get_main_worktree<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    let cwd = cwd.as_ref();
    // The main worktree is always listed first.
    let output = run_git(cwd, &["worktree", "list", "--porcelain"])?;

    if let Some(path) = output
        .stdout
        .lines()
        .find_map(|line| line.strip_prefix("worktree "))
    {
        return Ok(PathBuf::from(path));
    }

    get_repo_root(cwd)
}

/// Resolve a revision (branch, tag, `HEAD`, sha) to a full commit SHA.
pub fn resolve_commit<P: AsRef<Path>>(cwd: P, rev: &str) -> Result<String> {
    let spec = format!("{}^{{commit}}", rev);
    let output = run_git(cwd, &["rev-parse", "--verify", "--quiet", &spec]).map_err(|_| {
        BakeoffError::GitError(format!("cannot resolve '{}' to a commit", rev))
    })?;
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_repo;
    use tempfile::TempDir;

    #[test]
    fn test_run_git_captures_stdout() {
        let temp_dir = create_test_repo();
        let output = run_git(temp_dir.path(), &["rev-parse", "--show-toplevel"]).unwrap();
        assert!(!output.stdout.is_empty());
    }

    #[test]
    fn test_run_git_failure_returns_git_error() {
        let temp_dir = create_test_repo();
        let err = run_git(temp_dir.path(), &["checkout", "nonexistent-branch"]).unwrap_err();
        assert!(matches!(err, BakeoffError::GitError(_)));
        assert!(err.to_string().contains("git checkout failed"));
    }

    #[test]
    fn test_get_repo_root_from_subdirectory() {
        let temp_dir = create_test_repo();
        let subdir = temp_dir.path().join("src").join("nested");
        std::fs::create_dir_all(&subdir).unwrap();

        let root = get_repo_root(&subdir).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_get_repo_root_outside_repo_is_user_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = get_repo_root(temp_dir.path()).unwrap_err();
        assert!(matches!(err, BakeoffError::UserError(_)));
        assert!(err.to_string().contains("not inside a git repository"));
    }

    #[test]
    fn test_resolve_commit() {
        let temp_dir = create_test_repo();
        let sha = resolve_commit(temp_dir.path(), "HEAD").unwrap();
        assert_eq!(sha.len(), 40);

        let err = resolve_commit(temp_dir.path(), "no-such-ref").unwrap_err();
        assert!(err.to_string().contains("no-such-ref"));
    }

    #[test]
    fn test_git_output_lines() {
        let output = GitOutput {
            stdout: "a\nb".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.lines(), vec!["a", "b"]);

        let empty = GitOutput {
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(empty.lines().is_empty());
        assert!(empty.is_empty());
    }
}
