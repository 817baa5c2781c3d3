//! Repository context resolution for bakeoff.
//!
//! Finds the canonical repository (the main worktree) from any working
//! directory and derives the paths bakeoff keeps its state under.
//!
//! ```text
//! {repo_root}/.bakeoff/
//!   config.yaml
//!   workspaces/{request_id}/task-{n}/    (default workspaces_dir)
//!   runs/{request_id}/
//!     run.lock
//!     events.ndjson
//!     prompts/
//! ```

use crate::error::{BakeoffError, Result};
use crate::git;
use std::env;
use std::path::{Path, PathBuf};

/// Directory under the repo root holding all bakeoff state.
pub const STATE_DIR: &str = ".bakeoff";

/// Resolved paths for the canonical repository. All paths are absolute.
#[derive(Debug, Clone)]
pub struct RepoContext {
    /// Absolute path to the main Git worktree (the canonical repository).
    pub repo_root: PathBuf,

    /// `{repo_root}/.bakeoff`
    pub state_dir: PathBuf,

    /// `{repo_root}/.bakeoff/runs`
    pub runs_dir: PathBuf,
}

impl RepoContext {
    /// Resolve the context from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            BakeoffError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Self::resolve_from(&cwd)
    }

    /// Resolve the context from a specific directory.
    ///
    /// Invoking bakeoff from inside one of its own workspaces still resolves
    /// to the main checkout.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P) -> Result<Self> {
        let cwd = cwd.as_ref();
        let toplevel = git::get_repo_root(cwd)?;

        let repo_root = match git::get_main_worktree(cwd) {
            Ok(main) if main.exists() => main,
            _ => toplevel,
        };

        Ok(Self::for_root(repo_root))
    }

    /// Build a context for a known repository root.
    pub fn for_root(repo_root: PathBuf) -> Self {
        let state_dir = repo_root.join(STATE_DIR);
        let runs_dir = state_dir.join("runs");
        Self {
            repo_root,
            state_dir,
            runs_dir,
        }
    }

    /// Path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    /// Resolve the configured workspaces directory against the repo root.
    pub fn workspaces_dir(&self, configured: &str) -> PathBuf {
        let path = PathBuf::from(configured);
        if path.is_absolute() {
            path
        } else {
            self.repo_root.join(path)
        }
    }

    /// Directory holding a single run's artifacts.
    pub fn run_dir(&self, request_id: &str) -> PathBuf {
        self.runs_dir.join(request_id)
    }

    /// NDJSON event log for a run.
    pub fn events_file(&self, request_id: &str) -> PathBuf {
        self.run_dir(request_id).join("events.ndjson")
    }

    /// Lock file guarding a request id against concurrent duplicate runs.
    pub fn run_lock_path(&self, request_id: &str) -> PathBuf {
        self.run_dir(request_id).join("run.lock")
    }
}
