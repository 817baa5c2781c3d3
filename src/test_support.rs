use crate::agent::{AgentEvent, AgentEventStream, AgentInvoker, AgentRequest};
use crate::error::{BakeoffError, Result};
use crate::git::run_git;
use crate::promote::{ChangeRequest, ChangeRequestPublisher};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard};
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // The process cwd is global; serialize even if a #[serial] is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// A repository on an unborn-then-committed `main` with one README commit.
pub(crate) fn create_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    git(path, &["init"]);
    // Deterministic default branch regardless of the host's init.defaultBranch.
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);

    std::fs::write(path.join("README.md"), "# Test\n").unwrap();
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "Initial commit"]);

    temp_dir
}

/// A test repo plus a bare repository registered as its `origin`.
pub(crate) fn create_test_repo_with_remote() -> (TempDir, TempDir) {
    let repo = create_test_repo();
    let remote = TempDir::new().unwrap();
    git(remote.path(), &["init", "--bare"]);

    let remote_str = remote.path().to_string_lossy().to_string();
    git(repo.path(), &["remote", "add", "origin", &remote_str]);
    (repo, remote)
}

pub(crate) fn git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute git {}: {}", args.join(" "), e));

    if !output.status.success() {
        panic!(
            "git {} failed (exit code {:?})\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Whether tracked files in `cwd` have uncommitted changes.
pub(crate) fn has_uncommitted_changes(cwd: &Path) -> bool {
    !run_git(cwd, &["status", "--porcelain", "--untracked-files=no"])
        .unwrap()
        .is_empty()
}

/// The branch checked out in `cwd`.
pub(crate) fn current_branch(cwd: &Path) -> String {
    run_git(cwd, &["rev-parse", "--abbrev-ref", "HEAD"])
        .unwrap()
        .stdout
}

type Script = dyn Fn(&AgentRequest) -> Result<Vec<AgentEvent>> + Send + Sync;

/// In-process agent whose events are computed from the request.
pub(crate) struct ScriptedAgent {
    script: Box<Script>,
    calls: AtomicUsize,
    requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    pub(crate) fn new<F>(script: F) -> Self
    where
        F: Fn(&AgentRequest) -> Result<Vec<AgentEvent>> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// An agent that always answers with `text` as its success result.
    pub(crate) fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(vec![success(&text)]))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl AgentInvoker for ScriptedAgent {
    fn invoke(&self, request: &AgentRequest) -> Result<AgentEventStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let events = (self.script)(request)?;
        Ok(Box::new(events.into_iter()))
    }
}

pub(crate) fn success(result: &str) -> AgentEvent {
    AgentEvent::Success {
        result: result.to_string(),
    }
}

pub(crate) fn failure(detail: &str) -> AgentEvent {
    AgentEvent::Error {
        detail: detail.to_string(),
    }
}

/// The task id of an implementation request, from its `task-<n>` workspace.
pub(crate) fn task_id_of(request: &AgentRequest) -> u32 {
    request
        .working_directory
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("task-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or_else(|| panic!("not a task workspace: {}", request.working_directory.display()))
}

/// Publisher that records requests and returns a fixed result.
pub(crate) struct RecordingPublisher {
    result: std::result::Result<String, String>,
    requests: Mutex<Vec<ChangeRequest>>,
}

impl RecordingPublisher {
    pub(crate) fn succeeding(url: &str) -> Self {
        Self {
            result: Ok(url.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ChangeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChangeRequestPublisher for RecordingPublisher {
    fn open_draft(&self, _repo_root: &Path, request: &ChangeRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.result.clone().map_err(BakeoffError::GitError)
    }
}
