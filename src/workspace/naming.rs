//! Request id, branch and workspace naming.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Generate a request id from a timestamp: `YYYYMMDD-HHMMSS-mmm`.
pub fn generate_request_id(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d-%H%M%S-%3f").to_string()
}

/// Normalize a caller-supplied request id for use in branch and path names.
///
/// Lowercases, collapses runs of other characters into single hyphens and
/// trims hyphens from both ends. Returns `None` when nothing usable remains.
pub fn normalize_request_id(raw: &str) -> Option<String> {
    let mut result = String::with_capacity(raw.len());
    let mut last_was_hyphen = true;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            result.push('-');
            last_was_hyphen = true;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    (!result.is_empty()).then_some(result)
}

/// Branch for one attempt: `{prefix}/{request_id}/task-{n}`.
pub fn task_branch_name(prefix: &str, request_id: &str, task_id: u32) -> String {
    format!("{}/{}/task-{}", prefix, request_id, task_id)
}

/// Workspace directory for one attempt: `{workspaces_dir}/{request_id}/task-{n}`.
pub fn task_workspace_path(workspaces_dir: &Path, request_id: &str, task_id: u32) -> PathBuf {
    workspaces_dir
        .join(request_id)
        .join(format!("task-{}", task_id))
}

/// Whether `s` can be used as one `/`-separated component of a branch name.
pub fn is_valid_branch_component(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('-')
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
