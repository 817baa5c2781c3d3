//! Attempt workspaces: one git worktree and branch per task.
//!
//! - Naming: deterministic branch and directory names per request id
//! - Branch / worktree primitives over the `git` CLI, idempotent on "already absent"
//! - Provisioning: stale purge, then `fan_out` fresh workspaces from one base commit
//! - Reclamation: independent, best-effort teardown that records every outcome
//!
//! All git failures surface as `BakeoffError::GitError` or, during
//! provisioning, `BakeoffError::ProvisionError`.

mod branch;
mod naming;
mod provision;
mod reclaim;
mod worktree;

pub use branch::{branch_exists, checkout_branch, create_branch, delete_branch, list_branches};
pub use naming::{
    generate_request_id, is_valid_branch_component, normalize_request_id, task_branch_name,
    task_workspace_path,
};
pub use provision::{Workspace, WorkspacePlan, provision_workspaces};
pub use reclaim::{
    PurgeSummary, ReclaimOutcome, purge_stale_workspaces, reclaim_workspace, reclaim_workspaces,
};
pub use worktree::{
    ExistingWorktree, add_worktree, commit_all_changes, list_worktrees, remove_workspace,
};
