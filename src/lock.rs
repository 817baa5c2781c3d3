//! Per-request run lock.
//!
//! A run creates `.bakeoff/runs/{request_id}/run.lock` with create-new
//! semantics, so a second run with the same request id fails fast instead of
//! provisioning over the first run's workspaces. The lock is released when
//! the guard drops.

use crate::error::{BakeoffError, Result};
use crate::events::actor_string;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Metadata stored in the lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    /// `user@HOST` of the lock holder.
    pub owner: String,

    /// Process id of the lock holder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    pub created_at: DateTime<Utc>,

    pub request_id: String,
}

impl LockMetadata {
    pub fn new(request_id: &str) -> Self {
        Self {
            owner: actor_string(),
            pid: Some(std::process::id()),
            created_at: Utc::now(),
            request_id: request_id.to_string(),
        }
    }

    /// Parse lock metadata from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            BakeoffError::UserError(format!(
                "failed to read lock file '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            BakeoffError::UserError(format!(
                "failed to parse lock file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Human-readable lock age, e.g. `5m` or `2h 10m`.
    pub fn age_string(&self) -> String {
        let minutes = (Utc::now() - self.created_at).num_minutes().max(0);
        if minutes < 60 {
            format!("{}m", minutes)
        } else {
            format!("{}h {}m", minutes / 60, minutes % 60)
        }
    }
}

/// RAII guard for a run lock. Dropping it deletes the lock file.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Acquire the lock at `path` for `request_id`.
    ///
    /// Fails with `LockError` (exit 4) when the file already exists.
    pub fn acquire(path: &Path, request_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BakeoffError::LockError(format!(
                    "failed to create run directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    let holder = match LockMetadata::from_file(path) {
                        Ok(meta) => format!(
                            " (held by {} for {}, pid {})",
                            meta.owner,
                            meta.age_string(),
                            meta.pid.map(|p| p.to_string()).unwrap_or_else(|| "?".into())
                        ),
                        Err(_) => String::new(),
                    };
                    BakeoffError::LockError(format!(
                        "request id '{}' is already running{}.\n\
                         Request ids must be unique per run. If no run is active, clear it with:\n  \
                         bakeoff clean --request-id {}",
                        request_id, holder, request_id
                    ))
                } else {
                    BakeoffError::LockError(format!(
                        "failed to acquire lock '{}': {}",
                        path.display(),
                        e
                    ))
                }
            })?;

        let metadata = LockMetadata::new(request_id);
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| BakeoffError::LockError(format!("failed to serialize lock: {}", e)))?;
        if let Err(e) = file.write_all(json.as_bytes()) {
            let _ = fs::remove_file(path);
            return Err(BakeoffError::LockError(format!(
                "failed to write lock metadata: {}",
                e
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

/// Remove a leftover lock file. Missing locks are not an error.
pub fn clear_lock(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BakeoffError::LockError(format!(
            "failed to clear lock '{}': {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("runs").join("r1").join("run.lock");

        {
            let lock = RunLock::acquire(&path, "r1").unwrap();
            assert!(lock.path().exists());
            let meta = LockMetadata::from_file(lock.path()).unwrap();
            assert_eq!(meta.request_id, "r1");
            assert_eq!(meta.pid, Some(std::process::id()));
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_is_lock_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.lock");

        let _held = RunLock::acquire(&path, "dup").unwrap();
        let err = RunLock::acquire(&path, "dup").unwrap_err();

        assert!(matches!(err, BakeoffError::LockError(_)));
        assert!(err.to_string().contains("already running"));
        assert!(err.to_string().contains("bakeoff clean --request-id dup"));
    }

    #[test]
    fn test_clear_lock_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.lock");
        fs::write(&path, "{}").unwrap();

        assert!(clear_lock(&path).unwrap());
        assert!(!clear_lock(&path).unwrap());
    }

    #[test]
    fn test_age_string() {
        let mut meta = LockMetadata::new("r");
        meta.created_at = Utc::now() - chrono::Duration::minutes(125);
        assert_eq!(meta.age_string(), "2h 5m");
    }
}
