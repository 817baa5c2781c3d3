//! Error types for bakeoff.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for bakeoff operations.
///
/// Each variant maps to a process exit code (see [`exit_codes`]).
#[derive(Error, Debug)]
pub enum BakeoffError {
    /// User provided invalid arguments or input.
    #[error("{0}")]
    UserError(String),

    /// Configuration file could not be read or failed validation.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Git operation failed.
    #[error("Git operation failed: {0}")]
    GitError(String),

    /// The agent process could not be started or driven.
    #[error("Agent invocation failed: {0}")]
    AgentError(String),

    /// Run lock could not be acquired.
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    /// Workspaces could not be provisioned; no attempt can start.
    #[error("Provisioning failed: {0}")]
    ProvisionError(String),

    /// The judge produced no usable verdict.
    ///
    /// `raw_response` always carries the judge text verbatim so an operator
    /// can see what the judge actually said.
    #[error("Decision failed: {reason}")]
    DecisionError { reason: String, raw_response: String },

    /// The winning branch could not be checked out in the canonical repository.
    #[error("Promotion failed: {0}")]
    PromotionError(String),

    /// A run finished in the Failed state.
    #[error("Run failed during {phase}: {reason}")]
    RunFailed {
        phase: String,
        reason: String,
        exit_code: i32,
    },
}

impl BakeoffError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            BakeoffError::UserError(_) | BakeoffError::ConfigError(_) => exit_codes::USER_ERROR,
            BakeoffError::AgentError(_) | BakeoffError::DecisionError { .. } => {
                exit_codes::RUN_FAILURE
            }
            BakeoffError::GitError(_)
            | BakeoffError::ProvisionError(_)
            | BakeoffError::PromotionError(_) => exit_codes::GIT_FAILURE,
            BakeoffError::LockError(_) => exit_codes::LOCK_FAILURE,
            BakeoffError::RunFailed { exit_code, .. } => *exit_code,
        }
    }

    /// Build a decision error, keeping the judge response verbatim.
    pub fn decision(reason: impl Into<String>, raw_response: impl Into<String>) -> Self {
        BakeoffError::DecisionError {
            reason: reason.into(),
            raw_response: raw_response.into(),
        }
    }
}

/// Result type alias for bakeoff operations.
pub type Result<T> = std::result::Result<T, BakeoffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_and_config_errors_are_user_failures() {
        assert_eq!(
            BakeoffError::UserError("bad".into()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            BakeoffError::ConfigError("fan_out".into()).exit_code(),
            exit_codes::USER_ERROR
        );
    }

    #[test]
    fn git_side_errors_share_git_exit_code() {
        for err in [
            BakeoffError::GitError("x".into()),
            BakeoffError::ProvisionError("x".into()),
            BakeoffError::PromotionError("x".into()),
        ] {
            assert_eq!(err.exit_code(), exit_codes::GIT_FAILURE);
        }
    }

    #[test]
    fn decision_error_keeps_raw_response() {
        let err = BakeoffError::decision("no verdict", "I liked them all.");
        assert_eq!(err.exit_code(), exit_codes::RUN_FAILURE);
        assert_eq!(err.to_string(), "Decision failed: no verdict");
        match err {
            BakeoffError::DecisionError { raw_response, .. } => {
                assert_eq!(raw_response, "I liked them all.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn run_failed_carries_its_own_exit_code() {
        let err = BakeoffError::RunFailed {
            phase: "executing".into(),
            reason: "all 3 tasks failed".into(),
            exit_code: exit_codes::RUN_FAILURE,
        };
        assert_eq!(err.exit_code(), exit_codes::RUN_FAILURE);
        assert_eq!(
            err.to_string(),
            "Run failed during executing: all 3 tasks failed"
        );
    }

    #[test]
    fn lock_error_has_lock_exit_code() {
        let err = BakeoffError::LockError("held".into());
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
    }
}
