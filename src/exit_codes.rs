//! Exit code constants for the bakeoff CLI.
//!
//! - 0: Success (a winner was promoted)
//! - 1: User error (bad args, invalid config, malformed request)
//! - 2: Run failure (every attempt failed, or no usable verdict)
//! - 3: Git failure (provisioning or promotion could not touch the repository)
//! - 4: Lock failure (the request id is already running)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or unusable input.
pub const USER_ERROR: i32 = 1;

/// Run failure: all attempts failed or the judge produced no valid verdict.
pub const RUN_FAILURE: i32 = 2;

/// Git failure: workspace provisioning, checkout, or branch plumbing errors.
pub const GIT_FAILURE: i32 = 3;

/// Lock failure: another run holds the lock for this request id.
pub const LOCK_FAILURE: i32 = 4;
