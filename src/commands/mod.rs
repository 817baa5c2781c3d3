//! Command implementations for bakeoff.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations.

mod clean;
mod init;
mod run;
mod verdict;

use crate::cli::Command;
use crate::error::{BakeoffError, Result};
use std::io::Read;
use std::path::Path;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Init(args) => init::cmd_init(args),
        Command::Run(args) => run::cmd_run(args),
        Command::Clean(args) => clean::cmd_clean(args),
        Command::Verdict(args) => verdict::cmd_verdict(args),
    }
}

/// Read text from a file path, or from stdin when the path is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| BakeoffError::UserError(format!("failed to read stdin: {}", e)))?;
        return Ok(buf);
    }

    std::fs::read_to_string(path).map_err(|e| {
        BakeoffError::UserError(format!("failed to read '{}': {}", path.display(), e))
    })
}
