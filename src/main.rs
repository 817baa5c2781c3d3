//! Bakeoff: run several coding agents on one feature request and keep the best attempt.
//!
//! This is the main entry point for the `bakeoff` CLI. It parses arguments,
//! dispatches to the appropriate command handler, and handles errors with
//! proper exit codes.

use bakeoff::cli::Cli;
use bakeoff::error::BakeoffError;
use bakeoff::{commands, exit_codes, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init_logging(cli.verbose);

    match commands::dispatch(cli.command) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // A failed run has already printed its report.
            if !matches!(err, BakeoffError::RunFailed { .. }) {
                eprintln!("Error: {}", err);
            }
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
