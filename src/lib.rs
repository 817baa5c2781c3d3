//! Bakeoff: run several coding agents on one feature request and keep the best attempt.
//!
//! A run fans one feature request out to isolated Git worktrees, lets an
//! implementer agent work in each, asks a judge agent to pick a winner,
//! checks the winning branch out in the main repository and reclaims the
//! rest. See [`run::execute_run`] for the entry point.

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod git;
pub mod lock;
pub mod logging;
pub mod promote;
pub mod prompt;
pub mod run;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;
