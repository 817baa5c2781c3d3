//! CLI argument parsing for bakeoff.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Bakeoff: run several agents on one feature request and keep the best attempt.
///
/// Each attempt gets its own worktree and branch. A judge agent compares the
/// completed attempts, the winning branch is checked out and published as a
/// draft change request, and every other attempt is cleaned up.
#[derive(Parser, Debug)]
#[command(name = "bakeoff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `BAKEOFF_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for bakeoff.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default `.bakeoff/config.yaml` in the current repository.
    ///
    /// Also adds `.bakeoff/` to `.git/info/exclude`.
    Init(InitArgs),

    /// Run one feature request end to end.
    ///
    /// Provisions one workspace per attempt, runs the implementer in each,
    /// asks the judge to pick a winner, checks the winner out and reclaims
    /// the rest.
    Run(RunArgs),

    /// Remove leftover workspaces, attempt branches and run locks.
    Clean(CleanArgs),

    /// Parse a saved judge response and print the verdict it contains.
    Verdict(VerdictArgs),
}

/// Arguments for the `init` command.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// The feature request text.
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub feature_request: Option<String>,

    /// Read the feature request from a file (`-` for stdin).
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Number of independent attempts (overrides config `fan_out`).
    #[arg(short = 'n', long)]
    pub fan_out: Option<u32>,

    /// Request id used in branch and workspace names. Generated if omitted.
    #[arg(long)]
    pub request_id: Option<String>,

    /// Revision the attempts branch from (overrides config `base_ref`).
    #[arg(long)]
    pub base_ref: Option<String>,

    /// Skip opening a draft change request for the winner.
    #[arg(long)]
    pub no_publish: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `clean` command.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Only clean up this run. Without it, every run is cleaned.
    #[arg(long)]
    pub request_id: Option<String>,
}

/// Arguments for the `verdict` command.
#[derive(Parser, Debug)]
pub struct VerdictArgs {
    /// File holding the judge response, or `-` for stdin.
    #[arg(default_value = "-")]
    pub input: String,

    /// Completed task ids the winner must be one of (e.g. `1,3`).
    #[arg(long, value_delimiter = ',')]
    pub candidates: Vec<u32>,

    /// Print the verdict as JSON.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
