//! Implementation of the `bakeoff init` command.
//!
//! Writes a default `.bakeoff/config.yaml` and keeps `.bakeoff/` out of
//! `git status` via `.git/info/exclude`.

use crate::cli::InitArgs;
use crate::config::Config;
use crate::context::{RepoContext, STATE_DIR};
use crate::error::{BakeoffError, Result};
use crate::fs::atomic_write_file;
use std::fs;
use tracing::info;

/// Execute the `bakeoff init` command.
pub fn cmd_init(args: InitArgs) -> Result<()> {
    let ctx = RepoContext::resolve()?;

    write_default_config(&ctx, args.force)?;
    let excluded = add_to_git_exclude(&ctx)?;

    println!("Initialized bakeoff.");
    println!();
    println!("Config: {}", ctx.config_path().display());
    if excluded {
        println!("Added {}/ to .git/info/exclude", STATE_DIR);
    }
    println!();
    println!("Edit the agent commands in the config, then start a run with:");
    println!("  bakeoff run \"describe the feature\"");

    Ok(())
}

/// Write the default config. Refuses to replace an existing file unless `force`.
fn write_default_config(ctx: &RepoContext, force: bool) -> Result<()> {
    let path = ctx.config_path();
    if path.exists() && !force {
        return Err(BakeoffError::UserError(format!(
            "config already exists at '{}'.\n\n\
             Re-run with --force to overwrite it with the defaults.",
            path.display()
        )));
    }

    let yaml = Config::default().to_yaml()?;
    atomic_write_file(&path, &yaml)?;
    info!(path = %path.display(), "wrote default config");
    Ok(())
}

/// Add `.bakeoff/` to `.git/info/exclude`. Returns whether the file changed.
fn add_to_git_exclude(ctx: &RepoContext) -> Result<bool> {
    let exclude_path = ctx.repo_root.join(".git").join("info").join("exclude");
    let entry = format!("{}/", STATE_DIR);

    if let Some(parent) = exclude_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BakeoffError::UserError(format!("failed to create git info directory: {}", e))
        })?;
    }

    let mut content = fs::read_to_string(&exclude_path).unwrap_or_default();
    if content.lines().any(|line| line.trim() == entry) {
        return Ok(false);
    }

    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str("\n# bakeoff state and workspaces\n");
    content.push_str(&entry);
    content.push('\n');

    atomic_write_file(&exclude_path, &content)?;
    Ok(true)
}
