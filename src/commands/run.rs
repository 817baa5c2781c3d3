//! Implementation of the `bakeoff run` command.

use super::read_input;
use crate::agent::CommandAgent;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::context::RepoContext;
use crate::error::{BakeoffError, Result};
use crate::promote::{ChangeRequestPublisher, GhCliPublisher};
use crate::run::{Collaborators, RunOutcome, execute_run};
use crate::workspace::{generate_request_id, normalize_request_id};
use chrono::{DateTime, Utc};
use tracing::info;

/// Execute the `bakeoff run` command.
///
/// Prints the run report either way; a failed run is returned as
/// `RunFailed` carrying the report's exit code.
pub fn cmd_run(args: RunArgs) -> Result<()> {
    let ctx = RepoContext::resolve()?;
    let mut config = Config::load_or_default(ctx.config_path())?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let feature_request = load_feature_request(&args)?;
    let request_id = resolve_request_id(args.request_id.as_deref(), Utc::now())?;
    info!(request_id = %request_id, fan_out = config.fan_out, "starting run");

    let implementer = CommandAgent::new(config.implementer.clone());
    let judge = CommandAgent::new(config.judge_profile().clone());
    let publisher = GhCliPublisher::new(&config.publish);
    let agents = Collaborators {
        implementer: &implementer,
        judge: &judge,
        publisher: config
            .publish
            .enabled
            .then_some(&publisher as &dyn ChangeRequestPublisher),
    };

    let report = execute_run(&ctx, &config, &request_id, &feature_request, agents)?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }

    match &report.outcome {
        RunOutcome::Succeeded { .. } => Ok(()),
        RunOutcome::Failed { phase, reason, .. } => Err(BakeoffError::RunFailed {
            phase: phase.to_string(),
            reason: reason.clone(),
            exit_code: report.exit_code(),
        }),
    }
}

/// CLI flags win over config values.
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(fan_out) = args.fan_out {
        config.fan_out = fan_out;
    }
    if let Some(base_ref) = &args.base_ref {
        config.base_ref = base_ref.clone();
    }
    if args.no_publish {
        config.publish.enabled = false;
    }
}

fn load_feature_request(args: &RunArgs) -> Result<String> {
    let text = match (&args.feature_request, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => read_input(path)?,
        (None, None) => String::new(),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(BakeoffError::UserError(
            "feature request is empty".to_string(),
        ));
    }
    Ok(text.to_string())
}

/// Normalize a caller-supplied request id, or generate one from `now`.
fn resolve_request_id(supplied: Option<&str>, now: DateTime<Utc>) -> Result<String> {
    match supplied {
        None => Ok(generate_request_id(now)),
        Some(raw) => normalize_request_id(raw).ok_or_else(|| {
            BakeoffError::UserError(format!(
                "request id '{}' has no usable characters (use letters, digits and '-')",
                raw
            ))
        }),
    }
}
