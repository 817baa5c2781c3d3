//! Implementation of the `bakeoff verdict` command.
//!
//! Runs the verdict parser over a saved judge response, so a failed
//! decision can be diagnosed (or a prompt tuned) without another run.

use super::read_input;
use crate::cli::VerdictArgs;
use crate::decision::{Decision, ParsedVerdict, parse_verdict};
use crate::error::{BakeoffError, Result};
use std::path::Path;

/// Execute the `bakeoff verdict` command.
pub fn cmd_verdict(args: VerdictArgs) -> Result<()> {
    let response = read_input(Path::new(&args.input))?;
    let verdict = evaluate(&response, &args.candidates)?;

    if args.json {
        let json = serde_json::to_string_pretty(&verdict)
            .map_err(|e| BakeoffError::UserError(format!("failed to serialize verdict: {}", e)))?;
        println!("{}", json);
    } else {
        println!("Winner:       task {}", verdict.winning_task_id);
        println!("Quality:      {}", verdict.quality_score);
        println!("Completeness: {}", verdict.completeness_score);
        println!("Strategy:     {}", verdict.strategy);
        if !verdict.reasoning.is_empty() {
            println!();
            println!("{}", verdict.reasoning);
        }
    }
    Ok(())
}

/// Parse `response`; with candidates, also require the winner to be one of them.
fn evaluate(response: &str, candidates: &[u32]) -> Result<ParsedVerdict> {
    if candidates.is_empty() {
        return parse_verdict(response).map_err(|e| BakeoffError::decision(e.to_string(), response));
    }

    let decision = Decision::from_response(response, candidates)?;
    Ok(ParsedVerdict {
        winning_task_id: decision.winning_task_id,
        reasoning: decision.reasoning,
        quality_score: decision.quality_score,
        completeness_score: decision.completeness_score,
        strategy: decision.extraction_strategy,
    })
}
