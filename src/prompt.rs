//! Built-in prompt templates and their rendering.
//!
//! Both templates can be replaced through `prompts.implementation` and
//! `prompts.review` in config. Implementation templates may use
//! `{feature_request}`, `{task_id}`, `{fan_out}` and `{branch}`; review
//! templates may use `{feature_request}`, `{candidates}` and
//! `{candidate_ids}`. Literal braces are written `{{` and `}}`.

use crate::agent::{TemplateError, render_template, vars};
use crate::error::{BakeoffError, Result};

pub const DEFAULT_IMPLEMENTATION_TEMPLATE: &str = "\
You are one of {fan_out} independent engineers implementing the same feature \
request in separate copies of this repository. Your attempt is task {task_id} \
on branch `{branch}`.

## Feature request

{feature_request}

## Instructions

- Make the change directly in the current working directory.
- Keep the change focused on the request; do not reformat unrelated code.
- Add or update tests where the project has them, and run them if you can.
- Do not commit, push, or switch branches; your edits are collected for you.
- Finish with a short summary of what you changed and why. That summary is \
shown to the reviewer who compares all attempts.
";

pub const DEFAULT_REVIEW_TEMPLATE: &str = "\
You are reviewing independent attempts at the same feature request and must \
pick the single best one. You may read the repository, but do not modify it.

## Feature request

{feature_request}

## Attempts

{candidates}

## Verdict

Judge each attempt on correctness, completeness against the request, and \
code quality. Then answer with exactly one JSON object and nothing after it:

```json
{{
  \"winning_task_id\": <one of {candidate_ids}>,
  \"reasoning\": \"<why this attempt is best>\",
  \"quality_score\": <0-100>,
  \"completeness_score\": <0-100>
}}
```
";

/// A completed attempt as shown to the judge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub task_id: u32,
    pub branch: String,
    pub output: String,
}

/// Render the prompt for one implementation attempt.
pub fn implementation_prompt(
    template: Option<&str>,
    feature_request: &str,
    task_id: u32,
    fan_out: u32,
    branch: &str,
) -> Result<String> {
    let variables = vars([
        ("feature_request", feature_request.to_string()),
        ("task_id", task_id.to_string()),
        ("fan_out", fan_out.to_string()),
        ("branch", branch.to_string()),
    ]);
    render_template(template.unwrap_or(DEFAULT_IMPLEMENTATION_TEMPLATE), &variables)
        .map_err(|e| template_error("implementation", e))
}

/// Render the judge prompt embedding every candidate, tagged with its task id.
pub fn review_prompt(
    template: Option<&str>,
    feature_request: &str,
    candidates: &[Candidate],
) -> Result<String> {
    let ids = candidates
        .iter()
        .map(|c| c.task_id.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let variables = vars([
        ("feature_request", feature_request.to_string()),
        ("candidates", render_candidates(candidates)),
        ("candidate_ids", ids),
    ]);
    render_template(template.unwrap_or(DEFAULT_REVIEW_TEMPLATE), &variables)
        .map_err(|e| template_error("review", e))
}

fn render_candidates(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| {
            format!(
                "### Task {} (branch `{}`)\n\n{}\n",
                c.task_id,
                c.branch,
                c.output.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn template_error(which: &str, e: TemplateError) -> BakeoffError {
    BakeoffError::ConfigError(format!("{} prompt template: {}", which, e))
}
