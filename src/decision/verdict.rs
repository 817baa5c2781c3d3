//! Verdict extraction from free-form judge text.
//!
//! Extraction is layered; the first strategy that yields a verdict wins:
//!
//! 1. [`ExtractionStrategy::Direct`]: the whole response is a verdict object
//! 2. [`ExtractionStrategy::FencedBlock`]: a fenced code block holds one
//! 3. [`ExtractionStrategy::EmbeddedObject`]: the first JSON object in the
//!    raw text that carries a winning-task field
//!
//! A verdict-shaped object with unusable fields is skipped and noted; it
//! never stops the search.
//!
//! Parsing is pure. Whether the named task is an acceptable winner is the
//! caller's concern.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").expect("valid fenced block regex")
});

const WINNER_KEYS: &[&str] = &[
    "winning_task_id",
    "winningTaskId",
    "winner",
    "winning_task",
    "winningTask",
    "winner_task_id",
];

/// Which layer produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    Direct,
    FencedBlock,
    EmbeddedObject,
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionStrategy::Direct => "direct",
            ExtractionStrategy::FencedBlock => "fenced_block",
            ExtractionStrategy::EmbeddedObject => "embedded_object",
        };
        f.write_str(name)
    }
}

/// A structurally valid verdict, not yet checked against the candidates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedVerdict {
    pub winning_task_id: u32,
    pub reasoning: String,
    pub quality_score: f64,
    pub completeness_score: f64,
    pub strategy: ExtractionStrategy,
}

/// A verdict-shaped object one strategy found but could not use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedCandidate {
    pub strategy: ExtractionStrategy,
    pub message: String,
}

impl fmt::Display for RejectedCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.message)
    }
}

fn join_rejected(rejected: &[RejectedCandidate]) -> String {
    rejected
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerdictParseError {
    #[error("judge response is empty")]
    Empty,

    #[error("no structured verdict found in judge response")]
    NotFound,

    /// Every strategy failed, and at least one found a verdict-shaped
    /// object with unusable fields.
    #[error("malformed verdict ({})", join_rejected(.0))]
    Malformed(Vec<RejectedCandidate>),
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(alias = "winningTaskId")]
    #[serde(alias = "winner")]
    #[serde(alias = "winning_task")]
    #[serde(alias = "winningTask")]
    #[serde(alias = "winner_task_id")]
    winning_task_id: TaskRef,

    #[serde(default, alias = "reason", alias = "rationale")]
    reasoning: Option<String>,

    #[serde(alias = "qualityScore", alias = "quality")]
    quality_score: Score,

    #[serde(alias = "completenessScore", alias = "completeness")]
    completeness_score: Score,
}

/// Judges write task ids as `2`, `"2"`, `"task-2"` or `"#2"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaskRef {
    Number(u64),
    Text(String),
}

impl TaskRef {
    fn resolve(&self) -> Result<u32, String> {
        match self {
            TaskRef::Number(n) => {
                u32::try_from(*n).map_err(|_| format!("task id {} is out of range", n))
            }
            TaskRef::Text(s) => {
                let trimmed = s.trim();
                let lower = trimmed.to_ascii_lowercase();
                let digits = ["task-", "task ", "task", "#"]
                    .iter()
                    .find_map(|p| lower.strip_prefix(p))
                    .unwrap_or(lower.as_str())
                    .trim();
                digits
                    .parse::<u32>()
                    .map_err(|_| format!("'{}' is not a task id", trimmed))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Score {
    Number(f64),
    Text(String),
}

impl Score {
    fn resolve(&self, field: &str) -> Result<f64, String> {
        let value = match self {
            Score::Number(n) => *n,
            Score::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("{} '{}' is not a number", field, s))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("{} must be a finite number", field))
        }
    }
}

impl RawVerdict {
    fn finish(self, strategy: ExtractionStrategy) -> Result<ParsedVerdict, String> {
        Ok(ParsedVerdict {
            winning_task_id: self.winning_task_id.resolve()?,
            reasoning: self.reasoning.unwrap_or_default().trim().to_string(),
            quality_score: self.quality_score.resolve("quality_score")?,
            completeness_score: self.completeness_score.resolve("completeness_score")?,
            strategy,
        })
    }
}

fn has_winner_key(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| WINNER_KEYS.iter().any(|k| obj.contains_key(*k)))
}

/// Collects the candidates a strategy rejected so the final error can list them.
struct Attempt<'a> {
    strategy: ExtractionStrategy,
    rejected: &'a mut Vec<RejectedCandidate>,
}

impl Attempt<'_> {
    fn try_text(&mut self, text: &str) -> Option<ParsedVerdict> {
        let value = serde_json::from_str::<Value>(text.trim()).ok()?;
        self.try_value(value)
    }

    /// A rejected candidate is recorded and scanning continues.
    fn try_value(&mut self, value: Value) -> Option<ParsedVerdict> {
        if !has_winner_key(&value) {
            return None;
        }
        let parsed = serde_json::from_value::<RawVerdict>(value)
            .map_err(|e| e.to_string())
            .and_then(|raw| raw.finish(self.strategy));
        match parsed {
            Ok(verdict) => Some(verdict),
            Err(message) => {
                self.rejected.push(RejectedCandidate {
                    strategy: self.strategy,
                    message,
                });
                None
            }
        }
    }
}

fn direct(text: &str, attempt: &mut Attempt<'_>) -> Option<ParsedVerdict> {
    attempt.try_text(text)
}

fn fenced_block(text: &str, attempt: &mut Attempt<'_>) -> Option<ParsedVerdict> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|body| attempt.try_text(body.as_str()))
}

fn embedded_object(text: &str, attempt: &mut Attempt<'_>) -> Option<ParsedVerdict> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => attempt.try_value(value),
            _ => None,
        }
    })
}

type Strategy = fn(&str, &mut Attempt<'_>) -> Option<ParsedVerdict>;

const STRATEGIES: &[(ExtractionStrategy, Strategy)] = &[
    (ExtractionStrategy::Direct, direct),
    (ExtractionStrategy::FencedBlock, fenced_block),
    (ExtractionStrategy::EmbeddedObject, embedded_object),
];

/// Extract a structured verdict from a judge response.
///
/// A candidate with unusable fields does not stop extraction; the next
/// candidate and then the next strategy are tried.
pub fn parse_verdict(text: &str) -> Result<ParsedVerdict, VerdictParseError> {
    if text.trim().is_empty() {
        return Err(VerdictParseError::Empty);
    }

    let mut rejected = Vec::new();
    for (strategy, extract) in STRATEGIES {
        let mut attempt = Attempt {
            strategy: *strategy,
            rejected: &mut rejected,
        };
        if let Some(verdict) = extract(text, &mut attempt) {
            return Ok(verdict);
        }
    }

    if rejected.is_empty() {
        Err(VerdictParseError::NotFound)
    } else {
        Err(VerdictParseError::Malformed(rejected))
    }
}
