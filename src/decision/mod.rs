//! Decision engine: one judge invocation over the completed attempts.
//!
//! Verdict extraction ([`parse_verdict`]) is a pure function over the judge's
//! text. [`DecisionEngine`] builds the review prompt, runs the judge read-only
//! in the canonical repository and validates the named winner against the
//! completed set.

mod engine;
mod verdict;

#[cfg(test)]
mod tests;

pub use engine::{Decision, DecisionEngine};
pub use verdict::{ExtractionStrategy, ParsedVerdict, VerdictParseError, parse_verdict};
