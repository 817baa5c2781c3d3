//! Tests for the decision engine.

use crate::agent::AgentPermissions;
use crate::decision::{Decision, DecisionEngine, ExtractionStrategy};
use crate::error::BakeoffError;
use crate::prompt::Candidate;
use crate::test_support::{ScriptedAgent, failure};
use std::time::Duration;
use tempfile::TempDir;

const VERDICT: &str = r#"{"winning_task_id": 2, "reasoning": "Only attempt with tests", "quality_score": 90, "completeness_score": 95}"#;

fn candidates(ids: &[u32]) -> Vec<Candidate> {
    ids.iter()
        .map(|&id| Candidate {
            task_id: id,
            branch: format!("bakeoff/r1/task-{}", id),
            output: format!("attempt {} summary", id),
        })
        .collect()
}

fn engine<'a>(judge: &'a ScriptedAgent, temp_dir: &TempDir) -> DecisionEngine<'a> {
    DecisionEngine::new(
        judge,
        temp_dir.path().to_path_buf(),
        temp_dir.path().join("run"),
        Duration::from_secs(30),
    )
}

fn decision_error(err: BakeoffError) -> (String, String) {
    match err {
        BakeoffError::DecisionError {
            reason,
            raw_response,
        } => (reason, raw_response),
        other => panic!("expected DecisionError, got {:?}", other),
    }
}

#[test]
fn test_same_decision_from_every_strategy() {
    let responses = [
        (VERDICT.to_string(), ExtractionStrategy::Direct),
        (
            format!("Here is my verdict:\n\n```json\n{}\n```\n", VERDICT),
            ExtractionStrategy::FencedBlock,
        ),
        (
            format!("Task 2 is best. {} Thanks for reading.", VERDICT),
            ExtractionStrategy::EmbeddedObject,
        ),
    ];

    for (response, strategy) in responses {
        let decision = Decision::from_response(&response, &[1, 2, 3]).unwrap();
        assert_eq!(decision.winning_task_id, 2);
        assert_eq!(decision.reasoning, "Only attempt with tests");
        assert_eq!(decision.quality_score, 90.0);
        assert_eq!(decision.completeness_score, 95.0);
        assert_eq!(decision.extraction_strategy, strategy);
    }
}

#[test]
fn test_prose_response_is_error_with_verbatim_response() {
    let prose = "All three attempts are reasonable; I slightly prefer the second one.";
    let (reason, raw) = decision_error(Decision::from_response(prose, &[1, 2, 3]).unwrap_err());
    assert!(reason.contains("no structured verdict"));
    assert_eq!(raw, prose);
}

#[test]
fn test_winner_outside_completed_set_is_not_coerced() {
    let (reason, raw) = decision_error(Decision::from_response(VERDICT, &[1, 3]).unwrap_err());
    assert!(reason.contains("judge named task 2"));
    assert!(reason.contains("completed: 1, 3"));
    assert_eq!(raw, VERDICT);

    let nonexistent = r#"{"winning_task_id": 7, "quality_score": 1, "completeness_score": 1}"#;
    assert!(Decision::from_response(nonexistent, &[1, 2, 3]).is_err());
}

#[test]
fn test_engine_invokes_judge_once_read_only_in_repo() {
    let temp_dir = TempDir::new().unwrap();
    let judge = ScriptedAgent::replying(VERDICT);

    let decision = engine(&judge, &temp_dir)
        .decide("Add a login page", &candidates(&[1, 2, 3]))
        .unwrap();

    assert_eq!(decision.winning_task_id, 2);
    assert_eq!(judge.calls(), 1);
    let request = &judge.requests()[0];
    assert_eq!(request.permissions, AgentPermissions::read_only());
    assert_eq!(request.working_directory, temp_dir.path());
    assert_eq!(request.label, "judge");
    assert!(request.prompt.contains("Add a login page"));
    assert!(request.prompt.contains("### Task 3"));
}

#[test]
fn test_engine_single_candidate() {
    let temp_dir = TempDir::new().unwrap();
    let judge = ScriptedAgent::replying(VERDICT);

    let decision = engine(&judge, &temp_dir)
        .decide("x", &candidates(&[2]))
        .unwrap();
    assert_eq!(decision.winning_task_id, 2);

    let prompt = &judge.requests()[0].prompt;
    assert!(prompt.contains("### Task 2"));
    assert!(!prompt.contains("### Task 1"));
}

#[test]
fn test_engine_judge_failure_is_decision_error() {
    let temp_dir = TempDir::new().unwrap();
    let judge = ScriptedAgent::new(|_| Ok(vec![failure("rate limited")]));

    let (reason, _) = decision_error(
        engine(&judge, &temp_dir)
            .decide("x", &candidates(&[1]))
            .unwrap_err(),
    );
    assert!(reason.contains("rate limited"));
}

#[test]
fn test_engine_judge_start_failure_is_decision_error() {
    let temp_dir = TempDir::new().unwrap();
    let judge = ScriptedAgent::new(|_| {
        Err(BakeoffError::AgentError("no such binary".to_string()))
    });

    let (reason, _) = decision_error(
        engine(&judge, &temp_dir)
            .decide("x", &candidates(&[1]))
            .unwrap_err(),
    );
    assert!(reason.contains("could not be started"));
}

#[test]
fn test_engine_without_candidates_never_calls_judge() {
    let temp_dir = TempDir::new().unwrap();
    let judge = ScriptedAgent::replying(VERDICT);

    assert!(engine(&judge, &temp_dir).decide("x", &[]).is_err());
    assert_eq!(judge.calls(), 0);
}

#[test]
fn test_engine_custom_review_template() {
    let temp_dir = TempDir::new().unwrap();
    let judge = ScriptedAgent::replying(VERDICT);

    engine(&judge, &temp_dir)
        .with_review_template(Some("Pick from {candidate_ids}".to_string()))
        .decide("x", &candidates(&[1, 2]))
        .unwrap();
    assert_eq!(judge.requests()[0].prompt, "Pick from 1, 2");
}
