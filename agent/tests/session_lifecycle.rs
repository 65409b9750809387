//! End-to-end session scenarios.
//!
//! These drive `AgentSession` with scripted collaborators and, where the
//! scenario touches the filesystem, the real shell executor inside a temporary
//! directory.

use std::fs;
use std::sync::Arc;

use agent::core::types::{Decision, SessionOutcome, StopReason};
use agent::evaluator::AiEvaluator;
use agent::io::auto_index::{AutoIndexer, ChangeDetector, TrackRules};
use agent::io::config::{AutoIndexConfig, SessionConfig};
use agent::io::executor::ShellExecutor;
use agent::io::index_worker::IndexWorker;
use agent::session::AgentSession;
use agent::test_support::{
    FixedEmbedder, MemoryStore, RecordingRunner, ScriptedConsole, ScriptedEvaluator,
    ScriptedModel,
};

fn auto_approve(max_attempts: u32) -> SessionConfig {
    SessionConfig {
        auto_approve: true,
        max_attempts,
        ..SessionConfig::default()
    }
}

/// Request → command → goal check → final answer, against a real shell.
#[test]
fn creates_file_and_answers() {
    let temp = tempfile::tempdir().expect("tempdir");
    let model = Arc::new(ScriptedModel::new([
        "echo 'hi' > hello.txt",
        "YES",
        "I created hello.txt containing hi.",
    ]));
    let session = AgentSession::new(
        auto_approve(3),
        model.clone(),
        Arc::new(ShellExecutor::in_dir(temp.path())),
        Box::new(AiEvaluator::new(model.clone())),
    );
    let mut console = ScriptedConsole::approving();

    let report = session
        .handle_prompt("create hello.txt containing hi", &mut console)
        .expect("handle");

    assert_eq!(
        fs::read_to_string(temp.path().join("hello.txt")).expect("read"),
        "hi\n"
    );
    assert_eq!(
        report.outcome,
        SessionOutcome::Finished(StopReason::GoalAchieved)
    );
    assert!(report.succeeded());
    assert_eq!(report.attempts, 1);
    assert_eq!(
        report.answer.as_deref(),
        Some("I created hello.txt containing hi.")
    );
    assert!(report.log.as_str().starts_with("$ echo 'hi' > hello.txt\n"));
    assert_eq!(model.calls(), 3);
}

/// An evaluator that always continues runs exactly `max_attempts` attempts.
#[test]
fn attempt_budget_bounds_the_loop() {
    let model = Arc::new(ScriptedModel::new(["false"]));
    let runner = Arc::new(RecordingRunner::failing_on(["false"]));
    let evaluator = ScriptedEvaluator::always(Decision::Continue(vec!["false".to_string()]));
    let handle = evaluator.handle();
    let session = AgentSession::new(auto_approve(3), model, runner.clone(), Box::new(evaluator));
    let mut console = ScriptedConsole::approving();

    let report = session
        .handle_prompt("make it work", &mut console)
        .expect("handle");

    assert_eq!(handle.evaluations(), 3);
    assert_eq!(runner.executed().len(), 3);
    assert_eq!(
        report.outcome,
        SessionOutcome::BudgetExhausted {
            remaining: vec!["false".to_string()]
        }
    );
    assert!(
        report
            .log
            .as_str()
            .contains("Max attempts (3) reached. Remaining commands not executed.")
    );
    assert!(handle.calls().iter().all(|call| call.had_error));
    assert_eq!(handle.stored().len(), 1);
}

/// Declining the second of three commands cancels the request.
#[test]
fn denial_stops_before_the_remaining_commands() {
    let model = Arc::new(ScriptedModel::new(["touch a\ntouch b\ntouch c"]));
    let runner = Arc::new(RecordingRunner::succeeding());
    let evaluator = ScriptedEvaluator::new(Vec::new());
    let handle = evaluator.handle();
    let session = AgentSession::new(
        SessionConfig::default(),
        model,
        runner.clone(),
        Box::new(evaluator),
    );
    let mut console = ScriptedConsole::answering([true, false]);

    let report = session
        .handle_prompt("make three files", &mut console)
        .expect("handle");

    assert_eq!(runner.executed(), vec!["touch a"]);
    assert_eq!(console.confirmations, vec!["touch a", "touch b"]);
    assert_eq!(
        report.outcome,
        SessionOutcome::Denied {
            command: "touch b".to_string()
        }
    );
    assert_eq!(handle.evaluations(), 0);
    let stored = handle.stored();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].contains("Command execution cancelled by user: touch b"));
}

/// A file written by a command reaches the auto-index collection once.
#[test]
fn auto_index_picks_up_written_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("existing.md"), "old").expect("write");

    let rules = TrackRules::from_config(&AutoIndexConfig::default())
        .expect("rules")
        .with_enabled(true);
    let detector = ChangeDetector::new(temp.path(), rules);
    detector.take_snapshot().expect("snapshot");

    let store = Arc::new(MemoryStore::default());
    let indexer = Arc::new(AutoIndexer::new(
        detector,
        Arc::new(FixedEmbedder::default()),
        store.clone(),
        "auto_indexed",
    ));
    let worker = IndexWorker::spawn(indexer.clone()).expect("spawn");

    let model = Arc::new(ScriptedModel::new(["echo notes > notes.txt"]));
    let mut session = AgentSession::new(
        SessionConfig {
            auto_index: true,
            ..auto_approve(3)
        },
        model,
        Arc::new(ShellExecutor::in_dir(temp.path())),
        Box::new(ScriptedEvaluator::new(vec![Decision::Stop(
            StopReason::GoalAchieved,
        )])),
    )
    .with_index_worker(worker);
    let mut console = ScriptedConsole::approving();

    session
        .handle_prompt("write some notes", &mut console)
        .expect("handle");
    session.shutdown().expect("shutdown");

    let docs = store.documents("auto_indexed");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].text, "notes\n");
    assert!(docs[0].id.starts_with("auto_notes.txt_"));
    assert!(
        indexer
            .detector()
            .detect_changes()
            .expect("detect")
            .is_empty()
    );
    assert_eq!(
        indexer.detector().tracked_paths().expect("tracked"),
        vec!["existing.md", "notes.txt"]
    );
}
