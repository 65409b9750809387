//! Decides what happens after each attempt.
//!
//! One evaluation runs a goal check first. If the goal is not met, the next
//! step depends on whether commands are still queued:
//!
//! - queue empty: ask for the next batch (`NONE` ends the session);
//! - queue pending: ask for PROCEED / MODIFY / STOP.
//!
//! Every model call here is made without retrieval context.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::decision::{GoalMatcher, parse_next_commands, parse_queue_choice};
use crate::core::shortcuts::ShortcutTable;
use crate::core::types::{Decision, QueueChoice, StopReason};
use crate::io::debug_log::DebugLog;
use crate::io::embeddings::Embedder;
use crate::io::llm::LanguageModel;
use crate::io::prompt::PromptBuilder;
use crate::io::vector_store::VectorStore;

/// The session's view of the evaluator.
pub trait Evaluate {
    /// Decide the next step after an attempt.
    fn evaluate(
        &self,
        log: &str,
        request: &str,
        remaining: &[String],
        had_error: bool,
    ) -> Result<Decision>;

    /// Conversational answer for a request whose goal was achieved.
    fn final_answer(&self, log: &str, request: &str) -> Result<String>;

    /// Persist a finished session transcript for future retrieval.
    fn store_session(&self, log: &str) -> Result<()>;
}

/// Where finished transcripts are stored.
struct HistorySink {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

/// Evaluator backed by a language model.
pub struct AiEvaluator {
    llm: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
    matcher: GoalMatcher,
    shortcuts: ShortcutTable,
    debug_log: DebugLog,
    history: Option<HistorySink>,
}

impl AiEvaluator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            prompts: PromptBuilder::new(),
            matcher: GoalMatcher::default(),
            shortcuts: ShortcutTable::builtin(),
            debug_log: DebugLog::disabled(),
            history: None,
        }
    }

    pub fn with_matcher(mut self, matcher: GoalMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_shortcuts(mut self, shortcuts: ShortcutTable) -> Self {
        self.shortcuts = shortcuts;
        self
    }

    pub fn with_debug_log(mut self, debug_log: DebugLog) -> Self {
        self.debug_log = debug_log;
        self
    }

    /// Store finished transcripts in `collection`.
    pub fn with_history(
        mut self,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        self.history = Some(HistorySink {
            embedder,
            store,
            collection: collection.into(),
        });
        self
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        self.llm.generate(prompt, None)
    }

    fn goal_achieved(&self, log: &str, request: &str) -> Result<bool> {
        if let Some(name) = self.shortcuts.goal_shortcut(request, log) {
            debug!(shortcut = name, "goal achieved by shortcut");
            self.debug_log
                .write("GOAL ACHIEVEMENT CHECK", &format!("shortcut '{name}' matched"));
            return Ok(true);
        }
        let prompt = self.prompts.goal_check(request, log)?;
        self.debug_log
            .write("GOAL ACHIEVEMENT CHECK", &format!("Prompt: {prompt}"));
        let reply = match self.ask(&prompt) {
            Ok(reply) => reply,
            Err(err) => {
                self.debug_log
                    .write("GOAL ACHIEVEMENT ERROR", &format!("{err:#}"));
                return Err(err);
            }
        };
        let achieved = self.matcher.is_affirmative(&reply);
        self.debug_log.write(
            "GOAL ACHIEVEMENT RESPONSE",
            &format!("'{}' -> {achieved}", reply.trim()),
        );
        Ok(achieved)
    }

    fn next_commands(&self, log: &str, request: &str, had_error: bool) -> Result<Decision> {
        let prompt = self.prompts.next_commands(request, log, had_error)?;
        let reply = self.ask(&prompt)?;
        let commands = parse_next_commands(&reply);
        if commands.is_empty() {
            return Ok(Decision::Stop(StopReason::NothingToDo));
        }
        Ok(Decision::Continue(commands))
    }

    fn queue_decision(
        &self,
        log: &str,
        request: &str,
        remaining: &[String],
        had_error: bool,
    ) -> Result<Decision> {
        let prompt = self
            .prompts
            .queue_decision(request, log, remaining, had_error)?;
        let reply = self.ask(&prompt)?;
        let choice = parse_queue_choice(&reply);
        debug!(?choice, "queue decision");
        Ok(match choice {
            QueueChoice::Proceed => Decision::Continue(remaining.to_vec()),
            QueueChoice::Modify(commands) if commands.is_empty() => {
                Decision::Stop(StopReason::EmptyModification)
            }
            QueueChoice::Modify(commands) => Decision::Continue(commands),
            QueueChoice::Stop => Decision::Stop(StopReason::ModelStopped),
        })
    }
}

impl Evaluate for AiEvaluator {
    #[instrument(skip_all, fields(remaining = remaining.len(), had_error = had_error))]
    fn evaluate(
        &self,
        log: &str,
        request: &str,
        remaining: &[String],
        had_error: bool,
    ) -> Result<Decision> {
        self.debug_log.write(
            "EVALUATION START",
            &format!(
                "Original Request: {request}\nHad Error: {had_error}\nRemaining Commands: {remaining:?}\nExecution Log: {log}"
            ),
        );

        if self
            .goal_achieved(log, request)
            .context("check goal achievement")?
        {
            info!("goal achieved");
            return Ok(Decision::Stop(StopReason::GoalAchieved));
        }

        let decision = if remaining.is_empty() {
            self.next_commands(log, request, had_error)
                .context("determine next commands")?
        } else {
            self.queue_decision(log, request, remaining, had_error)
                .context("evaluate command queue")?
        };
        debug!(?decision, "evaluation finished");
        Ok(decision)
    }

    #[instrument(skip_all)]
    fn final_answer(&self, log: &str, request: &str) -> Result<String> {
        if let Some((name, answer)) = self.shortcuts.direct_answer(request, log) {
            debug!(shortcut = name, "final answer from shortcut");
            return Ok(answer);
        }
        let prompt = self.prompts.final_answer(request, log)?;
        self.debug_log
            .write("FINAL ANSWER GENERATION", &format!("Prompt: {prompt}"));
        let reply = self.ask(&prompt).context("generate final answer")?;
        let answer = reply.trim().to_string();
        self.debug_log
            .write("FINAL ANSWER RESPONSE", &format!("'{answer}'"));
        Ok(answer)
    }

    #[instrument(skip_all, fields(log_len = log.len()))]
    fn store_session(&self, log: &str) -> Result<()> {
        let Some(history) = &self.history else {
            debug!("session history disabled");
            return Ok(());
        };
        let summary = format!("Command execution session:\n{log}");
        let vector = history
            .embedder
            .embed(&summary)
            .context("embed execution session")?;
        let id = session_id();
        history
            .store
            .upsert(&history.collection, &id, &summary, &vector)
            .context("store execution session")?;
        debug!(id = %id, "session stored");
        Ok(())
    }
}

/// Time-derived session id, unique at microsecond resolution.
pub fn session_id() -> String {
    format!("cmd_session_{}", Utc::now().format("%Y%m%dT%H%M%S%.6f"))
}

/// Persist `log` through `evaluator`, logging instead of failing.
pub fn store_best_effort(evaluator: &dyn Evaluate, log: &str) {
    if let Err(err) = evaluator.store_session(log) {
        warn!(err = %format!("{err:#}"), "failed to store execution session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedEmbedder, MemoryStore, ScriptedModel};

    const LS_LOG: &str = "$ ls\na.txt\n\n";

    fn evaluator(model: &Arc<ScriptedModel>) -> AiEvaluator {
        AiEvaluator::new(model.clone())
    }

    #[test]
    fn affirmative_goal_check_stops() {
        let model = Arc::new(ScriptedModel::new(["Yes, the goal was achieved."]));
        let decision = evaluator(&model)
            .evaluate(LS_LOG, "list files", &[], false)
            .expect("evaluate");
        assert_eq!(decision, Decision::Stop(StopReason::GoalAchieved));
        assert_eq!(model.calls(), 1);
        assert!(model.contexts().iter().all(Option::is_none));
    }

    #[test]
    fn empty_queue_asks_for_next_commands() {
        let model = Arc::new(ScriptedModel::new(["NO", "mkdir out\ntouch out/a"]));
        let decision = evaluator(&model)
            .evaluate(LS_LOG, "make out/a", &[], false)
            .expect("evaluate");
        assert_eq!(
            decision,
            Decision::Continue(vec!["mkdir out".to_string(), "touch out/a".to_string()])
        );
        assert!(model.prompts()[1].contains("The previous commands succeeded."));
    }

    #[test]
    fn none_reply_ends_the_session() {
        let model = Arc::new(ScriptedModel::new(["NO", " none "]));
        let decision = evaluator(&model)
            .evaluate(LS_LOG, "x", &[], true)
            .expect("evaluate");
        assert_eq!(decision, Decision::Stop(StopReason::NothingToDo));
        assert!(model.prompts()[1].contains("The last command failed."));
    }

    #[test]
    fn proceed_keeps_the_queue() {
        let model = Arc::new(ScriptedModel::new(["NO", "PROCEED"]));
        let remaining = vec!["touch b".to_string()];
        let decision = evaluator(&model)
            .evaluate(LS_LOG, "x", &remaining, false)
            .expect("evaluate");
        assert_eq!(decision, Decision::Continue(remaining));
    }

    #[test]
    fn modify_replaces_the_queue_or_stops_when_empty() {
        let model = Arc::new(ScriptedModel::new(["NO", "MODIFY\nls -la", "NO", "MODIFY\n$ nothing"]));
        let ev = evaluator(&model);
        let remaining = vec!["touch b".to_string()];
        assert_eq!(
            ev.evaluate(LS_LOG, "x", &remaining, true).expect("evaluate"),
            Decision::Continue(vec!["ls -la".to_string()])
        );
        assert_eq!(
            ev.evaluate(LS_LOG, "x", &remaining, true).expect("evaluate"),
            Decision::Stop(StopReason::EmptyModification)
        );
    }

    #[test]
    fn unrecognized_queue_reply_stops() {
        let model = Arc::new(ScriptedModel::new(["NO", "Let me think about it"]));
        let decision = evaluator(&model)
            .evaluate(LS_LOG, "x", &["ls".to_string()], false)
            .expect("evaluate");
        assert_eq!(decision, Decision::Stop(StopReason::ModelStopped));
    }

    #[test]
    fn time_shortcut_skips_the_model() {
        let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
        let log = "$ date\nSat Jul 12 00:10:49 EDT 2025\n\n";
        let ev = evaluator(&model);
        assert_eq!(
            ev.evaluate(log, "what time is it?", &[], false).expect("evaluate"),
            Decision::Stop(StopReason::GoalAchieved)
        );
        assert_eq!(
            ev.final_answer(log, "what time is it?").expect("answer"),
            "The current time is 12:10 AM."
        );
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn disabled_shortcuts_ask_the_model() {
        let model = Arc::new(ScriptedModel::new(["NO", "NONE"]));
        let ev = evaluator(&model).with_shortcuts(ShortcutTable::disabled());
        let log = "$ date\nSat Jul 12 00:10:49 EDT 2025\n\n";
        assert_eq!(
            ev.evaluate(log, "what time is it?", &[], false).expect("evaluate"),
            Decision::Stop(StopReason::NothingToDo)
        );
        assert_eq!(model.calls(), 2);
    }

    #[test]
    fn model_failure_is_an_error() {
        let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
        let err = evaluator(&model)
            .evaluate(LS_LOG, "x", &[], false)
            .expect_err("no scripted reply");
        assert!(format!("{err:#}").contains("check goal achievement"));
    }

    #[test]
    fn final_answer_falls_back_to_model() {
        let model = Arc::new(ScriptedModel::new(["  There is one file: a.txt.  "]));
        let answer = evaluator(&model)
            .final_answer(LS_LOG, "what files are here?")
            .expect("answer");
        assert_eq!(answer, "There is one file: a.txt.");
        assert!(model.prompts()[0].contains("User asked: what files are here?"));
    }

    #[test]
    fn stores_session_summary_in_history() {
        let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
        let store = Arc::new(MemoryStore::default());
        let ev = evaluator(&model).with_history(
            Arc::new(FixedEmbedder::default()),
            store.clone(),
            "command_history",
        );
        ev.store_session(LS_LOG).expect("store");
        let docs = store.documents("command_history");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, format!("Command execution session:\n{LS_LOG}"));
        assert!(docs[0].id.starts_with("cmd_session_"));
    }

    #[test]
    fn debug_log_records_goal_check() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("eval.log");
        let model = Arc::new(ScriptedModel::new(["YES"]));
        let ev = evaluator(&model).with_debug_log(DebugLog::to_file(&path));
        ev.evaluate(LS_LOG, "list files", &[], false).expect("evaluate");
        let contents = std::fs::read_to_string(&path).expect("read");
        assert!(contents.contains("EVALUATION START"));
        assert!(contents.contains("'YES' -> true"));
    }
}
