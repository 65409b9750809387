//! Scripted collaborators for driving the session and evaluator in tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow, bail};

use crate::core::types::{Decision, ExecutionResult};
use crate::evaluator::Evaluate;
use crate::io::embeddings::Embedder;
use crate::io::executor::CommandRunner;
use crate::io::llm::LanguageModel;
use crate::io::vector_store::{VectorStore, document_id};
use crate::session::{Interaction, SessionEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Language model that replays canned replies and records every call.
///
/// Runs out of replies with an error.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    contexts: Mutex<Vec<Option<Vec<String>>>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        lock(&self.prompts).len()
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn contexts(&self) -> Vec<Option<Vec<String>>> {
        lock(&self.contexts).clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn generate(&self, prompt: &str, context: Option<&[String]>) -> Result<String> {
        lock(&self.prompts).push(prompt.to_string());
        lock(&self.contexts).push(context.map(<[String]>::to_vec));
        lock(&self.replies)
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply"))
    }
}

/// Embedder that returns the same vector for every text.
#[derive(Debug, Clone)]
pub struct FixedEmbedder {
    vector: Vec<f32>,
}

impl Default for FixedEmbedder {
    fn default() -> Self {
        Self {
            vector: vec![1.0, 0.0, 0.0],
        }
    }
}

impl Embedder for FixedEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }
}

/// Embedder whose every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("embedding service unavailable")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// In-memory vector store; queries return documents in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<StoredDocument>>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn documents(&self, collection: &str) -> Vec<StoredDocument> {
        lock(&self.collections)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every call touching `collection` fail.
    pub fn fail_collection(&self, collection: &str) {
        lock(&self.failing).insert(collection.to_string());
    }

    fn check(&self, collection: &str) -> Result<()> {
        if lock(&self.failing).contains(collection) {
            bail!("collection {collection} unavailable");
        }
        Ok(())
    }
}

impl VectorStore for MemoryStore {
    fn upsert(&self, collection: &str, id: &str, text: &str, vector: &[f32]) -> Result<()> {
        self.check(collection)?;
        lock(&self.collections)
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument {
                id: document_id(id),
                text: text.to_string(),
                vector: vector.to_vec(),
            });
        Ok(())
    }

    fn query(&self, collection: &str, _vector: &[f32], k: usize) -> Result<Vec<String>> {
        self.check(collection)?;
        Ok(self
            .documents(collection)
            .into_iter()
            .take(k)
            .map(|doc| doc.text)
            .collect())
    }
}

/// Command runner that records commands instead of spawning them.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    failing: HashSet<String>,
    executed: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Fail exactly the listed commands.
    pub fn failing_on<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: commands.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn execute(&self, command: &str) -> ExecutionResult {
        lock(&self.executed).push(command.to_string());
        if self.failing.contains(command) {
            ExecutionResult::failure(
                command,
                String::new(),
                "command failed: exit status: 1".to_string(),
                None,
            )
        } else {
            ExecutionResult::success(command, format!("ran {command}\n"))
        }
    }
}

/// Arguments of one `evaluate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationCall {
    pub log: String,
    pub request: String,
    pub remaining: Vec<String>,
    pub had_error: bool,
}

#[derive(Debug, Default)]
struct EvaluatorState {
    decisions: VecDeque<Decision>,
    repeat: Option<Decision>,
    calls: Vec<EvaluationCall>,
    stored: Vec<String>,
}

/// Evaluator that replays decisions. Runs out with an error unless built
/// with [`ScriptedEvaluator::always`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvaluator {
    state: Arc<Mutex<EvaluatorState>>,
}

impl ScriptedEvaluator {
    pub fn new(decisions: Vec<Decision>) -> Self {
        let evaluator = Self::default();
        lock(&evaluator.state).decisions = decisions.into();
        evaluator
    }

    /// Return `decision` from every call.
    pub fn always(decision: Decision) -> Self {
        let evaluator = Self::default();
        lock(&evaluator.state).repeat = Some(decision);
        evaluator
    }

    /// A second view on the same state, kept after the evaluator is boxed.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn calls(&self) -> Vec<EvaluationCall> {
        lock(&self.state).calls.clone()
    }

    pub fn evaluations(&self) -> usize {
        lock(&self.state).calls.len()
    }

    /// Transcripts passed to `store_session`.
    pub fn stored(&self) -> Vec<String> {
        lock(&self.state).stored.clone()
    }
}

impl Evaluate for ScriptedEvaluator {
    fn evaluate(
        &self,
        log: &str,
        request: &str,
        remaining: &[String],
        had_error: bool,
    ) -> Result<Decision> {
        let mut state = lock(&self.state);
        state.calls.push(EvaluationCall {
            log: log.to_string(),
            request: request.to_string(),
            remaining: remaining.to_vec(),
            had_error,
        });
        if let Some(decision) = state.repeat.clone() {
            return Ok(decision);
        }
        state
            .decisions
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted decision"))
    }

    fn final_answer(&self, _log: &str, _request: &str) -> Result<String> {
        Ok("scripted answer".to_string())
    }

    fn store_session(&self, log: &str) -> Result<()> {
        lock(&self.state).stored.push(log.to_string());
        Ok(())
    }
}

/// Interaction that answers confirmations from a script and records events.
///
/// Once the script runs out every further confirmation is approved.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    answers: VecDeque<bool>,
    pub confirmations: Vec<String>,
    pub events: Vec<String>,
}

impl ScriptedConsole {
    pub fn approving() -> Self {
        Self::default()
    }

    pub fn answering(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl Interaction for ScriptedConsole {
    fn confirm(&mut self, command: &str) -> Result<bool> {
        self.confirmations.push(command.to_string());
        Ok(self.answers.pop_front().unwrap_or(true))
    }

    fn event(&mut self, event: &SessionEvent<'_>) {
        self.events.push(format!("{event:?}"));
    }
}
