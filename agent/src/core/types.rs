//! Shared deterministic types for the agent core.
//!
//! These types define stable contracts between the executor, evaluator, and
//! session. They carry no I/O handles and are cheap to clone.

use serde::{Deserialize, Serialize};

/// Outcome of running one command string through the executor.
///
/// `output` holds whatever text is useful for diagnosis: the final stage's
/// stdout (plus an annotated stderr suffix) on success, or the failure report
/// including intermediate pipeline output on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: String,
    pub output: String,
    pub succeeded: bool,
    /// 1-indexed pipeline stage that failed, when the command was a pipeline.
    pub failing_stage: Option<usize>,
    /// Error text, present iff `succeeded` is false.
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(command: &str, output: String) -> Self {
        Self {
            command: command.to_string(),
            output,
            succeeded: true,
            failing_stage: None,
            error: None,
        }
    }

    pub fn failure(
        command: &str,
        output: String,
        error: String,
        failing_stage: Option<usize>,
    ) -> Self {
        Self {
            command: command.to_string(),
            output,
            succeeded: false,
            failing_stage,
            error: Some(error),
        }
    }
}

/// Why the evaluator ended the attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The goal check reported the request as satisfied.
    GoalAchieved,
    /// No queue was pending and the model proposed no further commands.
    NothingToDo,
    /// The model chose STOP (or an unrecognized reply, which fails closed).
    ModelStopped,
    /// The model chose MODIFY but no replacement command survived validation.
    EmptyModification,
}

/// Evaluator verdict for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run these commands next. Replaces the queue wholesale.
    Continue(Vec<String>),
    Stop(StopReason),
}

impl Decision {
    pub fn should_continue(&self) -> bool {
        matches!(self, Decision::Continue(_))
    }

    pub fn goal_achieved(&self) -> bool {
        matches!(self, Decision::Stop(StopReason::GoalAchieved))
    }
}

/// The model's choice when a command queue is still pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueChoice {
    Proceed,
    Modify(Vec<String>),
    Stop,
}

/// Terminal state of one top-level request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The model reply contained no executable commands; it was shown as-is.
    NoCommands,
    /// The evaluator ended the loop.
    Finished(StopReason),
    /// The attempt budget ran out with commands still queued.
    BudgetExhausted { remaining: Vec<String> },
    /// The user declined a command; nothing after it ran.
    Denied { command: String },
    /// The evaluator's model calls failed; the loop stopped.
    EvaluatorFailed(String),
}
