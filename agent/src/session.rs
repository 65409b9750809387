//! The attempt loop for one top-level request.
//!
//! [`AgentSession`] turns a request into validated commands, runs them with
//! permission gating, feeds the transcript to the evaluator after every
//! attempt and persists the transcript once at the end. Presentation is left
//! to an [`Interaction`] adapter.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::transcript::ExecutionLog;
use crate::core::types::{Decision, ExecutionResult, SessionOutcome, StopReason};
use crate::core::validator::parse_commands;
use crate::evaluator::{Evaluate, store_best_effort};
use crate::io::config::SessionConfig;
use crate::io::context::ContextProvider;
use crate::io::executor::CommandRunner;
use crate::io::index_worker::IndexWorker;
use crate::io::llm::LanguageModel;
use crate::io::prompt::PromptBuilder;
use crate::io::system_info::SystemInfo;

/// Progress notifications for the presentation layer.
#[derive(Debug, Clone, Copy)]
pub enum SessionEvent<'a> {
    /// The model reply held no commands; it is the answer.
    Reply(&'a str),
    /// Commands extracted from the first reply.
    Planned(&'a [String]),
    /// A new attempt begins with these commands.
    AttemptStarted {
        attempt: u32,
        max_attempts: u32,
        commands: &'a [String],
    },
    Running(&'a str),
    Finished(&'a ExecutionResult),
    Denied(&'a str),
    BudgetExhausted {
        max_attempts: u32,
        remaining: &'a [String],
    },
    EvaluatorFailed(&'a str),
    Answer(&'a str),
}

/// Presentation adapter driven by the session.
pub trait Interaction {
    /// Ask whether `command` may run. `false` cancels the whole request.
    fn confirm(&mut self, command: &str) -> Result<bool>;

    fn event(&mut self, event: &SessionEvent<'_>);
}

/// Everything a caller may want to know about one handled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Attempts started (0 when nothing was executed).
    pub attempts: u32,
    pub log: ExecutionLog,
    pub answer: Option<String>,
}

impl SessionReport {
    pub fn succeeded(&self) -> bool {
        matches!(
            self.outcome,
            SessionOutcome::Finished(StopReason::GoalAchieved) | SessionOutcome::NoCommands
        )
    }
}

/// Orchestrates validator, executor, evaluator, context and auto-indexing.
pub struct AgentSession {
    config: SessionConfig,
    llm: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
    system: SystemInfo,
    runner: Arc<dyn CommandRunner>,
    evaluator: Box<dyn Evaluate>,
    context: Option<ContextProvider>,
    indexer: Option<IndexWorker>,
}

impl AgentSession {
    pub fn new(
        config: SessionConfig,
        llm: Arc<dyn LanguageModel>,
        runner: Arc<dyn CommandRunner>,
        evaluator: Box<dyn Evaluate>,
    ) -> Self {
        Self {
            config,
            llm,
            prompts: PromptBuilder::new(),
            system: SystemInfo::basic(),
            runner,
            evaluator,
            context: None,
            indexer: None,
        }
    }

    pub fn with_system_info(mut self, system: SystemInfo) -> Self {
        self.system = system;
        self
    }

    pub fn with_context(mut self, context: ContextProvider) -> Self {
        self.context = Some(context);
        self
    }

    /// Trigger `worker` after every successful command.
    pub fn with_index_worker(mut self, worker: IndexWorker) -> Self {
        self.indexer = Some(worker);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Handle one request end to end.
    ///
    /// Only a failure of the first model call is an `Err`; everything after
    /// that (command failures, denial, budget, evaluator errors) is reported
    /// in the returned [`SessionReport`].
    #[instrument(skip_all, fields(request_len = request.len()))]
    pub fn handle_prompt(
        &self,
        request: &str,
        interaction: &mut dyn Interaction,
    ) -> Result<SessionReport> {
        let context = match &self.context {
            Some(provider) => provider.fetch(request, !self.config.no_history),
            None => Vec::new(),
        };
        let prompt = self.prompts.command(request, &self.system)?;
        let reply = self
            .llm
            .generate(&prompt, Some(context.as_slice()))
            .context("generate response")?;

        let commands = parse_commands(&reply);
        if commands.is_empty() {
            debug!("reply contained no commands");
            interaction.event(&SessionEvent::Reply(reply.trim()));
            return Ok(SessionReport {
                outcome: SessionOutcome::NoCommands,
                attempts: 0,
                log: ExecutionLog::new(),
                answer: Some(reply.trim().to_string()),
            });
        }
        interaction.event(&SessionEvent::Planned(&commands));
        Ok(self.run_commands(request, commands, interaction))
    }

    /// Drive the attempt loop starting from `commands`.
    pub fn run_commands(
        &self,
        request: &str,
        commands: Vec<String>,
        interaction: &mut dyn Interaction,
    ) -> SessionReport {
        let max_attempts = self.config.max_attempts.max(1);
        let mut log = ExecutionLog::new();
        let mut queue: VecDeque<String> = commands.into();
        let mut attempt = 1;

        let outcome = 'attempts: loop {
            let mut had_error = false;
            while let Some(command) = queue.pop_front() {
                if !self.config.auto_approve && !confirm(interaction, &command) {
                    info!(command = %command, "command denied by user");
                    log.note_denied(&command);
                    interaction.event(&SessionEvent::Denied(&command));
                    break 'attempts SessionOutcome::Denied { command };
                }
                interaction.event(&SessionEvent::Running(&command));
                let result = self.runner.execute(&command);
                log.record(&result);
                interaction.event(&SessionEvent::Finished(&result));
                if !result.succeeded {
                    had_error = true;
                    break;
                }
                if let Some(worker) = &self.indexer {
                    worker.trigger();
                }
            }

            let remaining: Vec<String> = queue.iter().cloned().collect();
            match self
                .evaluator
                .evaluate(log.as_str(), request, &remaining, had_error)
            {
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(err = %message, "evaluation failed");
                    interaction.event(&SessionEvent::EvaluatorFailed(&message));
                    break SessionOutcome::EvaluatorFailed(message);
                }
                Ok(Decision::Stop(reason)) => {
                    debug!(?reason, attempt, "evaluator stopped");
                    break SessionOutcome::Finished(reason);
                }
                Ok(Decision::Continue(next)) => {
                    queue = next.into();
                    if attempt >= max_attempts {
                        break SessionOutcome::BudgetExhausted {
                            remaining: queue.iter().cloned().collect(),
                        };
                    }
                    attempt += 1;
                    let upcoming: Vec<String> = queue.iter().cloned().collect();
                    interaction.event(&SessionEvent::AttemptStarted {
                        attempt,
                        max_attempts,
                        commands: &upcoming,
                    });
                }
            }
        };

        // Denial writes its own note; any other exit with work left is marked.
        if !queue.is_empty() && !matches!(outcome, SessionOutcome::Denied { .. }) {
            log.note_unexecuted(max_attempts);
        }
        if let SessionOutcome::BudgetExhausted { remaining } = &outcome {
            interaction.event(&SessionEvent::BudgetExhausted {
                max_attempts,
                remaining,
            });
        }

        let mut answer = None;
        if outcome == SessionOutcome::Finished(StopReason::GoalAchieved) {
            match self.evaluator.final_answer(log.as_str(), request) {
                Ok(text) if !text.is_empty() => {
                    interaction.event(&SessionEvent::Answer(&text));
                    answer = Some(text);
                }
                Ok(_) => {}
                Err(err) => warn!(err = %format!("{err:#}"), "failed to generate final answer"),
            }
        }

        store_best_effort(self.evaluator.as_ref(), log.as_str());
        info!(?outcome, attempts = attempt, "request finished");
        SessionReport {
            outcome,
            attempts: attempt,
            log,
            answer,
        }
    }

    /// Stop the background indexer, waiting for a queued pass.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.indexer.as_mut() {
            Some(worker) => worker.shutdown(),
            None => Ok(()),
        }
    }
}

/// A prompt that cannot be answered counts as a denial.
fn confirm(interaction: &mut dyn Interaction, command: &str) -> bool {
    match interaction.confirm(command) {
        Ok(approved) => approved,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "could not read confirmation");
            false
        }
    }
}
