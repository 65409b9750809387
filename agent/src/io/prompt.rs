//! Prompt rendering for every language-model call the agent makes.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::io::system_info::SystemInfo;

const COMMAND_TEMPLATE: &str = include_str!("prompts/command.md");
const GOAL_CHECK_TEMPLATE: &str = include_str!("prompts/goal_check.md");
const NEXT_COMMANDS_TEMPLATE: &str = include_str!("prompts/next_commands.md");
const QUEUE_DECISION_TEMPLATE: &str = include_str!("prompts/queue_decision.md");
const FINAL_ANSWER_TEMPLATE: &str = include_str!("prompts/final_answer.md");

#[derive(Debug, Serialize)]
struct ToolContext<'a> {
    name: &'a str,
    version: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        for (name, source) in [
            ("command", COMMAND_TEMPLATE),
            ("goal_check", GOAL_CHECK_TEMPLATE),
            ("next_commands", NEXT_COMMANDS_TEMPLATE),
            ("queue_decision", QUEUE_DECISION_TEMPLATE),
            ("final_answer", FINAL_ANSWER_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("prompt template should be valid");
        }
        Self { env }
    }

    /// Wrap a user request in the command-assistant prompt.
    pub fn command(&self, request: &str, system: &SystemInfo) -> Result<String> {
        let tools: Vec<ToolContext<'_>> = system
            .tools
            .iter()
            .map(|(name, version)| ToolContext { name, version })
            .collect();
        let rendered = self.env.get_template("command")?.render(context! {
            os => &system.os,
            arch => &system.arch,
            shell => &system.shell,
            hints => system.syntax_hints(),
            tools => tools,
            detection_commands => system.detection_commands(),
            file_size_example => system.file_size_example(),
            request => request.trim(),
        })?;
        debug!(len = rendered.len(), "rendered command prompt");
        Ok(rendered)
    }

    pub fn goal_check(&self, request: &str, log: &str) -> Result<String> {
        let rendered = self.env.get_template("goal_check")?.render(context! {
            request => request.trim(),
            log => log,
        })?;
        Ok(rendered)
    }

    pub fn next_commands(&self, request: &str, log: &str, had_error: bool) -> Result<String> {
        let rendered = self.env.get_template("next_commands")?.render(context! {
            request => request.trim(),
            log => log,
            had_error => had_error,
        })?;
        Ok(rendered)
    }

    pub fn queue_decision(
        &self,
        request: &str,
        log: &str,
        remaining: &[String],
        had_error: bool,
    ) -> Result<String> {
        let rendered = self.env.get_template("queue_decision")?.render(context! {
            request => request.trim(),
            log => log,
            remaining => remaining,
            had_error => had_error,
        })?;
        Ok(rendered)
    }

    pub fn final_answer(&self, request: &str, log: &str) -> Result<String> {
        let rendered = self.env.get_template("final_answer")?.render(context! {
            request => request.trim(),
            log => log,
        })?;
        Ok(rendered)
    }
}
