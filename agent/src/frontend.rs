//! Line-oriented terminal frontend.
//!
//! [`TerminalConsole`] renders session events and asks for per-command
//! confirmation; [`run_interactive`] is the read-eval loop around
//! [`AgentSession::handle_prompt`].

use std::fmt;
use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::transcript::truncate_for_display;
use crate::io::config::SessionConfig;
use crate::session::{AgentSession, Interaction, SessionEvent};

const HELP: &str = "\
Commands:
  help, ?      show this help
  clear        clear the screen
  exit, quit   leave the agent

Anything else is sent to the model as a request.";

/// Console over any reader/writer pair (stdin/stdout in the binary).
pub struct TerminalConsole<R, W> {
    input: R,
    output: W,
    max_output_lines: usize,
    truncate_output: bool,
}

impl<R: BufRead, W: Write> TerminalConsole<R, W> {
    pub fn new(input: R, output: W, config: &SessionConfig) -> Self {
        Self {
            input,
            output,
            max_output_lines: config.max_output_lines,
            truncate_output: config.truncate_output,
        }
    }

    /// Show `prompt` and read one line without its terminator; `None` on EOF.
    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}").context("write prompt")?;
        self.output.flush().context("flush prompt")?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn say(&mut self, args: fmt::Arguments<'_>) {
        if let Err(err) = writeln!(self.output, "{args}") {
            debug!(err = %err, "console write failed");
        }
    }
}

impl<R: BufRead, W: Write> Interaction for TerminalConsole<R, W> {
    /// Empty input and `y`/`yes` approve, `n`/`no` and EOF decline. Any other
    /// answer asks again.
    fn confirm(&mut self, command: &str) -> Result<bool> {
        let prompt = format!("Execute `{command}`? [Y/n] ");
        while let Some(answer) = self.read_line(&prompt)? {
            match answer.trim().to_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say(format_args!("Please answer y or n.")),
            }
        }
        Ok(false)
    }

    fn event(&mut self, event: &SessionEvent<'_>) {
        match *event {
            SessionEvent::Reply(text) => self.say(format_args!("{text}")),
            SessionEvent::Planned(commands) => {
                self.say(format_args!("Commands to execute:"));
                for command in commands {
                    self.say(format_args!("  {command}"));
                }
            }
            SessionEvent::AttemptStarted {
                attempt,
                max_attempts,
                commands,
            } => {
                self.say(format_args!("\nAttempt {attempt}/{max_attempts}:"));
                for command in commands {
                    self.say(format_args!("  {command}"));
                }
            }
            SessionEvent::Running(command) => self.say(format_args!("$ {command}")),
            SessionEvent::Finished(result) => {
                let shown = truncate_for_display(
                    result.output.trim_end(),
                    self.max_output_lines,
                    self.truncate_output,
                );
                if !shown.is_empty() {
                    self.say(format_args!("{shown}"));
                }
                if let Some(err) = &result.error {
                    self.say(format_args!("Error: {err}"));
                }
            }
            SessionEvent::Denied(command) => {
                self.say(format_args!("Command execution cancelled: {command}"));
            }
            SessionEvent::BudgetExhausted {
                max_attempts,
                remaining,
            } => {
                self.say(format_args!(
                    "Max attempts ({max_attempts}) reached. Remaining commands not executed:"
                ));
                for command in remaining {
                    self.say(format_args!("  {command}"));
                }
            }
            SessionEvent::EvaluatorFailed(message) => {
                self.say(format_args!("Evaluation failed: {message}"));
            }
            SessionEvent::Answer(text) => self.say(format_args!("\n{text}")),
        }
    }
}

/// Read requests until EOF or `exit`, handling each with `session`.
///
/// A failed request is printed and the loop continues.
pub fn run_interactive<R: BufRead, W: Write>(
    session: &AgentSession,
    console: &mut TerminalConsole<R, W>,
) -> Result<()> {
    console.say(format_args!("Type 'help' for commands, 'exit' to quit."));
    while let Some(line) = console.read_line("> ")? {
        let request = line.trim();
        match request {
            "" => continue,
            "exit" | "quit" => break,
            "help" | "?" => console.say(format_args!("{HELP}")),
            "clear" => console.say(format_args!("\x1b[2J\x1b[H")),
            _ => {
                if let Err(err) = session.handle_prompt(request, console) {
                    console.say(format_args!("Error: {err:#}"));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use super::*;
    use crate::core::types::{Decision, ExecutionResult, StopReason};
    use crate::test_support::{RecordingRunner, ScriptedEvaluator, ScriptedModel};

    fn console(input: &str) -> TerminalConsole<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalConsole::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            &SessionConfig::default(),
        )
    }

    fn printed(console: TerminalConsole<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(console.into_output()).expect("utf8")
    }

    #[test]
    fn confirmation_defaults_to_yes() {
        let mut c = console("\ny\nYES\nn\nNo\n");
        let answers: Vec<bool> = (0..5).map(|_| c.confirm("ls").expect("confirm")).collect();
        assert_eq!(answers, vec![true, true, true, false, false]);
        assert!(printed(c).contains("Execute `ls`? [Y/n] "));
    }

    #[test]
    fn unclear_answer_asks_again() {
        let mut c = console("maybe\nsure\ny\n");
        assert!(c.confirm("ls").expect("confirm"));
        let shown = printed(c);
        assert_eq!(shown.matches("Execute `ls`? [Y/n] ").count(), 3);
        assert_eq!(shown.matches("Please answer y or n.").count(), 2);
    }

    #[test]
    fn unclear_answer_then_eof_declines() {
        let mut c = console("ok\n");
        assert!(!c.confirm("ls").expect("confirm"));
    }

    #[test]
    fn eof_declines() {
        let mut c = console("");
        assert!(!c.confirm("rm -rf build").expect("confirm"));
    }

    #[test]
    fn long_output_is_truncated_for_display_only() {
        let mut c = TerminalConsole::new(
            Cursor::new(Vec::new()),
            Vec::new(),
            &SessionConfig {
                max_output_lines: 4,
                ..SessionConfig::default()
            },
        );
        let output: String = (1..=10).map(|i| format!("line {i}\n")).collect();
        c.event(&SessionEvent::Finished(&ExecutionResult::success("seq 10", output)));
        let shown = printed(c);
        assert!(shown.contains("line 1\n"));
        assert!(shown.contains("line 10"));
        assert!(!shown.contains("line 5\n"));
    }

    #[test]
    fn loop_handles_builtins_and_requests() {
        let model = Arc::new(ScriptedModel::new(["ls"]));
        let runner = Arc::new(RecordingRunner::succeeding());
        let evaluator = ScriptedEvaluator::new(vec![Decision::Stop(StopReason::GoalAchieved)]);
        let session = AgentSession::new(
            SessionConfig::default(),
            model,
            runner.clone(),
            Box::new(evaluator),
        );
        let mut c = console("help\n\nlist files\n\nexit\nnever read\n");
        run_interactive(&session, &mut c).expect("loop");

        assert_eq!(runner.executed(), vec!["ls"]);
        let shown = printed(c);
        assert!(shown.contains("exit, quit"));
        assert!(shown.contains("scripted answer"));
    }

    #[test]
    fn failed_request_does_not_end_the_loop() {
        let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
        let session = AgentSession::new(
            SessionConfig::default(),
            model,
            Arc::new(RecordingRunner::succeeding()),
            Box::new(ScriptedEvaluator::new(Vec::new())),
        );
        let mut c = console("first\nsecond\n");
        run_interactive(&session, &mut c).expect("loop");
        assert_eq!(printed(c).matches("Error: generate response").count(), 2);
    }
}
