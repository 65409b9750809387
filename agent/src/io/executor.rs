//! Command execution with per-stage pipeline attribution.
//!
//! The [`CommandRunner`] trait decouples the session loop from the operating
//! shell. Tests use recording runners that return predetermined results
//! without spawning processes.

use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use crate::core::pipeline::{Stage, split_pipeline};
use crate::core::types::ExecutionResult;
use crate::io::process::{CommandOutput, run_shell};

/// Abstraction over command execution backends.
pub trait CommandRunner: Send + Sync {
    /// Run one command string. Failures are reported in the result, never as
    /// an `Err`: a failing command is signal for the evaluator.
    fn execute(&self, command: &str) -> ExecutionResult;
}

/// Runs commands through `sh -c`, splitting `" | "` pipelines into stages.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    workdir: Option<PathBuf>,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command (and every pipeline stage) inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: Some(dir.into()),
        }
    }

    fn run(&self, script: &str, stdin: Option<&[u8]>) -> anyhow::Result<CommandOutput> {
        run_shell(script, stdin, self.workdir.as_deref())
    }

    fn execute_single(&self, command: &str) -> ExecutionResult {
        // One stream keeps stdout and stderr lines in the order they were written.
        let output = match self.run(&format!("exec 2>&1\n{command}"), None) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "command could not be started");
                return ExecutionResult::failure(
                    command,
                    String::new(),
                    format!("command failed: {err:#}"),
                    None,
                );
            }
        };
        let mut text = output.stdout_lossy();
        text.push_str(&output.stderr_lossy());
        if output.status.success() {
            ExecutionResult::success(command, text)
        } else {
            ExecutionResult::failure(
                command,
                text,
                format!("command failed: {}", output.status),
                None,
            )
        }
    }

    fn execute_pipeline(&self, command: &str, stages: &[Stage]) -> ExecutionResult {
        // Stdout of the last successful stage; only stdout flows forward.
        let mut carried: Option<Vec<u8>> = None;
        let mut last = String::new();

        for stage in stages {
            let is_first = carried.is_none();
            let output = match self.run(&stage.command, carried.as_deref()) {
                Ok(output) => output,
                Err(err) => {
                    warn!(stage = stage.index, err = %format!("{err:#}"), "pipeline stage could not be started");
                    let error = if is_first {
                        format!("command failed: {err:#}")
                    } else {
                        format!("pipe step {} failed: {err:#}", stage.index)
                    };
                    return ExecutionResult::failure(command, String::new(), error, Some(stage.index));
                }
            };
            let stderr = output.stderr_lossy();

            if !output.status.success() {
                debug!(stage = stage.index, status = %output.status, "pipeline stage failed");
                if is_first {
                    let mut text = output.stdout_lossy();
                    if !stderr.is_empty() {
                        text.push_str("\nstderr: ");
                        text.push_str(&stderr);
                    }
                    return ExecutionResult::failure(
                        command,
                        text,
                        format!("command failed: {}", output.status),
                        Some(stage.index),
                    );
                }
                let mut report = format!(
                    "Steps 1-{} succeeded. Step {} failed: {}",
                    stage.index - 1,
                    stage.index,
                    stage.command
                );
                if !stderr.is_empty() {
                    report.push_str(&format!(" (stderr: {stderr})"));
                }
                if let Some(previous) = carried.as_deref().filter(|bytes| !bytes.is_empty()) {
                    report.push_str("\nIntermediate output from previous steps:\n");
                    report.push_str(&String::from_utf8_lossy(previous));
                }
                return ExecutionResult::failure(
                    command,
                    report,
                    format!("pipe step {} failed: {}", stage.index, output.status),
                    Some(stage.index),
                );
            }

            last = output.stdout_lossy();
            if !stderr.is_empty() {
                last.push_str("\nstderr: ");
                last.push_str(&stderr);
            }
            debug!(stage = stage.index, bytes = output.stdout.len(), "pipeline stage succeeded");
            carried = Some(output.stdout);
        }

        ExecutionResult::success(command, last)
    }
}

impl CommandRunner for ShellExecutor {
    #[instrument(skip_all, fields(command = %command))]
    fn execute(&self, command: &str) -> ExecutionResult {
        match split_pipeline(command) {
            Some(stages) if !stages.is_empty() => self.execute_pipeline(command, &stages),
            _ => self.execute_single(command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_command_succeeds() {
        let result = ShellExecutor::new().execute("echo hello");
        assert!(result.succeeded);
        assert_eq!(result.output.trim(), "hello");
        assert_eq!(result.error, None);
    }

    #[test]
    fn simple_failure_keeps_output() {
        let result = ShellExecutor::new().execute("nonexistentcommand12345");
        assert!(!result.succeeded);
        let error = result.error.expect("error");
        assert!(error.contains("command failed"), "{error}");
        assert!(result.output.contains("not found"), "{}", result.output);
        assert_eq!(result.failing_stage, None);
    }

    #[test]
    fn single_command_keeps_stream_order() {
        let result = ShellExecutor::new().execute("echo one; echo two >&2; echo three");
        assert!(result.succeeded);
        assert_eq!(result.output, "one\ntwo\nthree\n");
    }

    #[test]
    fn pipeline_stages_feed_stdout_forward() {
        let result = ShellExecutor::new().execute("echo hi | wc -w");
        assert!(result.succeeded, "{result:?}");
        assert!(result.output.contains('1'));

        let result = ShellExecutor::new().execute("printf 'a\\nb\\nc\\n' | head -2 | wc -l");
        assert!(result.succeeded, "{result:?}");
        assert!(result.output.contains('2'));
    }

    #[test]
    fn first_stage_failure_is_command_failed() {
        let result = ShellExecutor::new().execute("nope123 | wc -w");
        assert!(!result.succeeded);
        let error = result.error.expect("error");
        assert!(error.contains("command failed"), "{error}");
        assert_eq!(result.failing_stage, Some(1));
        assert!(result.output.contains("stderr: "), "{}", result.output);
    }

    #[test]
    fn later_stage_failure_names_the_step() {
        let result = ShellExecutor::new().execute("echo hi | nope123");
        assert!(!result.succeeded);
        let error = result.error.expect("error");
        assert!(error.contains("pipe step 2 failed"), "{error}");
        assert_eq!(result.failing_stage, Some(2));
        assert!(result.output.starts_with("Steps 1-1 succeeded. Step 2 failed: nope123"));
        assert!(result.output.contains("Intermediate output from previous steps:\nhi\n"));
    }

    #[test]
    fn middle_stage_failure_is_attributed() {
        let result = ShellExecutor::new().execute("echo hello | invalidcommand123 | wc -l");
        assert_eq!(result.failing_stage, Some(2));
        assert!(result.error.expect("error").contains("pipe step 2 failed"));
    }

    #[test]
    fn successful_stage_stderr_is_annotated() {
        let result = ShellExecutor::new().execute("echo hi | sh -c 'cat; echo warn >&2'");
        assert!(result.succeeded, "{result:?}");
        assert_eq!(result.output, "hi\n\nstderr: warn\n");
    }

    #[test]
    fn blank_stages_are_skipped() {
        let result = ShellExecutor::new().execute("echo hello |  | wc -w");
        assert!(result.succeeded, "{result:?}");
        assert!(result.output.contains('1'));
    }

    #[test]
    fn runs_in_configured_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ShellExecutor::in_dir(temp.path());
        let result = executor.execute("echo 'hi' > hello.txt");
        assert!(result.succeeded, "{result:?}");
        let content = std::fs::read_to_string(temp.path().join("hello.txt")).expect("read");
        assert_eq!(content, "hi\n");
    }
}
