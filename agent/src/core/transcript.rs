//! Append-only execution transcript for one user request.

use std::fmt;

use crate::core::types::ExecutionResult;

/// Ordered record of commands and their outputs.
///
/// Blocks are `"$ <command>\n<output>\n"` on success and
/// `"$ <command>\n[<output>\n]Error: <err>\n"` on failure, each followed by a
/// blank separator line. Nothing is ever removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionLog {
    text: String,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the block for one executed command.
    pub fn record(&mut self, result: &ExecutionResult) {
        self.text.push_str("$ ");
        self.text.push_str(&result.command);
        self.text.push('\n');
        match &result.error {
            None => {
                self.text.push_str(&result.output);
                self.text.push_str("\n\n");
            }
            Some(err) => {
                if !result.output.is_empty() {
                    self.text.push_str(&result.output);
                    self.text.push('\n');
                }
                self.text.push_str("Error: ");
                self.text.push_str(err);
                self.text.push_str("\n\n");
            }
        }
    }

    /// Note that the loop ended with commands still queued.
    pub fn note_unexecuted(&mut self, max_attempts: u32) {
        self.text.push_str(&format!(
            "\nMax attempts ({max_attempts}) reached. Remaining commands not executed.\n"
        ));
    }

    /// Note that the user declined `command`.
    pub fn note_denied(&mut self, command: &str) {
        self.text
            .push_str(&format!("\nCommand execution cancelled by user: {command}\n"));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for ExecutionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Shorten long command output for terminal display.
///
/// When `enabled` and `output` has more than `max_lines` lines, keep the first
/// and last `max_lines / 2` lines around an omission marker. The transcript
/// always keeps the full output; this is display-only.
pub fn truncate_for_display(output: &str, max_lines: usize, enabled: bool) -> String {
    if !enabled || max_lines == 0 {
        return output.to_string();
    }
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= max_lines {
        return output.to_string();
    }
    let keep = (max_lines / 2).max(1);
    let omitted = lines.len() - keep * 2;
    let mut out = lines[..keep].join("\n");
    out.push_str(&format!("\n... ({omitted} lines omitted) ...\n"));
    out.push_str(&lines[lines.len() - keep..].join("\n"));
    if output.ends_with('\n') {
        out.push('\n');
    }
    out
}
