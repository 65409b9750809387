//! Named heuristic shortcuts for the evaluator.
//!
//! Each entry pairs a request pattern with a transcript pattern. When both
//! match, the entry may declare the goal achieved without a model round-trip
//! and may extract a direct answer from the transcript. The table is data: the
//! decision state machine only asks it questions, so entries can be removed or
//! the whole table disabled through configuration.

use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;

static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap());

/// Extracts a conversational answer from a transcript.
pub type AnswerExtractor = fn(&str) -> Option<String>;

/// One `(request pattern, transcript pattern) -> answer` entry.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub name: &'static str,
    request: Regex,
    /// Matches the `$ <command>` line whose output the entry inspects.
    command: Regex,
    /// Whether a successful matching command alone proves the goal.
    achieves_goal: bool,
    answer: AnswerExtractor,
}

impl Shortcut {
    pub fn new(
        name: &'static str,
        request_pattern: &str,
        command_pattern: &str,
        achieves_goal: bool,
        answer: AnswerExtractor,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            request: Regex::new(request_pattern)?,
            command: Regex::new(command_pattern)?,
            achieves_goal,
            answer,
        })
    }

    fn matches(&self, request: &str, transcript: &str) -> bool {
        self.request.is_match(request) && self.command_output(transcript).is_some()
    }

    /// Output block following the first `$ ` line matched by the command pattern.
    fn command_output<'t>(&self, transcript: &'t str) -> Option<&'t str> {
        let mut offset = 0;
        for line in transcript.split_inclusive('\n') {
            offset += line.len();
            let Some(cmd) = line.trim_end().strip_prefix("$ ") else {
                continue;
            };
            if !self.command.is_match(cmd) {
                continue;
            }
            let rest = &transcript[offset..];
            let end = if rest.starts_with("$ ") {
                0
            } else {
                rest.find("\n$ ").map(|i| i + 1).unwrap_or(rest.len())
            };
            return Some(&rest[..end]);
        }
        None
    }
}

/// Ordered set of shortcuts consulted by the evaluator.
#[derive(Debug, Clone, Default)]
pub struct ShortcutTable {
    entries: Vec<Shortcut>,
}

impl ShortcutTable {
    /// The built-in entries: current time via `date`, IP address via
    /// `ifconfig`/`ipconfig`/`curl`.
    pub fn builtin() -> Self {
        let entries = vec![
            Shortcut::new("time", r"(?i)\btime\b", r"^date\b", true, answer_time),
            Shortcut::new(
                "ip-address",
                r"(?i)\bip\b",
                r"^(?:ifconfig|ipconfig|curl)\b",
                false,
                answer_ip_address,
            ),
        ];
        Self {
            entries: entries
                .into_iter()
                .collect::<Result<_, _>>()
                .expect("built-in shortcut patterns should be valid"),
        }
    }

    /// A table that never matches.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with(mut self, shortcut: Shortcut) -> Self {
        self.entries.push(shortcut);
        self
    }

    /// Drop the entry called `name`, if present.
    pub fn without(mut self, name: &str) -> Self {
        self.entries.retain(|entry| entry.name != name);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    /// Name of the first entry that proves the goal for this request, if any.
    ///
    /// A transcript that recorded any error never short-circuits.
    pub fn goal_shortcut(&self, request: &str, transcript: &str) -> Option<&'static str> {
        if transcript.contains("Error:") {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.achieves_goal && entry.matches(request, transcript))
            .map(|entry| entry.name)
    }

    /// First direct answer any matching entry can extract.
    pub fn direct_answer(&self, request: &str, transcript: &str) -> Option<(&'static str, String)> {
        self.entries.iter().find_map(|entry| {
            if !entry.request.is_match(request) {
                return None;
            }
            let output = entry.command_output(transcript)?;
            (entry.answer)(output).map(|answer| (entry.name, answer))
        })
    }
}

fn answer_time(output: &str) -> Option<String> {
    let line = first_output_line(output)?;
    let time = line
        .split_whitespace()
        .find_map(|token| NaiveTime::parse_from_str(token, "%H:%M:%S").ok());
    match time {
        Some(time) => Some(format!("The current time is {}.", time.format("%-I:%M %p"))),
        None => Some(format!("The current time is {line}.")),
    }
}

fn answer_ip_address(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| !line.trim_start().starts_with(['$', '#']))
        .find_map(|line| IPV4_RE.find(line))
        .map(|ip| format!("Your IP address is {}.", ip.as_str()))
}

fn first_output_line(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with(['$', '#']) && !line.starts_with("Error:"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE_LOG: &str = "$ date\nSat Jul 12 00:10:49 EDT 2025\n\n\n";

    #[test]
    fn time_question_with_date_output_achieves_goal() {
        let table = ShortcutTable::builtin();
        assert_eq!(table.goal_shortcut("what time is it?", DATE_LOG), Some("time"));
    }

    #[test]
    fn failed_transcript_never_short_circuits() {
        let table = ShortcutTable::builtin();
        let log = "$ date\nError: command failed: exit status: 1\n\n";
        assert_eq!(table.goal_shortcut("what time is it?", log), None);
    }

    #[test]
    fn unrelated_request_or_command_does_not_match() {
        let table = ShortcutTable::builtin();
        assert_eq!(table.goal_shortcut("list files", DATE_LOG), None);
        assert_eq!(table.goal_shortcut("what time is it?", "$ ls\na\n\n"), None);
        assert_eq!(table.goal_shortcut("what time is it?", "$ dated\nx\n\n"), None);
    }

    #[test]
    fn time_answer_uses_twelve_hour_clock() {
        let table = ShortcutTable::builtin();
        let (name, answer) = table
            .direct_answer("what time is it", DATE_LOG)
            .expect("answer");
        assert_eq!(name, "time");
        assert_eq!(answer, "The current time is 12:10 AM.");

        let log = "$ date\nTue Mar  4 15:42:07 UTC 2025\n\n";
        let (_, answer) = table.direct_answer("time please", log).expect("answer");
        assert_eq!(answer, "The current time is 3:42 PM.");
    }

    #[test]
    fn ip_answer_extracts_address_but_does_not_prove_goal() {
        let table = ShortcutTable::builtin();
        let log = "$ curl -s ifconfig.me\n203.0.113.7\n\n";
        assert_eq!(table.goal_shortcut("what is my ip", log), None);
        let (name, answer) = table.direct_answer("what is my ip", log).expect("answer");
        assert_eq!(name, "ip-address");
        assert_eq!(answer, "Your IP address is 203.0.113.7.");
    }

    #[test]
    fn answer_reads_only_the_matching_block() {
        let table = ShortcutTable::builtin();
        let log = "$ echo 10.0.0.1\n10.0.0.1\n\n$ curl -s ifconfig.me\n198.51.100.4\n\n";
        let (_, answer) = table.direct_answer("my ip?", log).expect("answer");
        assert_eq!(answer, "Your IP address is 198.51.100.4.");
    }

    #[test]
    fn entries_can_be_removed_or_disabled() {
        let table = ShortcutTable::builtin().without("time");
        assert_eq!(table.names(), vec!["ip-address"]);
        assert_eq!(table.goal_shortcut("what time is it?", DATE_LOG), None);
        assert!(ShortcutTable::disabled().direct_answer("time", DATE_LOG).is_none());
    }
}
