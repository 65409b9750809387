//! Interpretation of free-text model replies used by the evaluator.
//!
//! Models do not reliably follow terse-output instructions, so every parser
//! here is lenient about surrounding text and fails closed when unsure.

use crate::core::types::QueueChoice;
use crate::core::validator::parse_commands;

/// Default substrings that count as a "goal achieved" answer.
pub const DEFAULT_AFFIRMATIONS: [&str; 4] = ["YES", "ACHIEVED", "COMPLETED", "SUCCESS"];

/// Reply that means "no further commands".
const NONE_REPLY: &str = "NONE";

/// Decides whether a goal-check reply is affirmative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalMatcher {
    affirmations: Vec<String>,
}

impl Default for GoalMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_AFFIRMATIONS.iter().copied())
    }
}

impl GoalMatcher {
    pub fn new<I, S>(affirmations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            affirmations: affirmations
                .into_iter()
                .map(|a| a.as_ref().trim().to_uppercase())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    /// A reply is affirmative if it is exactly `Y`, or contains any configured
    /// affirmation, unless its first word is a plain `NO`/`N`.
    pub fn is_affirmative(&self, reply: &str) -> bool {
        let upper = reply.trim().to_uppercase();
        if upper == "Y" {
            return true;
        }
        if matches!(first_word(&upper).as_str(), "NO" | "N") {
            return false;
        }
        self.affirmations.iter().any(|a| upper.contains(a.as_str()))
    }
}

/// Parse the reply to a "what next?" prompt.
///
/// An empty reply or `NONE` (any case) means no further commands. Stray
/// `NONE` lines mixed with commands are dropped.
pub fn parse_next_commands(reply: &str) -> Vec<String> {
    let trimmed = reply.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NONE_REPLY) {
        return Vec::new();
    }
    parse_commands(trimmed)
        .into_iter()
        .filter(|cmd| !cmd.eq_ignore_ascii_case(NONE_REPLY))
        .collect()
}

/// Parse the reply to a PROCEED / MODIFY / STOP prompt.
///
/// Only the first word of the first line is inspected. MODIFY takes its
/// replacement commands from the following lines. Anything unrecognized is
/// treated as STOP.
pub fn parse_queue_choice(reply: &str) -> QueueChoice {
    let trimmed = reply.trim();
    let mut lines = trimmed.lines();
    let head = lines.next().map(|l| first_word(&l.to_uppercase())).unwrap_or_default();
    match head.as_str() {
        "PROCEED" => QueueChoice::Proceed,
        "MODIFY" => {
            let rest: Vec<&str> = lines.collect();
            QueueChoice::Modify(parse_commands(&rest.join("\n")))
        }
        _ => QueueChoice::Stop,
    }
}

fn first_word(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}
