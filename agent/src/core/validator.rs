//! Noise filter for language-model replies.
//!
//! Model output is free text that may echo earlier command output, shell
//! prompts, or commentary. Lines are kept only if they plausibly are a single
//! shell command. This is not a security boundary.

use std::sync::LazyLock;

use regex::Regex;

/// `ls -l` style permission column, e.g. `drwxr-xr-x` or `-rw-r--r--@`.
static PERMISSION_COLUMN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)[dlcbps-](?:[r-][w-][xsStT-]){3}[@+.]?(?:\s|$)").unwrap()
});

/// `ls -l` header line, e.g. `total 48`.
static TOTAL_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^total\s+\d+").unwrap());

const PROMPT_PREFIXES: [char; 3] = ['$', '#', '>'];
const ERROR_MARKERS: [&str; 2] = ["Error:", "command not found"];

/// Return whether `line` looks like an executable command rather than noise.
pub fn is_valid(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if line.starts_with(PROMPT_PREFIXES) || trimmed.starts_with(PROMPT_PREFIXES) {
        return false;
    }
    if line.contains('\n') {
        return false;
    }
    if PERMISSION_COLUMN_RE.is_match(trimmed) || TOTAL_HEADER_RE.is_match(trimmed) {
        return false;
    }
    if trimmed.parse::<i64>().is_ok() {
        return false;
    }
    if ERROR_MARKERS.iter().any(|marker| line.contains(marker)) {
        return false;
    }
    true
}

/// Extract the valid command lines from a model reply.
///
/// Lines are trimmed and filtered through [`is_valid`]. Order and repeats are
/// preserved. Returns an empty vector when nothing validates.
pub fn parse_commands(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| is_valid(line))
        .map(str::to_string)
        .collect()
}
