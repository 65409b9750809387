//! Pipeline decomposition for per-stage failure attribution.
//!
//! Splitting happens on the literal `" | "` separator only. This is not shell
//! grammar: `||`, `|&` or a bare `a|b` are left to the shell as a single stage.

pub const STAGE_SEPARATOR: &str = " | ";

/// One segment of a decomposed pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// 1-indexed position in the original command.
    pub index: usize,
    pub command: String,
}

/// Split `command` into pipeline stages.
///
/// Returns `None` when the command has no separator and should run as a
/// single shell invocation. Blank segments are skipped but keep their slot in
/// the numbering.
pub fn split_pipeline(command: &str) -> Option<Vec<Stage>> {
    if !command.contains(STAGE_SEPARATOR) {
        return None;
    }
    let stages = command
        .split(STAGE_SEPARATOR)
        .enumerate()
        .map(|(i, part)| (i + 1, part.trim()))
        .filter(|(_, part)| !part.is_empty())
        .map(|(index, part)| Stage {
            index,
            command: part.to_string(),
        })
        .collect();
    Some(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_command_is_not_a_pipeline() {
        assert_eq!(split_pipeline("ls -la"), None);
        assert_eq!(split_pipeline("true || false"), None);
        assert_eq!(split_pipeline("echo a|wc -c"), None);
    }

    #[test]
    fn splits_on_spaced_pipe() {
        let stages = split_pipeline("cat file | grep x | wc -l").expect("pipeline");
        let commands: Vec<&str> = stages.iter().map(|s| s.command.as_str()).collect();
        assert_eq!(commands, vec!["cat file", "grep x", "wc -l"]);
        assert_eq!(stages[2].index, 3);
    }

    #[test]
    fn blank_segments_keep_numbering() {
        let stages = split_pipeline("echo hi |  | wc -w").expect("pipeline");
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].index, 3);
    }
}
