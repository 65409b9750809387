//! Stable exit codes for the agent CLI.

/// Request handled (including a reply without commands).
pub const OK: i32 = 0;
/// Configuration, collaborator or command failure.
pub const ERROR: i32 = 1;
/// The user declined a command.
pub const DENIED: i32 = 2;
