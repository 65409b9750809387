//! Conversational shell agent.
//!
//! A natural-language request is turned into shell commands by a language
//! model, run with per-command confirmation, and evaluated after every
//! attempt until the goal is met, the model gives up, or the attempt budget
//! runs out.
//!
//! - **[`core`]**: Pure, deterministic logic (validation, pipeline splitting,
//!   transcripts, decision parsing). No I/O.
//! - **[`io`]**: Side effects (processes, HTTP collaborators, config,
//!   auto-indexing). Each collaborator sits behind a trait so tests can fake it.
//!
//! [`session`] coordinates the two with the [`evaluator`]; [`frontend`] is the
//! terminal presentation.

pub mod core;
pub mod evaluator;
pub mod exit_codes;
pub mod frontend;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
