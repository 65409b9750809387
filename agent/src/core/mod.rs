//! Deterministic, pure logic shared by the agent.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! text and return deterministic outputs suitable for tests.

pub mod chunker;
pub mod decision;
pub mod pipeline;
pub mod shortcuts;
pub mod transcript;
pub mod types;
pub mod validator;
