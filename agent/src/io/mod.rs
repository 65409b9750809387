//! Side-effecting operations: processes, collaborators, files.
//!
//! Everything here talks to the outside world. Collaborators sit behind
//! traits ([`llm::LanguageModel`], [`embeddings::Embedder`],
//! [`vector_store::VectorStore`], [`executor::CommandRunner`]) so the session
//! and evaluator can be driven by fakes in tests.

pub mod auto_index;
pub mod config;
pub mod context;
pub mod debug_log;
pub mod document_index;
pub mod embeddings;
pub mod executor;
pub mod http;
pub mod index_worker;
pub mod llm;
pub mod process;
pub mod prompt;
pub mod system_info;
pub mod vector_store;
