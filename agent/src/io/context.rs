//! Retrieval of prior documents and sessions for the first model call.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::io::embeddings::Embedder;
use crate::io::vector_store::VectorStore;

/// Looks up text related to a request in the document and history collections.
pub struct ContextProvider {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    documents_collection: String,
    history_collection: String,
    max_documents: usize,
    max_history: usize,
}

impl ContextProvider {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        documents_collection: impl Into<String>,
        history_collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            documents_collection: documents_collection.into(),
            history_collection: history_collection.into(),
            max_documents: 5,
            max_history: 3,
        }
    }

    pub fn with_limits(mut self, max_documents: usize, max_history: usize) -> Self {
        self.max_documents = max_documents;
        self.max_history = max_history;
        self
    }

    /// Context snippets for `query`: documents first, then past sessions.
    ///
    /// Never fails: any retrieval error degrades to an empty context.
    pub fn fetch(&self, query: &str, include_history: bool) -> Vec<String> {
        match self.try_fetch(query, include_history) {
            Ok(snippets) => snippets,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "failed to retrieve context");
                Vec::new()
            }
        }
    }

    /// Like [`fetch`](Self::fetch) but surfaces document-lookup failures.
    ///
    /// A failed history lookup still returns the documents.
    #[instrument(skip_all, fields(include_history = include_history))]
    pub fn try_fetch(&self, query: &str, include_history: bool) -> Result<Vec<String>> {
        let vector = self.embedder.embed(query).context("embed query")?;
        let mut snippets = self
            .store
            .query(&self.documents_collection, &vector, self.max_documents)
            .context("query documents")?;
        if include_history {
            match self
                .store
                .query(&self.history_collection, &vector, self.max_history)
            {
                Ok(history) => snippets.extend(history),
                Err(err) => debug!(err = %format!("{err:#}"), "history lookup failed"),
            }
        }
        debug!(snippets = snippets.len(), "context retrieved");
        Ok(snippets)
    }
}
