//! Vector-store collaborator.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::io::config::VectorConfig;
use crate::io::http;

/// Similarity-search document store with named collections.
pub trait VectorStore: Send + Sync {
    /// Store `text` with its embedding. An empty `id` gets a generated one.
    fn upsert(&self, collection: &str, id: &str, text: &str, vector: &[f32]) -> Result<()>;

    /// Texts of the `k` nearest documents, best first.
    fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<String>>;
}

/// Generated document id for callers that pass an empty one.
pub fn document_id(id: &str) -> String {
    if id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        id.to_string()
    }
}

/// Client for a Chroma-compatible HTTP API (`/api/v1`).
///
/// Collections are looked up by name (created when missing) on first use and
/// their ids cached for the life of the client.
pub struct ChromaStore {
    agent: ureq::Agent,
    base_url: String,
    collection_ids: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Collection {
    #[serde(default, skip_serializing)]
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    ids: [&'a str; 1],
    documents: [&'a str; 1],
    embeddings: [&'a [f32]; 1],
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: [&'a [f32]; 1],
    n_results: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
}

impl ChromaStore {
    pub fn new(cfg: &VectorConfig) -> Self {
        Self {
            agent: http::agent(cfg.timeout()),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            collection_ids: Mutex::new(HashMap::new()),
        }
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.base_url)
    }

    fn collection_id(&self, name: &str) -> Result<String> {
        if let Some(id) = self
            .collection_ids
            .lock()
            .map_err(|_| anyhow!("collection cache poisoned"))?
            .get(name)
        {
            return Ok(id.clone());
        }

        let id = match self.find_collection(name)? {
            Some(id) => id,
            None => self.create_collection(name)?,
        };
        self.collection_ids
            .lock()
            .map_err(|_| anyhow!("collection cache poisoned"))?
            .insert(name.to_string(), id.clone());
        Ok(id)
    }

    fn find_collection(&self, name: &str) -> Result<Option<String>> {
        let collections: Vec<Collection> =
            http::get_json(&self.agent, &self.collections_url()).context("list collections")?;
        Ok(collections
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.id))
    }

    fn create_collection(&self, name: &str) -> Result<String> {
        let request = Collection {
            id: String::new(),
            name: name.to_string(),
        };
        let created: Collection = http::post_json(&self.agent, &self.collections_url(), &request)
            .with_context(|| format!("create collection {name}"))?;
        info!(collection = name, id = %created.id, "created collection");
        Ok(created.id)
    }
}

impl VectorStore for ChromaStore {
    #[instrument(skip_all, fields(collection = %collection))]
    fn upsert(&self, collection: &str, id: &str, text: &str, vector: &[f32]) -> Result<()> {
        let collection_id = self.collection_id(collection)?;
        let id = document_id(id);
        let request = AddRequest {
            ids: [id.as_str()],
            documents: [text],
            embeddings: [vector],
        };
        let url = format!("{}/{collection_id}/add", self.collections_url());
        http::post(&self.agent, &url, &request)
            .with_context(|| format!("add document {id} to {collection}"))?;
        debug!(id = %id, "document stored");
        Ok(())
    }

    #[instrument(skip_all, fields(collection = %collection, k = k))]
    fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<String>> {
        let collection_id = self.collection_id(collection)?;
        let request = QueryRequest {
            query_embeddings: [vector],
            n_results: k,
        };
        let url = format!("{}/{collection_id}/query", self.collections_url());
        let reply: QueryResponse = http::post_json(&self.agent, &url, &request)
            .with_context(|| format!("query {collection}"))?;
        Ok(first_result_list(reply))
    }
}

fn first_result_list(reply: QueryResponse) -> Vec<String> {
    reply
        .documents
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect()
}
