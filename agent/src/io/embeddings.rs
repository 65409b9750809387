//! Embedding collaborator.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::io::config::EmbeddingsConfig;
use crate::io::http;

/// Text embedding service.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Client for an Ollama-compatible `/api/embed` endpoint.
pub struct OllamaEmbedder {
    agent: ureq::Agent,
    url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f64>>,
}

impl OllamaEmbedder {
    pub fn new(cfg: &EmbeddingsConfig) -> Self {
        Self {
            agent: http::agent(cfg.timeout()),
            url: http::endpoint(&cfg.base_url, "/api/embed"),
            model: cfg.model.clone(),
        }
    }
}

impl Embedder for OllamaEmbedder {
    #[instrument(skip_all, fields(model = %self.model, text_len = text.len()))]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };
        let reply: EmbedResponse =
            http::post_json(&self.agent, &self.url, &request).context("generate embedding")?;
        first_vector(reply)
    }
}

fn first_vector(reply: EmbedResponse) -> Result<Vec<f32>> {
    let first = reply
        .embeddings
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no embeddings returned"))?;
    Ok(first.into_iter().map(|v| v as f32).collect())
}
