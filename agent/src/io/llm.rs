//! Language-model collaborator.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::io::config::LlmConfig;
use crate::io::http;

/// Text generation service.
pub trait LanguageModel: Send + Sync {
    /// Generate a reply to `prompt`. Non-empty `context` snippets are offered
    /// to the model ahead of the prompt.
    fn generate(&self, prompt: &str, context: Option<&[String]>) -> Result<String>;
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaClient {
    agent: ureq::Agent,
    url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(cfg: &LlmConfig) -> Self {
        Self {
            agent: http::agent(cfg.timeout()),
            url: http::endpoint(&cfg.base_url, "/api/generate"),
            model: cfg.model.clone(),
        }
    }
}

impl LanguageModel for OllamaClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    fn generate(&self, prompt: &str, context: Option<&[String]>) -> Result<String> {
        let full_prompt = with_context(prompt, context.unwrap_or_default());
        let request = GenerateRequest {
            model: &self.model,
            prompt: &full_prompt,
            stream: false,
        };
        let reply: GenerateResponse =
            http::post_json(&self.agent, &self.url, &request).context("generate response")?;
        debug!(reply_len = reply.response.len(), "model replied");
        Ok(reply.response)
    }
}

/// Prefix `prompt` with a numbered "Context information" block.
pub fn with_context(prompt: &str, context: &[String]) -> String {
    if context.is_empty() {
        return prompt.to_string();
    }
    let mut out = String::from("Context information:\n");
    for (i, snippet) in context.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, snippet));
    }
    out.push('\n');
    out.push_str(prompt);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_leaves_prompt_untouched() {
        assert_eq!(with_context("list files", &[]), "list files");
    }

    #[test]
    fn context_is_numbered_before_prompt() {
        let context = vec!["first doc".to_string(), "second doc".to_string()];
        assert_eq!(
            with_context("list files", &context),
            "Context information:\n1. first doc\n2. second doc\n\nlist files"
        );
    }
}
