//! Shared blocking HTTP plumbing for the collaborator clients.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Build an agent whose every request fails after `timeout`.
pub fn agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .new_agent()
}

/// POST `body` as JSON and decode the JSON reply.
pub fn post_json<B: Serialize, R: DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    body: &B,
) -> Result<R> {
    let payload = serde_json::to_string(body).context("encode request body")?;
    let mut resp = agent
        .post(url)
        .header("Content-Type", "application/json")
        .send(payload)
        .with_context(|| format!("POST {url}"))?;
    let text = resp
        .body_mut()
        .read_to_string()
        .with_context(|| format!("read response from {url}"))?;
    decode(url, &text)
}

/// POST `body` as JSON, ignoring the reply body.
pub fn post<B: Serialize>(agent: &ureq::Agent, url: &str, body: &B) -> Result<()> {
    let payload = serde_json::to_string(body).context("encode request body")?;
    agent
        .post(url)
        .header("Content-Type", "application/json")
        .send(payload)
        .with_context(|| format!("POST {url}"))?;
    Ok(())
}

/// GET `url` and decode the JSON reply.
pub fn get_json<R: DeserializeOwned>(agent: &ureq::Agent, url: &str) -> Result<R> {
    let mut resp = agent.get(url).call().with_context(|| format!("GET {url}"))?;
    let text = resp
        .body_mut()
        .read_to_string()
        .with_context(|| format!("read response from {url}"))?;
    decode(url, &text)
}

fn decode<R: DeserializeOwned>(url: &str, text: &str) -> Result<R> {
    serde_json::from_str(text).with_context(|| format!("decode response from {url}"))
}

/// Join `base` and an absolute `path` without doubling the slash.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
