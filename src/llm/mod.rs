//! Shared LLM collaborator: a thin `reqwest` client used by the Dense
//! Embedder (§4.3), the Ingredient Resolver's `generateAliases` (§4.1), and
//! the Substitution Planner (§4.9).
//!
//! Grounded on the nearest-neighbor example's `api_connection/connection.rs`
//! (bearer-auth JSON POST against an OpenAI-compatible endpoint, typed error
//! enum via `thiserror`-free `impl std::error::Error`); generalized here into
//! `anyhow` since callers only need a log-and-degrade boundary, never a typed
//! variant (§7: LLM failures become a local sentinel, not a propagated
//! error).

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;

const LLM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embed_model: String,
    embed_dim: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(LLM_TIMEOUT)
            .build()
            .expect("failed to build LLM http client");

        Self {
            http,
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            chat_model: config.llm_chat_model.clone(),
            embed_model: config.llm_embed_model.clone(),
            embed_dim: config.llm_embed_dim,
        }
    }

    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    /// Lightweight availability probe (§4.3): a GET against the provider's
    /// models endpoint, never an exception to the caller.
    pub async fn probe_available(&self) -> bool {
        match self
            .http
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                tracing::warn!(%err, "LLM availability probe failed");
                false
            }
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.embed_model,
            input: text,
        };

        let response = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("embedding request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("embedding API returned {status}: {body}"));
        }

        let parsed: EmbeddingResponse = response.json().await.context("invalid embedding response")?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("embedding response contained no data"))
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: 0.2,
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("chat completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat API returned {status}: {body}"));
        }

        let parsed: ChatResponse = response.json().await.context("invalid chat response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat response contained no choices"))
    }

    /// Sends a system/user prompt and defensively parses the reply as JSON:
    /// either a bare value, or a value embedded in a ```json fenced block
    /// (models routinely wrap JSON in prose and fences despite instructions).
    pub async fn chat_json(&self, system: &str, user: &str) -> Result<Value> {
        let content = self.chat(system, user).await?;
        parse_json_loosely(&content)
    }
}

fn parse_json_loosely(content: &str) -> Result<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(start) = trimmed.find('{').filter(|&s| {
        trimmed.find('[').map_or(true, |a| s < a)
    }) {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }
    if let Some(start) = trimmed.find('[') {
        if let Some(end) = trimmed.rfind(']') {
            if end > start {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }

    Err(anyhow!("could not find JSON in LLM response: {trimmed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json_array() {
        let value = parse_json_loosely(r#"["roma tomato", "cherry tomato"]"#).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn parses_json_fenced_in_prose() {
        let value = parse_json_loosely(
            "Sure, here are the variants:\n```json\n[\"roma tomato\", \"plum tomato\"]\n```\nHope that helps!",
        )
        .unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn parses_object_with_array_field() {
        let value = parse_json_loosely(r#"{"variants": ["roma tomato"], "note": "ok"}"#).unwrap();
        assert!(value.get("variants").is_some());
    }
}
