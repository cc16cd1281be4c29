//! Reasoning Oracle: the external text-generation capability behind every stage.
//!
//! `OracleBridge` talks to any OpenAI-compatible chat-completions endpoint
//! (OpenRouter, Azure, local). The pipeline never constructs it; the gateway
//! builds one from `OracleConfig` and injects it, so tests can swap in a stub.

use crate::config::OracleConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle API {status}: {body}")]
    Api { status: u16, body: String },
    #[error("oracle response parse: {0}")]
    Parse(String),
    #[error("oracle returned no choices")]
    Empty,
}

/// Synchronous-in-spirit generation seam: one prompt in, one text out.
/// Implementations may be slow and may fail transiently; callers decide
/// whether a failure is fatal for their stage.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Generate text for `prompt` under the given role instructions
    /// (sent as the system message).
    async fn generate(&self, prompt: &str, role_instructions: &str) -> Result<String, OracleError>;

    /// Model identifier recorded on every reasoning step this oracle produces.
    fn model_id(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// Reqwest-backed bridge to an OpenAI-compatible chat endpoint.
pub struct OracleBridge {
    config: OracleConfig,
    client: reqwest::Client,
}

impl OracleBridge {
    pub fn new(config: OracleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }
}

#[async_trait]
impl ReasoningOracle for OracleBridge {
    async fn generate(&self, prompt: &str, role_instructions: &str) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: role_instructions.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = self.config.api_key.as_deref() {
            req = req.bearer_auth(key);
        }

        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(OracleError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        extract_reply(&text)
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

/// Pull the first choice's text out of a chat-completions body. A missing or
/// whitespace-only content is `Empty`: a blank reply must never become a
/// completed step's output.
fn extract_reply(body: &str) -> Result<String, OracleError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| OracleError::Parse(e.to_string()))?;
    let content = parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or(OracleError::Empty)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(OracleError::Empty);
    }
    Ok(content.to_string())
}
