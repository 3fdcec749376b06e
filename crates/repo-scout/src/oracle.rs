//! Model oracle boundary.
//!
//! The loop needs exactly one operation from the language model: hand it the
//! full conversation, get back one free-form text block. `ModelOracle` is that
//! seam; `ChatCompletionsOracle` implements it against any OpenAI-compatible
//! `/chat/completions` endpoint (GitHub Models by default).
//!
//! Oracle failure is the one error class a query cannot absorb — the loop
//! cannot proceed without its decision maker, so these errors propagate to
//! the caller instead of becoming observation payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::OracleConfig;

/// Conversation role. Observations are injected as `User` messages; the
/// oracle must never author one itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the append-only conversation owned by a single query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Errors from the oracle boundary. Fatal for the query that hit them.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("oracle API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("oracle response carried no message content")]
    EmptyResponse,
}

/// The request/response oracle the loop consults once per iteration.
#[async_trait]
pub trait ModelOracle: Send + Sync {
    /// Complete the conversation; returns the raw assistant text.
    async fn complete(&self, messages: &[Message]) -> Result<String, OracleError>;
}

/// Production oracle over an OpenAI-compatible chat-completions endpoint.
pub struct ChatCompletionsOracle {
    http: reqwest::Client,
    config: OracleConfig,
}

impl ChatCompletionsOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ModelOracle for ChatCompletionsOracle {
    async fn complete(&self, messages: &[Message]) -> Result<String, OracleError> {
        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "max_tokens": self.config.max_tokens,
        });

        let mut request = self.http.post(self.completions_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = resp.json().await?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or(OracleError::EmptyResponse)?;
        debug!(chars = content.len(), "oracle completion received");
        Ok(content.to_string())
    }
}
