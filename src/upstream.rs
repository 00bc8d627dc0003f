//! HTTP client for the upstream chat-completions endpoint.
//!
//! A [`CompletionClient`] performs exactly one call per [`complete`] and
//! folds every possible result (transport errors, unexpected bodies, error
//! statuses) into a [`CompletionOutcome`]. It never retries on its own; the
//! caller decides whether another key is worth trying.
//!
//! [`complete`]: CompletionClient::complete

use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::UpstreamConfig,
    keys::ApiKey,
    normalize::normalize_reply,
    prompt::RESPONSE_STYLE,
    sanitize::ChatMessage,
};

/// Output token budget requested from the model.
pub const MAX_OUTPUT_TOKENS: u32 = 90;

/// Sampling temperature; low for short, near-deterministic replies.
pub const TEMPERATURE: f64 = 0.3;

/// Upstream bodies larger than this are abandoned as unreadable.
pub const MAX_UPSTREAM_BODY_BYTES: usize = 1_000_000;

pub const UNREACHABLE_MESSAGE: &str = "Unable to reach the AI service.";
pub const EMPTY_REPLY_MESSAGE: &str = "The AI service returned an empty response.";
pub const REQUEST_FAILED_MESSAGE: &str = "AI service request failed.";

/// Result of a single upstream attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Normalized, non-empty reply.
    Success { answer: String },
    /// Another key (or a later attempt) might succeed.
    Retryable { status: StatusCode, message: String },
    /// No key substitution can fix this; surface it as-is.
    Fatal { status: StatusCode, message: String },
}

/// Statuses worth retrying with a different key. `401` and `403` are here
/// because they usually mean one bad or revoked key, not a bad request.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        401 | 403 | 408 | 409 | 425 | 429 | 500 | 502 | 503 | 504
    )
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f64,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// The parts of an upstream response the proxy reads. Every field is
/// optional; a body that does not fit this shape is treated as empty.
#[derive(Debug, Default, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<Value>,
}

impl CompletionResponse {
    fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Text of the first choice, if it is a string.
    fn content(&self) -> Option<&str> {
        self.choices
            .first()?
            .message
            .as_ref()?
            .content
            .as_ref()?
            .as_str()
    }

    /// `error.message`, or a bare string `error` as some providers send.
    fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(message) => Some(message.clone()),
            Value::Object(obj) => obj.get("message")?.as_str().map(String::from),
            _ => None,
        }
    }
}

/// Client for one configured chat-completions endpoint.
///
/// [`Client`] pools connections internally, so one instance is built at
/// startup and shared by every request.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    url: String,
    model: String,
    system_prompt: String,
}

impl CompletionClient {
    pub fn new(cfg: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("building reqwest client")?;

        Ok(Self {
            client,
            url: cfg.url.clone(),
            model: cfg.model.clone(),
            system_prompt: cfg.system_prompt.clone(),
        })
    }

    /// Send the conversation upstream with `key` and classify the result.
    ///
    /// The request carries the configured system prompt, the fixed style
    /// instructions, then `messages` in order.
    pub async fn complete(&self, key: &ApiKey, messages: &[ChatMessage]) -> CompletionOutcome {
        let body = CompletionRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: [
                WireMessage { role: "system", content: &self.system_prompt },
                WireMessage { role: "system", content: RESPONSE_STYLE },
            ]
            .into_iter()
            .chain(messages.iter().map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
            }))
            .collect(),
        };

        let response = match self
            .client
            .post(&self.url)
            .bearer_auth(&key.secret)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(key = key.index, error = %e, timeout = e.is_timeout(), "upstream request failed");
                return network_failure();
            }
        };

        let status = response.status();
        let body = match read_bounded(response).await {
            Ok(body) => body,
            Err(e) => {
                debug!(key = key.index, %status, error = %e, "reading upstream body failed");
                return network_failure();
            }
        };
        let payload = serde_json::from_slice::<Value>(&body);

        if !status.is_success() {
            let message = payload
                .ok()
                .map(CompletionResponse::from_value)
                .and_then(|r| r.error_message())
                .unwrap_or_else(|| REQUEST_FAILED_MESSAGE.to_owned());
            return if is_retryable_status(status) {
                CompletionOutcome::Retryable { status, message }
            } else {
                CompletionOutcome::Fatal { status, message }
            };
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return empty_reply();
        }
        let Ok(payload) = payload else {
            debug!(key = key.index, %status, "upstream returned malformed JSON");
            return network_failure();
        };

        let answer = CompletionResponse::from_value(payload)
            .content()
            .map(normalize_reply)
            .unwrap_or_default();
        if answer.is_empty() {
            return empty_reply();
        }
        CompletionOutcome::Success { answer }
    }
}

/// Collect the response body, giving up once it exceeds
/// [`MAX_UPSTREAM_BODY_BYTES`].
async fn read_bounded(mut response: reqwest::Response) -> anyhow::Result<BytesMut> {
    if let Some(len) = response.content_length() {
        anyhow::ensure!(
            len <= MAX_UPSTREAM_BODY_BYTES as u64,
            "declared body of {len} bytes exceeds limit"
        );
    }
    let mut buf = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        anyhow::ensure!(
            buf.len() + chunk.len() <= MAX_UPSTREAM_BODY_BYTES,
            "body exceeds {MAX_UPSTREAM_BODY_BYTES} bytes"
        );
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn empty_reply() -> CompletionOutcome {
    CompletionOutcome::Retryable {
        status: StatusCode::BAD_GATEWAY,
        message: EMPTY_REPLY_MESSAGE.to_owned(),
    }
}

fn network_failure() -> CompletionOutcome {
    CompletionOutcome::Retryable {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: UNREACHABLE_MESSAGE.to_owned(),
    }
}
