//! Key-rotating retry loop, the core of the chat proxy.
//!
//! Each request gets its own trial order from [`KeyRotation`]. Keys are tried
//! strictly one after another, never in parallel, so a request costs at most
//! one upstream call per configured key:
//!
//! - a success ends the loop and is returned;
//! - a retryable failure is remembered and the next key is tried;
//! - a fatal failure ends the loop immediately with that failure's status.
//!
//! When every key fails in a retryable way the last failure's message is
//! reported as `503`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::Config,
    error::ChatError,
    keys::{KeyPool, KeyRotation, KeySource},
    sanitize::ChatMessage,
    upstream::{CompletionClient, CompletionOutcome},
};

/// Reported when the loop ends without recording any failure.
pub const DEFAULT_UNAVAILABLE_MESSAGE: &str = "AI service unavailable.";

/// Shared application state injected into every handler via [`axum::extract::State`].
pub struct ProxyState {
    pub config: Arc<Config>,
    /// Where `API_KEY_*` variables are read from on every request.
    pub keys: KeySource,
    /// Created once; survives for the process lifetime.
    pub rotation: KeyRotation,
    pub completions: CompletionClient,
}

impl ProxyState {
    pub fn new(config: Arc<Config>, keys: KeySource) -> anyhow::Result<Self> {
        let completions = CompletionClient::new(&config.upstream)?;
        Ok(Self {
            config,
            keys,
            rotation: KeyRotation::new(),
            completions,
        })
    }
}

/// Obtain an answer for `messages`, trying keys from `pool` in rotated order.
#[tracing::instrument(skip_all, fields(keys = pool.len(), messages = messages.len()))]
pub async fn answer(
    state: &ProxyState,
    pool: &KeyPool,
    messages: &[ChatMessage],
) -> Result<String, ChatError> {
    let order = state.rotation.next_order(pool);
    let mut last_error = DEFAULT_UNAVAILABLE_MESSAGE.to_owned();

    for (attempt, key) in order.iter().enumerate() {
        match state.completions.complete(key, messages).await {
            CompletionOutcome::Success { answer } => {
                info!(key = key.index, attempt, "upstream answered");
                return Ok(answer);
            }
            CompletionOutcome::Retryable { status, message } => {
                warn!(key = key.index, attempt, %status, %message, "retryable upstream failure, trying next key");
                last_error = message;
            }
            CompletionOutcome::Fatal { status, message } => {
                warn!(key = key.index, attempt, %status, %message, "fatal upstream failure, not retrying");
                return Err(ChatError::Upstream { status, message });
            }
        }
    }

    warn!(attempts = order.len(), "all keys exhausted");
    Err(ChatError::Unavailable(last_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::UpstreamConfig, sanitize::Role};
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn state_for(server: &MockServer, keys: &[(&str, &str)]) -> ProxyState {
        let config = Config {
            upstream: UpstreamConfig {
                url: format!("{}/v1/chat/completions", server.uri()),
                timeout_ms: 5_000,
                ..UpstreamConfig::default()
            },
            ..Config::default()
        };
        let vars = keys.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ProxyState::new(Arc::new(config), KeySource::Fixed(vars)).unwrap()
    }

    fn hello() -> Vec<ChatMessage> {
        vec![ChatMessage { role: Role::User, content: "Hi".into() }]
    }

    async fn respond_for_key(server: &MockServer, secret: &str, template: ResponseTemplate, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", format!("Bearer {secret}").as_str()))
            .respond_with(template)
            .expect(calls)
            .mount(server)
            .await;
    }

    fn ok(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_json(json!({ "choices": [{ "message": { "content": content } }] }))
    }

    fn failing(code: u16, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(code).set_body_json(json!({ "error": { "message": message } }))
    }

    // -----------------------------------------------------------------------
    // Retry loop
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn retryable_failure_moves_on_to_next_key() {
        let server = MockServer::start().await;
        respond_for_key(&server, "sk-1", failing(429, "rate limited"), 1).await;
        respond_for_key(&server, "sk-2", ok("From the second key."), 1).await;

        let state = state_for(&server, &[("API_KEY_1", "sk-1"), ("API_KEY_2", "sk-2")]);
        let pool = state.keys.pool();
        let answer = answer(&state, &pool, &hello()).await.unwrap();
        assert_eq!(answer, "From the second key.");
    }

    #[tokio::test]
    async fn fatal_failure_stops_without_trying_remaining_keys() {
        let server = MockServer::start().await;
        respond_for_key(&server, "sk-1", failing(400, "bad request"), 1).await;
        respond_for_key(&server, "sk-2", ok("Never reached."), 0).await;

        let state = state_for(&server, &[("API_KEY_1", "sk-1"), ("API_KEY_2", "sk-2")]);
        let pool = state.keys.pool();
        let err = answer(&state, &pool, &hello()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "bad request");
    }

    #[tokio::test]
    async fn exhausting_all_keys_reports_last_error_as_503() {
        let server = MockServer::start().await;
        respond_for_key(&server, "sk-1", failing(500, "first failure"), 1).await;
        respond_for_key(&server, "sk-2", failing(401, "invalid token"), 1).await;

        let state = state_for(&server, &[("API_KEY_1", "sk-1"), ("API_KEY_2", "sk-2")]);
        let pool = state.keys.pool();
        let err = answer(&state, &pool, &hello()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "invalid token");
    }

    #[tokio::test]
    async fn successive_requests_start_with_different_keys() {
        let server = MockServer::start().await;
        respond_for_key(&server, "sk-1", ok("One."), 1).await;
        respond_for_key(&server, "sk-2", ok("Two."), 1).await;

        let state = state_for(&server, &[("API_KEY_1", "sk-1"), ("API_KEY_2", "sk-2")]);
        let pool = state.keys.pool();
        assert_eq!(answer(&state, &pool, &hello()).await.unwrap(), "One.");
        assert_eq!(answer(&state, &pool, &hello()).await.unwrap(), "Two.");
    }

    #[tokio::test]
    async fn each_key_is_tried_at_most_once_per_request() {
        let server = MockServer::start().await;
        respond_for_key(&server, "sk-1", failing(503, "busy"), 1).await;

        let state = state_for(&server, &[("API_KEY_1", "sk-1")]);
        let pool = state.keys.pool();
        let err = answer(&state, &pool, &hello()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "busy");
    }

    #[tokio::test]
    async fn empty_pool_reports_default_unavailable_message() {
        let server = MockServer::start().await;
        let state = state_for(&server, &[]);
        let err = answer(&state, &KeyPool::default(), &hello()).await.unwrap_err();
        assert_eq!(err.to_string(), DEFAULT_UNAVAILABLE_MESSAGE);
    }
}
