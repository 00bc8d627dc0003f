//! Error type for the chat route.
//!
//! Every way a chat request can fail maps to one [`ChatError`] variant, and
//! every variant renders as `{"error": "<message>"}` with a fixed status. The
//! only messages that originate outside this file are the upstream's own
//! error text and JSON parse errors.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

/// `Content-Type` on every JSON response from the proxy.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Method not allowed.")]
    MethodNotAllowed,

    #[error("No API keys configured. Add API_KEY_1 and API_KEY_2.")]
    NoKeys,

    #[error("Request body too large.")]
    BodyTooLarge,

    #[error("Invalid request body.")]
    InvalidBody,

    /// The body was read but is not JSON; carries the parser's message.
    #[error("{0}")]
    InvalidJson(String),

    #[error("A non-empty messages array is required.")]
    EmptyConversation,

    /// Non-retryable upstream failure, surfaced with the upstream's status.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    /// Every key was tried and each attempt failed in a retryable way.
    #[error("{0}")]
    Unavailable(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NoKeys => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BodyTooLarge
            | Self::InvalidBody
            | Self::InvalidJson(_)
            | Self::EmptyConversation => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self, "chat request failed");
        } else {
            tracing::debug!(%status, error = %self, "chat request rejected");
        }
        json_response(status, json!({ "error": self.to_string() }))
    }
}

/// Serialize `body` with the proxy's JSON content type.
pub fn json_response(status: StatusCode, body: Value) -> Response {
    let mut response = (status, body.to_string()).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}
