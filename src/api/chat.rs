//! The `/api/chat` route, the only endpoint the portfolio widget talks to.
//!
//! This layer owns the HTTP concerns: method gating, CORS, bounded body
//! reading and JSON parsing. Key rotation and upstream calls live in
//! [`crate::proxy`].

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use bytes::BytesMut;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    error::{json_response, ChatError},
    proxy::{self, ProxyState},
    sanitize::sanitize_messages,
};

/// Path the widget posts to. Sub-paths are routed to the same handler.
pub const CHAT_ROUTE: &str = "/api/chat";

/// Request bodies larger than this are rejected while streaming.
pub const MAX_BODY_BYTES: usize = 1_000_000;

/// Build the axum router: the chat route (with CORS), `/healthz`, and a JSON
/// 404 for everything else.
pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route(CHAT_ROUTE, any(chat))
        .route("/api/chat/", any(chat))
        .route("/api/chat/{*rest}", any(chat))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), cors_middleware))
        .route("/healthz", get(crate::api::health::healthz))
        .fallback(not_found)
        .with_state(state)
}

/// `OPTIONS | POST /api/chat`.
///
/// Gates run in a fixed order (method, key pool, body, conversation) and the
/// first one that fails decides the response. A configuration problem is
/// therefore reported even when the body is also bad.
pub async fn chat(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    body: Body,
) -> Result<Response, ChatError> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    if method != Method::POST {
        return Err(ChatError::MethodNotAllowed);
    }

    let pool = state.keys.pool();
    if pool.is_empty() {
        return Err(ChatError::NoKeys);
    }

    let payload = read_json_body(body).await?;
    let messages = sanitize_messages(payload.get("messages").unwrap_or(&Value::Null));
    if messages.is_empty() {
        return Err(ChatError::EmptyConversation);
    }

    let answer = proxy::answer(&state, &pool, &messages).await?;
    Ok(json_response(StatusCode::OK, json!({ "answer": answer })))
}

/// Read at most [`MAX_BODY_BYTES`] and parse them as JSON. An empty body
/// parses as `{}`.
async fn read_json_body(body: Body) -> Result<Value, ChatError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            debug!(error = %e, "reading request body failed");
            ChatError::InvalidBody
        })?;
        if buf.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(ChatError::BodyTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }

    if buf.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_slice(&buf).map_err(|e| ChatError::InvalidJson(e.to_string()))
}

/// Adds the CORS headers to every response from the chat route, errors included.
async fn cors_middleware(
    State(state): State<Arc<ProxyState>>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    apply_cors(response.headers_mut(), &state.config.server.allowed_origin);
    response
}

fn apply_cors(headers: &mut HeaderMap, allowed_origin: &str) {
    // Validated at startup; an invalid origin simply omits the header.
    if let Ok(origin) = HeaderValue::from_str(allowed_origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

async fn not_found() -> Response {
    json_response(StatusCode::NOT_FOUND, json!({ "error": "Not found." }))
}
