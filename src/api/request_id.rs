//! Request ID middleware.
//!
//! Every inbound request is tagged with an `X-Request-ID`, taken from the
//! caller when present and freshly generated (UUID v4) otherwise. The ID is
//! echoed in the response header and attached to a [`tracing`] span so the
//! retry loop's per-key log lines for one chat request can be grouped together.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Instrument as _;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied ID that is accepted as-is.
const MAX_CALLER_ID_LEN: usize = 128;

/// Apply **inside** `tower_http::TraceLayer` so it runs within the trace span.
pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_CALLER_ID_LEN)
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!("request", id = %id);
    let mut response = next.run(req).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}
