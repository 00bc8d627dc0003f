//! Liveness probe.

use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::error::json_response;

/// `GET /healthz`: `200 {"status": "ok"}` whenever the process is serving.
///
/// Never touches the upstream or the key pool, so a missing `API_KEY_*`
/// configuration does not fail the probe; that surfaces on `/api/chat`.
pub async fn healthz() -> impl IntoResponse {
    json_response(StatusCode::OK, json!({ "status": "ok" }))
}
