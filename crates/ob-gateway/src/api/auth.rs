//! Bearer-token gate for the protected `/v1/responses*` routes.
//!
//! Authentication sits outside `ob_domain::error::Error`'s taxonomy, so
//! its failure mode (`unauthorized` / 401) is built directly rather than
//! routed through the core error type. A missing `api_token` in config
//! means auth is not enforced (local development mode).

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn require_bearer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = &state.config.server.api_token else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => next.run(req).await,
        _ => unauthorized(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"type": "unauthorized", "message": "missing or invalid bearer token"}})),
    )
        .into_response()
}
