//! Operational endpoints: `/healthz`, `/version`, `/metrics`.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn version() -> Json<Value> {
    Json(json!({"name": "openbridge", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn metrics(State(state): State<AppState>) -> Json<Value> {
    let requests_total = state.requests_total.load(std::sync::atomic::Ordering::Relaxed);
    Json(json!({
        "store_backend": format!("{:?}", state.config.store.backend),
        "requests_total": requests_total,
    }))
}
