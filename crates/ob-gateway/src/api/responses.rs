//! `POST|GET|DELETE /v1/responses*`: a single create handler splits
//! between a JSON and an SSE reply depending on the request's `stream`
//! flag; separate handlers cover retrieval and deletion against the
//! conversation store.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use serde_json::json;
use uuid::Uuid;

use ob_domain::model::ResponsesRequest;

use crate::error_response::ApiError;
use crate::orchestrator;
use crate::state::AppState;
use crate::translate::project_stored_turn;

pub async fn create(State(state): State<AppState>, Json(req): Json<ResponsesRequest>) -> Response {
    let request_id = Uuid::new_v4().simple().to_string();
    state.requests_total.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let result = if req.stream {
        orchestrator::handle_stream(&state, &req).await.map(|stream| {
            let stream = stream.map(Ok::<_, Infallible>);
            Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
        })
    } else {
        orchestrator::handle_non_stream(&state, &req)
            .await
            .map(|resp| Json(resp).into_response())
    };

    let mut response = match result {
        Ok(r) => r,
        Err(e) => ApiError(e).into_response(),
    };
    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

pub async fn retrieve(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match orchestrator::get_stored_response(&state, &id).await {
        Ok(turn) => Json(project_stored_turn(&turn, &id)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match orchestrator::delete_stored_response(&state, &id).await {
        Ok(existed) => Json(json!({"id": id, "deleted": existed})).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
