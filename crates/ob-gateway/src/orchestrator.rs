//! The per-request controller. Sequences
//! load → translate → call → translate-back → store for one
//! `/v1/responses` request, composing the other modules without owning
//! any protocol detail itself.

use std::sync::Arc;

use axum::response::sse::Event;
use serde_json::Value;
use uuid::Uuid;

use ob_domain::error::{Error, Result};
use ob_domain::model::{ChatMessage, ResponseObject, ResponsesRequest, StoredTurn, ToolCallOut};
use ob_domain::store::ConversationStore;
use ob_upstream::sse::BoxStream;
use ob_upstream::SseFrame;

use crate::bridge::{bridge_stream, BridgeRequest};
use crate::state::AppState;
use crate::translate::{translate_request, translate_response};

/// Non-streaming request path. Returns the final `ResponseObject`,
/// persisting a `StoredTurn` on success when the store is enabled.
pub async fn handle_non_stream(state: &AppState, req: &ResponsesRequest) -> Result<ResponseObject> {
    guard_previous_response_id(state, req)?;

    let translated = translate_request(req, &state.config.translation, state.store.as_ref()).await?;
    let upstream_resp = state.upstream.call(translated.upstream_payload).await?;
    tracing::debug!(
        upstream_request_id = ?upstream_resp.upstream_request_id,
        "upstream call completed"
    );

    let response_id = new_response_id();
    let created_at = chrono::Utc::now().timestamp();
    let response = translate_response(&upstream_resp.body, &translated.model, &translated.context);
    let response = ResponseObject { id: response_id.clone(), created_at, ..response };

    if state.config.store.state_enabled() && matches!(
        response.status,
        ob_domain::model::ResponseStatus::Completed | ob_domain::model::ResponseStatus::Incomplete
    ) {
        let turn = build_stored_turn(
            &translated.messages,
            &upstream_resp.body,
            &translated.context,
            &translated.model,
            created_at,
        );
        state.store.put(response_id, turn, state.config.store.ttl_seconds).await?;
    }

    Ok(response)
}

/// Streaming request path. Returns a stream of Responses SSE events; the
/// caller (the HTTP handler) wraps it in `axum::response::sse::Sse`.
pub async fn handle_stream(
    state: &AppState,
    req: &ResponsesRequest,
) -> Result<impl futures_core::Stream<Item = Event> + Send + 'static> {
    guard_previous_response_id(state, req)?;

    let translated = translate_request(req, &state.config.translation, state.store.as_ref()).await?;
    let upstream_stream: BoxStream<'static, Result<SseFrame>> =
        state.upstream.call_stream(translated.upstream_payload).await?;

    let bridge_req = BridgeRequest {
        response_id: new_response_id(),
        model: translated.model,
        created_at: chrono::Utc::now().timestamp(),
        pre_turn_messages: translated.messages,
        context: translated.context,
        store: Arc::clone(&state.store),
        state_enabled: state.config.store.state_enabled(),
        ttl_seconds: state.config.store.ttl_seconds,
    };

    Ok(bridge_stream(upstream_stream, bridge_req))
}

/// Returns a previously stored turn's `messages`, projected back into a
/// minimal `ResponseObject`-shaped view for `GET /v1/responses/{id}`.
pub async fn get_stored_response(state: &AppState, response_id: &str) -> Result<StoredTurn> {
    if !state.config.store.state_enabled() {
        return Err(Error::NotImplemented("conversation store is disabled".into()));
    }
    state.store.get(response_id).await
}

pub async fn delete_stored_response(state: &AppState, response_id: &str) -> Result<bool> {
    if !state.config.store.state_enabled() {
        return Err(Error::NotImplemented("conversation store is disabled".into()));
    }
    state.store.delete(response_id).await
}

fn guard_previous_response_id(state: &AppState, req: &ResponsesRequest) -> Result<()> {
    if req.previous_response_id.is_some() && !state.config.store.state_enabled() {
        return Err(Error::NotImplemented(
            "previous_response_id requires an enabled conversation store".into(),
        ));
    }
    Ok(())
}

fn new_response_id() -> String {
    format!("resp_{}", Uuid::new_v4().simple())
}

/// Builds the post-turn `StoredTurn`: the pre-call messages plus the raw
/// upstream assistant message, kept in its virtualized (not un-virtualized)
/// shape so the next turn can send `tool_call_id`s the upstream recognizes.
fn build_stored_turn(
    pre_turn_messages: &[ChatMessage],
    upstream_body: &Value,
    ctx: &ob_domain::model::TranslationContext,
    model: &str,
    created_at: i64,
) -> StoredTurn {
    let mut messages = pre_turn_messages.to_vec();

    let message = &upstream_body["choices"][0]["message"];
    let content = message.get("content").and_then(Value::as_str).filter(|s| !s.is_empty());
    let tool_calls: Vec<ToolCallOut> = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|c| ToolCallOut {
                    id: c.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
                    name: c["function"].get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    arguments: c["function"]
                        .get("arguments")
                        .and_then(Value::as_str)
                        .unwrap_or("{}")
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    messages.push(ChatMessage::Assistant {
        content: content.map(String::from),
        tool_calls,
        reasoning_details: ctx.reasoning_to_replay.clone(),
    });

    StoredTurn {
        messages,
        tool_map: ctx.tool_map.clone(),
        model: model.to_string(),
        created_at,
    }
}
