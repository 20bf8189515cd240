//! Streaming bridge: a per-request, single-threaded state machine that
//! reads upstream SSE chunk deltas and emits Responses lifecycle events,
//! with per-tool-call-index aggregation for concurrent tool calls.

use std::collections::HashMap;
use std::sync::Arc;

use axum::response::sse::Event;
use futures_core::Stream;
use serde_json::{json, Value};
use uuid::Uuid;

use ob_domain::model::{
    ChatMessage, ErrorBody, OutputContentPart, OutputItem, ResponseObject, ResponseStatus,
    StoredTurn, ToolCallOut, TranslationContext,
};
use ob_domain::store::ConversationStore;
use ob_domain::tool_registry::registry;
use ob_upstream::sse::BoxStream;
use ob_upstream::SseFrame;

pub struct BridgeRequest {
    pub response_id: String,
    pub model: String,
    pub created_at: i64,
    pub pre_turn_messages: Vec<ChatMessage>,
    pub context: TranslationContext,
    pub store: Arc<dyn ConversationStore>,
    pub state_enabled: bool,
    pub ttl_seconds: u64,
}

#[derive(Default)]
struct TextAggregator {
    item_id: String,
    opened: bool,
    buffer: String,
}

struct ToolCallAggregator {
    item_id: String,
    call_id: String,
    function_name: String,
    arguments: String,
    wire_type: String,
}

/// Drives one upstream SSE stream to completion, yielding Responses SSE
/// events in emission order. Consumes `req` and the upstream stream; owns
/// all per-request aggregation state locally — this state is never shared
/// across requests, so no locking is needed.
pub fn bridge_stream(
    mut upstream: BoxStream<'static, ob_domain::error::Result<SseFrame>>,
    mut req: BridgeRequest,
) -> impl Stream<Item = Event> + Send + 'static {
    async_stream::stream! {
        let mut created_emitted = false;
        let mut text = TextAggregator::default();
        let mut tool_calls: HashMap<u64, ToolCallAggregator> = HashMap::new();
        let mut tool_call_order: Vec<u64> = Vec::new();
        let mut finish_reason: Option<String> = None;

        loop {
            let frame = match futures_util::StreamExt::next(&mut upstream).await {
                Some(f) => f,
                None => {
                    yield sse_event("response.failed", json!({
                        "error": ErrorBody::from_error(&ob_domain::error::Error::Upstream(
                            "stream ended without completion".into(),
                        )),
                    }));
                    break;
                }
            };

            match frame {
                Ok(SseFrame::Done) => {
                    if !created_emitted {
                        yield sse_event("response.created", json!({
                            "id": req.response_id, "model": req.model, "created_at": req.created_at,
                        }));
                        created_emitted = true;
                    }

                    if text.opened {
                        yield sse_event("response.output_text.done", json!({
                            "item_id": text.item_id, "text": text.buffer,
                        }));
                        yield sse_event("response.content_part.done", json!({"item_id": text.item_id}));
                        yield sse_event("response.output_item.done", json!({
                            "id": text.item_id, "type": "message",
                        }));
                    }

                    for index in &tool_call_order {
                        let agg = &tool_calls[index];
                        yield sse_event("response.function_call_arguments.done", json!({
                            "item_id": agg.item_id, "arguments": agg.arguments,
                        }));
                        yield sse_event("response.output_item.done", json!({
                            "id": agg.item_id, "type": agg.wire_type, "call_id": agg.call_id,
                        }));
                    }

                    let output = build_output(&text, &tool_calls, &tool_call_order, &req.context);
                    let status = if finish_reason.as_deref() == Some("length") {
                        ResponseStatus::Incomplete
                    } else {
                        ResponseStatus::Completed
                    };
                    let response = ResponseObject::new(
                        req.response_id.clone(),
                        req.created_at,
                        req.model.clone(),
                        status,
                        &output,
                        None,
                        if req.context.reasoning_to_replay.is_empty() {
                            None
                        } else {
                            Some(Value::Array(req.context.reasoning_to_replay.clone()))
                        },
                    );

                    yield sse_event("response.completed", json!({
                        "response": serde_json::to_value(&response).unwrap_or(Value::Null),
                    }));

                    if req.state_enabled {
                        persist_turn(&req, &text, &tool_calls, &tool_call_order).await;
                    }

                    break;
                }
                Ok(SseFrame::Data(raw)) => {
                    let chunk: Value = match serde_json::from_str(&raw) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    if !created_emitted {
                        yield sse_event("response.created", json!({
                            "id": req.response_id, "model": req.model, "created_at": req.created_at,
                        }));
                        created_emitted = true;
                    }

                    let choice = &chunk["choices"][0];
                    if let Some(fr) = choice.get("finish_reason").and_then(Value::as_str) {
                        finish_reason = Some(fr.to_string());
                    }
                    let delta = &choice["delta"];

                    if let Some(content) = delta.get("content").and_then(Value::as_str) {
                        if !content.is_empty() {
                            if !text.opened {
                                text.item_id = new_id("msg");
                                text.opened = true;
                                yield sse_event("response.output_item.added", json!({
                                    "id": text.item_id, "type": "message",
                                }));
                                yield sse_event("response.content_part.added", json!({
                                    "item_id": text.item_id,
                                    "part": {"type": "output_text", "text": ""},
                                }));
                            }
                            text.buffer.push_str(content);
                            yield sse_event("response.output_text.delta", json!({
                                "item_id": text.item_id, "delta": content,
                            }));
                        }
                    }

                    if let Some(deltas) = delta.get("tool_calls").and_then(Value::as_array) {
                        for tc_delta in deltas {
                            let index = tc_delta.get("index").and_then(Value::as_u64).unwrap_or(0);

                            if !tool_calls.contains_key(&index) {
                                let call_id = tc_delta.get("id").and_then(Value::as_str).unwrap_or_default();
                                let name = tc_delta
                                    .get("function")
                                    .and_then(|f| f.get("name"))
                                    .and_then(Value::as_str)
                                    .unwrap_or_default();
                                let wire_type = req
                                    .context
                                    .tool_map
                                    .external_type_for(name)
                                    .map(|ext| format!("{ext}_call"))
                                    .unwrap_or_else(|| "function_call".to_string());
                                let item_id = new_id("fc");

                                yield sse_event("response.output_item.added", json!({
                                    "id": item_id, "type": wire_type, "call_id": call_id, "arguments": "",
                                }));

                                tool_calls.insert(index, ToolCallAggregator {
                                    item_id,
                                    call_id: call_id.to_string(),
                                    function_name: name.to_string(),
                                    arguments: String::new(),
                                    wire_type,
                                });
                                tool_call_order.push(index);
                            }

                            if let Some(arg_fragment) = tc_delta
                                .get("function")
                                .and_then(|f| f.get("arguments"))
                                .and_then(Value::as_str)
                            {
                                if let Some(agg) = tool_calls.get_mut(&index) {
                                    agg.arguments.push_str(arg_fragment);
                                    yield sse_event("response.function_call_arguments.delta", json!({
                                        "item_id": agg.item_id, "delta": arg_fragment,
                                    }));
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    yield sse_event("response.failed", json!({
                        "error": ErrorBody::from_error(&e),
                    }));
                    break;
                }
            }
        }
    }
}

fn build_output(
    text: &TextAggregator,
    tool_calls: &HashMap<u64, ToolCallAggregator>,
    order: &[u64],
    ctx: &TranslationContext,
) -> Vec<OutputItem> {
    let mut output = Vec::new();
    if text.opened {
        output.push(OutputItem::Message {
            id: text.item_id.clone(),
            content: vec![OutputContentPart::OutputText { text: text.buffer.clone() }],
        });
    }
    for index in order {
        let agg = &tool_calls[index];
        output.push(expand_tool_call(agg, ctx));
    }
    output
}

fn expand_tool_call(agg: &ToolCallAggregator, ctx: &TranslationContext) -> OutputItem {
    if let Some(external_type) = ctx.tool_map.external_type_for(&agg.function_name) {
        if let Some(entry) = registry().lookup(external_type) {
            let args_value: Value = serde_json::from_str(&agg.arguments).unwrap_or(Value::Null);
            let fields = entry.projection.to_external_fields(&args_value);
            return OutputItem::BuiltinCall {
                id: agg.item_id.clone(),
                external_type: external_type.to_string(),
                call_id: agg.call_id.clone(),
                fields,
            };
        }
    }
    OutputItem::FunctionCall {
        id: agg.item_id.clone(),
        call_id: agg.call_id.clone(),
        name: agg.function_name.clone(),
        arguments: agg.arguments.clone(),
    }
}

async fn persist_turn(
    req: &BridgeRequest,
    text: &TextAggregator,
    tool_calls: &HashMap<u64, ToolCallAggregator>,
    order: &[u64],
) {
    let mut messages = req.pre_turn_messages.clone();
    let assistant_tool_calls: Vec<ToolCallOut> = order
        .iter()
        .map(|i| {
            let agg = &tool_calls[i];
            ToolCallOut {
                id: agg.call_id.clone(),
                name: agg.function_name.clone(),
                arguments: agg.arguments.clone(),
            }
        })
        .collect();

    messages.push(ChatMessage::Assistant {
        content: if text.buffer.is_empty() { None } else { Some(text.buffer.clone()) },
        tool_calls: assistant_tool_calls,
        reasoning_details: req.context.reasoning_to_replay.clone(),
    });

    let turn = StoredTurn {
        messages,
        tool_map: req.context.tool_map.clone(),
        model: req.model.clone(),
        created_at: req.created_at,
    };

    if let Err(e) = req.store.put(req.response_id.clone(), turn, req.ttl_seconds).await {
        tracing::warn!(error = %e, response_id = %req.response_id, "failed to persist streamed turn");
    }
}

fn sse_event(name: &str, data: Value) -> Event {
    Event::default().event(name).data(data.to_string())
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}
