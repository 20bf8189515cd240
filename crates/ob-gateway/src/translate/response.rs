//! Response translation (non-streaming path).
//!
//! Converts a single Chat Completions response body back into a
//! [`ResponseObject`], un-virtualizing tool calls through the turn's
//! [`TranslationContext::tool_map`].

use serde_json::Value;
use uuid::Uuid;

use ob_domain::model::{
    ChatMessage, OutputContentPart, OutputItem, ResponseObject, ResponseStatus, StoredTurn,
    TranslationContext, Usage,
};
use ob_domain::tool_registry::registry;

pub fn translate_response(body: &Value, model: &str, ctx: &TranslationContext) -> ResponseObject {
    let choice = &body["choices"][0];
    let message = &choice["message"];
    let finish_reason = choice.get("finish_reason").and_then(Value::as_str);

    let mut output = Vec::new();

    if let Some(reasoning) = extract_reasoning(message) {
        output.push(reasoning);
    }

    if let Some(content) = message.get("content").and_then(Value::as_str) {
        if !content.is_empty() {
            output.push(OutputItem::Message {
                id: new_id("msg"),
                content: vec![OutputContentPart::OutputText {
                    text: content.to_string(),
                }],
            });
        }
    }

    if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in tool_calls {
            output.push(translate_tool_call(call, ctx));
        }
    }

    let status = match finish_reason {
        Some("length") => ResponseStatus::Incomplete,
        Some("content_filter") => ResponseStatus::Incomplete,
        _ => ResponseStatus::Completed,
    };

    let usage = body.get("usage").map(|u| Usage {
        prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        completion_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
    });

    let reasoning_passthrough = if ctx.reasoning_to_replay.is_empty() {
        None
    } else {
        Some(Value::Array(ctx.reasoning_to_replay.clone()))
    };

    ResponseObject::new(
        new_id("resp"),
        chrono::Utc::now().timestamp(),
        model.to_string(),
        status,
        &output,
        usage,
        reasoning_passthrough,
    )
}

fn translate_tool_call(call: &Value, ctx: &TranslationContext) -> OutputItem {
    let call_id = call.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    let function = &call["function"];
    let name = function.get("name").and_then(Value::as_str).unwrap_or_default();
    let arguments = function
        .get("arguments")
        .and_then(Value::as_str)
        .unwrap_or("{}")
        .to_string();

    if let Some(external_type) = ctx.tool_map.external_type_for(name) {
        if let Some(entry) = registry().lookup(external_type) {
            let args_value: Value = serde_json::from_str(&arguments).unwrap_or(Value::Null);
            let fields = entry.projection.to_external_fields(&args_value);
            return OutputItem::BuiltinCall {
                id: new_id("fc"),
                external_type: external_type.to_string(),
                call_id,
                fields,
            };
        }
    }

    OutputItem::FunctionCall {
        id: new_id("fc"),
        call_id,
        name: name.to_string(),
        arguments,
    }
}

fn extract_reasoning(message: &Value) -> Option<OutputItem> {
    let summary = message.get("reasoning").and_then(Value::as_str).map(String::from);
    let details = message
        .get("reasoning_details")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if summary.is_none() && details.is_empty() {
        return None;
    }

    Some(OutputItem::Reasoning {
        id: new_id("rs"),
        summary,
        details,
    })
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Re-projects a [`StoredTurn`]'s last assistant message into a
/// `ResponseObject`, for `GET /v1/responses/{id}`. Un-virtualizes tool
/// calls through the turn's own `tool_map`, same as the live response path.
pub fn project_stored_turn(turn: &StoredTurn, response_id: &str) -> ResponseObject {
    let last_assistant = turn.messages.iter().rev().find_map(|m| match m {
        ChatMessage::Assistant {
            content,
            tool_calls,
            reasoning_details,
        } => Some((content.clone(), tool_calls.clone(), reasoning_details.clone())),
        _ => None,
    });

    let mut output = Vec::new();
    if let Some((content, tool_calls, reasoning_details)) = last_assistant {
        if !reasoning_details.is_empty() {
            output.push(OutputItem::Reasoning {
                id: new_id("rs"),
                summary: None,
                details: reasoning_details,
            });
        }
        if let Some(text) = content.filter(|s| !s.is_empty()) {
            output.push(OutputItem::Message {
                id: new_id("msg"),
                content: vec![OutputContentPart::OutputText { text }],
            });
        }
        for tc in &tool_calls {
            let args_value: Value = serde_json::from_str(&tc.arguments).unwrap_or(Value::Null);
            if let Some(external_type) = turn.tool_map.external_type_for(&tc.name) {
                if let Some(entry) = registry().lookup(external_type) {
                    let fields = entry.projection.to_external_fields(&args_value);
                    output.push(OutputItem::BuiltinCall {
                        id: new_id("fc"),
                        external_type: external_type.to_string(),
                        call_id: tc.id.clone(),
                        fields,
                    });
                    continue;
                }
            }
            output.push(OutputItem::FunctionCall {
                id: new_id("fc"),
                call_id: tc.id.clone(),
                name: tc.name.clone(),
                arguments: tc.arguments.clone(),
            });
        }
    }

    ResponseObject::new(
        response_id.to_string(),
        turn.created_at,
        turn.model.clone(),
        ResponseStatus::Completed,
        &output,
        None,
        None,
    )
}


#[cfg(test)]
mod tests {
    use super::*;
    use ob_domain::model::ToolMap;
    use serde_json::json;

    #[test]
    fn plain_text_reply_becomes_message_item() {
        let body = json!({
            "choices": [{"message": {"content": "hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8},
        });
        let ctx = TranslationContext::default();
        let resp = translate_response(&body, "gpt-4.1", &ctx);
        assert_eq!(resp.status, ResponseStatus::Completed);
        assert_eq!(resp.output.len(), 1);
        assert_eq!(resp.output[0]["type"], "message");
        assert_eq!(resp.usage.unwrap().total_tokens, 8);
    }

    #[test]
    fn length_finish_reason_is_incomplete() {
        let body = json!({"choices": [{"message": {"content": "cut off"}, "finish_reason": "length"}]});
        let ctx = TranslationContext::default();
        let resp = translate_response(&body, "gpt-4.1", &ctx);
        assert_eq!(resp.status, ResponseStatus::Incomplete);
    }

    #[test]
    fn virtualized_tool_call_is_re_expanded_to_builtin_shape() {
        let body = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{"id": "call_1", "function": {"name": "shell", "arguments": "{\"command\":\"ls\"}"}}],
            }, "finish_reason": "tool_calls"}],
        });
        let mut ctx = TranslationContext::default();
        ctx.tool_map.insert_builtin("shell", "shell", json!({})).unwrap();
        let resp = translate_response(&body, "gpt-4.1", &ctx);
        assert_eq!(resp.output.len(), 1);
        assert_eq!(resp.output[0]["type"], "shell_call");
        assert_eq!(resp.output[0]["command"], "ls");
        assert_eq!(resp.output[0]["call_id"], "call_1");
    }

    #[test]
    fn undeclared_tool_call_stays_a_plain_function_call() {
        let body = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{"id": "call_1", "function": {"name": "lookup", "arguments": "{}"}}],
            }, "finish_reason": "tool_calls"}],
        });
        let ctx = TranslationContext::default();
        let resp = translate_response(&body, "gpt-4.1", &ctx);
        assert_eq!(resp.output[0]["type"], "function_call");
        assert_eq!(resp.output[0]["name"], "lookup");
    }

    #[test]
    fn empty_tool_map_does_not_panic() {
        let body = json!({"choices": [{"message": {"content": ""}, "finish_reason": "stop"}]});
        let ctx = TranslationContext { tool_map: ToolMap::new(), ..Default::default() };
        let resp = translate_response(&body, "gpt-4.1", &ctx);
        assert!(resp.output.is_empty());
    }
}
