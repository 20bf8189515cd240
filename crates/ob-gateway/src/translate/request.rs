//! Request translation.
//!
//! Converts an incoming [`ResponsesRequest`] plus optional rehydrated
//! history into a Chat Completions payload, emitting a per-turn
//! [`TranslationContext`].

use serde_json::{json, Value};

use ob_domain::config::TranslationConfig;
use ob_domain::error::{Error, Result};
use ob_domain::model::{
    ChatMessage, InputItem, InputPayload, ResponsesRequest, StoredTurn, TextFormat, ToolCallOut,
    ToolMap, TranslationContext,
};
use ob_domain::store::ConversationStore;
use ob_domain::tool_registry::registry;

pub struct TranslationOutput {
    pub upstream_payload: Value,
    pub context: TranslationContext,
    pub model: String,
    /// The working `messages` list as sent upstream, kept structured (not
    /// just the JSON body) so the orchestrator can append the assistant's
    /// reply and persist a `StoredTurn` without re-parsing the payload.
    pub messages: Vec<ChatMessage>,
}

pub async fn translate_request(
    req: &ResponsesRequest,
    config: &TranslationConfig,
    store: &dyn ConversationStore,
) -> Result<TranslationOutput> {
    // 1. Model resolution.
    let model = config
        .model_alias_map
        .get(&req.model)
        .cloned()
        .unwrap_or_else(|| req.model.clone());

    // 2. History rehydration.
    let mut messages: Vec<ChatMessage> = Vec::new();
    let mut tool_map = ToolMap::new();
    if let Some(prev_id) = &req.previous_response_id {
        let stored: StoredTurn = store.get(prev_id).await?;
        messages = stored.messages;
        tool_map = stored.tool_map;
    }

    let mut ctx = TranslationContext {
        tool_map,
        ..Default::default()
    };

    // 3. Instructions injection — never persisted, never inherited.
    if let Some(instructions) = req.instructions.as_ref().filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::System {
            content: instructions.clone(),
        });
        ctx.injected_system_text = Some(instructions.clone());
    }

    // 4. Input reduction.
    let items = match &req.input {
        InputPayload::Text(text) => vec![InputItem::Message {
            role: ob_domain::model::Role::User,
            content: text.clone(),
        }],
        InputPayload::Items(raw) => raw
            .iter()
            .map(InputItem::classify)
            .collect::<Result<Vec<_>>>()?,
    };

    let mut observed_call_names: Vec<String> = Vec::new();
    reduce_input_items(&items, &mut messages, &mut ctx, &mut observed_call_names)?;

    // 5. Tool declaration / 6. Tool inference.
    let mut upstream_tools: Vec<Value> = Vec::new();
    if let Some(declared) = &req.tools {
        for tool in declared {
            upstream_tools.push(normalize_declared_tool(tool, &mut ctx.tool_map)?);
        }
    } else if !observed_call_names.is_empty() {
        ctx.tools_inferred = true;
        for name in &observed_call_names {
            ctx.tool_map.insert_function(name, json!({"type": "object"})).ok();
            upstream_tools.push(json!({
                "type": "function",
                "function": { "name": name, "parameters": {"type": "object"} },
            }));
        }
    }

    // 7. Tool-choice mapping.
    let mut tool_choice = req.tool_choice.clone();
    if ctx.tools_inferred && tool_choice.is_none() {
        tool_choice = Some(json!("none"));
    }
    let (tool_choice, upstream_tools) = map_tool_choice(tool_choice, upstream_tools)?;

    // 8. Output limits.
    let max_tokens = req
        .max_output_tokens
        .map(|m| m.saturating_add(config.max_tokens_buffer));

    // 9. Structured output.
    let response_format = req.text.as_ref().and_then(|t| t.format.as_ref()).map(|f| match f {
        TextFormat::JsonSchema { name, strict, schema } => json!({
            "type": "json_schema",
            "json_schema": { "name": name, "strict": strict, "schema": schema },
        }),
        TextFormat::JsonObject => json!({"type": "json_object"}),
        TextFormat::Text => json!({"type": "text"}),
    });

    // Build the upstream payload.
    let mut body = json!({
        "model": model,
        "messages": messages.iter().map(chat_message_to_json).collect::<Vec<_>>(),
        "stream": req.stream,
    });
    if !upstream_tools.is_empty() {
        body["tools"] = Value::Array(upstream_tools);
    }
    if let Some(tc) = tool_choice {
        body["tool_choice"] = tc;
    }
    if let Some(mt) = max_tokens {
        body["max_tokens"] = json!(mt);
    }
    if let Some(t) = req.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(p) = req.top_p {
        body["top_p"] = json!(p);
    }
    if let Some(ptc) = req.parallel_tool_calls {
        body["parallel_tool_calls"] = json!(ptc);
    }
    if let Some(reasoning) = &req.reasoning {
        body["reasoning"] = reasoning.clone();
    }
    if let Some(v) = &req.verbosity {
        body["verbosity"] = json!(v);
    }
    if let Some(rf) = response_format {
        body["response_format"] = rf;
    }

    Ok(TranslationOutput {
        upstream_payload: body,
        context: ctx,
        model,
        messages,
    })
}

fn reduce_input_items(
    items: &[InputItem],
    messages: &mut Vec<ChatMessage>,
    ctx: &mut TranslationContext,
    observed_call_names: &mut Vec<String>,
) -> Result<()> {
    // Reasoning items precede the tool calls they explain; buffered here
    // until the next assistant message is opened, then attached as its
    // `reasoning_details` so the upstream can replay them on the next turn.
    let mut pending_reasoning: Vec<Value> = Vec::new();

    for item in items {
        match item {
            InputItem::Message { role, content } => {
                messages.push(role_message(*role, content.clone()));
            }
            InputItem::FunctionCall { call_id, name, arguments } => {
                if !observed_call_names.contains(name) {
                    observed_call_names.push(name.clone());
                }
                push_tool_call(
                    messages,
                    call_id.clone(),
                    name.clone(),
                    arguments.clone(),
                    &mut pending_reasoning,
                );
            }
            InputItem::FunctionCallOutput { call_id, output } => {
                messages.push(ChatMessage::Tool {
                    tool_call_id: call_id.clone(),
                    content: output.as_tool_content(),
                });
            }
            InputItem::BuiltinCall { external_type, call_id, fields } => {
                let entry = registry().lookup(external_type).ok_or_else(|| {
                    Error::InvalidRequest(format!("unknown built-in tool type: {external_type}"))
                })?;
                ctx.tool_map
                    .insert_builtin(external_type, entry.name, (entry.parameters)())?;
                let arguments = entry.projection.to_arguments(fields);
                if !observed_call_names.contains(&entry.name.to_string()) {
                    observed_call_names.push(entry.name.to_string());
                }
                push_tool_call(
                    messages,
                    call_id.clone(),
                    entry.name.to_string(),
                    arguments.to_string(),
                    &mut pending_reasoning,
                );
            }
            InputItem::BuiltinCallOutput { call_id, output, .. } => {
                messages.push(ChatMessage::Tool {
                    tool_call_id: call_id.clone(),
                    content: output.as_tool_content(),
                });
            }
            InputItem::Reasoning { summary, details, encrypted } => {
                let mut blocks = details.clone();
                if let Some(s) = summary {
                    blocks.push(json!({"summary": s}));
                }
                if let Some(e) = encrypted {
                    blocks.push(json!({"encrypted": e}));
                }
                ctx.reasoning_to_replay.extend(blocks.clone());
                pending_reasoning.extend(blocks);
            }
            InputItem::Unknown => { /* dropped silently */ }
        }
    }
    Ok(())
}

fn role_message(role: ob_domain::model::Role, content: String) -> ChatMessage {
    use ob_domain::model::Role;
    match role {
        Role::System => ChatMessage::System { content },
        Role::User => ChatMessage::User { content },
        Role::Assistant => ChatMessage::Assistant {
            content: Some(content),
            tool_calls: Vec::new(),
            reasoning_details: Vec::new(),
        },
        Role::Tool => ChatMessage::Tool {
            tool_call_id: String::new(),
            content,
        },
    }
}

/// Append a tool call, coalescing into the preceding assistant message when
/// it has no content (consecutive `function_call` items collapse into one
/// assistant message). Any buffered reasoning blocks are attached, and
/// drained, only when a new assistant message is opened — they describe
/// the reasoning that led to it.
fn push_tool_call(
    messages: &mut Vec<ChatMessage>,
    call_id: String,
    name: String,
    arguments: String,
    pending_reasoning: &mut Vec<Value>,
) {
    if let Some(ChatMessage::Assistant { content, tool_calls, .. }) = messages.last_mut() {
        if content.is_none() {
            tool_calls.push(ToolCallOut { id: call_id, name, arguments });
            return;
        }
    }
    messages.push(ChatMessage::Assistant {
        content: None,
        tool_calls: vec![ToolCallOut { id: call_id, name, arguments }],
        reasoning_details: std::mem::take(pending_reasoning),
    });
}

fn normalize_declared_tool(tool: &Value, tool_map: &mut ToolMap) -> Result<Value> {
    let ty = tool.get("type").and_then(Value::as_str).unwrap_or("function");

    if ty == "function" {
        // Either flat `{type,name,parameters}` or nested
        // `{type:"function", function:{name,parameters}}`.
        let (name, parameters) = if let Some(func) = tool.get("function") {
            (
                func.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                func.get("parameters").cloned().unwrap_or(json!({"type": "object"})),
            )
        } else {
            (
                tool.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                tool.get("parameters").cloned().unwrap_or(json!({"type": "object"})),
            )
        };
        registry().validate_declared_name(&name)?;
        tool_map.insert_function(&name, parameters.clone())?;
        return Ok(json!({"type": "function", "function": {"name": name, "parameters": parameters}}));
    }

    // Built-in tool type, e.g. `{"type":"apply_patch"}`.
    let entry = registry()
        .lookup(ty)
        .ok_or_else(|| Error::InvalidRequest(format!("unknown tool type: {ty}")))?;
    tool_map.insert_builtin(ty, entry.name, (entry.parameters)())?;
    Ok(json!({
        "type": "function",
        "function": {"name": entry.name, "parameters": (entry.parameters)()},
    }))
}

fn map_tool_choice(tool_choice: Option<Value>, tools: Vec<Value>) -> Result<(Option<Value>, Vec<Value>)> {
    let Some(tc) = tool_choice else {
        return Ok((None, tools));
    };

    if let Some(s) = tc.as_str() {
        if matches!(s, "auto" | "none" | "required") {
            return Ok((Some(json!(s)), tools));
        }
    }

    if let Some(obj) = tc.as_object() {
        if let Some(name) = obj.get("name").and_then(Value::as_str) {
            return Ok((
                Some(json!({"type": "function", "function": {"name": name}})),
                tools,
            ));
        }
        // `allowed_tools` selector: filter the tool list, pass the mode through.
        if let Some(allowed) = obj.get("allowed_tools").and_then(Value::as_array) {
            let allowed_names: Vec<&str> = allowed.iter().filter_map(Value::as_str).collect();
            let filtered: Vec<Value> = tools
                .into_iter()
                .filter(|t| {
                    t.get("function")
                        .and_then(|f| f.get("name"))
                        .and_then(Value::as_str)
                        .map(|n| allowed_names.contains(&n))
                        .unwrap_or(false)
                })
                .collect();
            let mode = obj.get("mode").cloned().unwrap_or(json!("auto"));
            return Ok((Some(mode), filtered));
        }
    }

    Ok((Some(tc), tools))
}

fn chat_message_to_json(msg: &ChatMessage) -> Value {
    match msg {
        ChatMessage::System { content } => json!({"role": "system", "content": content}),
        ChatMessage::User { content } => json!({"role": "user", "content": content}),
        ChatMessage::Tool { tool_call_id, content } => {
            json!({"role": "tool", "tool_call_id": tool_call_id, "content": content})
        }
        ChatMessage::Assistant { content, tool_calls, reasoning_details } => {
            let mut obj = json!({"role": "assistant"});
            obj["content"] = match content {
                Some(c) => Value::String(c.clone()),
                None => Value::Null,
            };
            if !tool_calls.is_empty() {
                obj["tool_calls"] = Value::Array(
                    tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {"name": tc.name, "arguments": tc.arguments},
                            })
                        })
                        .collect(),
                );
            }
            if !reasoning_details.is_empty() {
                obj["reasoning_details"] = Value::Array(reasoning_details.clone());
            }
            obj
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ob_domain::store::ConversationStore;

    struct NoopStore;
    #[async_trait::async_trait]
    impl ConversationStore for NoopStore {
        async fn get(&self, _id: &str) -> Result<StoredTurn> {
            Err(Error::NotFound("no store".into()))
        }
        async fn put(&self, _id: String, _t: StoredTurn, _ttl: u64) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _id: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn req_with_text(text: &str) -> ResponsesRequest {
        serde_json::from_value(json!({
            "model": "gpt-4.1",
            "input": text,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn plain_text_translates_to_user_message() {
        let req = req_with_text("Hello");
        let config = TranslationConfig::default();
        let store = NoopStore;
        let out = translate_request(&req, &config, &store).await.unwrap();
        assert_eq!(out.upstream_payload["messages"][0]["role"], "user");
        assert_eq!(out.upstream_payload["messages"][0]["content"], "Hello");
        assert_eq!(
            out.upstream_payload["max_tokens"].is_null(),
            true,
            "no max_output_tokens means no max_tokens in the payload"
        );
    }

    #[tokio::test]
    async fn max_output_tokens_gets_buffer_added() {
        let mut req = req_with_text("hi");
        req.max_output_tokens = Some(100);
        let mut config = TranslationConfig::default();
        config.max_tokens_buffer = 50;
        let store = NoopStore;
        let out = translate_request(&req, &config, &store).await.unwrap();
        assert_eq!(out.upstream_payload["max_tokens"], 150);
    }

    #[tokio::test]
    async fn builtin_tool_declaration_rewrites_to_function() {
        let mut req = req_with_text("hi");
        req.tools = Some(vec![json!({"type": "apply_patch"})]);
        let config = TranslationConfig::default();
        let store = NoopStore;
        let out = translate_request(&req, &config, &store).await.unwrap();
        let tools = out.upstream_payload["tools"].as_array().unwrap();
        assert_eq!(tools[0]["function"]["name"], "apply_patch");
        assert_eq!(out.context.tool_map.function_name_for("apply_patch"), Some("apply_patch"));
    }

    #[tokio::test]
    async fn tool_collision_fails_translation() {
        let mut req = req_with_text("hi");
        req.tools = Some(vec![
            json!({"type": "apply_patch"}),
            json!({"type": "function", "name": "apply_patch", "parameters": {}}),
        ]);
        let config = TranslationConfig::default();
        let store = NoopStore;
        let err = translate_request(&req, &config, &store).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn missing_tools_with_function_call_output_infers_tool_and_forces_none() {
        let req: ResponsesRequest = serde_json::from_value(json!({
            "model": "gpt-4.1",
            "input": [
                {"type": "function_call", "call_id": "call_1", "name": "lookup", "arguments": "{}"},
                {"type": "function_call_output", "call_id": "call_1", "output": "ok"},
            ],
        }))
        .unwrap();
        let config = TranslationConfig::default();
        let store = NoopStore;
        let out = translate_request(&req, &config, &store).await.unwrap();
        assert!(out.context.tools_inferred);
        assert_eq!(out.upstream_payload["tool_choice"], "none");
        let tools = out.upstream_payload["tools"].as_array().unwrap();
        assert_eq!(tools[0]["function"]["name"], "lookup");
    }

    #[tokio::test]
    async fn instructions_become_a_fresh_system_message() {
        let mut req = req_with_text("hi");
        req.instructions = Some("be nice".into());
        let config = TranslationConfig::default();
        let store = NoopStore;
        let out = translate_request(&req, &config, &store).await.unwrap();
        assert_eq!(out.upstream_payload["messages"][0]["role"], "system");
        assert_eq!(out.upstream_payload["messages"][0]["content"], "be nice");
        assert_eq!(out.context.injected_system_text.as_deref(), Some("be nice"));
    }

    #[tokio::test]
    async fn model_alias_is_applied() {
        let req = req_with_text("hi");
        let mut config = TranslationConfig::default();
        config.model_alias_map.insert("gpt-4.1".into(), "openai/gpt-4.1".into());
        let store = NoopStore;
        let out = translate_request(&req, &config, &store).await.unwrap();
        assert_eq!(out.model, "openai/gpt-4.1");
        assert_eq!(out.upstream_payload["model"], "openai/gpt-4.1");
    }

    #[tokio::test]
    async fn reasoning_item_attaches_to_the_assistant_message_it_precedes() {
        let req: ResponsesRequest = serde_json::from_value(json!({
            "model": "gpt-4.1",
            "input": [
                {"type": "reasoning", "summary": "thinking it through", "details": [{"text": "step 1"}]},
                {"type": "function_call", "call_id": "call_1", "name": "lookup", "arguments": "{}"},
            ],
        }))
        .unwrap();
        let config = TranslationConfig::default();
        let store = NoopStore;
        let out = translate_request(&req, &config, &store).await.unwrap();
        let assistant = &out.messages[0];
        match assistant {
            ChatMessage::Assistant { reasoning_details, tool_calls, .. } => {
                assert_eq!(tool_calls.len(), 1);
                assert!(!reasoning_details.is_empty());
            }
            other => panic!("expected assistant message, got {other:?}"),
        }
        assert!(!out.context.reasoning_to_replay.is_empty());
    }

    #[tokio::test]
    async fn missing_previous_response_id_fails_not_found() {
        let mut req = req_with_text("hi");
        req.previous_response_id = Some("resp_missing".into());
        let config = TranslationConfig::default();
        let store = NoopStore;
        let err = translate_request(&req, &config, &store).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
