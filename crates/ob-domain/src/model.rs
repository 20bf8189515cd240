//! The Responses <-> Chat Completions data model.
//!
//! Tagged variants rather than inheritance, doubling the vocabulary: one
//! side speaks the Responses API's input/output items, the other speaks
//! Chat Completions' messages. Built-in tool calls (`shell_call`,
//! `apply_patch_call`, ...) are open-ended on the wire, so they are
//! classified by suffix rather than by a fixed serde tag — see
//! [`InputItem::classify`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Incoming Responses request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
    pub input: InputPayload,
    #[serde(default)]
    pub tools: Option<Vec<Value>>,
    #[serde(default)]
    pub tool_choice: Option<Value>,
    #[serde(default)]
    pub parallel_tool_calls: Option<bool>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub verbosity: Option<String>,
    #[serde(default)]
    pub text: Option<TextConfig>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub previous_response_id: Option<String>,
    #[serde(default)]
    pub reasoning: Option<Value>,
}

/// `input` is either a bare string (shorthand for a single user message) or
/// an ordered list of input items, kept as raw JSON until
/// [`InputItem::classify`] sorts them by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InputPayload {
    Text(String),
    Items(Vec<Value>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextConfig {
    pub format: Option<TextFormat>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextFormat {
    JsonSchema {
        name: String,
        #[serde(default)]
        strict: Option<bool>,
        schema: Value,
    },
    JsonObject,
    Text,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// InputItem — classified from raw JSON by `type`
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub enum InputItem {
    Message {
        role: Role,
        content: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: OutputValue,
    },
    /// A virtualized built-in call, e.g. `shell_call`. `external_type` keeps
    /// the wire suffix stripped (`"shell"`, not `"shell_call"`).
    BuiltinCall {
        external_type: String,
        call_id: String,
        fields: Value,
    },
    BuiltinCallOutput {
        external_type: String,
        call_id: String,
        output: OutputValue,
    },
    Reasoning {
        summary: Option<String>,
        details: Vec<Value>,
        encrypted: Option<String>,
    },
    /// Any `type` not recognized above. Dropped silently by the translator.
    Unknown,
}

/// `function_call_output.output` / `*_call_output.output` may be a plain
/// string or an arbitrary JSON value; the latter is re-encoded as a string
/// when it becomes a `tool` message's content.
#[derive(Debug, Clone)]
pub struct OutputValue(pub Value);

impl OutputValue {
    pub fn as_tool_content(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl InputItem {
    /// Classify one raw JSON input item by its `type` field.
    pub fn classify(value: &Value) -> Result<InputItem> {
        let ty = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("message");

        match ty {
            "message" => {
                let role = value
                    .get("role")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::InvalidRequest("message item missing role".into()))?;
                let role = parse_role(role)?;
                let content = extract_message_content(value)?;
                Ok(InputItem::Message { role, content })
            }
            "function_call" => {
                let call_id = required_str(value, "call_id")?;
                let name = required_str(value, "name")?;
                let arguments = value
                    .get("arguments")
                    .and_then(Value::as_str)
                    .unwrap_or("{}")
                    .to_string();
                Ok(InputItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                })
            }
            "function_call_output" => {
                let call_id = required_str(value, "call_id")?;
                let output = OutputValue(
                    value
                        .get("output")
                        .cloned()
                        .ok_or_else(|| Error::InvalidRequest("missing output".into()))?,
                );
                Ok(InputItem::FunctionCallOutput { call_id, output })
            }
            "reasoning" => {
                let summary = value
                    .get("summary")
                    .and_then(Value::as_str)
                    .map(String::from);
                let details = value
                    .get("details")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let encrypted = value
                    .get("encrypted")
                    .and_then(Value::as_str)
                    .map(String::from);
                Ok(InputItem::Reasoning {
                    summary,
                    details,
                    encrypted,
                })
            }
            t if t.ends_with("_call_output") => {
                let external_type = t.trim_end_matches("_call_output").to_string();
                let call_id = required_str(value, "call_id")?;
                let output = OutputValue(
                    value
                        .get("output")
                        .cloned()
                        .ok_or_else(|| Error::InvalidRequest("missing output".into()))?,
                );
                Ok(InputItem::BuiltinCallOutput {
                    external_type,
                    call_id,
                    output,
                })
            }
            t if t.ends_with("_call") => {
                let external_type = t.trim_end_matches("_call").to_string();
                let call_id = required_str(value, "call_id")?;
                Ok(InputItem::BuiltinCall {
                    external_type,
                    call_id,
                    fields: value.clone(),
                })
            }
            _ => Ok(InputItem::Unknown),
        }
    }
}

fn parse_role(s: &str) -> Result<Role> {
    match s {
        "system" => Ok(Role::System),
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "tool" => Ok(Role::Tool),
        other => Err(Error::InvalidRequest(format!("unknown role: {other}"))),
    }
}

fn required_str(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| Error::InvalidRequest(format!("missing field: {field}")))
}

/// `message.content` may be a bare string or a list of `{type:"text", text}`
/// parts; either way we reduce it to plain text, matching the Chat
/// Completions wire shape this adapter forwards to.
fn extract_message_content(value: &Value) -> Result<String> {
    match value.get("content") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Array(parts)) => {
            let text = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(text)
        }
        _ => Ok(String::new()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChatMessage — upstream wire shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallOut {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallOut>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        reasoning_details: Vec<Value>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    /// Does this assistant message already carry tool calls with no content?
    /// Used by the input-reduction step to decide whether a fresh
    /// `function_call` item should coalesce into the preceding message.
    pub fn is_contentless_assistant(&self) -> bool {
        matches!(
            self,
            ChatMessage::Assistant { content: None, .. }
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolMap — per-turn bijection between external type and upstream fn name
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-turn bijection between the external tool type seen in a Responses
/// input item (e.g. `"shell_call"` -> external type `"shell"`) and the
/// virtualized function name sent upstream. The process-wide
/// [`crate::tool_registry::ToolRegistry`] is read-only; this map is the
/// mutable, per-request artifact built on top of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMap {
    ext_to_fn: HashMap<String, String>,
    fn_to_ext: HashMap<String, String>,
    schemas: HashMap<String, Value>,
}

impl ToolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in tool's virtualized name. Fails if the function
    /// name is already taken by a different external type (collision).
    pub fn insert_builtin(
        &mut self,
        external_type: &str,
        function_name: &str,
        schema: Value,
    ) -> Result<()> {
        self.insert(external_type, function_name, schema)
    }

    /// Register a plain user-declared function tool (external type ==
    /// function name; present so declared functions and built-ins share one
    /// collision-checked namespace).
    pub fn insert_function(&mut self, function_name: &str, schema: Value) -> Result<()> {
        self.insert(function_name, function_name, schema)
    }

    fn insert(&mut self, external_type: &str, function_name: &str, schema: Value) -> Result<()> {
        if let Some(existing) = self.fn_to_ext.get(function_name) {
            if existing != external_type {
                return Err(Error::InvalidRequest(format!(
                    "tool name collision: '{function_name}' is claimed by both \
                     '{existing}' and '{external_type}'"
                )));
            }
        }
        self.ext_to_fn
            .insert(external_type.to_string(), function_name.to_string());
        self.fn_to_ext
            .insert(function_name.to_string(), external_type.to_string());
        self.schemas.insert(function_name.to_string(), schema);
        Ok(())
    }

    pub fn function_name_for(&self, external_type: &str) -> Option<&str> {
        self.ext_to_fn.get(external_type).map(String::as_str)
    }

    pub fn external_type_for(&self, function_name: &str) -> Option<&str> {
        self.fn_to_ext.get(function_name).map(String::as_str)
    }

    pub fn schema_for(&self, function_name: &str) -> Option<&Value> {
        self.schemas.get(function_name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.fn_to_ext.keys().map(String::as_str)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TranslationContext
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-turn artifact threaded from [`crate`] request translation into
/// response translation and the streaming bridge. Created on request entry,
/// dropped once the response is emitted — nothing here outlives one turn.
#[derive(Debug, Clone, Default)]
pub struct TranslationContext {
    pub tool_map: ToolMap,
    pub degraded_fields: Vec<String>,
    pub tools_inferred: bool,
    pub injected_system_text: Option<String>,
    pub reasoning_to_replay: Vec<Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ResponseObject — outgoing Responses payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Completed,
    Failed,
    Incomplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContentPart {
    OutputText { text: String },
}

/// An output item in source order. Built-in calls carry their own wire
/// `type` (e.g. `"shell_call"`), which is open-ended, so this enum
/// serializes itself by hand via [`OutputItem::to_json`] rather than via a
/// derived internally-tagged enum.
#[derive(Debug, Clone)]
pub enum OutputItem {
    Message { id: String, content: Vec<OutputContentPart> },
    FunctionCall {
        id: String,
        call_id: String,
        name: String,
        arguments: String,
    },
    /// A re-expanded built-in call. `fields` holds the projected external
    /// shape (e.g. `{"command": "ls"}`); `external_type` becomes
    /// `"{external_type}_call"` on the wire.
    BuiltinCall {
        id: String,
        external_type: String,
        call_id: String,
        fields: Value,
    },
    Reasoning {
        id: String,
        summary: Option<String>,
        details: Vec<Value>,
    },
}

impl OutputItem {
    pub fn to_json(&self) -> Value {
        match self {
            OutputItem::Message { id, content } => serde_json::json!({
                "type": "message",
                "id": id,
                "content": content,
            }),
            OutputItem::FunctionCall { id, call_id, name, arguments } => serde_json::json!({
                "type": "function_call",
                "id": id,
                "call_id": call_id,
                "name": name,
                "arguments": arguments,
            }),
            OutputItem::BuiltinCall { id, external_type, call_id, fields } => {
                let mut obj = fields.clone();
                if let Value::Object(map) = &mut obj {
                    map.insert("type".into(), Value::String(format!("{external_type}_call")));
                    map.insert("id".into(), Value::String(id.clone()));
                    map.insert("call_id".into(), Value::String(call_id.clone()));
                } else {
                    obj = serde_json::json!({
                        "type": format!("{external_type}_call"),
                        "id": id,
                        "call_id": call_id,
                    });
                }
                obj
            }
            OutputItem::Reasoning { id, summary, details } => {
                let mut obj = serde_json::json!({
                    "type": "reasoning",
                    "id": id,
                });
                if let Some(s) = summary {
                    obj["summary"] = Value::String(s.clone());
                }
                if !details.is_empty() {
                    obj["details"] = Value::Array(details.clone());
                }
                obj
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseObject {
    pub id: String,
    pub created_at: i64,
    pub model: String,
    pub status: ResponseStatus,
    pub output: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Value>,
}

impl ResponseObject {
    pub fn new(
        id: String,
        created_at: i64,
        model: String,
        status: ResponseStatus,
        items: &[OutputItem],
        usage: Option<Usage>,
        reasoning: Option<Value>,
    ) -> Self {
        Self {
            id,
            created_at,
            model,
            status,
            output: items.iter().map(OutputItem::to_json).collect(),
            usage,
            reasoning,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// StoredTurn — conversation store entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTurn {
    pub messages: Vec<ChatMessage>,
    pub tool_map: ToolMap,
    pub model: String,
    pub created_at: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ErrorBody — the wire error envelope, shared by the non-stream error
// response and the streaming bridge's `response.failed` event
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `{"type", "message", "code"}`, nested under an `"error"` key on the wire.
/// `type` and `code` both come from [`Error::kind`] — the taxonomy has no
/// finer-grained codes than its kind — `message` is the human-readable
/// display string.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub code: String,
}

impl ErrorBody {
    pub fn from_error(e: &Error) -> Self {
        Self {
            error_type: e.kind().to_string(),
            message: e.to_string(),
            code: e.kind().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_message() {
        let v = json!({"type": "message", "role": "user", "content": "hi"});
        let item = InputItem::classify(&v).unwrap();
        assert!(matches!(item, InputItem::Message { role: Role::User, content } if content == "hi"));
    }

    #[test]
    fn classify_builtin_call() {
        let v = json!({"type": "shell_call", "call_id": "call_1", "command": "ls"});
        let item = InputItem::classify(&v).unwrap();
        match item {
            InputItem::BuiltinCall { external_type, call_id, .. } => {
                assert_eq!(external_type, "shell");
                assert_eq!(call_id, "call_1");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn classify_builtin_call_output() {
        let v = json!({"type": "shell_call_output", "call_id": "call_1", "output": "ok"});
        let item = InputItem::classify(&v).unwrap();
        match item {
            InputItem::BuiltinCallOutput { external_type, call_id, output } => {
                assert_eq!(external_type, "shell");
                assert_eq!(call_id, "call_1");
                assert_eq!(output.as_tool_content(), "ok");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn classify_unknown_type_drops_silently() {
        let v = json!({"type": "mystery_widget", "foo": "bar"});
        let item = InputItem::classify(&v).unwrap();
        assert!(matches!(item, InputItem::Unknown));
    }

    #[test]
    fn output_value_non_string_is_json_encoded() {
        let ov = OutputValue(json!({"a": 1}));
        assert_eq!(ov.as_tool_content(), "{\"a\":1}");
    }

    #[test]
    fn tool_map_rejects_collision() {
        let mut map = ToolMap::new();
        map.insert_builtin("shell", "shell", json!({})).unwrap();
        let err = map.insert_function("shell", json!({})).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn tool_map_allows_reinsert_of_same_pair() {
        let mut map = ToolMap::new();
        map.insert_builtin("shell", "shell", json!({})).unwrap();
        map.insert_builtin("shell", "shell", json!({})).unwrap();
        assert_eq!(map.function_name_for("shell"), Some("shell"));
    }
}
