//! Catalog of virtualized built-in tools.
//!
//! A static table of entries rather than a trait-object hierarchy per
//! tool. Immutable after process start; read by every request task
//! without synchronization.

use std::sync::OnceLock;

use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Describes how an external `*_call` item's fields become a function's
/// JSON arguments, and back. Kept deliberately simple: a field rename map
/// covers every built-in this adapter virtualizes.
#[derive(Debug, Clone)]
pub struct ArgProjection {
    /// `(external_field, argument_field)` pairs, applied in order.
    pub field_map: &'static [(&'static str, &'static str)],
}

impl ArgProjection {
    /// Project an external `*_call` item's fields into function arguments.
    pub fn to_arguments(&self, fields: &Value) -> Value {
        let mut args = serde_json::Map::new();
        for (ext_field, arg_field) in self.field_map {
            if let Some(v) = fields.get(ext_field) {
                args.insert((*arg_field).to_string(), v.clone());
            }
        }
        Value::Object(args)
    }

    /// Re-expand function arguments back into the external item's fields.
    pub fn to_external_fields(&self, arguments: &Value) -> Value {
        let mut fields = serde_json::Map::new();
        for (ext_field, arg_field) in self.field_map {
            if let Some(v) = arguments.get(arg_field) {
                fields.insert((*ext_field).to_string(), v.clone());
            }
        }
        Value::Object(fields)
    }
}

#[derive(Debug, Clone)]
pub struct ToolRegistryEntry {
    /// Canonical, unprefixed name matching the external tool type
    /// (e.g. `"shell"` for a `shell_call` item).
    pub name: &'static str,
    pub parameters: fn() -> Value,
    pub projection: ArgProjection,
}

pub struct ToolRegistry {
    entries: Vec<ToolRegistryEntry>,
    reserved: &'static [&'static str],
}

impl ToolRegistry {
    pub fn lookup(&self, external_type: &str) -> Option<&ToolRegistryEntry> {
        self.entries.iter().find(|e| e.name == external_type)
    }

    pub fn all(&self) -> impl Iterator<Item = &ToolRegistryEntry> {
        self.entries.iter()
    }

    /// Names the host reserves for its own virtualized built-ins and
    /// prefixes; a user-declared function tool using one of these is
    /// rejected at registration time.
    pub fn reserved_names(&self) -> &'static [&'static str] {
        self.reserved
    }

    /// Whether `name` collides with a reserved prefix (e.g. the host's own
    /// `ob_` namespace) rather than a specific built-in name.
    pub fn is_reserved_prefix(&self, name: &str) -> bool {
        RESERVED_PREFIXES.iter().any(|p| name.starts_with(p))
    }

    pub fn validate_declared_name(&self, name: &str) -> Result<()> {
        if self.is_reserved_prefix(name) {
            return Err(Error::InvalidRequest(format!(
                "tool name '{name}' uses a reserved prefix"
            )));
        }
        if self.reserved.contains(&name) {
            return Err(Error::InvalidRequest(format!(
                "tool name '{name}' is reserved for a built-in tool"
            )));
        }
        Ok(())
    }
}

const RESERVED_PREFIXES: &[&str] = &["ob_"];

fn apply_patch_parameters() -> Value {
    json!({
        "type": "object",
        "properties": { "input": { "type": "string" } },
        "required": ["input"],
        "additionalProperties": false,
    })
}

fn shell_parameters() -> Value {
    json!({
        "type": "object",
        "properties": { "command": { "type": "string" } },
        "required": ["command"],
        "additionalProperties": false,
    })
}

fn local_shell_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "command": { "type": "string" },
            "working_directory": { "type": "string" },
        },
        "required": ["command"],
        "additionalProperties": false,
    })
}

fn web_search_parameters() -> Value {
    json!({
        "type": "object",
        "properties": { "query": { "type": "string" } },
        "required": ["query"],
        "additionalProperties": false,
    })
}

static REGISTRY: OnceLock<ToolRegistry> = OnceLock::new();

/// The process-wide, read-only tool catalog. Built once, lazily, on first
/// access.
pub fn registry() -> &'static ToolRegistry {
    REGISTRY.get_or_init(|| ToolRegistry {
        entries: vec![
            ToolRegistryEntry {
                name: "apply_patch",
                parameters: apply_patch_parameters,
                projection: ArgProjection {
                    field_map: &[("input", "input")],
                },
            },
            ToolRegistryEntry {
                name: "shell",
                parameters: shell_parameters,
                projection: ArgProjection {
                    field_map: &[("command", "command")],
                },
            },
            ToolRegistryEntry {
                name: "local_shell",
                parameters: local_shell_parameters,
                projection: ArgProjection {
                    field_map: &[
                        ("command", "command"),
                        ("working_directory", "working_directory"),
                    ],
                },
            },
            ToolRegistryEntry {
                name: "web_search",
                parameters: web_search_parameters,
                projection: ArgProjection {
                    field_map: &[("query", "query")],
                },
            },
        ],
        reserved: &["apply_patch", "shell", "local_shell", "web_search"],
    })
}
