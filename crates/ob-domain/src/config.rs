//! Configuration inputs recognized by the core, plus the ambient fields a
//! runnable service needs (bind address, upstream credentials, store
//! backend selection). Loaded once at startup by `ob-gateway`; deserialized
//! from TOML, with environment overrides for anything secret.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            translation: TranslationConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_bind_host")]
    pub bind_host: String,
    #[serde(default = "d_bind_port")]
    pub bind_port: u16,
    /// Bearer token required on `/v1/responses*`. `None` = dev mode, no auth
    /// enforced.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: d_bind_host(),
            bind_port: d_bind_port(),
            api_token: None,
        }
    }
}

fn d_bind_host() -> String {
    "0.0.0.0".to_string()
}
fn d_bind_port() -> u16 {
    8085
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Env var name to read the bearer credential from.
    #[serde(default = "d_auth_env")]
    pub auth_env: String,
    #[serde(default)]
    pub attribution_headers: HashMap<String, String>,
    #[serde(default = "d_request_timeout_s")]
    pub request_timeout_s: f64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            auth_env: d_auth_env(),
            attribution_headers: HashMap::new(),
            request_timeout_s: d_request_timeout_s(),
        }
    }
}

fn d_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn d_auth_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}
fn d_request_timeout_s() -> f64 {
    120.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "d_max_tokens_buffer")]
    pub max_tokens_buffer: u32,
    #[serde(default = "d_degrade_fields")]
    pub degrade_fields: Vec<String>,
    #[serde(default = "d_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "d_retry_max_seconds")]
    pub retry_max_seconds: f64,
    #[serde(default = "d_retry_backoff")]
    pub retry_backoff: f64,
    #[serde(default)]
    pub model_alias_map: HashMap<String, String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_tokens_buffer: d_max_tokens_buffer(),
            degrade_fields: d_degrade_fields(),
            retry_max_attempts: d_retry_max_attempts(),
            retry_max_seconds: d_retry_max_seconds(),
            retry_backoff: d_retry_backoff(),
            model_alias_map: HashMap::new(),
        }
    }
}

fn d_max_tokens_buffer() -> u32 {
    1024
}
fn d_degrade_fields() -> Vec<String> {
    vec!["verbosity".to_string()]
}
fn d_retry_max_attempts() -> u32 {
    3
}
fn d_retry_max_seconds() -> f64 {
    30.0
}
fn d_retry_backoff() -> f64 {
    2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Disabled,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "d_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Only consulted when `backend = "redis"`.
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            ttl_seconds: d_ttl_seconds(),
            redis_url: None,
        }
    }
}

impl StoreConfig {
    pub fn state_enabled(&self) -> bool {
        self.backend != StoreBackend::Disabled
    }
}

fn d_ttl_seconds() -> u64 {
    3600
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues; empty means
    /// everything looks good. Used by `openbridge config validate`.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.bind_port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.bind_port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.bind_host.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.bind_host".into(),
                message: "bind_host must not be empty".into(),
            });
        }
        if self.server.api_token.is_none() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.api_token".into(),
                message: "no api_token configured — /v1/responses* is unauthenticated".into(),
            });
        }

        if self.upstream.base_url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "upstream.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "upstream.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{}\")",
                    self.upstream.base_url
                ),
            });
        }
        if std::env::var(&self.upstream.auth_env).is_err() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "upstream.auth_env".into(),
                message: format!(
                    "environment variable '{}' is not currently set",
                    self.upstream.auth_env
                ),
            });
        }

        if self.store.backend == StoreBackend::Redis && self.store.redis_url.is_none() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "store.redis_url".into(),
                message: "store.backend is \"redis\" but no redis_url is configured".into(),
            });
        }

        issues
    }
}
