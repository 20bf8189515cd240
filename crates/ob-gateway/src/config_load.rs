//! Config loading: TOML file (optional) plus CLI overrides plus the
//! upstream bearer token from the environment. Split into a config-only
//! step (used by `config show`/`config validate`, which must not require a
//! credential) and a separate bearer-token resolution step (used only by
//! `serve`).

use ob_domain::config::Config;
use ob_domain::error::{Error, Result};

use crate::cli::Cli;

/// Load the config file (if present) and apply CLI bind-address overrides.
/// Never touches the environment — safe to call for `config show`/`validate`
/// without an upstream credential configured.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match std::fs::read_to_string(&cli.config) {
        Ok(contents) => toml::from_str(&contents).map_err(|e| {
            Error::InvalidRequest(format!("failed to parse config file '{}': {e}", cli.config))
        })?,
        Err(_) => {
            tracing::info!(path = %cli.config, "no config file found, using defaults");
            Config::default()
        }
    };

    if let Some(host) = &cli.bind_host {
        config.server.bind_host = host.clone();
    }
    if let Some(port) = cli.bind_port {
        config.server.bind_port = port;
    }

    Ok(config)
}

/// Resolve the upstream bearer credential from the environment variable
/// named by `config.upstream.auth_env`. Only `serve` needs this.
pub fn resolve_bearer_token(config: &Config) -> Result<String> {
    std::env::var(&config.upstream.auth_env).map_err(|_| {
        Error::Internal(format!(
            "environment variable '{}' is not set",
            config.upstream.auth_env
        ))
    })
}
