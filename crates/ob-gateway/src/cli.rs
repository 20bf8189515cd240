//! Command-line entry point: `serve` (the default), `version`, and
//! `config show`/`config validate`.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "openbridge", about = "Responses-to-Chat-Completions translation bridge")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to a TOML config file. Missing file falls back to defaults.
    #[arg(long, default_value = "openbridge.toml", global = true)]
    pub config: String,

    /// Overrides `server.bind_host` from the config file.
    #[arg(long, global = true)]
    pub bind_host: Option<String>,

    /// Overrides `server.bind_port` from the config file.
    #[arg(long, global = true)]
    pub bind_port: Option<u16>,

    /// `tracing_subscriber::EnvFilter` directive, e.g. `ob_gateway=debug`.
    #[arg(long, default_value = "info", global = true)]
    pub log_filter: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}
