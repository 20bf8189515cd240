//! Binary entry point: parse the CLI, init tracing, and dispatch to the
//! selected subcommand (`serve` by default).

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ob_gateway::cli::{Cli, Command, ConfigCommand};
use ob_gateway::state::AppState;
use ob_gateway::{api, cli_commands, config_load, store};
use ob_upstream::UpstreamClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(&cli).await,
        Command::Version => {
            cli_commands::version();
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let config = config_load::load_config(&cli)?;
            cli_commands::show(&config);
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let config = config_load::load_config(&cli)?;
            if !cli_commands::validate(&config, &cli.config) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn serve(cli: &Cli) -> anyhow::Result<()> {
    let config = config_load::load_config(cli)?;
    let bearer_token = config_load::resolve_bearer_token(&config)?;
    let config = Arc::new(config);

    let upstream = Arc::new(UpstreamClient::new(&config.upstream, &config.translation, bearer_token)?);
    let conversation_store = store::build(&config.store)?;

    let state = AppState {
        config: Arc::clone(&config),
        upstream,
        store: conversation_store,
        requests_total: Arc::new(std::sync::atomic::AtomicU64::new(0)),
    };

    let addr = format!("{}:{}", config.server.bind_host, config.server.bind_port);
    tracing::info!(%addr, "starting openbridge");

    let router = api::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
