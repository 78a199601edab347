//! Gambit node: a command-line binary wiring identity, swarm, log,
//! storage, and engine crates into host/join/spectate workflows.

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Args, Command};
use config::NodeConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = NodeConfig::load(args.config.as_deref())?;

    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(rendezvous_dir) = args.rendezvous_dir {
        config.rendezvous_dir = rendezvous_dir;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }
    config.validate_config()?;

    init_tracing(&config.log_level, &config.log_format);

    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.rendezvous_dir)?;

    match args.command {
        Command::Host => commands::host(&config).await,
        Command::Join { invite_code } => commands::join(&config, &invite_code).await,
        Command::Spectate { invite_code } => commands::spectate(&config, &invite_code).await,
        Command::Keygen { output } => commands::keygen(output.as_deref()),
        Command::ListSaved => commands::list_saved(&config.data_dir).await,
        Command::Engine {
            binary,
            fen,
            depth,
            movetime_ms,
        } => {
            let binary = binary.or_else(|| config.engine_binary.clone());
            commands::engine(binary.as_deref(), &fen, depth, movetime_ms).await
        }
    }
}

fn init_tracing(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
