//! Orienta daemon - chat server over the retrieval-augmented decision core

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use orienta_server::config;
use orienta_server::engine::DialogueEngine;
use orienta_server::error::Result;
use orienta_server::server::ChatServer;

/// Orienta - Decision core for a retrieval-augmented conversational advisor
#[derive(Parser)]
#[command(name = "orienta")]
#[command(about = "Retrieval-augmented conversational advisor daemon")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the chat server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,orienta=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting Orienta daemon");

    let config = config::load(config_path.as_deref())?;
    tracing::debug!("Config loaded: {:?}", config);

    let engine = Arc::new(DialogueEngine::from_config(&config)?);
    tracing::info!(
        "Engine ready: backend={}, {}",
        config.backend.provider,
        engine.parameters()
    );

    let server = ChatServer::new(config.server.clone(), engine);
    server.serve().await?;

    tracing::info!("Orienta daemon stopped");
    Ok(())
}
