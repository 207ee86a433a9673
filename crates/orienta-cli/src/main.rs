use std::path::PathBuf;

use clap::{Parser, Subcommand};
use orienta_cli::commands::{AskCommand, ChatCommand, TuneCommand};
use orienta_cli::error::CliResult;
use orienta_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "orienta-cli")]
#[command(about = "Orienta CLI - Operator tool for the Orienta advisor")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Ask a single question through the engine")]
    Ask(AskCommand),

    #[clap(about = "Interactive chat session in the terminal")]
    Chat(ChatCommand),

    #[clap(about = "Tune retrieval parameters with the evolutionary search")]
    Tune(TuneCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    match &cli.command {
        Command::Ask(cmd) => cmd.execute(cli.config.as_deref(), format).await,
        Command::Chat(cmd) => cmd.execute(cli.config.as_deref()).await,
        Command::Tune(cmd) => cmd.execute(cli.config.as_deref(), format).await,
    }
}
