//! Headlock CLI: drive hash-locked payments across ledger heads.
//!
//! Subcommands: init, paths, send.

mod commands;
mod demo;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Headlock: multi-hop payments across independent ledger heads.
#[derive(Parser, Debug)]
#[command(name = "headlock", version, about, long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the demo topology configuration file.
    Init(commands::init::InitArgs),
    /// List the payment paths of a topology.
    Paths(commands::paths::PathsArgs),
    /// Execute a payment end to end on the in-memory ledger.
    Send(commands::send::SendArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    match &cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Paths(args) => commands::paths::run(args),
        Commands::Send(args) => commands::send::run(args).await,
    }
}
