use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fundledger::cli::Cli;
use fundledger::dispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Initialize logging (RUST_LOG wins over the default filter)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fundledger=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    dispatcher::dispatch(cli).await
}
