//! flood-risk - Main Entry Point

use clap::Parser;
use flood_risk::cli::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flood_risk=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    Cli::parse().run()
}
