#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use onboard_relay::Cli;
use onboard_relay::app::dispatch::{dispatch, load_config};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Both ring and aws-lc-rs may be linked; pick one explicitly.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: Failed to install log subscriber: {e}");
    }

    let config = load_config(&cli)?;
    dispatch(cli, config).await
}
