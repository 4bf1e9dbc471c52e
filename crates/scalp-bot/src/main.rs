//! Prediction-market position exit bot - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Prediction-market position exit bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SCALP_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    scalp_bot::init_logging();

    info!("Starting scalp exit bot v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > SCALP_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SCALP_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = scalp_bot::AppConfig::load(&config_path)?;

    let app = scalp_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
