use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use whale_watch_core::{AlertBroadcaster, ConfigLoader, TradeStore};
use whale_watch_pipeline::{BroadcastSink, LogStore};
use whale_watch_polymarket::GammaClient;

#[derive(Parser)]
#[command(name = "whale-watch")]
#[command(about = "Polymarket whale trade monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion and detection pipeline
    Run {
        /// Config profile (also loads config/Config.<profile>.toml)
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// List the current top-volume markets and exit
    Markets {
        /// How many markets to list
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { profile } => run(profile).await,
        Commands::Markets { limit } => list_markets(limit).await,
    }
}

async fn run(profile: Option<String>) -> Result<()> {
    let config = match profile {
        Some(profile) => ConfigLoader::load_with_profile(&profile)?,
        None => ConfigLoader::load()?,
    };

    let store: Arc<dyn TradeStore> = Arc::new(LogStore);
    let (broadcast_sink, _alerts) = BroadcastSink::new(256);
    let broadcaster: Arc<dyn AlertBroadcaster> = Arc::new(broadcast_sink);

    let handle = whale_watch_pipeline::start(config, store, broadcaster).await?;
    tracing::info!("pipeline running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("stop signal received, shutting down");
    handle.shutdown().await;

    Ok(())
}

async fn list_markets(limit: usize) -> Result<()> {
    let config = ConfigLoader::load()?;
    let gamma = GammaClient::new().with_base_url(config.poll.gamma_url);

    let markets = gamma.top_volume_markets(limit).await?;
    for market in markets {
        println!(
            "{:<46} {:>14.0} {}",
            market.condition_id, market.volume_24h, market.title
        );
    }

    Ok(())
}
