//! Wiring: discovery → producers → pipeline.
//!
//! `start` owns the startup sequence: discover the top-volume markets,
//! derive the stream subscription set from their token ids, then spawn the
//! feed, the poller, and the consumer as independent tasks joined by one
//! mpsc channel. The returned handle shuts everything down cleanly without
//! losing in-flight events: producers stop first, then the consumer drains.

use crate::orchestrator::TradePipeline;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use whale_watch_core::{AlertBroadcaster, AppConfig, TradeStore};
use whale_watch_polymarket::{DataApiClient, FeedEvent, GammaClient, TradeFeed, TradePoller};

/// Handle to the running pipeline tasks.
pub struct PipelineHandle {
    feed: TradeFeed,
    poller_shutdown_tx: mpsc::Sender<()>,
    pipeline_shutdown_tx: mpsc::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Stops producers, then the consumer, and waits for all tasks.
    pub async fn shutdown(self) {
        self.feed.shutdown().await;
        let _ = self.poller_shutdown_tx.send(()).await;
        let _ = self.pipeline_shutdown_tx.send(()).await;

        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("pipeline shut down");
    }
}

/// Starts the full pipeline and returns its handle.
///
/// # Errors
///
/// Returns an error only if task wiring itself fails; upstream outages at
/// startup degrade (empty subscription set, poller retries on its own
/// cadence) rather than abort.
pub async fn start(
    config: AppConfig,
    store: Arc<dyn TradeStore>,
    broadcaster: Arc<dyn AlertBroadcaster>,
) -> Result<PipelineHandle> {
    let gamma = Arc::new(GammaClient::new().with_base_url(config.poll.gamma_url.clone()));

    // Subscription set: every outcome token of the current top markets.
    // Fixed for the life of the process; the poller's own list refreshes.
    let token_ids: Vec<String> = match gamma.top_volume_markets(config.poll.top_markets).await {
        Ok(markets) => {
            let token_ids: Vec<String> = markets
                .iter()
                .flat_map(|market| market.token_ids.iter().cloned())
                .collect();
            tracing::info!(
                markets = markets.len(),
                tokens = token_ids.len(),
                "subscribing to top-volume markets"
            );
            token_ids
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "initial market discovery failed; stream starts unsubscribed"
            );
            Vec::new()
        }
    };

    let (trade_tx, trade_rx) = mpsc::channel(config.feed.channel_buffer_size);

    // Stream producer, bridged into the shared trade channel.
    let (feed, mut feed_rx) =
        TradeFeed::connect(token_ids, config.feed.clone(), Some(Arc::clone(&gamma))).await?;
    let bridge_tx = trade_tx.clone();
    let bridge_task = tokio::spawn(async move {
        while let Some(event) = feed_rx.recv().await {
            match event {
                FeedEvent::Trade(trade) => {
                    if bridge_tx.send(trade).await.is_err() {
                        break;
                    }
                }
                FeedEvent::Connected => tracing::info!("trade stream connected"),
                FeedEvent::Disconnected { reason } => {
                    tracing::warn!(reason = %reason, "trade stream disconnected");
                }
            }
        }
    });

    // Poll producer.
    let client = DataApiClient::new()
        .with_base_url(config.poll.api_url.clone())
        .with_request_timeout(config.poll.request_timeout());
    let (poller_shutdown_tx, poller_shutdown_rx) = mpsc::channel(1);
    let mut poller = TradePoller::new(client, Arc::clone(&gamma), config.poll.clone(), trade_tx);
    let poller_task = tokio::spawn(async move {
        if let Err(e) = poller.run(poller_shutdown_rx).await {
            tracing::error!(error = %e, "trade poller exited with error");
        }
    });

    // Consumer.
    let (pipeline_shutdown_tx, pipeline_shutdown_rx) = mpsc::channel(1);
    let pipeline = TradePipeline::new(&config.detection, store, broadcaster);
    let pipeline_task = tokio::spawn(async move {
        if let Err(e) = pipeline.run(trade_rx, pipeline_shutdown_rx).await {
            tracing::error!(error = %e, "pipeline exited with error");
        }
    });

    Ok(PipelineHandle {
        feed,
        poller_shutdown_tx,
        pipeline_shutdown_tx,
        tasks: vec![bridge_task, poller_task, pipeline_task],
    })
}
