//! Recent-trades polling collector.
//!
//! Every poll cycle fetches one global page of recent trades plus a page per
//! tracked top-volume market, all in parallel. Individual request failures
//! are logged and treated as empty pages — a partial failure never aborts
//! the cycle. Fetched records are resolved to a market title (embedded or
//! via the Gamma cache); unresolvable trades are not actionable and are
//! dropped before they reach the dedup gate.

use crate::client::DataApiClient;
use crate::gamma::GammaClient;
use crate::models::MarketSummary;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use whale_watch_core::{PollConfig, TradeEvent};

/// Statistics for the trade poller.
#[derive(Debug, Clone, Default)]
pub struct TradePollerStats {
    /// Total number of poll cycles completed
    pub poll_cycles: u64,
    /// Total number of trade events emitted
    pub trades_emitted: u64,
    /// Records dropped (unresolvable title or malformed fields)
    pub trades_dropped: u64,
    /// Number of errors encountered
    pub errors: u64,
    /// Number of market-list refreshes performed
    pub refreshes: u64,
    /// Last successful poll timestamp
    pub last_poll: Option<chrono::DateTime<Utc>>,
}

impl TradePollerStats {
    /// Records a completed poll cycle.
    pub fn record_poll(&mut self, emitted: usize, dropped: usize) {
        self.poll_cycles += 1;
        self.trades_emitted += emitted as u64;
        self.trades_dropped += dropped as u64;
        self.last_poll = Some(Utc::now());
    }

    /// Records an error.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Records a market-list refresh.
    pub fn record_refresh(&mut self, markets: usize) {
        self.refreshes += 1;
        tracing::debug!(markets, "tracked market list refreshed");
    }
}

/// Lifecycle events emitted by the poller for monitoring.
#[derive(Debug, Clone)]
pub enum PollerEvent {
    /// Poller started
    Started,
    /// Top-volume market list refreshed
    MarketsRefreshed { count: usize },
    /// Poll cycle completed
    PollCompleted { emitted: usize },
    /// Error occurred
    Error { message: String },
    /// Poller stopped
    Stopped,
}

/// Interval-driven recent-trades collector.
///
/// Covers the streaming feed's gaps: the global page catches broad activity,
/// the per-market pages keep high-volume markets dense even when the global
/// page scrolls past them between cycles.
pub struct TradePoller {
    /// Data-API client for trade pages
    client: DataApiClient,
    /// Gamma client for discovery and title resolution
    gamma: Arc<GammaClient>,
    /// Configuration
    config: PollConfig,
    /// Output channel for normalized trades
    tx: mpsc::Sender<TradeEvent>,
    /// Optional event channel for monitoring
    event_tx: Option<mpsc::Sender<PollerEvent>>,
    /// Currently tracked top-volume markets
    tracked_markets: Vec<MarketSummary>,
    /// Statistics
    stats: TradePollerStats,
}

impl TradePoller {
    /// Creates a new trade poller.
    pub fn new(
        client: DataApiClient,
        gamma: Arc<GammaClient>,
        config: PollConfig,
        tx: mpsc::Sender<TradeEvent>,
    ) -> Self {
        Self {
            client,
            gamma,
            config,
            tx,
            event_tx: None,
            tracked_markets: Vec::new(),
            stats: TradePollerStats::default(),
        }
    }

    /// Sets an event channel for monitoring.
    #[must_use]
    pub fn with_event_channel(mut self, tx: mpsc::Sender<PollerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Returns a reference to current statistics.
    pub fn stats(&self) -> &TradePollerStats {
        &self.stats
    }

    /// Returns the list of currently tracked markets.
    pub fn tracked_markets(&self) -> &[MarketSummary] {
        &self.tracked_markets
    }

    /// Refreshes the top-volume market list used for per-market fetches.
    pub async fn refresh_markets(&mut self) -> Result<usize> {
        let markets = self.gamma.top_volume_markets(self.config.top_markets).await?;
        let count = markets.len();

        self.tracked_markets = markets;
        self.stats.record_refresh(count);
        self.emit_event(PollerEvent::MarketsRefreshed { count }).await;

        Ok(count)
    }

    /// Runs one poll cycle and returns the number of trades emitted.
    pub async fn poll_once(&mut self) -> usize {
        // One global page plus one page per tracked market, fetched
        // concurrently. `None` marks the unscoped request.
        let mut targets: Vec<Option<String>> = vec![None];
        targets.extend(
            self.tracked_markets
                .iter()
                .map(|market| Some(market.condition_id.clone())),
        );

        let client = &self.client;
        let limit = self.config.page_limit;
        let fetches = targets.into_iter().map(|market| async move {
            let result = client.recent_trades(market.as_deref(), limit).await;
            (market, result)
        });
        let pages = futures_util::future::join_all(fetches).await;

        let mut emitted = 0usize;
        let mut dropped = 0usize;
        let mut errors = 0usize;

        'pages: for (market, result) in pages {
            let trades = match result {
                Ok(trades) => trades,
                Err(e) => {
                    tracing::warn!(
                        market = market.as_deref().unwrap_or("all"),
                        error = %e,
                        "recent-trades request failed"
                    );
                    errors += 1;
                    continue;
                }
            };

            for raw in trades {
                let title = match &raw.title {
                    Some(title) => Some(title.clone()),
                    None => match self.gamma.market_title(&raw.condition_id).await {
                        Ok(title) => title,
                        Err(e) => {
                            tracing::debug!(
                                market = %raw.condition_id,
                                error = %e,
                                "title lookup failed"
                            );
                            None
                        }
                    },
                };

                let Some(title) = title else {
                    dropped += 1;
                    tracing::debug!(
                        tx_hash = %raw.transaction_hash,
                        market = %raw.condition_id,
                        "dropping trade without resolvable title"
                    );
                    continue;
                };

                match raw.to_trade_event(title) {
                    Some(trade) => {
                        if self.tx.send(trade).await.is_err() {
                            tracing::warn!("trade channel closed");
                            break 'pages;
                        }
                        emitted += 1;
                    }
                    None => {
                        dropped += 1;
                        tracing::debug!(
                            tx_hash = %raw.transaction_hash,
                            "dropping malformed trade record"
                        );
                    }
                }
            }
        }

        for _ in 0..errors {
            self.stats.record_error();
        }
        self.stats.record_poll(emitted, dropped);
        self.emit_event(PollerEvent::PollCompleted { emitted }).await;

        emitted
    }

    /// Runs the poller until shutdown, refreshing the market list on its
    /// slower cadence.
    pub async fn run(&mut self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        self.emit_event(PollerEvent::Started).await;

        if let Err(e) = self.refresh_markets().await {
            tracing::error!(error = %e, "initial market discovery failed");
            self.stats.record_error();
            self.emit_event(PollerEvent::Error {
                message: e.to_string(),
            })
            .await;
        }

        let mut poll_interval = interval(self.config.poll_interval());
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_refresh = Instant::now();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("trade poller shutdown requested");
                    break;
                }

                _ = poll_interval.tick() => {
                    if last_refresh.elapsed() >= self.config.market_refresh_interval() {
                        if let Err(e) = self.refresh_markets().await {
                            tracing::error!(error = %e, "market refresh failed");
                            self.stats.record_error();
                            self.emit_event(PollerEvent::Error {
                                message: e.to_string(),
                            })
                            .await;
                        }
                        last_refresh = Instant::now();
                    }

                    self.poll_once().await;
                }
            }
        }

        self.emit_event(PollerEvent::Stopped).await;
        Ok(())
    }

    /// Helper to emit monitoring events.
    async fn emit_event(&self, event: PollerEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}
