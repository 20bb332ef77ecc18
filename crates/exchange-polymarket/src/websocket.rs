//! Streaming trade feed over the CLOB market channel WebSocket.
//!
//! The feed runs as an independent task: it connects, re-subscribes (a fresh
//! session has no subscription state), keeps the link alive with periodic
//! pings, and emits [`FeedEvent`]s over an mpsc channel. On any link failure
//! it waits a fixed delay and reconnects — forever, with no backoff growth
//! and no retry cap. The upstream is assumed highly available and the feed is
//! best-effort; the poll feed covers its gaps.
//!
//! Trade frames are normalized into [`TradeEvent`]s. Everything else —
//! non-JSON control strings, aggregate price updates without size
//! information, frames with unparsable fields — is dropped silently so it
//! can never be double-counted downstream.

use crate::gamma::GammaClient;
use crate::models::{StreamMessage, StreamTradeMessage, SubscriptionMessage};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use whale_watch_core::{FeedConfig, TradeEvent};

/// Events emitted by the trade feed.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A normalized trade execution.
    Trade(TradeEvent),
    /// Streaming session established and subscribed.
    Connected,
    /// Streaming session lost; a reconnect is already scheduled.
    Disconnected { reason: String },
}

/// Errors that can occur on the streaming connection.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Handle to a running trade feed task.
#[derive(Clone)]
pub struct TradeFeed {
    shutdown_tx: mpsc::Sender<()>,
    subscriptions: Arc<Vec<String>>,
}

impl TradeFeed {
    /// Spawns the feed task subscribed to the given token ids.
    ///
    /// Returns a handle plus the receiver for feed events. When a Gamma
    /// client is supplied, emitted trades are labeled from its title cache;
    /// the hot path never issues a lookup request itself.
    pub async fn connect(
        subscriptions: Vec<String>,
        config: FeedConfig,
        titles: Option<Arc<GammaClient>>,
    ) -> Result<(Self, mpsc::Receiver<FeedEvent>), FeedError> {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let subscriptions_arc = Arc::new(subscriptions.clone());

        tokio::spawn(run_connection_loop(
            config,
            subscriptions,
            titles,
            event_tx,
            shutdown_rx,
        ));

        Ok((
            Self {
                shutdown_tx,
                subscriptions: subscriptions_arc,
            },
            event_rx,
        ))
    }

    /// Token ids the feed re-subscribes to on every connect.
    #[must_use]
    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Gracefully stops the feed: the reconnect loop exits and the
    /// connection is released.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Reconnect-forever loop with a fixed delay between attempts.
async fn run_connection_loop(
    config: FeedConfig,
    subscriptions: Vec<String>,
    titles: Option<Arc<GammaClient>>,
    event_tx: mpsc::Sender<FeedEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        if shutdown_rx.try_recv().is_ok() {
            info!("trade feed shutdown requested");
            break;
        }

        info!(url = %config.ws_url, "connecting to trade stream");

        match connect_and_stream(
            &config,
            &subscriptions,
            titles.as_deref(),
            &event_tx,
            &mut shutdown_rx,
        )
        .await
        {
            Ok(()) => {
                info!("trade stream closed cleanly");
                break;
            }
            Err(e) => {
                error!(error = %e, "trade stream connection failed");
                let _ = event_tx
                    .send(FeedEvent::Disconnected {
                        reason: e.to_string(),
                    })
                    .await;

                sleep(config.reconnect_delay()).await;
            }
        }
    }
}

/// Connects, subscribes, and processes messages until shutdown or failure.
async fn connect_and_stream(
    config: &FeedConfig,
    subscriptions: &[String],
    titles: Option<&GammaClient>,
    event_tx: &mpsc::Sender<FeedEvent>,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<(), FeedError> {
    let (ws_stream, _response) =
        tokio::time::timeout(config.connect_timeout(), connect_async(&config.ws_url))
            .await
            .map_err(|_| FeedError::ConnectionFailed("connect timed out".to_string()))?
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    let sub_msg = SubscriptionMessage {
        subscribe_ids: subscriptions,
        kind: "market",
    };
    let sub_json = serde_json::to_string(&sub_msg)?;
    debug!(message = %sub_json, "sending subscription");
    write.send(Message::Text(sub_json)).await?;

    let _ = event_tx.send(FeedEvent::Connected).await;

    let mut ping_interval = tokio::time::interval(config.ping_interval());
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("shutdown signal received, closing trade stream");
                let _ = write.close().await;
                return Ok(());
            }

            _ = ping_interval.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    warn!(error = %e, "failed to send keep-alive ping");
                    return Err(FeedError::WebSocket(e));
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&text, titles, event_tx).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        return Err(FeedError::ConnectionFailed(
                            frame
                                .map(|f| f.reason.to_string())
                                .unwrap_or_else(|| "connection closed".to_string()),
                        ));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(FeedError::WebSocket(e));
                    }
                    None => {
                        return Err(FeedError::ConnectionFailed("stream ended".to_string()));
                    }
                }
            }
        }
    }
}

/// Parses a text frame and emits any trades it carries. Re-parsing is always
/// possible since no bytes are mutated; anything that is not a well-formed
/// trade is dropped here.
async fn handle_text(text: &str, titles: Option<&GammaClient>, event_tx: &mpsc::Sender<FeedEvent>) {
    let messages: Vec<StreamMessage> = if text.trim_start().starts_with('[') {
        match serde_json::from_str(text) {
            Ok(messages) => messages,
            Err(e) => {
                debug!(error = %e, "dropping unparsable frame");
                return;
            }
        }
    } else {
        match serde_json::from_str::<StreamMessage>(text) {
            Ok(message) => vec![message],
            Err(e) => {
                debug!(error = %e, "dropping unparsable frame");
                return;
            }
        }
    };

    for msg in messages {
        if msg.event_type != "trade" {
            // Aggregate price updates carry no size and must not be counted.
            debug!(event_type = %msg.event_type, "ignoring non-trade event");
            continue;
        }

        let trade_msg: StreamTradeMessage = match serde_json::from_value(msg.data) {
            Ok(trade_msg) => trade_msg,
            Err(e) => {
                debug!(error = %e, "dropping malformed trade frame");
                continue;
            }
        };

        let title = titles.and_then(|gamma| gamma.cached_title(&trade_msg.market));
        match trade_msg.to_trade_event(title) {
            Some(trade) => {
                if event_tx.send(FeedEvent::Trade(trade)).await.is_err() {
                    debug!("feed channel closed");
                    return;
                }
            }
            None => {
                debug!(market = %trade_msg.market, "dropping trade frame with unparsable fields");
            }
        }
    }
}
