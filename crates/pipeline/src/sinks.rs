//! Downstream sink implementations.
//!
//! Real persistence and presentation live outside this pipeline; these
//! implementations cover the boundary: a structured-log store and a
//! broadcast publisher for live subscribers. Both are safe to call from the
//! pipeline without blocking event processing.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use whale_watch_core::{AlertBroadcaster, AnomalyResult, TradeEvent, TradeStore};

/// Alert payload delivered to live subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct WhaleAlert {
    pub trade: TradeEvent,
    pub result: AnomalyResult,
}

/// Store that records anomalous trades in the structured log.
pub struct LogStore;

#[async_trait]
impl TradeStore for LogStore {
    async fn persist(&self, trade: &TradeEvent, result: &AnomalyResult) -> Result<()> {
        tracing::info!(
            tx_id = %trade.tx_id,
            market = %trade.market_id,
            title = trade.title.as_deref().unwrap_or(""),
            side = %trade.side,
            notional = %trade.notional,
            severity = %result.severity,
            suspicion = result.suspicion_score,
            "whale trade recorded"
        );
        Ok(())
    }
}

/// Publishes alerts over a tokio broadcast channel.
pub struct BroadcastSink {
    tx: broadcast::Sender<WhaleAlert>,
}

impl BroadcastSink {
    /// Creates the sink plus an initial subscriber handle.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<WhaleAlert>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    /// Registers another live subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WhaleAlert> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl AlertBroadcaster for BroadcastSink {
    async fn publish(&self, trade: &TradeEvent, result: &AnomalyResult) -> Result<()> {
        let alert = WhaleAlert {
            trade: trade.clone(),
            result: result.clone(),
        };

        // A send error only means nobody is listening right now.
        if self.tx.send(alert).is_err() {
            tracing::debug!(tx_id = %trade.tx_id, "no live subscribers for whale alert");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use whale_watch_core::{Severity, TradeSide, TradeSource};

    fn sample_alert_parts() -> (TradeEvent, AnomalyResult) {
        let trade = TradeEvent::new(
            "0xabc",
            "cond-1",
            "token-1",
            TradeSide::Buy,
            dec!(20000),
            dec!(0.50),
            Utc::now(),
            TradeSource::Poll,
        )
        .with_title("Test market");

        let result = AnomalyResult {
            is_anomaly: true,
            combined_z: 3.2,
            percentile: 99.0,
            suspicion_score: 87.0,
            severity: Severity::High,
        };

        (trade, result)
    }

    #[tokio::test]
    async fn test_log_store_accepts_alerts() {
        let (trade, result) = sample_alert_parts();
        LogStore.persist(&trade, &result).await.unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_to_subscriber() {
        let (sink, mut rx) = BroadcastSink::new(16);
        let (trade, result) = sample_alert_parts();

        sink.publish(&trade, &result).await.unwrap();

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.trade.tx_id, "0xabc");
        assert_eq!(alert.result.severity, Severity::High);
    }

    #[tokio::test]
    async fn test_broadcast_sink_without_subscribers_is_ok() {
        let (sink, rx) = BroadcastSink::new(16);
        drop(rx);

        let (trade, result) = sample_alert_parts();
        sink.publish(&trade, &result).await.unwrap();
    }

    #[test]
    fn test_alert_serializes() {
        let (trade, result) = sample_alert_parts();
        let alert = WhaleAlert { trade, result };

        let json = serde_json::to_string(&alert).unwrap();
        assert!(json.contains("\"HIGH\""));
        assert!(json.contains("0xabc"));
    }
}
