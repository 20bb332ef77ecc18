//! The single consumer task at the center of the pipeline.
//!
//! Each event is processed to completion before the next one starts, which
//! sequences `observe` before the classification that follows it for the
//! same trade. Per-event failures are logged and never abort processing of
//! subsequent events.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tokio::sync::mpsc;
use whale_watch_core::{
    AlertBroadcaster, AnomalyResult, DetectionConfig, TradeEvent, TradeStore,
};
use whale_watch_detect::{RollingStats, TradeDeduplicator, WhaleClassifier, WindowKey};

/// Counters for the orchestrator loop.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Events received from either producer
    pub received: u64,
    /// Events rejected at the dedup gate
    pub duplicates: u64,
    /// New events that updated statistics and were classified
    pub processed: u64,
    /// Events classified as anomalous and emitted
    pub anomalies: u64,
    /// Time of the last processed event
    pub last_event: Option<DateTime<Utc>>,
}

/// Orchestrator: dedup gate → statistics update → classification → sinks.
pub struct TradePipeline {
    dedup: TradeDeduplicator,
    stats_engine: Arc<RollingStats>,
    classifier: WhaleClassifier,
    store: Arc<dyn TradeStore>,
    broadcaster: Arc<dyn AlertBroadcaster>,
    stats: PipelineStats,
}

impl TradePipeline {
    #[must_use]
    pub fn new(
        config: &DetectionConfig,
        store: Arc<dyn TradeStore>,
        broadcaster: Arc<dyn AlertBroadcaster>,
    ) -> Self {
        let stats_engine = Arc::new(RollingStats::from_config(config));
        Self {
            dedup: TradeDeduplicator::from_config(config),
            classifier: WhaleClassifier::new(Arc::clone(&stats_engine)),
            stats_engine,
            store,
            broadcaster,
            stats: PipelineStats::default(),
        }
    }

    /// The statistics engine owned by this pipeline. All window access goes
    /// through its synchronized operations.
    #[must_use]
    pub fn stats_engine(&self) -> &Arc<RollingStats> {
        &self.stats_engine
    }

    #[must_use]
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Processes one event to completion.
    ///
    /// Returns `None` for duplicates, which terminate at the dedup gate with
    /// no further side effects — in particular no statistics update. New
    /// trades always feed the windows; only anomalous ones reach the sinks.
    pub async fn process(&mut self, trade: TradeEvent) -> Option<AnomalyResult> {
        self.stats.received += 1;

        if !self.dedup.is_new(&trade.tx_id) {
            self.stats.duplicates += 1;
            tracing::debug!(tx_id = %trade.tx_id, source = ?trade.source, "duplicate trade dropped");
            return None;
        }

        let notional = trade.notional.to_f64().unwrap_or(0.0);
        self.stats_engine.observe(WindowKey::Global, notional);
        self.stats_engine
            .observe(WindowKey::Market(&trade.market_id), notional);

        let result = self.classifier.classify(&trade);

        self.stats.processed += 1;
        self.stats.last_event = Some(Utc::now());

        if result.is_anomaly {
            self.stats.anomalies += 1;
            tracing::info!(
                tx_id = %trade.tx_id,
                market = %trade.market_id,
                title = trade.title.as_deref().unwrap_or(""),
                side = %trade.side,
                notional = %trade.notional,
                combined_z = result.combined_z,
                percentile = result.percentile,
                suspicion = result.suspicion_score,
                severity = %result.severity,
                "whale trade detected"
            );
            self.emit(trade, result.clone());
        }

        Some(result)
    }

    /// Hands an anomalous trade to both sinks without blocking the loop.
    /// Sink failures are logged; the event counts as processed regardless.
    fn emit(&self, trade: TradeEvent, result: AnomalyResult) {
        let store = Arc::clone(&self.store);
        let broadcaster = Arc::clone(&self.broadcaster);

        tokio::spawn(async move {
            if let Err(e) = store.persist(&trade, &result).await {
                tracing::warn!(tx_id = %trade.tx_id, error = %e, "persist failed");
            }
            if let Err(e) = broadcaster.publish(&trade, &result).await {
                tracing::warn!(tx_id = %trade.tx_id, error = %e, "broadcast failed");
            }
        });
    }

    /// Consumes trades until shutdown or until every producer has closed its
    /// sender.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<TradeEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("pipeline shutdown requested");
                    break;
                }

                maybe = rx.recv() => match maybe {
                    Some(trade) => {
                        self.process(trade).await;
                    }
                    None => {
                        tracing::info!("all producers closed, pipeline exiting");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            received = self.stats.received,
            duplicates = self.stats.duplicates,
            anomalies = self.stats.anomalies,
            "pipeline stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::BroadcastSink;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use std::time::Duration;
    use whale_watch_core::{Severity, TradeSide, TradeSource};

    /// Store double that records every persisted alert.
    struct RecordingStore {
        persisted: Mutex<Vec<(String, Severity)>>,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                persisted: Mutex::new(Vec::new()),
            })
        }

        fn persisted(&self) -> Vec<(String, Severity)> {
            self.persisted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TradeStore for RecordingStore {
        async fn persist(&self, trade: &TradeEvent, result: &AnomalyResult) -> anyhow::Result<()> {
            self.persisted
                .lock()
                .unwrap()
                .push((trade.tx_id.clone(), result.severity));
            Ok(())
        }
    }

    /// Store double that always fails.
    struct FailingStore;

    #[async_trait]
    impl TradeStore for FailingStore {
        async fn persist(&self, _: &TradeEvent, _: &AnomalyResult) -> anyhow::Result<()> {
            Err(anyhow!("sink unavailable"))
        }
    }

    fn trade(tx_id: &str, market: &str, size: Decimal) -> TradeEvent {
        TradeEvent::new(
            tx_id,
            market,
            "token-1",
            TradeSide::Buy,
            size,
            dec!(0.50),
            Utc::now(),
            TradeSource::Poll,
        )
        .with_title("Test market")
    }

    fn pipeline_with(
        store: Arc<dyn TradeStore>,
    ) -> (TradePipeline, tokio::sync::broadcast::Receiver<crate::WhaleAlert>) {
        let (broadcast_sink, alerts_rx) = BroadcastSink::new(64);
        let pipeline = TradePipeline::new(
            &DetectionConfig::default(),
            store,
            Arc::new(broadcast_sink),
        );
        (pipeline, alerts_rx)
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within timeout");
    }

    #[tokio::test]
    async fn test_duplicate_never_reaches_statistics() {
        let store = RecordingStore::new();
        let (mut pipeline, _alerts) = pipeline_with(store);

        let first = pipeline.process(trade("0xaaa", "cond-1", dec!(100))).await;
        assert!(first.is_some());

        let second = pipeline.process(trade("0xaaa", "cond-1", dec!(100))).await;
        assert!(second.is_none(), "duplicate terminates at the dedup gate");

        assert_eq!(pipeline.stats_engine().window_len(WindowKey::Global), 1);
        assert_eq!(pipeline.stats().received, 2);
        assert_eq!(pipeline.stats().duplicates, 1);
        assert_eq!(pipeline.stats().processed, 1);
    }

    #[tokio::test]
    async fn test_non_anomalous_trade_feeds_baseline_without_emission() {
        let store = RecordingStore::new();
        let store_probe = Arc::clone(&store);
        let (mut pipeline, mut alerts) = pipeline_with(store);

        // notional 50, nowhere near the floor and no baseline for a z-score
        let result = pipeline.process(trade("0xaaa", "cond-1", dec!(100))).await.unwrap();

        assert!(!result.is_anomaly);
        assert_eq!(pipeline.stats_engine().window_len(WindowKey::Global), 1);
        assert_eq!(pipeline.stats().anomalies, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store_probe.persisted().is_empty());
        assert!(alerts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_anomalous_trade_reaches_both_sinks() {
        let store = RecordingStore::new();
        let store_probe = Arc::clone(&store);
        let (mut pipeline, mut alerts) = pipeline_with(store);

        // notional 30,000: over the floor and into the MEDIUM size tier
        let result = pipeline.process(trade("0xbig", "cond-1", dec!(60000))).await.unwrap();

        assert!(result.is_anomaly);
        assert_eq!(result.severity, Severity::Medium);

        let alert = tokio::time::timeout(Duration::from_secs(5), alerts.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alert.trade.tx_id, "0xbig");

        wait_until(|| !store_probe.persisted().is_empty()).await;
        assert_eq!(store_probe.persisted(), vec![("0xbig".to_string(), Severity::Medium)]);
        assert_eq!(pipeline.stats().anomalies, 1);
    }

    #[tokio::test]
    async fn test_sink_failure_never_aborts_processing() {
        let (mut pipeline, mut alerts) = pipeline_with(Arc::new(FailingStore));

        let first = pipeline.process(trade("0xbig1", "cond-1", dec!(60000))).await.unwrap();
        assert!(first.is_anomaly);

        // Next event still processes normally; the broadcast side still fires.
        let second = pipeline.process(trade("0xbig2", "cond-1", dec!(60000))).await.unwrap();
        assert!(second.is_anomaly);
        assert_eq!(pipeline.stats().processed, 2);

        let mut seen = Vec::new();
        for _ in 0..2 {
            let alert = tokio::time::timeout(Duration::from_secs(5), alerts.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(alert.trade.tx_id);
        }
        seen.sort();
        assert_eq!(seen, vec!["0xbig1".to_string(), "0xbig2".to_string()]);
    }

    #[tokio::test]
    async fn test_distinct_trades_fill_global_window() {
        let store = RecordingStore::new();
        let (mut pipeline, _alerts) = pipeline_with(store);

        for i in 0..50 {
            pipeline.process(trade(&format!("tx-{i}"), "cond-1", dec!(100))).await;
        }

        assert_eq!(pipeline.stats_engine().window_len(WindowKey::Global), 50);
        assert_eq!(
            pipeline.stats_engine().window_len(WindowKey::Market("cond-1")),
            50
        );
    }

    #[tokio::test]
    async fn test_run_drains_channel_and_honors_shutdown() {
        let store = RecordingStore::new();
        let (pipeline, _alerts) = pipeline_with(store);

        let (trade_tx, trade_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(pipeline.run(trade_rx, shutdown_rx));

        trade_tx.send(trade("0xaaa", "cond-1", dec!(100))).await.unwrap();
        trade_tx.send(trade("0xbbb", "cond-1", dec!(100))).await.unwrap();

        shutdown_tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("pipeline did not stop")
            .unwrap()
            .unwrap();
    }
}
