use crate::events::{AnomalyResult, TradeEvent};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence sink for anomalous trades. Invoked fire-and-forget by the
/// pipeline; errors are logged, never propagated back into event processing.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn persist(&self, trade: &TradeEvent, result: &AnomalyResult) -> Result<()>;
}

/// Live broadcast sink for anomalous trades.
#[async_trait]
pub trait AlertBroadcaster: Send + Sync {
    async fn publish(&self, trade: &TradeEvent, result: &AnomalyResult) -> Result<()>;
}
