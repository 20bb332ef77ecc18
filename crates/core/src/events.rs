use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Parses the side strings used by both upstream feeds.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" | "B" => Some(TradeSide::Buy),
            "SELL" | "S" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Which upstream produced an event. Push trades carry synthesized ids that
/// cannot match the poll feed's transaction hashes, so consumers may want to
/// tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSource {
    Stream,
    Poll,
}

/// Canonical trade record after normalization from either feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Transaction identifier: the on-chain hash for poll-feed trades, a
    /// synthesized `<market>-<timestamp>-<hex>` key for stream-only trades.
    pub tx_id: String,
    /// Market (condition) identifier.
    pub market_id: String,
    /// Outcome token identifier.
    pub asset_id: String,
    pub side: TradeSide,
    /// Number of outcome shares.
    pub size: Decimal,
    /// Probability-style unit price in [0, 1].
    pub price: Decimal,
    /// size * price, always non-negative.
    pub notional: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Wallet behind the trade; the stream feed does not carry one.
    pub wallet: Option<String>,
    /// Human-readable market title.
    pub title: Option<String>,
    pub source: TradeSource,
}

impl TradeEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tx_id: impl Into<String>,
        market_id: impl Into<String>,
        asset_id: impl Into<String>,
        side: TradeSide,
        size: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
        source: TradeSource,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            market_id: market_id.into(),
            asset_id: asset_id.into(),
            side,
            size,
            price,
            notional: size * price,
            timestamp,
            wallet: None,
            title: None,
            source,
        }
    }

    #[must_use]
    pub fn with_wallet(mut self, wallet: impl Into<String>) -> Self {
        self.wallet = Some(wallet.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Severity tiers for classified trades, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Extreme,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// Classification verdict for a single trade. Computed fresh per trade and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub is_anomaly: bool,
    /// Weighted combination of global and per-market z-scores; can be negative.
    pub combined_z: f64,
    /// Percentile rank of the notional in the global window, 0..100.
    pub percentile: f64,
    /// Composite heuristic, clamped to 0..100.
    pub suspicion_score: f64,
    pub severity: Severity,
}
