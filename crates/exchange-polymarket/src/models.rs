//! Wire models for the streaming feed, the data-API, and the Gamma API.
//!
//! All conversions into [`TradeEvent`] are lenient: a record that fails
//! field parsing (or carries a negative size or price) converts to `None`
//! and is dropped by the caller, never half-populated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use whale_watch_core::{TradeEvent, TradeSide, TradeSource};

// ============================================================================
// Streaming feed messages
// ============================================================================

/// Subscription frame sent to the market channel once per (re)connect.
#[derive(Debug, Serialize)]
pub struct SubscriptionMessage<'a> {
    pub subscribe_ids: &'a [String],
    pub kind: &'static str,
}

/// Incoming stream frame wrapper; only `event_type == "trade"` is consumed.
#[derive(Debug, Deserialize)]
pub struct StreamMessage {
    pub event_type: String,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Trade execution frame from the streaming feed.
///
/// ```json
/// {
///   "event_type": "trade",
///   "asset_id": "7131...",
///   "market": "0xbd31...",
///   "price": ".48",
///   "side": "BUY",
///   "size": "250",
///   "timestamp": 1706745600000,
///   "fee_rate_bps": "0"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StreamTradeMessage {
    pub asset_id: String,
    pub market: String,
    pub price: String,
    pub side: String,
    pub size: String,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub fee_rate_bps: Option<String>,
}

impl StreamTradeMessage {
    /// Normalizes into a [`TradeEvent`].
    ///
    /// Stream trades carry no transaction hash; the identifier is
    /// synthesized from the market id, the timestamp, and a random suffix.
    /// Such keys dedupe re-deliveries within the stream but cannot match the
    /// poll feed's real hashes.
    #[must_use]
    pub fn to_trade_event(&self, title: Option<String>) -> Option<TradeEvent> {
        let price = parse_decimal(&self.price)?;
        let size = parse_decimal(&self.size)?;
        let side = TradeSide::parse(&self.side)?;
        let timestamp = DateTime::from_timestamp_millis(self.timestamp)?;

        let tx_id = format!(
            "{}-{}-{:08x}",
            self.market,
            self.timestamp,
            rand::random::<u32>()
        );

        let mut trade = TradeEvent::new(
            tx_id,
            self.market.clone(),
            self.asset_id.clone(),
            side,
            size,
            price,
            timestamp,
            TradeSource::Stream,
        );
        if let Some(title) = title {
            trade = trade.with_title(title);
        }
        Some(trade)
    }
}

// ============================================================================
// Data-API records
// ============================================================================

/// One row of the data-API recent-trades response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTrade {
    pub transaction_hash: String,
    #[serde(default)]
    pub proxy_wallet: Option<String>,
    pub condition_id: String,
    #[serde(default)]
    pub asset: String,
    pub side: String,
    pub size: f64,
    pub price: f64,
    /// Seconds since the epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
}

impl RecentTrade {
    /// Normalizes into a [`TradeEvent`]. The caller supplies the resolved
    /// market title; records without one are not actionable and never reach
    /// this point.
    #[must_use]
    pub fn to_trade_event(&self, title: String) -> Option<TradeEvent> {
        if self.size < 0.0 || self.price < 0.0 {
            return None;
        }
        let size = Decimal::try_from(self.size).ok()?;
        let price = Decimal::try_from(self.price).ok()?;
        let side = TradeSide::parse(&self.side)?;
        let timestamp = DateTime::from_timestamp(self.timestamp, 0)?;

        let mut trade = TradeEvent::new(
            self.transaction_hash.clone(),
            self.condition_id.clone(),
            self.asset.clone(),
            side,
            size,
            price,
            timestamp,
            TradeSource::Poll,
        )
        .with_title(title);
        if let Some(wallet) = &self.proxy_wallet {
            trade = trade.with_wallet(wallet.clone());
        }
        Some(trade)
    }
}

// ============================================================================
// Gamma API records
// ============================================================================

/// Raw market row from the Gamma API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGammaMarket {
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub volume24hr: Option<f64>,
    /// JSON-encoded string array, e.g. `"[\"token1\", \"token2\"]"`.
    #[serde(default)]
    pub clob_token_ids: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
}

impl RawGammaMarket {
    /// Converts to a [`MarketSummary`], requiring at least an id and a title.
    #[must_use]
    pub fn to_summary(&self) -> Option<MarketSummary> {
        let condition_id = self.condition_id.clone()?;
        let title = self.question.clone()?;
        let token_ids = self
            .clob_token_ids
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default();

        Some(MarketSummary {
            condition_id,
            title,
            volume_24h: self.volume24hr.unwrap_or(0.0),
            token_ids,
        })
    }
}

/// Cleaned-up market metadata used for discovery and title resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSummary {
    pub condition_id: String,
    pub title: String,
    pub volume_24h: f64,
    pub token_ids: Vec<String>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses a non-negative decimal string, handling the bare ".48" form used
/// by the streaming feed.
pub(crate) fn parse_decimal(s: &str) -> Option<Decimal> {
    let normalized = if s.starts_with('.') {
        format!("0{s}")
    } else {
        s.to_string()
    };

    Decimal::from_str(&normalized)
        .ok()
        .filter(|d| *d >= Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal_standard() {
        assert_eq!(parse_decimal("0.48"), Some(dec!(0.48)));
        assert_eq!(parse_decimal("250"), Some(dec!(250)));
    }

    #[test]
    fn test_parse_decimal_bare_fraction() {
        assert_eq!(parse_decimal(".48"), Some(dec!(0.48)));
        assert_eq!(parse_decimal(".01"), Some(dec!(0.01)));
    }

    #[test]
    fn test_parse_decimal_rejects_garbage_and_negatives() {
        assert_eq!(parse_decimal("invalid"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("-5"), None);
    }

    #[test]
    fn test_stream_trade_parsing() {
        let json = r#"{
            "event_type": "trade",
            "asset_id": "token-123",
            "market": "0xcond",
            "price": ".48",
            "side": "BUY",
            "size": "250",
            "timestamp": 1706745600000,
            "fee_rate_bps": "0"
        }"#;

        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.event_type, "trade");

        let trade_msg: StreamTradeMessage = serde_json::from_value(msg.data).unwrap();
        assert_eq!(trade_msg.asset_id, "token-123");
        assert_eq!(trade_msg.market, "0xcond");
        assert_eq!(trade_msg.fee_rate_bps.as_deref(), Some("0"));

        let trade = trade_msg.to_trade_event(None).unwrap();
        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(trade.size, dec!(250));
        assert_eq!(trade.price, dec!(0.48));
        assert_eq!(trade.notional, dec!(120.00));
        assert_eq!(trade.source, TradeSource::Stream);
        assert!(trade.wallet.is_none());
        assert!(trade.tx_id.starts_with("0xcond-1706745600000-"));
    }

    #[test]
    fn test_stream_trade_synthesized_ids_differ() {
        let msg = StreamTradeMessage {
            asset_id: "token".to_string(),
            market: "0xcond".to_string(),
            price: ".50".to_string(),
            side: "SELL".to_string(),
            size: "10".to_string(),
            timestamp: 1_706_745_600_000,
            fee_rate_bps: None,
        };

        let a = msg.to_trade_event(None).unwrap();
        let b = msg.to_trade_event(None).unwrap();
        assert_ne!(a.tx_id, b.tx_id, "random suffix keeps re-parses distinct");
    }

    #[test]
    fn test_stream_trade_rejects_bad_fields() {
        let base = StreamTradeMessage {
            asset_id: "token".to_string(),
            market: "0xcond".to_string(),
            price: ".50".to_string(),
            side: "BUY".to_string(),
            size: "10".to_string(),
            timestamp: 1_706_745_600_000,
            fee_rate_bps: None,
        };

        let mut bad_price = base.clone();
        bad_price.price = "n/a".to_string();
        assert!(bad_price.to_trade_event(None).is_none());

        let mut bad_side = base.clone();
        bad_side.side = "HOLD".to_string();
        assert!(bad_side.to_trade_event(None).is_none());

        let mut negative_size = base;
        negative_size.size = "-10".to_string();
        assert!(negative_size.to_trade_event(None).is_none());
    }

    #[test]
    fn test_recent_trade_parsing() {
        let json = r#"{
            "transactionHash": "0xdeadbeef",
            "proxyWallet": "0xwallet",
            "conditionId": "0xcond",
            "asset": "token-123",
            "side": "SELL",
            "size": 1200.5,
            "price": 0.62,
            "timestamp": 1706745600,
            "title": "Will X happen?",
            "slug": "will-x-happen",
            "outcome": "Yes"
        }"#;

        let raw: RecentTrade = serde_json::from_str(json).unwrap();
        assert_eq!(raw.transaction_hash, "0xdeadbeef");
        assert_eq!(raw.condition_id, "0xcond");

        let trade = raw.to_trade_event("Will X happen?".to_string()).unwrap();
        assert_eq!(trade.tx_id, "0xdeadbeef");
        assert_eq!(trade.side, TradeSide::Sell);
        assert_eq!(trade.wallet.as_deref(), Some("0xwallet"));
        assert_eq!(trade.title.as_deref(), Some("Will X happen?"));
        assert_eq!(trade.source, TradeSource::Poll);
        assert_eq!(trade.timestamp.timestamp(), 1_706_745_600);
    }

    #[test]
    fn test_recent_trade_optional_fields_absent() {
        let json = r#"{
            "transactionHash": "0xhash",
            "conditionId": "0xcond",
            "side": "BUY",
            "size": 10.0,
            "price": 0.5,
            "timestamp": 1706745600
        }"#;

        let raw: RecentTrade = serde_json::from_str(json).unwrap();
        assert!(raw.title.is_none());
        assert!(raw.proxy_wallet.is_none());

        let trade = raw.to_trade_event("Resolved title".to_string()).unwrap();
        assert!(trade.wallet.is_none());
        assert_eq!(trade.title.as_deref(), Some("Resolved title"));
    }

    #[test]
    fn test_recent_trade_rejects_negative_values() {
        let json = r#"{
            "transactionHash": "0xhash",
            "conditionId": "0xcond",
            "side": "BUY",
            "size": -10.0,
            "price": 0.5,
            "timestamp": 1706745600
        }"#;

        let raw: RecentTrade = serde_json::from_str(json).unwrap();
        assert!(raw.to_trade_event("t".to_string()).is_none());
    }

    #[test]
    fn test_gamma_market_to_summary() {
        let json = r#"{
            "conditionId": "0xcond",
            "question": "Will X happen?",
            "volume24hr": 123456.78,
            "clobTokenIds": "[\"token-yes\", \"token-no\"]",
            "active": true,
            "closed": false
        }"#;

        let raw: RawGammaMarket = serde_json::from_str(json).unwrap();
        let summary = raw.to_summary().unwrap();

        assert_eq!(summary.condition_id, "0xcond");
        assert_eq!(summary.title, "Will X happen?");
        assert_eq!(summary.volume_24h, 123456.78);
        assert_eq!(summary.token_ids, vec!["token-yes", "token-no"]);
    }

    #[test]
    fn test_gamma_market_missing_fields() {
        let raw: RawGammaMarket = serde_json::from_str(r#"{"question": "No id"}"#).unwrap();
        assert!(raw.to_summary().is_none());

        let raw: RawGammaMarket =
            serde_json::from_str(r#"{"conditionId": "0xcond", "question": "Q"}"#).unwrap();
        let summary = raw.to_summary().unwrap();
        assert!(summary.token_ids.is_empty());
        assert_eq!(summary.volume_24h, 0.0);
    }

    #[test]
    fn test_subscription_message_serialization() {
        let ids = vec!["token-1".to_string(), "token-2".to_string()];
        let msg = SubscriptionMessage {
            subscribe_ids: &ids,
            kind: "market",
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""subscribe_ids":["token-1","token-2"]"#));
        assert!(json.contains(r#""kind":"market""#));
    }
}
