//! Polymarket integration for the whale-watch pipeline.
//!
//! This crate provides the two redundant trade producers plus the market
//! metadata they need:
//!
//! - [`TradeFeed`]: streaming WebSocket connection to the CLOB market
//!   channel, reconnecting forever on a fixed delay
//! - [`TradePoller`]: interval polling of the data-API recent-trades
//!   endpoint, globally and per top-volume market
//! - [`DataApiClient`] / [`GammaClient`]: rate-limited REST clients
//!
//! Both producers normalize raw records into
//! [`whale_watch_core::TradeEvent`] and emit them over an mpsc channel;
//! neither blocks its caller.

pub mod client;
pub mod gamma;
pub mod models;
pub mod poller;
pub mod websocket;

pub use client::DataApiClient;
pub use gamma::GammaClient;
pub use models::{MarketSummary, RecentTrade, StreamTradeMessage};
pub use poller::{PollerEvent, TradePoller, TradePollerStats};
pub use websocket::{FeedError, FeedEvent, TradeFeed};
