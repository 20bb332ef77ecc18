//! Trade dedup and anomaly detection.
//!
//! This crate holds the stateful middle of the pipeline:
//!
//! - [`TradeDeduplicator`]: bounded identity cache that collapses
//!   re-observations of the same transaction from either feed
//! - [`RollingStats`]: global and per-market sliding windows of trade
//!   notionals with z-score and percentile queries
//! - [`WhaleClassifier`]: combines the window statistics into an
//!   [`whale_watch_core::AnomalyResult`]

pub mod classifier;
pub mod dedup;
pub mod stats;

pub use classifier::WhaleClassifier;
pub use dedup::TradeDeduplicator;
pub use stats::{RollingStats, WindowKey};
