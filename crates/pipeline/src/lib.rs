//! Pipeline orchestration.
//!
//! Wires the two trade producers into the single consumer that owns the
//! dedup gate, the statistics engine, and the classifier:
//!
//! ```text
//! TradeFeed ─┐
//!            ├─ mpsc ─► TradePipeline ─► TradeStore / AlertBroadcaster
//! TradePoller┘
//! ```
//!
//! Duplicates terminate at the dedup stage with no side effects. New trades
//! always update the statistics (they are the baseline); only anomalous ones
//! are emitted to the sinks, fire-and-forget.

pub mod orchestrator;
pub mod runner;
pub mod sinks;

pub use orchestrator::{PipelineStats, TradePipeline};
pub use runner::{start, PipelineHandle};
pub use sinks::{BroadcastSink, LogStore, WhaleAlert};
