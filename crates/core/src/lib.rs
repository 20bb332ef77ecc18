pub mod config;
pub mod config_loader;
pub mod events;
pub mod traits;

pub use config::{AppConfig, DetectionConfig, FeedConfig, PollConfig};
pub use config_loader::ConfigLoader;
pub use events::{AnomalyResult, Severity, TradeEvent, TradeSide, TradeSource};
pub use traits::{AlertBroadcaster, TradeStore};
