use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub poll: PollConfig,
    pub detection: DetectionConfig,
}

/// Streaming (push) feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub ws_url: String,
    /// Fixed delay between reconnect attempts. No backoff growth and no retry
    /// cap: the upstream is assumed highly available.
    pub reconnect_delay_secs: u64,
    /// Keep-alive ping cadence while the link is open.
    pub ping_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub channel_buffer_size: usize,
}

/// Polling feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub api_url: String,
    pub gamma_url: String,
    pub poll_interval_secs: u64,
    /// How often the top-volume market list is refreshed.
    pub market_refresh_interval_secs: u64,
    /// How many top-volume markets get their own supplementary fetch.
    pub top_markets: usize,
    /// Page size for each recent-trades request.
    pub page_limit: usize,
    pub request_timeout_secs: u64,
}

/// Dedup and rolling-statistics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub global_window: usize,
    pub market_window: usize,
    /// Below this many observations a window's z-score is 0.
    pub min_observations: usize,
    pub dedup_max_entries: usize,
    pub dedup_trim_to: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            poll: PollConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string(),
            reconnect_delay_secs: 5,
            ping_interval_secs: 30,
            connect_timeout_secs: 10,
            channel_buffer_size: 1024,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            api_url: "https://data-api.polymarket.com".to_string(),
            gamma_url: "https://gamma-api.polymarket.com".to_string(),
            poll_interval_secs: 5,
            market_refresh_interval_secs: 300,
            top_markets: 10,
            page_limit: 100,
            request_timeout_secs: 10,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            global_window: 5_000,
            market_window: 500,
            min_observations: 10,
            dedup_max_entries: 10_000,
            dedup_trim_to: 5_000,
        }
    }
}

impl FeedConfig {
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl PollConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn market_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.market_refresh_interval_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
