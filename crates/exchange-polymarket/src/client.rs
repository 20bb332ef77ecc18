//! Data-API REST client with rate limiting.
//!
//! Provides typed access to the recent-trades endpoint with automatic
//! rate limiting using the governor crate. Every request carries a timeout
//! so a stalled upstream cannot stall a poll cycle.

use crate::models::RecentTrade;
use anyhow::{anyhow, Result};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Default data-API base URL.
pub const DATA_API_URL: &str = "https://data-api.polymarket.com";

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Data-API REST client.
pub struct DataApiClient {
    /// HTTP client
    http: Client,
    /// Base URL for API
    base_url: String,
    /// Per-request timeout
    request_timeout: Duration,
    /// Rate limiter (requests per minute)
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl DataApiClient {
    /// Creates a new client with default settings.
    ///
    /// Rate limited to 300 requests per minute by default: one global page
    /// plus the per-market pages every poll cycle stays well inside that.
    pub fn new() -> Self {
        Self::with_rate_limit(nonzero!(300u32))
    }

    /// Creates a new client with custom rate limit.
    pub fn with_rate_limit(requests_per_minute: NonZeroU32) -> Self {
        let quota = Quota::per_minute(requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Self {
            http: Client::new(),
            base_url: DATA_API_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            rate_limiter,
        }
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets a custom per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Waits for rate limit and makes a GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("data-API error {}: {}", status, text));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }

    /// Fetches the most recent trades, optionally scoped to one market.
    ///
    /// # Arguments
    /// * `market_id` - Optional condition id filter
    /// * `limit` - Maximum number of records to return
    pub async fn recent_trades(
        &self,
        market_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RecentTrade>> {
        let mut path = format!("/trades?limit={limit}");
        if let Some(id) = market_id {
            path.push_str(&format!("&market={}", urlencoding::encode(id)));
        }

        self.get(&path).await
    }
}

impl Default for DataApiClient {
    fn default() -> Self {
        Self::new()
    }
}
