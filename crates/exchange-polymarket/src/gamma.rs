//! Gamma API client for market metadata.
//!
//! Two jobs: discovering the current top-volume markets (which seeds both
//! the stream subscription set and the poller's per-market fetch list) and
//! resolving market titles. Titles are cached per condition id — one lookup
//! per market, not per trade — and discovery primes the cache for free.

use crate::models::{MarketSummary, RawGammaMarket};
use anyhow::{anyhow, Result};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Default Gamma API base URL.
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Gamma API client with a market-title cache.
pub struct GammaClient {
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
    /// condition id -> market title
    titles: RwLock<HashMap<String, String>>,
}

impl GammaClient {
    /// Creates a new client with default settings.
    ///
    /// Rate limited to 60 requests per minute by default.
    pub fn new() -> Self {
        Self::with_rate_limit(nonzero!(60u32))
    }

    /// Creates a new client with custom rate limit.
    pub fn with_rate_limit(requests_per_minute: NonZeroU32) -> Self {
        let quota = Quota::per_minute(requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Self {
            http: Client::new(),
            base_url: GAMMA_API_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            rate_limiter,
            titles: RwLock::new(HashMap::new()),
        }
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
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
            return Err(anyhow!("Gamma API error {}: {}", status, text));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }

    /// Fetches the current top markets by 24h volume, most active first.
    ///
    /// Rows without an id or title are skipped. Every returned market also
    /// lands in the title cache.
    pub async fn top_volume_markets(&self, limit: usize) -> Result<Vec<MarketSummary>> {
        let path = format!(
            "/markets?order=volume24hr&ascending=false&active=true&closed=false&limit={limit}"
        );
        let rows: Vec<RawGammaMarket> = self.get(&path).await?;

        let markets: Vec<MarketSummary> = rows.iter().filter_map(RawGammaMarket::to_summary).collect();

        {
            let mut titles = self.titles.write();
            for market in &markets {
                titles.insert(market.condition_id.clone(), market.title.clone());
            }
        }

        tracing::debug!(count = markets.len(), "discovered top-volume markets");
        Ok(markets)
    }

    /// Cache-only title lookup; never touches the network.
    #[must_use]
    pub fn cached_title(&self, condition_id: &str) -> Option<String> {
        self.titles.read().get(condition_id).cloned()
    }

    /// Resolves a market title, hitting the API only on a cache miss.
    ///
    /// Returns `Ok(None)` when the market is unknown upstream; the caller
    /// decides whether that makes the event non-actionable.
    pub async fn market_title(&self, condition_id: &str) -> Result<Option<String>> {
        if let Some(title) = self.cached_title(condition_id) {
            return Ok(Some(title));
        }

        let path = format!(
            "/markets?condition_ids={}",
            urlencoding::encode(condition_id)
        );
        let rows: Vec<RawGammaMarket> = self.get(&path).await?;

        let title = rows.into_iter().find_map(|row| match (row.condition_id, row.question) {
            (Some(id), Some(question)) if id == condition_id => Some(question),
            _ => None,
        });

        if let Some(title) = &title {
            self.titles
                .write()
                .insert(condition_id.to_string(), title.clone());
        }

        Ok(title)
    }
}

impl Default for GammaClient {
    fn default() -> Self {
        Self::new()
    }
}
