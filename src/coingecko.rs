//! CoinGecko markets endpoint fetcher

use crate::{
    constants::{
        COINGECKO_API_URL, COINGECKO_MARKETS_ENDPOINT, DEFAULT_RETRY_AFTER_SECS,
        PRICE_CHANGE_HORIZONS, REQUEST_TIMEOUT_SECS, USER_AGENT,
    },
    error::FetchError,
    fetcher::MarketFetcher,
    types::CoinMarket,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Fetcher for the CoinGecko `coins/markets` endpoint
pub struct CoinGeckoFetcher {
    client: Client,
    base_url: String,
}

impl CoinGeckoFetcher {
    /// Creates a new CoinGecko fetcher
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(COINGECKO_API_URL)
    }

    /// Creates a fetcher against a non-default base URL (proxies,
    /// self-hosted mirrors)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Builds the markets URL for a set of asset ids
    fn build_url(&self, asset_ids: &[String], vs_currency: &str) -> String {
        let ids = asset_ids.join(",");

        format!(
            "{}{}?ids={}&vs_currency={}&price_change_percentage={}",
            self.base_url, COINGECKO_MARKETS_ENDPOINT, ids, vs_currency, PRICE_CHANGE_HORIZONS
        )
    }
}

/// Decodes a `Retry-After` header value as whole seconds, falling back
/// to the default when the header is absent or not a number.
fn parse_retry_after(header: Option<&str>) -> Duration {
    let secs = header
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}

impl Default for CoinGeckoFetcher {
    fn default() -> Self {
        Self::new().expect("Failed to create CoinGecko fetcher")
    }
}

#[async_trait]
impl MarketFetcher for CoinGeckoFetcher {
    async fn fetch_markets(
        &self,
        asset_ids: &[String],
        vs_currency: &str,
    ) -> Result<Vec<CoinMarket>, FetchError> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.build_url(asset_ids, vs_currency);
        tracing::debug!(url = %url, "Fetching markets from CoinGecko");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::Network)?;

        // Upstream throttling carries its own wait hint; the poller
        // decides when to retry.
        if response.status().as_u16() == 429 {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok()),
            );
            return Err(FetchError::Throttled { retry_after });
        }

        if !response.status().is_success() {
            return Err(FetchError::Api {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let response_text = response.text().await.map_err(FetchError::Network)?;

        let markets: Vec<CoinMarket> = serde_json::from_str(&response_text).map_err(|e| {
            FetchError::invalid_response(format!(
                "Failed to parse CoinGecko response: {}. Response: {}",
                e, response_text
            ))
        })?;

        tracing::debug!(
            count = markets.len(),
            "Successfully fetched markets from CoinGecko"
        );

        Ok(markets)
    }

    fn fetcher_name(&self) -> &'static str {
        "coingecko"
    }
}
