//! Fetcher abstraction for retrieving market records from an upstream API

use crate::{error::FetchError, types::CoinMarket};
use async_trait::async_trait;

/// Trait for market data fetchers
///
/// The poller owns the scheduling and rate limiting; implementations
/// only turn one request into decoded records or a [`FetchError`].
#[async_trait]
pub trait MarketFetcher: Send + Sync {
    /// Fetches the current market records for a set of asset ids in one
    /// request.
    ///
    /// # Arguments
    /// * `asset_ids` - Upstream asset ids to include
    /// * `vs_currency` - Fiat currency code to quote prices in
    ///
    /// # Returns
    /// One record per asset the upstream knows about, or an error if
    /// the request fails as a whole.
    async fn fetch_markets(
        &self,
        asset_ids: &[String],
        vs_currency: &str,
    ) -> Result<Vec<CoinMarket>, FetchError>;

    /// Returns the name of this fetcher
    fn fetcher_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted fetcher for testing
    ///
    /// Responses are queued ahead of time and consumed one per call.
    pub struct MockFetcher {
        script: Arc<Mutex<VecDeque<Result<Vec<CoinMarket>, FetchError>>>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl Default for MockFetcher {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self {
                script: Arc::new(Mutex::new(VecDeque::new())),
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn push_success(&self, markets: Vec<CoinMarket>) {
            self.script.lock().unwrap().push_back(Ok(markets));
        }

        pub fn push_error(&self, error: FetchError) {
            self.script.lock().unwrap().push_back(Err(error));
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl MarketFetcher for MockFetcher {
        async fn fetch_markets(
            &self,
            _asset_ids: &[String],
            _vs_currency: &str,
        ) -> Result<Vec<CoinMarket>, FetchError> {
            *self.call_count.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::invalid_response("no scripted response")))
        }

        fn fetcher_name(&self) -> &'static str {
            "mock"
        }
    }

    /// Builds a minimal market record for tests
    pub fn coin(id: &str, price: f64) -> CoinMarket {
        CoinMarket {
            id: id.to_string(),
            name: id.to_uppercase(),
            symbol: id.chars().take(3).collect(),
            current_price: price,
            total_volume: Some(1_000.0),
            price_change_percentage_1h_in_currency: Some(0.1),
            price_change_percentage_24h_in_currency: Some(1.0),
            price_change_percentage_7d_in_currency: Some(2.0),
            price_change_percentage_14d_in_currency: Some(3.0),
            price_change_percentage_30d_in_currency: Some(4.0),
            price_change_percentage_1y_in_currency: Some(5.0),
            market_cap: Some(1_000_000.0),
            circulating_supply: Some(100.0),
            total_supply: Some(200.0),
            image: format!("https://img.example/{id}.png"),
            ath: Some(price * 2.0),
            ath_date: None,
            ath_change_percentage: Some(-50.0),
            market_cap_rank: Some(1),
        }
    }
}
