//! Per-poller sticky cache of decoded market records

use crate::types::CoinMarket;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory store for one poller's last good result set
///
/// The owning poller's task is the only writer; views read concurrently.
/// A failed cycle never touches the store, so the last successful
/// result keeps being served until the next success replaces it
/// wholesale. `None` means no cycle has ever succeeded.
pub struct MarketStore {
    markets: RwLock<Option<HashMap<String, CoinMarket>>>,
}

impl MarketStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            markets: RwLock::new(None),
        }
    }

    /// Replaces the cache with a cycle's complete result set, keyed by
    /// asset id.
    pub fn replace(&self, markets: Vec<CoinMarket>) {
        let map: HashMap<String, CoinMarket> = markets
            .into_iter()
            .map(|market| (market.id.clone(), market))
            .collect();

        tracing::debug!(assets = map.len(), "Replacing cached market data");
        *self.markets.write().unwrap() = Some(map);
    }

    /// Returns a snapshot of one asset's record.
    ///
    /// The record is cloned under a single read-lock hold, so every
    /// field of the returned value comes from the same cycle.
    pub fn get(&self, asset_id: &str) -> Option<CoinMarket> {
        self.markets
            .read()
            .unwrap()
            .as_ref()
            .and_then(|map| map.get(asset_id).cloned())
    }

    /// Returns a snapshot of the whole cached result set
    pub fn snapshot(&self) -> Option<HashMap<String, CoinMarket>> {
        self.markets.read().unwrap().clone()
    }

    /// True once any cycle has succeeded
    pub fn has_data(&self) -> bool {
        self.markets.read().unwrap().is_some()
    }
}

impl Default for MarketStore {
    fn default() -> Self {
        Self::new()
    }
}
