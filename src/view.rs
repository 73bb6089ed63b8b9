//! Read-only per-asset views over a poller's cache

use crate::{store::MarketStore, types::AssetAttributes};
use chrono::Utc;
use std::sync::Arc;

/// Read-only projection of one asset inside a poller's cached result set
///
/// Views never trigger fetches; any number of them can read the same
/// poller's cache. Each read takes one snapshot of the asset's record,
/// so every derived field within a single call comes from the same
/// cycle.
pub struct AssetView {
    store: Arc<MarketStore>,
    asset_id: String,
    multiplier: f64,
    vs_currency: String,
    unit: String,
}

impl AssetView {
    pub(crate) fn new(
        store: Arc<MarketStore>,
        asset_id: String,
        multiplier: f64,
        vs_currency: String,
        unit: String,
    ) -> Self {
        Self {
            store,
            asset_id,
            multiplier,
            vs_currency,
            unit,
        }
    }

    /// Upstream asset id this view projects
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Display multiplier applied by [`value`](AssetView::value)
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Display unit label from the poller configuration
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Current derived value: cached price times the multiplier.
    ///
    /// `None` while the asset is absent from the cache (no cycle has
    /// succeeded yet, or the upstream did not return this id).
    pub fn value(&self) -> Option<f64> {
        self.store
            .get(&self.asset_id)
            .map(|market| market.current_price * self.multiplier)
    }

    /// Full attribute snapshot for this asset.
    ///
    /// Derived from one cached record read under a single lock hold;
    /// when the asset is absent every data field is `None` but the
    /// evaluation timestamp is still set.
    pub fn attributes(&self) -> AssetAttributes {
        let last_update = Utc::now();

        match self.store.get(&self.asset_id) {
            Some(market) => AssetAttributes {
                last_update,
                asset_id: Some(market.id),
                name: Some(market.name),
                symbol: Some(market.symbol),
                currency: Some(self.vs_currency.clone()),
                base_price: Some(market.current_price),
                multiplier: Some(self.multiplier),
                volume_24h: market.total_volume,
                change_1h: market.price_change_percentage_1h_in_currency,
                change_24h: market.price_change_percentage_24h_in_currency,
                change_7d: market.price_change_percentage_7d_in_currency,
                change_14d: market.price_change_percentage_14d_in_currency,
                change_30d: market.price_change_percentage_30d_in_currency,
                change_1y: market.price_change_percentage_1y_in_currency,
                market_cap: market.market_cap,
                circulating_supply: market.circulating_supply,
                total_supply: market.total_supply,
                ath: market.ath,
                ath_date: market.ath_date,
                ath_change: market.ath_change_percentage,
                rank: market.market_cap_rank,
                image: Some(market.image),
            },
            None => AssetAttributes {
                last_update,
                asset_id: None,
                name: None,
                symbol: None,
                currency: None,
                base_price: None,
                multiplier: None,
                volume_24h: None,
                change_1h: None,
                change_24h: None,
                change_7d: None,
                change_14d: None,
                change_30d: None,
                change_1y: None,
                market_cap: None,
                circulating_supply: None,
                total_supply: None,
                ath: None,
                ath_date: None,
                ath_change: None,
                rank: None,
                image: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::mock::coin;
    use crate::types::CoinMarket;

    fn view_over(store: Arc<MarketStore>, multiplier: f64) -> AssetView {
        AssetView::new(
            store,
            "bitcoin".to_string(),
            multiplier,
            "usd".to_string(),
            "$".to_string(),
        )
    }

    #[test]
    fn value_applies_the_multiplier() {
        let store = Arc::new(MarketStore::new());
        store.replace(vec![coin("bitcoin", 100.0)]);

        assert_eq!(view_over(store.clone(), 1.0).value(), Some(100.0));
        assert_eq!(view_over(store, 0.25).value(), Some(25.0));
    }

    #[test]
    fn missing_asset_yields_placeholder_attributes() {
        let store = Arc::new(MarketStore::new());
        let view = view_over(store, 1.0);

        assert_eq!(view.value(), None);

        let attrs = view.attributes();
        assert_eq!(attrs.asset_id, None);
        assert_eq!(attrs.base_price, None);
        assert_eq!(attrs.currency, None);
        assert_eq!(attrs.rank, None);
    }

    #[test]
    fn attributes_mirror_the_cached_record() {
        let store = Arc::new(MarketStore::new());
        store.replace(vec![coin("bitcoin", 100.0)]);
        let view = view_over(store, 2.0);

        let attrs = view.attributes();
        assert_eq!(attrs.asset_id.as_deref(), Some("bitcoin"));
        assert_eq!(attrs.base_price, Some(100.0));
        assert_eq!(attrs.multiplier, Some(2.0));
        assert_eq!(attrs.currency.as_deref(), Some("usd"));
        assert_eq!(attrs.volume_24h, Some(1_000.0));
        assert_eq!(attrs.change_1y, Some(5.0));
        assert_eq!(attrs.ath, Some(200.0));
        assert_eq!(attrs.rank, Some(1));
    }

    /// Builds one internally consistent record for a generation: every
    /// numeric field is a fixed function of `generation`.
    fn generation_record(generation: u64) -> CoinMarket {
        let g = generation as f64;
        CoinMarket {
            total_volume: Some(g * 10.0),
            market_cap: Some(g * 100.0),
            circulating_supply: Some(g * 3.0),
            ..coin("bitcoin", g)
        }
    }

    #[test]
    fn attributes_never_tear_across_concurrent_replacements() {
        let store = Arc::new(MarketStore::new());
        store.replace(vec![generation_record(1)]);

        let writer_store = store.clone();
        let writer = std::thread::spawn(move || {
            for generation in 2..500u64 {
                writer_store.replace(vec![generation_record(generation)]);
            }
        });

        let view = view_over(store, 1.0);
        for _ in 0..500 {
            let attrs = view.attributes();
            let price = attrs.base_price.unwrap();
            // All fields must come from the same generation as the price.
            assert_eq!(attrs.volume_24h, Some(price * 10.0));
            assert_eq!(attrs.market_cap, Some(price * 100.0));
            assert_eq!(attrs.circulating_supply, Some(price * 3.0));
            assert_eq!(view.value().unwrap() % 1.0, 0.0);
        }

        writer.join().unwrap();
    }
}
