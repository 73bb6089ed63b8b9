//! Types for the market polling SDK

use crate::error::SetupError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One asset's market record as returned by the upstream markets endpoint
/// for a single polling cycle.
///
/// Numeric fields the API reports as `null` (supply figures for some
/// assets, percentage changes for young listings) are `Option`s. The
/// all-time-high fields and the rank are not guaranteed to be present at
/// all, so they default to `None` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinMarket {
    /// Upstream asset id (e.g. "bitcoin")
    pub id: String,
    /// Human-readable asset name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Current price in the requested fiat currency
    pub current_price: f64,
    /// 24h trading volume
    pub total_volume: Option<f64>,
    /// Percentage change over the last hour
    pub price_change_percentage_1h_in_currency: Option<f64>,
    /// Percentage change over the last 24 hours
    pub price_change_percentage_24h_in_currency: Option<f64>,
    /// Percentage change over the last 7 days
    pub price_change_percentage_7d_in_currency: Option<f64>,
    /// Percentage change over the last 14 days
    pub price_change_percentage_14d_in_currency: Option<f64>,
    /// Percentage change over the last 30 days
    pub price_change_percentage_30d_in_currency: Option<f64>,
    /// Percentage change over the last year
    pub price_change_percentage_1y_in_currency: Option<f64>,
    /// Market capitalization
    pub market_cap: Option<f64>,
    /// Circulating supply
    pub circulating_supply: Option<f64>,
    /// Total supply
    pub total_supply: Option<f64>,
    /// Asset image URL
    pub image: String,
    /// All-time-high price
    #[serde(default)]
    pub ath: Option<f64>,
    /// When the all-time high was reached
    #[serde(default)]
    pub ath_date: Option<DateTime<Utc>>,
    /// Percentage distance from the all-time high
    #[serde(default)]
    pub ath_change_percentage: Option<f64>,
    /// Market cap rank
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
}

/// Configuration for one poller
///
/// Hosts usually build this from their config entry form via
/// [`PollerConfig::from_entry`]; the fields are public so it can also be
/// constructed directly.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Human-readable poller name, used in logs and events
    pub name: String,
    /// Upstream asset ids to fetch each cycle
    pub asset_ids: Vec<String>,
    /// Fiat currency code for prices (e.g. "usd")
    pub vs_currency: String,
    /// Display unit label passed through to views
    pub unit: String,
    /// Per-asset display multipliers, same order as `asset_ids`
    pub multipliers: Vec<f64>,
    /// Time between polling cycles
    pub interval: Duration,
}

impl PollerConfig {
    /// Parses the comma-separated host config form.
    ///
    /// Asset ids are lowercased and trimmed, multipliers parsed as
    /// floats, the interval given in (possibly fractional) minutes.
    /// The multiplier list must be exactly as long as the asset-id
    /// list; any violation fails setup before anything is created.
    pub fn from_entry(
        name: &str,
        asset_ids: &str,
        vs_currency: &str,
        unit: &str,
        multipliers: &str,
        interval_minutes: &str,
    ) -> Result<Self, SetupError> {
        let asset_ids: Vec<String> = asset_ids
            .to_lowercase()
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        if asset_ids.is_empty() {
            return Err(SetupError::EmptyAssetList);
        }

        let multipliers = multipliers
            .split(',')
            .map(|m| {
                let m = m.trim();
                m.parse::<f64>()
                    .map_err(|_| SetupError::InvalidMultiplier(m.to_string()))
            })
            .collect::<Result<Vec<f64>, SetupError>>()?;

        if multipliers.len() != asset_ids.len() {
            return Err(SetupError::LengthMismatch {
                assets: asset_ids.len(),
                multipliers: multipliers.len(),
            });
        }

        let minutes = interval_minutes
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|m| *m > 0.0)
            .ok_or_else(|| SetupError::InvalidInterval(interval_minutes.to_string()))?;

        Ok(Self {
            name: name.trim().to_string(),
            asset_ids,
            vs_currency: vs_currency.trim().to_string(),
            unit: unit.trim().to_string(),
            multipliers,
            interval: Duration::from_secs_f64(minutes * 60.0),
        })
    }

    /// Re-checks the invariants `from_entry` enforces, for configs
    /// built directly. Setup runs this before anything is created.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.asset_ids.is_empty() {
            return Err(SetupError::EmptyAssetList);
        }
        if self.multipliers.len() != self.asset_ids.len() {
            return Err(SetupError::LengthMismatch {
                assets: self.asset_ids.len(),
                multipliers: self.multipliers.len(),
            });
        }
        Ok(())
    }
}

/// Per-asset attribute snapshot derived from one cached market record
///
/// All data fields are `None` when the asset is absent from the poller's
/// cache; the evaluation timestamp is always set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetAttributes {
    /// When this snapshot was evaluated
    pub last_update: DateTime<Utc>,
    /// Upstream asset id
    pub asset_id: Option<String>,
    /// Asset name
    pub name: Option<String>,
    /// Ticker symbol
    pub symbol: Option<String>,
    /// Fiat currency the price is quoted in
    pub currency: Option<String>,
    /// Undecorated upstream price
    pub base_price: Option<f64>,
    /// Display multiplier applied by `value()`
    pub multiplier: Option<f64>,
    /// 24h trading volume
    pub volume_24h: Option<f64>,
    /// 1h percentage change
    pub change_1h: Option<f64>,
    /// 24h percentage change
    pub change_24h: Option<f64>,
    /// 7d percentage change
    pub change_7d: Option<f64>,
    /// 14d percentage change
    pub change_14d: Option<f64>,
    /// 30d percentage change
    pub change_30d: Option<f64>,
    /// 1y percentage change
    pub change_1y: Option<f64>,
    /// Market capitalization
    pub market_cap: Option<f64>,
    /// Circulating supply
    pub circulating_supply: Option<f64>,
    /// Total supply
    pub total_supply: Option<f64>,
    /// All-time-high price
    pub ath: Option<f64>,
    /// When the all-time high was reached
    pub ath_date: Option<DateTime<Utc>>,
    /// Percentage distance from the all-time high
    pub ath_change: Option<f64>,
    /// Market cap rank
    pub rank: Option<u32>,
    /// Asset image URL
    pub image: Option<String>,
}

/// Poller lifecycle events for host observation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketEvent {
    /// A cycle succeeded and the cache was replaced
    CacheUpdated {
        id: Uuid,
        poller: String,
        assets: usize,
        timestamp: DateTime<Utc>,
    },

    /// A cycle failed; the previous cache is still being served
    FetchFailed {
        id: Uuid,
        poller: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The upstream throttled a cycle; a single retry follows the wait
    Throttled {
        id: Uuid,
        poller: String,
        retry_after_secs: u64,
        timestamp: DateTime<Utc>,
    },
}

impl MarketEvent {
    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            MarketEvent::CacheUpdated { id, .. } => *id,
            MarketEvent::FetchFailed { id, .. } => *id,
            MarketEvent::Throttled { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            MarketEvent::CacheUpdated { .. } => "CACHE_UPDATED",
            MarketEvent::FetchFailed { .. } => "FETCH_FAILED",
            MarketEvent::Throttled { .. } => "THROTTLED",
        }
    }

    /// Name of the poller that emitted the event
    pub fn poller(&self) -> &str {
        match self {
            MarketEvent::CacheUpdated { poller, .. } => poller,
            MarketEvent::FetchFailed { poller, .. } => poller,
            MarketEvent::Throttled { poller, .. } => poller,
        }
    }
}

impl std::fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketEvent::CacheUpdated { poller, assets, .. } => {
                write!(f, "Cache updated for {}: {} assets", poller, assets)
            }
            MarketEvent::FetchFailed {
                poller,
                error_message,
                ..
            } => {
                write!(f, "Fetch failed for {}: {}", poller, error_message)
            }
            MarketEvent::Throttled {
                poller,
                retry_after_secs,
                ..
            } => {
                write!(
                    f,
                    "Upstream throttled {}, retrying in {}s",
                    poller, retry_after_secs
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_entry_parses_lists_and_interval() {
        let config = PollerConfig::from_entry(
            "main",
            "Bitcoin, ethereum",
            "usd",
            "$",
            "1, 0.5",
            "2",
        )
        .unwrap();

        assert_eq!(config.asset_ids, vec!["bitcoin", "ethereum"]);
        assert_eq!(config.multipliers, vec![1.0, 0.5]);
        assert_eq!(config.interval, Duration::from_secs(120));
    }

    #[test]
    fn from_entry_rejects_length_mismatch() {
        let err = PollerConfig::from_entry("m", "a,b,c", "usd", "$", "1,2", "1").unwrap_err();
        assert!(matches!(
            err,
            SetupError::LengthMismatch {
                assets: 3,
                multipliers: 2
            }
        ));
    }

    #[test]
    fn from_entry_rejects_bad_multiplier_and_interval() {
        assert!(matches!(
            PollerConfig::from_entry("m", "a", "usd", "$", "one", "1").unwrap_err(),
            SetupError::InvalidMultiplier(_)
        ));
        assert!(matches!(
            PollerConfig::from_entry("m", "a", "usd", "$", "1", "0").unwrap_err(),
            SetupError::InvalidInterval(_)
        ));
        assert!(matches!(
            PollerConfig::from_entry("m", " , ", "usd", "$", "1", "1").unwrap_err(),
            SetupError::EmptyAssetList
        ));
    }

    #[test]
    fn coin_market_decodes_without_ath_fields() {
        let json = r#"{
            "id": "bitcoin",
            "name": "Bitcoin",
            "symbol": "btc",
            "current_price": 50000.0,
            "total_volume": 1000.0,
            "price_change_percentage_1h_in_currency": 0.1,
            "price_change_percentage_24h_in_currency": null,
            "price_change_percentage_7d_in_currency": 1.2,
            "price_change_percentage_14d_in_currency": 2.3,
            "price_change_percentage_30d_in_currency": 3.4,
            "price_change_percentage_1y_in_currency": 4.5,
            "market_cap": 900000.0,
            "circulating_supply": 19000000.0,
            "total_supply": null,
            "image": "https://img.example/btc.png"
        }"#;

        let market: CoinMarket = serde_json::from_str(json).unwrap();
        assert_eq!(market.id, "bitcoin");
        assert_eq!(market.current_price, 50000.0);
        assert_eq!(market.price_change_percentage_24h_in_currency, None);
        assert_eq!(market.total_supply, None);
        assert_eq!(market.ath, None);
        assert_eq!(market.market_cap_rank, None);
    }

    #[test]
    fn coin_market_decodes_ath_date() {
        let json = r#"{
            "id": "bitcoin",
            "name": "Bitcoin",
            "symbol": "btc",
            "current_price": 50000.0,
            "total_volume": 1000.0,
            "price_change_percentage_1h_in_currency": null,
            "price_change_percentage_24h_in_currency": null,
            "price_change_percentage_7d_in_currency": null,
            "price_change_percentage_14d_in_currency": null,
            "price_change_percentage_30d_in_currency": null,
            "price_change_percentage_1y_in_currency": null,
            "market_cap": null,
            "circulating_supply": null,
            "total_supply": null,
            "image": "https://img.example/btc.png",
            "ath": 69045.0,
            "ath_date": "2021-11-10T14:24:11.849Z",
            "ath_change_percentage": -27.5,
            "market_cap_rank": 1
        }"#;

        let market: CoinMarket = serde_json::from_str(json).unwrap();
        assert_eq!(market.ath, Some(69045.0));
        assert_eq!(market.market_cap_rank, Some(1));
        let ath_date = market.ath_date.unwrap();
        assert_eq!(ath_date.timestamp(), 1636554251);
    }
}
