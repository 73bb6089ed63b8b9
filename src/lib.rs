//! # Crypto Market Polling SDK
//!
//! Polls the CoinGecko markets endpoint for configurable groups of
//! assets and exposes per-asset values and metadata to a host
//! application, while keeping the whole process under the upstream's
//! shared request-rate ceiling.
//!
//! ## Important: one limiter per process
//!
//! The upstream ceiling applies to **all** pollers together. Construct
//! a single [`RateLimiter`], wrap it in an `Arc`, and pass it to every
//! poller you create; pollers registered with different limiters will
//! not coordinate.
//!
//! ## Usage
//!
//! ```no_run
//! use crypto_market_sdk::{spawn_poller, CoinGeckoFetcher, PollerConfig, RateLimiter};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(RateLimiter::new());
//! let fetcher = Arc::new(CoinGeckoFetcher::new()?);
//!
//! // One poller per config entry; each gets its own cache and views.
//! let config = PollerConfig::from_entry(
//!     "main",          // poller name
//!     "bitcoin,ethereum", // asset ids
//!     "usd",           // fiat currency
//!     "$",             // display unit
//!     "1,1",           // per-asset multipliers
//!     "5",             // polling interval in minutes
//! )?;
//!
//! let (poller, views) = spawn_poller(config, fetcher, limiter.clone()).await?;
//!
//! for view in &views {
//!     match view.value() {
//!         Some(value) => println!("{}: {:.2} {}", view.asset_id(), value, view.unit()),
//!         None => println!("{}: no data yet", view.asset_id()),
//!     }
//! }
//!
//! // Tear down: stops the loop and frees the limiter registration.
//! poller.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! spawn_poller(config, fetcher, limiter)
//!     ↓
//! MarketPoller background task
//!     (stagger once, then: acquire limiter slot → fetch → decode)
//!     ↓
//! MarketStore (sticky per-poller cache)
//!     ↓
//! AssetView (value, attributes), read-only, no fetches
//! ```
//!
//! The limiter tracks a sliding 60-second window of outbound requests
//! across all pollers and suspends `acquire()` callers until a request
//! fits under the ceiling. Registration order also assigns each poller
//! a one-time startup stagger slot so first fetches spread out instead
//! of bursting.
//!
//! ## Failure behavior
//!
//! A 429 from the upstream is retried exactly once after the
//! server-specified `Retry-After` delay. Any other failed cycle leaves
//! the previous cache in place, so views keep serving the last good
//! data; a view whose asset was never fetched reports `None` rather
//! than an error.

pub mod coingecko;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod limiter;
pub mod metrics;
pub mod poller;
pub mod store;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use coingecko::CoinGeckoFetcher;
pub use error::{FetchError, SetupError};
pub use fetcher::MarketFetcher;
pub use limiter::{JobId, RateLimiter};
pub use metrics::PollerMetrics;
pub use poller::{spawn_poller, MarketPoller};
pub use types::{AssetAttributes, CoinMarket, MarketEvent, PollerConfig};
pub use view::AssetView;
