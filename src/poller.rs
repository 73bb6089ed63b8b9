//! Per-asset-group polling coordinator
//!
//! A [`MarketPoller`] owns one periodic fetch loop: it registers with the
//! shared [`RateLimiter`] at construction, sleeps its stagger slot once,
//! then fetches, decodes and caches one result set per cycle. Views read
//! the cache; the poller's task is the only writer.

use crate::{
    error::{FetchError, SetupError},
    fetcher::MarketFetcher,
    limiter::{JobId, RateLimiter},
    metrics::{MetricsCollector, PollerMetrics},
    store::MarketStore,
    types::{CoinMarket, MarketEvent, PollerConfig},
    view::AssetView,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

/// Capacity of the per-poller event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Periodic rate-limited poller for one configured asset group
///
/// # Example
/// ```no_run
/// use crypto_market_sdk::{spawn_poller, CoinGeckoFetcher, PollerConfig, RateLimiter};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = Arc::new(RateLimiter::new());
/// let config = PollerConfig::from_entry("main", "bitcoin,ethereum", "usd", "$", "1,1", "5")?;
///
/// let (poller, views) = spawn_poller(
///     config,
///     Arc::new(CoinGeckoFetcher::new()?),
///     limiter.clone(),
/// )
/// .await?;
///
/// for view in &views {
///     println!("{}: {:?}", view.asset_id(), view.value());
/// }
/// # poller.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct MarketPoller {
    config: PollerConfig,
    store: Arc<MarketStore>,
    fetcher: Arc<dyn MarketFetcher>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
    events: broadcast::Sender<MarketEvent>,
    job_id: JobId,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MarketPoller {
    /// Creates a poller and registers it with the shared limiter.
    ///
    /// The stagger index assigned here is fixed for the poller's
    /// lifetime. The background loop does not run until [`start`] is
    /// called.
    ///
    /// [`start`]: MarketPoller::start
    pub async fn new(
        config: PollerConfig,
        fetcher: Arc<dyn MarketFetcher>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let job_id = limiter.register().await;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            store: Arc::new(MarketStore::new()),
            metrics: Arc::new(MetricsCollector::new(&config.name)),
            config,
            fetcher,
            limiter,
            events,
            job_id,
            task: Mutex::new(None),
        }
    }

    /// Starts the background polling loop.
    ///
    /// The task sleeps its stagger delay once, then runs one cycle per
    /// interval. Cycle N+1 never starts before cycle N has finished,
    /// including any 429 retry wait.
    pub async fn start(&self) {
        {
            let task = self.task.lock().unwrap();
            if task.is_some() {
                tracing::warn!(poller = %self.config.name, "Poller already started");
                return;
            }
        }

        let stagger = self.limiter.stagger_delay(self.job_id).await;
        let config = self.config.clone();
        let store = self.store.clone();
        let fetcher = self.fetcher.clone();
        let limiter = self.limiter.clone();
        let metrics = self.metrics.clone();
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(
                poller = %config.name,
                interval_secs = config.interval.as_secs_f64(),
                stagger_secs = stagger.as_secs_f64(),
                "Starting market poller"
            );

            if !stagger.is_zero() {
                sleep(stagger).await;
            }

            loop {
                let _ = Self::run_cycle(&config, &fetcher, &limiter, &store, &metrics, &events)
                    .await;
                sleep(config.interval).await;
            }
        });

        *self.task.lock().unwrap() = Some(handle);
    }

    /// Runs one fetch-decode-cache cycle.
    ///
    /// Acquires a limiter slot, issues the fetch, and on a 429 sleeps
    /// the server-specified delay before retrying exactly once. The
    /// retry does not take a second limiter slot. Any final failure
    /// leaves the cache untouched.
    async fn run_cycle(
        config: &PollerConfig,
        fetcher: &Arc<dyn MarketFetcher>,
        limiter: &Arc<RateLimiter>,
        store: &Arc<MarketStore>,
        metrics: &Arc<MetricsCollector>,
        events: &broadcast::Sender<MarketEvent>,
    ) -> Result<usize, FetchError> {
        limiter.acquire().await;

        tracing::debug!(
            poller = %config.name,
            assets = config.asset_ids.len(),
            "Fetching market data"
        );

        let start = Instant::now();
        let mut result = fetcher
            .fetch_markets(&config.asset_ids, &config.vs_currency)
            .await;

        if let Err(FetchError::Throttled { retry_after }) = &result {
            let retry_after = *retry_after;
            tracing::warn!(
                poller = %config.name,
                retry_after_secs = retry_after.as_secs(),
                "Upstream rate limit hit (429), retrying after wait"
            );
            metrics.record_throttle().await;
            let _ = events.send(MarketEvent::Throttled {
                id: Uuid::new_v4(),
                poller: config.name.clone(),
                retry_after_secs: retry_after.as_secs(),
                timestamp: Utc::now(),
            });

            sleep(retry_after).await;
            result = fetcher
                .fetch_markets(&config.asset_ids, &config.vs_currency)
                .await;
        }

        match result {
            Ok(markets) => {
                let count = markets.len();
                store.replace(markets);
                metrics.record_cycle(start.elapsed(), true).await;
                let _ = events.send(MarketEvent::CacheUpdated {
                    id: Uuid::new_v4(),
                    poller: config.name.clone(),
                    assets: count,
                    timestamp: Utc::now(),
                });
                Ok(count)
            }
            Err(e) => {
                tracing::error!(
                    poller = %config.name,
                    error = %e,
                    "Fetch failed, serving previous cache"
                );
                metrics.record_cycle(start.elapsed(), false).await;
                let _ = events.send(MarketEvent::FetchFailed {
                    id: Uuid::new_v4(),
                    poller: config.name.clone(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Runs one cycle immediately, outside the periodic loop.
    ///
    /// Still goes through the shared limiter. The error, if any, is the
    /// cycle's final failure; the cache keeps its previous contents on
    /// failure either way.
    pub async fn refresh_now(&self) -> Result<usize, FetchError> {
        Self::run_cycle(
            &self.config,
            &self.fetcher,
            &self.limiter,
            &self.store,
            &self.metrics,
            &self.events,
        )
        .await
    }

    /// Stops the poller and removes it from the shared limiter.
    ///
    /// Aborting the task interrupts whichever suspension is pending
    /// (stagger, limiter wait, retry wait or interval sleep); the
    /// registry entry is removed regardless.
    pub async fn shutdown(&self) {
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.limiter.unregister(self.job_id).await;
        tracing::info!(poller = %self.config.name, "Market poller stopped");
    }

    /// One read-only view per configured asset, in config order
    pub fn views(&self) -> Vec<AssetView> {
        self.config
            .asset_ids
            .iter()
            .zip(self.config.multipliers.iter())
            .map(|(asset_id, multiplier)| {
                AssetView::new(
                    self.store.clone(),
                    asset_id.clone(),
                    *multiplier,
                    self.config.vs_currency.clone(),
                    self.config.unit.clone(),
                )
            })
            .collect()
    }

    /// Subscribes to this poller's cycle events
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the whole cached result set
    pub fn snapshot(&self) -> Option<HashMap<String, CoinMarket>> {
        self.store.snapshot()
    }

    /// True once any cycle has succeeded
    pub fn has_data(&self) -> bool {
        self.store.has_data()
    }

    /// Cycle metrics for this poller
    pub async fn get_metrics(&self) -> PollerMetrics {
        self.metrics.get_metrics().await
    }

    /// Poller name from the configuration
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Limiter handle assigned at registration
    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}

/// Validates a config, then builds and starts one poller plus one view
/// per configured asset.
///
/// On a config error nothing is created: no registration, no poller, no
/// views.
pub async fn spawn_poller(
    config: PollerConfig,
    fetcher: Arc<dyn MarketFetcher>,
    limiter: Arc<RateLimiter>,
) -> Result<(Arc<MarketPoller>, Vec<AssetView>), SetupError> {
    config.validate()?;

    let poller = Arc::new(MarketPoller::new(config, fetcher, limiter).await);
    poller.start().await;
    let views = poller.views();

    Ok((poller, views))
}
