//! Shared rate limiter for upstream API requests
//!
//! All pollers in the process go through one [`RateLimiter`], which keeps
//! the global request rate under the upstream ceiling and hands out the
//! startup stagger slots that spread poller first-fetches apart.

use crate::constants::{MAX_REQUESTS_PER_WINDOW, RATE_WINDOW_SECS, STAGGER_SPACING_SECS};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Handle identifying one registered poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

struct LimiterState {
    /// Instants of requests issued within the trailing window, oldest
    /// first. Purged lazily on access, never on a timer.
    request_log: VecDeque<Instant>,
    /// Registered pollers with the stagger index assigned at
    /// registration. Indices are never reassigned on removal.
    registry: Vec<(JobId, usize)>,
    next_id: u64,
}

impl LimiterState {
    fn purge(&mut self, now: Instant, window: Duration) {
        while let Some(front) = self.request_log.front() {
            if now.duration_since(*front) >= window {
                self.request_log.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Process-wide sliding-window rate limiter and poller registry
///
/// Construct one per process (or per host application context) and hand
/// an `Arc` of it to every poller. Pollers registered with different
/// limiters do not coordinate.
pub struct RateLimiter {
    ceiling: usize,
    window: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Creates a limiter with the upstream free-tier limits
    pub fn new() -> Self {
        Self::with_limits(
            MAX_REQUESTS_PER_WINDOW,
            Duration::from_secs(RATE_WINDOW_SECS),
        )
    }

    /// Creates a limiter with explicit limits
    pub fn with_limits(ceiling: usize, window: Duration) -> Self {
        Self {
            ceiling,
            window,
            state: Mutex::new(LimiterState {
                request_log: VecDeque::new(),
                registry: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Waits until a request may be issued without breaching the
    /// ceiling, then records the issuance.
    ///
    /// The purge, capacity check, wait and append all happen while the
    /// state lock is held, so concurrent callers serialize: two pollers
    /// can never both observe the same free slot. The wait is exactly
    /// long enough for the oldest logged request to age out of the
    /// window.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        state.purge(now, self.window);

        if state.request_log.len() >= self.ceiling {
            if let Some(oldest) = state.request_log.front().copied() {
                let wait = (oldest + self.window).saturating_duration_since(now);
                if !wait.is_zero() {
                    tracing::debug!(
                        wait_secs = wait.as_secs_f64(),
                        in_window = state.request_log.len(),
                        "Rate limit reached, waiting for a window slot"
                    );
                    sleep(wait).await;
                    state.purge(Instant::now(), self.window);
                }
            }
        }

        state.request_log.push_back(Instant::now());
    }

    /// Registers a poller and returns its id.
    ///
    /// The stagger index is the registry length at registration time
    /// and stays with the poller until it unregisters.
    pub async fn register(&self) -> JobId {
        let mut state = self.state.lock().await;
        let id = JobId(state.next_id);
        state.next_id += 1;
        let index = state.registry.len();
        state.registry.push((id, index));
        tracing::debug!(job_id = id.0, stagger_index = index, "Poller registered");
        id
    }

    /// Removes a poller from the registry.
    ///
    /// Surviving pollers keep the indices they were assigned at
    /// registration.
    pub async fn unregister(&self, id: JobId) {
        let mut state = self.state.lock().await;
        state.registry.retain(|(job, _)| *job != id);
        tracing::debug!(job_id = id.0, "Poller unregistered");
    }

    /// One-time startup delay for a poller: stagger index times the
    /// spacing constant. Zero for ids that are not registered.
    pub async fn stagger_delay(&self, id: JobId) -> Duration {
        let state = self.state.lock().await;
        state
            .registry
            .iter()
            .find(|(job, _)| *job == id)
            .map(|(_, index)| Duration::from_secs(*index as u64 * STAGGER_SPACING_SECS))
            .unwrap_or(Duration::ZERO)
    }

    /// Number of logged requests still inside the trailing window
    pub async fn requests_in_window(&self) -> usize {
        let mut state = self.state.lock().await;
        state.purge(Instant::now(), self.window);
        state.request_log.len()
    }

    /// Number of currently registered pollers
    pub async fn registered_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn acquires_under_ceiling_do_not_wait() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            limiter.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.requests_in_window().await, MAX_REQUESTS_PER_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn sixteenth_acquire_waits_for_oldest_to_expire() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            limiter.acquire().await;
        }

        // The next acquire must suspend until the first timestamp ages
        // past the window.
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(RATE_WINDOW_SECS));
    }

    #[tokio::test(start_paused = true)]
    async fn window_count_never_exceeds_ceiling() {
        let limiter = RateLimiter::new();

        for _ in 0..40 {
            limiter.acquire().await;
            assert!(limiter.requests_in_window().await <= MAX_REQUESTS_PER_WINDOW);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquirers_serialize_on_the_window() {
        let limiter = Arc::new(RateLimiter::with_limits(5, Duration::from_secs(60)));
        let start = Instant::now();

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        // 20 grants through a ceiling of 5 need three full window
        // expiries; no interleaving may sneak an extra grant in.
        assert_eq!(start.elapsed(), Duration::from_secs(180));
        assert!(limiter.requests_in_window().await <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn stagger_delay_is_index_times_spacing() {
        let limiter = RateLimiter::new();

        let first = limiter.register().await;
        let second = limiter.register().await;
        let third = limiter.register().await;

        assert_eq!(limiter.stagger_delay(first).await, Duration::ZERO);
        assert_eq!(limiter.stagger_delay(second).await, Duration::from_secs(5));
        assert_eq!(limiter.stagger_delay(third).await, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn unregistering_keeps_surviving_indices() {
        let limiter = RateLimiter::new();

        let first = limiter.register().await;
        let second = limiter.register().await;
        let third = limiter.register().await;

        limiter.unregister(second).await;

        assert_eq!(limiter.registered_count().await, 2);
        assert_eq!(limiter.stagger_delay(third).await, Duration::from_secs(10));
        assert_eq!(limiter.stagger_delay(first).await, Duration::ZERO);
        // An unregistered id no longer gets a delay.
        assert_eq!(limiter.stagger_delay(second).await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn registration_after_removal_reuses_the_current_length() {
        let limiter = RateLimiter::new();

        let _first = limiter.register().await;
        let second = limiter.register().await;
        let _third = limiter.register().await;
        limiter.unregister(second).await;

        // Indices are not recompacted, so a newcomer's index is the
        // current registry length, which can repeat a survivor's slot.
        let fourth = limiter.register().await;
        assert_eq!(limiter.stagger_delay(fourth).await, Duration::from_secs(10));
    }
}
