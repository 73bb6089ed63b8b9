//! Error types for the market polling SDK

use std::time::Duration;
use thiserror::Error;

/// Errors that abort poller setup before anything is created
#[derive(Debug, Error)]
pub enum SetupError {
    /// Asset-id list and multiplier list have different lengths
    #[error("length mismatch: {multipliers} multipliers for {assets} asset ids")]
    LengthMismatch { assets: usize, multipliers: usize },

    /// A multiplier could not be parsed as a number
    #[error("invalid multiplier: {0:?}")]
    InvalidMultiplier(String),

    /// The polling interval is not a positive number of minutes
    #[error("invalid polling interval: {0:?}")]
    InvalidInterval(String),

    /// No asset ids were configured
    #[error("no asset ids configured")]
    EmptyAssetList,
}

/// Errors that can occur when fetching market data from the upstream API
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network request failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream returned 429; wait `retry_after` before trying again
    #[error("Upstream throttled, retry after {retry_after:?}")]
    Throttled { retry_after: Duration },

    /// Upstream returned a non-success status
    #[error("Upstream API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body did not decode as market records
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Creates a Throttled error from whole seconds
    pub fn throttled_secs(secs: u64) -> Self {
        Self::Throttled {
            retry_after: Duration::from_secs(secs),
        }
    }

    /// Creates an InvalidResponse error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// True for the throttled variant, regardless of the embedded delay
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}
