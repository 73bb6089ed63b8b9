//! Compile-time tuning constants for the SDK.
//!
//! All operational knobs — the CoinGecko endpoint, the process-wide
//! request ceiling and window, the startup stagger spacing, the HTTP
//! timeout and user agent, and the requested change horizons — live
//! here as flat `pub const` items.

/// Maximum number of outbound requests allowed within one sliding
/// window across all pollers in the process.
pub const MAX_REQUESTS_PER_WINDOW: usize = 15;

/// Length of the sliding rate-limit window, in seconds.
pub const RATE_WINDOW_SECS: u64 = 60;

/// Per-registration startup stagger spacing, in seconds.
pub const STAGGER_SPACING_SECS: u64 = 5;

/// CoinGecko API base URL.
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko markets endpoint (appended to the base URL).
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// Requested percentage-change horizons, pre-encoded for the query
/// string (`1h,24h,7d,14d,30d,1y`).
pub const PRICE_CHANGE_HORIZONS: &str = "1h%2C24h%2C7d%2C14d%2C30d%2C1y";

/// HTTP request timeout when fetching markets, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Fallback `Retry-After` delay, in seconds, when the header is absent
/// or unparseable.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// User agent sent with every outbound HTTP request.
pub const USER_AGENT: &str = "crypto-market-sdk/0.1.0";
