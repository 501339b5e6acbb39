//! Price engine defaults.

/// A fast-cache entry younger than this is served without further checks.
pub const CACHE_FRESH_FOR_SECS: i64 = 60 * 60;

/// A durable entry younger than this is served without an upstream call.
pub const DURABLE_FRESH_FOR_SECS: i64 = 4 * 60 * 60;

/// Fast-cache TTL for today's observation.
pub const CURRENT_TTL_SECS: u64 = 15 * 60;

/// Fast-cache TTL for the last trading day's price while the market is closed.
pub const CLOSED_MARKET_TTL_SECS: u64 = 24 * 60 * 60;

/// Fast-cache TTL for past days; they no longer change.
pub const HISTORICAL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Budget for a single fast-cache or durable-store call.
pub const STORE_TIMEOUT_MS: u64 = 2_000;

/// Budget for a single upstream call.
pub const UPSTREAM_TIMEOUT_SECS: u64 = 15;

/// Currency assumed when the provider reports none.
pub const DEFAULT_CURRENCY: &str = "USD";
