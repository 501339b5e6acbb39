//! Provider capabilities and rate limiting configuration.

use crate::models::Interval;

/// Describes the capabilities of a market data provider.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Bar intervals the provider can serve.
    pub intervals: &'static [Interval],

    /// Whether the provider supports a latest-quote endpoint.
    pub supports_latest: bool,

    /// Whether the provider supports historical quote fetching.
    pub supports_historical: bool,
}

impl ProviderCapabilities {
    pub fn supports_interval(&self, interval: Interval) -> bool {
        self.intervals.contains(&interval)
    }
}

/// The provider's published quota.
///
/// The provider never enforces this itself; the caller's rate limiter does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Maximum requests allowed per calendar day.
    pub requests_per_day: u32,

    /// Maximum concurrent requests to this provider.
    pub max_concurrency: usize,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_day: 10_000,
            max_concurrency: 5,
        }
    }
}
