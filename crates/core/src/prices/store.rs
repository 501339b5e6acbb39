//! Durable price storage trait.
//!
//! The durable tier never expires entries. Implementations live in the
//! storage crates (`pricevault-storage-sqlite`).

use async_trait::async_trait;

use pricevault_market_data::Interval;

use super::model::PricePoint;
use super::types::{Day, Ticker};
use crate::errors::Result;

/// Storage interface for price observations.
///
/// # Method Naming Convention
///
/// - `latest*` - Most recent observation(s)
/// - `range` - Observations within a day range
///
/// Reads return points exactly as stored; the caller re-tags their source.
#[async_trait]
pub trait PriceStore: Send + Sync {
    // =========================================================================
    // Mutations
    // =========================================================================

    /// Inserts or replaces points by their identity
    /// (ticker, interval, timestamp, provider).
    ///
    /// # Returns
    ///
    /// The number of rows written
    async fn upsert_points(&self, points: &[PricePoint]) -> Result<usize>;

    /// Deletes every observation of a day before `day`.
    ///
    /// Retention is decided outside the engine; this is only the hook.
    async fn delete_before(&self, day: Day) -> Result<usize>;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Latest observation within one day.
    fn get_point(&self, ticker: &Ticker, day: Day, interval: Interval)
        -> Result<Option<PricePoint>>;

    /// Observations whose day lies in `[start, end]`, chronological.
    fn range(
        &self,
        ticker: &Ticker,
        start: Day,
        end: Day,
        interval: Interval,
    ) -> Result<Vec<PricePoint>>;

    /// Most recent observation regardless of age.
    fn latest(&self, ticker: &Ticker, interval: Interval) -> Result<Option<PricePoint>>;

    /// Most recent observation whose day is on or before `day`.
    fn latest_on_or_before(
        &self,
        ticker: &Ticker,
        day: Day,
        interval: Interval,
    ) -> Result<Option<PricePoint>>;
}
