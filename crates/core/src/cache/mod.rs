//! Fast-tier price cache.
//!
//! Observations are stored per `(ticker, interval, day)` key as a JSON list,
//! never per requested range, so overlapping requests reuse the same entries.
//! Range reads and writes are a constant number of store round trips.
//! Every failure here is a miss: the cache never fails a request.

mod store;

pub use store::{CacheEntry, FastCacheStore, MokaCacheStore, DEFAULT_MAX_ENTRIES};

use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pricevault_market_data::Interval;

use crate::prices::{CacheKey, Day, PricePoint, PriceSource, Ticker};
use crate::utils::time_utils::get_days_between;

pub struct PriceCache {
    store: Arc<dyn FastCacheStore>,
}

impl PriceCache {
    pub fn new(store: Arc<dyn FastCacheStore>) -> Self {
        Self { store }
    }

    /// In-process cache over [`MokaCacheStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MokaCacheStore::new()))
    }

    /// Latest observation of one day.
    pub async fn get_point(
        &self,
        ticker: &Ticker,
        day: Day,
        interval: Interval,
    ) -> Option<PricePoint> {
        let key = CacheKey::new(ticker.clone(), interval, day);
        self.read_keys(std::slice::from_ref(&key))
            .await
            .pop()
            .flatten()
            .and_then(|mut points| points.pop())
    }

    pub async fn set_point(&self, point: &PricePoint, ttl: Duration) {
        self.set_range(std::slice::from_ref(point), ttl).await;
    }

    /// Every cached observation whose day lies in `[start, end]`, chronological.
    /// Missing days are omitted.
    pub async fn get_range(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Vec<PricePoint> {
        let keys: Vec<CacheKey> = get_days_between(start, end)
            .into_iter()
            .map(|d| CacheKey::new(ticker.clone(), interval, Day(d)))
            .collect();
        if keys.is_empty() {
            return Vec::new();
        }

        let points: Vec<PricePoint> = self
            .read_keys(&keys)
            .await
            .into_iter()
            .flatten()
            .flatten()
            .collect();

        debug!(
            "Cache range {} {} {}..{}: {} points",
            ticker,
            interval,
            start,
            end,
            points.len()
        );
        points
    }

    /// Write points with one TTL.
    pub async fn set_range(&self, points: &[PricePoint], ttl: Duration) {
        self.set_range_with(points, |_| ttl).await;
    }

    /// Write points with a TTL chosen per day.
    ///
    /// Points are merged into what each day already holds (same timestamp is
    /// replaced), then written with one multi-key call.
    pub async fn set_range_with<F>(&self, points: &[PricePoint], ttl_for: F)
    where
        F: Fn(Day) -> Duration,
    {
        if points.is_empty() {
            return;
        }

        let mut grouped: BTreeMap<String, (CacheKey, Vec<PricePoint>)> = BTreeMap::new();
        for point in points {
            let key = point.cache_key();
            grouped
                .entry(key.to_string())
                .or_insert_with(|| (key, Vec::new()))
                .1
                .push(point.with_source(PriceSource::Cache));
        }

        let keys: Vec<CacheKey> = grouped.values().map(|(k, _)| k.clone()).collect();
        let existing = self.read_keys(&keys).await;

        let mut entries = Vec::with_capacity(grouped.len());
        for ((rendered, (key, fresh)), current) in grouped.into_iter().zip(existing) {
            let mut by_timestamp: BTreeMap<_, PricePoint> = current
                .unwrap_or_default()
                .into_iter()
                .map(|p| (p.timestamp, p))
                .collect();
            for point in fresh {
                by_timestamp.insert(point.timestamp, point);
            }
            let merged: Vec<PricePoint> = by_timestamp.into_values().collect();

            match serde_json::to_string(&merged) {
                Ok(value) => entries.push(CacheEntry {
                    key: rendered,
                    value,
                    ttl: ttl_for(key.day),
                }),
                Err(e) => warn!("Failed to encode cache entry {}: {}", rendered, e),
            }
        }

        let count = entries.len();
        if let Err(e) = self.store.set_many(entries).await {
            warn!("Fast cache write of {} keys failed: {}", count, e);
        }
    }

    pub async fn invalidate(&self, ticker: &Ticker, day: Day, interval: Interval) {
        let key = CacheKey::new(ticker.clone(), interval, day).to_string();
        if let Err(e) = self.store.delete(&key).await {
            warn!("Fast cache delete of {} failed: {}", key, e);
        }
    }

    /// Decoded values per key, re-tagged as cache hits. Errors read as misses.
    async fn read_keys(&self, keys: &[CacheKey]) -> Vec<Option<Vec<PricePoint>>> {
        let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

        let raw = match self.store.get_many(&rendered).await {
            Ok(values) if values.len() == rendered.len() => values,
            Ok(values) => {
                warn!(
                    "Fast cache returned {} values for {} keys",
                    values.len(),
                    rendered.len()
                );
                return vec![None; rendered.len()];
            }
            Err(e) => {
                warn!("Fast cache read failed: {}", e);
                return vec![None; rendered.len()];
            }
        };

        raw.into_iter()
            .zip(rendered.iter())
            .map(|(value, key)| {
                let value = value?;
                match serde_json::from_str::<Vec<PricePoint>>(&value) {
                    Ok(points) if !points.is_empty() => Some(
                        points
                            .into_iter()
                            .map(|p| p.with_source(PriceSource::Cache))
                            .collect(),
                    ),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("Discarding undecodable cache entry {}: {}", key, e);
                        None
                    }
                }
            })
            .collect()
    }
}
