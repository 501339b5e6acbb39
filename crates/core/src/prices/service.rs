//! Price service: the fetch orchestrator.
//!
//! Every request walks the tiers in a fixed order and falls through on a miss:
//!
//! ```text
//! fast cache -> durable store -> (calendar) -> rate limiter -> upstream
//!                                                   |
//!                                   exhausted / transient failure
//!                                                   v
//!                                             stale fallback
//! ```
//!
//! Whatever is obtained from a slower tier is written back into the faster
//! ones. Only the total absence of data at every tier surfaces an error.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pricevault_market_data::errors::MarketDataError;
use pricevault_market_data::{Interval, MarketDataProvider};

use super::client::UpstreamClient;
use super::constants::*;
use super::errors::PriceError;
use super::model::{PricePoint, PriceSource};
use super::store::PriceStore;
use super::types::{Day, Ticker};
use crate::cache::PriceCache;
use crate::calendar::TradingCalendar;
use crate::errors::{Error, Result};
use crate::rate_limit::RateLimiter;
use crate::utils::time_utils::{market_date_from_utc, DEFAULT_MARKET_TZ};
use crate::utils::Clock;

// =============================================================================
// Configuration
// =============================================================================

/// Freshness thresholds, TTLs and timeouts of the orchestrator.
#[derive(Debug, Clone)]
pub struct PriceServiceConfig {
    /// A fast-cache entry younger than this is returned as is.
    pub cache_fresh_for: ChronoDuration,
    /// A durable entry younger than this is returned without an upstream call.
    pub durable_fresh_for: ChronoDuration,
    /// Fast-cache TTL of today's bucket.
    pub current_ttl: Duration,
    /// Fast-cache TTL of the last trading day's price while the market is closed.
    pub closed_market_ttl: Duration,
    /// Fast-cache TTL of past days.
    pub historical_ttl: Duration,
    /// Limit for one fast-cache or durable call; exceeding it is a miss.
    pub store_timeout: Duration,
    /// Limit for one upstream call; exceeding it is a transient failure.
    pub upstream_timeout: Duration,
    /// Tickers resolved concurrently by a batch request.
    pub max_concurrency: usize,
    /// Timezone that defines "today".
    pub market_timezone: Tz,
}

impl Default for PriceServiceConfig {
    fn default() -> Self {
        Self {
            cache_fresh_for: ChronoDuration::seconds(CACHE_FRESH_FOR_SECS),
            durable_fresh_for: ChronoDuration::seconds(DURABLE_FRESH_FOR_SECS),
            current_ttl: Duration::from_secs(CURRENT_TTL_SECS),
            closed_market_ttl: Duration::from_secs(CLOSED_MARKET_TTL_SECS),
            historical_ttl: Duration::from_secs(HISTORICAL_TTL_SECS),
            store_timeout: Duration::from_millis(STORE_TIMEOUT_MS),
            upstream_timeout: Duration::from_secs(UPSTREAM_TIMEOUT_SECS),
            max_concurrency: crate::rate_limit::DEFAULT_REQUESTS_PER_MINUTE as usize,
            market_timezone: DEFAULT_MARKET_TZ,
        }
    }
}

impl PriceServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::InvalidConfigValue(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.cache_fresh_for <= ChronoDuration::zero()
            || self.durable_fresh_for <= ChronoDuration::zero()
        {
            return Err(Error::InvalidConfigValue(
                "freshness thresholds must be positive".to_string(),
            ));
        }
        if self.store_timeout.is_zero() || self.upstream_timeout.is_zero() {
            return Err(Error::InvalidConfigValue(
                "timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Caller-facing contract
// =============================================================================

/// The four operations callers use to obtain prices.
#[async_trait]
pub trait PriceServiceTrait: Send + Sync {
    /// Best available current price.
    async fn get_current_price(&self, ticker: &Ticker) -> std::result::Result<PricePoint, PriceError>;

    /// Price in effect at `at`: the last trading day on or before its market date.
    async fn get_price_at(
        &self,
        ticker: &Ticker,
        at: DateTime<Utc>,
    ) -> std::result::Result<PricePoint, PriceError>;

    /// Observations for `[start, end]`, chronological.
    ///
    /// Returns whatever could be obtained; gaps are not an error unless
    /// nothing at all was found.
    async fn get_price_history(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> std::result::Result<Vec<PricePoint>, PriceError>;

    /// Current prices for many tickers against one shared budget.
    ///
    /// Tickers that cannot be resolved are omitted (and logged); the batch
    /// itself does not fail for them.
    async fn get_batch_prices(
        &self,
        tickers: &[Ticker],
    ) -> std::result::Result<HashMap<Ticker, PricePoint>, PriceError>;
}

// =============================================================================
// PriceService
// =============================================================================

/// What a ticker could fall back to if the upstream step yields nothing.
#[derive(Debug, Clone)]
enum Fallback {
    /// Today's entry from either tier; the durable `latest` is not consulted yet.
    Today(Option<PricePoint>),
    /// Every tier consulted.
    Settled(Option<PricePoint>),
}

impl Fallback {
    fn is_empty(&self) -> bool {
        matches!(self, Fallback::Settled(None))
    }
}

/// Outcome of the tiers in front of the rate limiter.
enum Lookup {
    Resolved(std::result::Result<PricePoint, PriceError>),
    NeedsUpstream(Fallback),
}

/// Why the upstream step produced nothing for a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shortfall {
    None,
    BudgetExhausted,
    NotFound,
    Unavailable,
}

pub struct PriceService {
    cache: Arc<PriceCache>,
    durable: Arc<dyn PriceStore>,
    upstream: UpstreamClient,
    limiter: Arc<RateLimiter>,
    calendar: Arc<TradingCalendar>,
    clock: Arc<dyn Clock>,
    config: PriceServiceConfig,
}

impl PriceService {
    pub fn new(
        cache: Arc<PriceCache>,
        durable: Arc<dyn PriceStore>,
        provider: Arc<dyn MarketDataProvider>,
        limiter: Arc<RateLimiter>,
        calendar: Arc<TradingCalendar>,
        clock: Arc<dyn Clock>,
        config: PriceServiceConfig,
    ) -> Result<Self> {
        config.validate()?;
        let upstream = UpstreamClient::new(
            provider,
            limiter.config().requests_per_minute as usize,
            config.upstream_timeout,
            config.market_timezone,
        );
        Ok(Self {
            cache,
            durable,
            upstream,
            limiter,
            calendar,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &PriceServiceConfig {
        &self.config
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        market_date_from_utc(now, self.config.market_timezone)
    }

    fn ttl_for(&self, day: Day, today: NaiveDate) -> Duration {
        if day.date() < today {
            self.config.historical_ttl
        } else {
            self.config.current_ttl
        }
    }

    // -------------------------------------------------------------------------
    // Tier access (all failures and timeouts are misses)
    // -------------------------------------------------------------------------

    async fn within_store_timeout<T, F>(&self, what: &str, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("{} exceeded {:?}, treating as a miss", what, self.config.store_timeout);
                None
            }
        }
    }

    async fn cache_point(&self, ticker: &Ticker, day: Day) -> Option<PricePoint> {
        let point = self
            .within_store_timeout(
                "Fast cache read",
                self.cache.get_point(ticker, day, Interval::Daily),
            )
            .await
            .flatten();
        debug!(
            "Fast cache {} for {} {}",
            if point.is_some() { "hit" } else { "miss" },
            ticker,
            day
        );
        point
    }

    async fn cache_range(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Vec<PricePoint> {
        self.within_store_timeout(
            "Fast cache range read",
            self.cache.get_range(ticker, start, end, interval),
        )
        .await
        .unwrap_or_default()
    }

    async fn cache_write(&self, points: &[PricePoint], today: NaiveDate) {
        self.within_store_timeout(
            "Fast cache write",
            self.cache
                .set_range_with(points, |day| self.ttl_for(day, today)),
        )
        .await;
    }

    async fn cache_write_with_ttl(&self, point: &PricePoint, ttl: Duration) {
        self.within_store_timeout("Fast cache write", self.cache.set_point(point, ttl))
            .await;
    }

    /// Runs a blocking durable read off the async workers, bounded by the store timeout.
    async fn durable_read<T, F>(&self, what: &'static str, read: F) -> Option<T>
    where
        F: FnOnce(&dyn PriceStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.durable);
        let task = tokio::task::spawn_blocking(move || read(store.as_ref()));

        match self.within_store_timeout(what, task).await {
            Some(Ok(Ok(value))) => Some(value),
            Some(Ok(Err(e))) => {
                warn!("{} failed: {}", what, e);
                None
            }
            Some(Err(e)) => {
                warn!("{} task failed: {}", what, e);
                None
            }
            None => None,
        }
    }

    async fn durable_point(&self, ticker: &Ticker, day: Day) -> Option<PricePoint> {
        let t = ticker.clone();
        let point = self
            .durable_read("Durable point read", move |store| {
                store.get_point(&t, day, Interval::Daily)
            })
            .await
            .flatten()
            .map(|p| p.with_source(PriceSource::Durable));
        debug!(
            "Durable store {} for {} {}",
            if point.is_some() { "hit" } else { "miss" },
            ticker,
            day
        );
        point
    }

    async fn durable_latest(&self, ticker: &Ticker) -> Option<PricePoint> {
        let t = ticker.clone();
        self.durable_read("Durable latest read", move |store| {
            store.latest(&t, Interval::Daily)
        })
        .await
        .flatten()
    }

    async fn durable_write(&self, points: &[PricePoint]) {
        if points.is_empty() {
            return;
        }
        match self
            .within_store_timeout("Durable write", self.durable.upsert_points(points))
            .await
        {
            Some(Ok(count)) => debug!("Persisted {} points", count),
            Some(Err(e)) => warn!("Failed to persist {} points: {}", points.len(), e),
            None => {}
        }
    }

    async fn persist(&self, points: &[PricePoint], today: NaiveDate) {
        self.durable_write(points).await;
        self.cache_write(points, today).await;
    }

    // -------------------------------------------------------------------------
    // Current price
    // -------------------------------------------------------------------------

    /// Single-ticker pipeline. With `exhausted`, a spent budget observed by
    /// any caller sharing the flag skips the upstream step.
    async fn resolve_current(
        &self,
        ticker: &Ticker,
        exhausted: Option<&AtomicBool>,
    ) -> std::result::Result<PricePoint, PriceError> {
        match self.lookup_current(ticker).await {
            Lookup::Resolved(outcome) => outcome,
            Lookup::NeedsUpstream(fallback) => self.fetch_current(ticker, fallback, exhausted).await,
        }
    }

    /// Steps 1-3: fast cache, durable store and the closed-market path.
    async fn lookup_current(&self, ticker: &Ticker) -> Lookup {
        let now = self.clock.now();
        let today = self.today(now);
        let today_key = Day(today);

        // 1. fast cache, today's key
        let cached_today = self.cache_point(ticker, today_key).await;
        if let Some(ref point) = cached_today {
            if point.is_fresh(now, self.config.cache_fresh_for) {
                return Lookup::Resolved(Ok(point.with_source(PriceSource::Cache)));
            }
        }

        // 2. durable store, today's key
        let durable_today = self.durable_point(ticker, today_key).await;
        if let Some(ref point) = durable_today {
            if point.is_fresh(now, self.config.durable_fresh_for) {
                self.cache_write_with_ttl(point, self.config.current_ttl).await;
                return Lookup::Resolved(Ok(point.with_source(PriceSource::Durable)));
            }
        }

        // 3. market closed today
        if !self.calendar.is_trading_day(today) {
            return Lookup::Resolved(self.resolve_closed_market(ticker, today).await);
        }

        Lookup::NeedsUpstream(Fallback::Today(cached_today.or(durable_today)))
    }

    /// Steps 4-5: budget, upstream, stale fallback.
    async fn fetch_current(
        &self,
        ticker: &Ticker,
        fallback: Fallback,
        exhausted: Option<&AtomicBool>,
    ) -> std::result::Result<PricePoint, PriceError> {
        let now = self.clock.now();
        let today = self.today(now);

        // 4. budget
        let skip = exhausted.is_some_and(|flag| flag.load(Ordering::SeqCst));
        if skip || !self.limiter.consume_token().await {
            if let Some(flag) = exhausted {
                flag.store(true, Ordering::SeqCst);
            }
            info!("Rate budget exhausted, looking for a stale price for {}", ticker);
            return self
                .stale_fallback(ticker, fallback)
                .await
                .ok_or_else(|| PriceError::RateBudgetExhausted(ticker.clone()));
        }

        // 5. upstream
        match self.upstream.latest(ticker, today, now).await {
            Ok(point) => {
                self.persist(std::slice::from_ref(&point), today).await;
                Ok(point)
            }
            Err(e) if e.is_not_found() => {
                warn!("Upstream does not know {}", ticker);
                self.stale_fallback(ticker, fallback)
                    .await
                    .ok_or_else(|| PriceError::TickerNotFound(ticker.clone()))
            }
            Err(e) => {
                warn!("Upstream fetch for {} failed: {}", ticker, e);
                self.stale_fallback(ticker, fallback)
                    .await
                    .ok_or_else(|| PriceError::unavailable(ticker, e.to_string()))
            }
        }
    }

    /// Batch step 1: everything short of the budget, with the fallback settled
    /// so the batch can tell which tickers would be left with nothing.
    async fn batch_lookup(&self, ticker: Ticker) -> (Ticker, Lookup) {
        let lookup = match self.lookup_current(&ticker).await {
            Lookup::NeedsUpstream(Fallback::Today(None)) => {
                Lookup::NeedsUpstream(Fallback::Settled(self.durable_latest(&ticker).await))
            }
            other => other,
        };
        (ticker, lookup)
    }

    async fn batch_fetch(
        &self,
        ticker: Ticker,
        fallback: Fallback,
        exhausted: &AtomicBool,
    ) -> (Ticker, std::result::Result<PricePoint, PriceError>) {
        let outcome = self.fetch_current(&ticker, fallback, Some(exhausted)).await;
        (ticker, outcome)
    }

    async fn resolve_closed_market(
        &self,
        ticker: &Ticker,
        today: NaiveDate,
    ) -> std::result::Result<PricePoint, PriceError> {
        let Some(last) = self.calendar.previous_trading_day(today) else {
            return Err(PriceError::unavailable(ticker, "no previous trading day"));
        };
        let last_key = Day(last);
        debug!("Market closed on {}, using {} for {}", today, last, ticker);

        if let Some(point) = self.cache_point(ticker, last_key).await {
            return Ok(point.with_source(PriceSource::LastTradingDay));
        }

        if let Some(point) = self.durable_point(ticker, last_key).await {
            self.cache_write_with_ttl(&point, self.config.closed_market_ttl)
                .await;
            return Ok(point.with_source(PriceSource::LastTradingDay));
        }

        Err(PriceError::unavailable(
            ticker,
            format!("market closed on {} and no price stored for {}", today, last),
        ))
    }

    /// Most recent value regardless of age: today's entry, then durable latest.
    async fn stale_fallback(&self, ticker: &Ticker, fallback: Fallback) -> Option<PricePoint> {
        let point = match fallback {
            Fallback::Today(Some(point)) | Fallback::Settled(Some(point)) => Some(point),
            Fallback::Today(None) => self.durable_latest(ticker).await,
            Fallback::Settled(None) => None,
        };
        if let Some(ref p) = point {
            info!(
                "Serving stale price for {} from {} (fetched {})",
                ticker,
                p.day(),
                p.fetched_at
            );
        }
        point.map(|p| p.with_source(PriceSource::Stale))
    }

    // -------------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------------

    async fn resolve_history(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
        exhausted: Option<&AtomicBool>,
    ) -> std::result::Result<Vec<PricePoint>, PriceError> {
        if start > end {
            return Err(PriceError::invalid_range(start, end));
        }

        let now = self.clock.now();
        let today = self.today(now);
        let end = end.min(today);
        if start > end {
            return Ok(Vec::new());
        }

        let trading_days = self.calendar.trading_days(start, end);
        if trading_days.is_empty() {
            return Ok(Vec::new());
        }

        // fast cache
        let mut by_day: BTreeMap<NaiveDate, Vec<PricePoint>> = BTreeMap::new();
        for point in self.cache_range(ticker, start, end, interval).await {
            by_day.entry(point.day().date()).or_default().push(point);
        }
        let mut missing = missing_days(&trading_days, &by_day);
        debug!(
            "History {} {} {}..{}: {} of {} trading days missing after cache",
            ticker,
            interval,
            start,
            end,
            missing.len(),
            trading_days.len()
        );

        // durable store
        if let (Some(&first), Some(&last)) = (missing.first(), missing.last()) {
            let wanted: HashSet<NaiveDate> = missing.iter().copied().collect();
            let t = ticker.clone();
            let found: Vec<PricePoint> = self
                .durable_read("Durable range read", move |store| {
                    store.range(&t, Day(first), Day(last), interval)
                })
                .await
                .unwrap_or_default()
                .into_iter()
                .filter(|p| wanted.contains(&p.day().date()))
                .filter(|p| {
                    p.day().date() < today || p.is_fresh(now, self.config.durable_fresh_for)
                })
                .collect();

            if !found.is_empty() {
                self.cache_write(&found, today).await;
                for point in found {
                    by_day
                        .entry(point.day().date())
                        .or_default()
                        .push(point.with_source(PriceSource::Durable));
                }
                missing = missing_days(&trading_days, &by_day);
            }
        }

        // upstream, one bulk call for the remaining span
        let mut shortfall = Shortfall::None;
        if let (Some(&first), Some(&last)) = (missing.first(), missing.last()) {
            let skip = exhausted.is_some_and(|flag| flag.load(Ordering::SeqCst));
            if skip || !self.limiter.consume_token().await {
                if let Some(flag) = exhausted {
                    flag.store(true, Ordering::SeqCst);
                }
                info!(
                    "Rate budget exhausted, returning {} of {} days for {}",
                    trading_days.len() - missing.len(),
                    trading_days.len(),
                    ticker
                );
                shortfall = Shortfall::BudgetExhausted;
            } else {
                match self
                    .upstream
                    .history(ticker, first, last, interval, now)
                    .await
                {
                    Ok(points) => {
                        self.persist(&points, today).await;
                        let wanted: BTreeSet<NaiveDate> = missing.iter().copied().collect();
                        for point in points {
                            let day = point.day().date();
                            if wanted.contains(&day) {
                                by_day.entry(day).or_default().push(point);
                            }
                        }
                    }
                    Err(MarketDataError::NoDataForRange) => {
                        debug!("Upstream has no {} bars for {} in {}..{}", interval, ticker, first, last);
                        shortfall = Shortfall::Unavailable;
                    }
                    Err(e) if e.is_not_found() => {
                        warn!("Upstream does not know {}", ticker);
                        shortfall = Shortfall::NotFound;
                    }
                    Err(e) => {
                        warn!("Upstream history for {} failed: {}", ticker, e);
                        shortfall = Shortfall::Unavailable;
                    }
                }
            }
        }

        let mut result: Vec<PricePoint> = by_day.into_values().flatten().collect();
        result.sort_by_key(|p| p.timestamp);

        if result.is_empty() {
            return Err(match shortfall {
                Shortfall::BudgetExhausted => PriceError::RateBudgetExhausted(ticker.clone()),
                Shortfall::NotFound => PriceError::TickerNotFound(ticker.clone()),
                Shortfall::None | Shortfall::Unavailable => {
                    PriceError::unavailable(ticker, format!("no data for {}..{}", start, end))
                }
            });
        }
        Ok(result)
    }
}

fn missing_days(
    trading_days: &[NaiveDate],
    by_day: &BTreeMap<NaiveDate, Vec<PricePoint>>,
) -> Vec<NaiveDate> {
    trading_days
        .iter()
        .filter(|d| !by_day.contains_key(d))
        .copied()
        .collect()
}

#[async_trait]
impl PriceServiceTrait for PriceService {
    async fn get_current_price(&self, ticker: &Ticker) -> std::result::Result<PricePoint, PriceError> {
        self.resolve_current(ticker, None).await
    }

    async fn get_price_at(
        &self,
        ticker: &Ticker,
        at: DateTime<Utc>,
    ) -> std::result::Result<PricePoint, PriceError> {
        let now = self.clock.now();
        let requested = self.today(at);
        if requested > self.today(now) {
            return Err(PriceError::InvalidRequest(format!(
                "{} is in the future",
                at
            )));
        }

        let Some(target) = self.calendar.last_trading_day_on_or_before(requested) else {
            return Err(PriceError::unavailable(ticker, "no trading day on or before request"));
        };

        let failure = match self
            .resolve_history(ticker, target, target, Interval::Daily, None)
            .await
        {
            Ok(mut points) => match points.pop() {
                Some(point) => return Ok(point),
                None => None,
            },
            Err(e @ PriceError::InvalidRequest(_)) => return Err(e),
            Err(e) => Some(e),
        };

        let t = ticker.clone();
        let fallback = self
            .durable_read("Durable on-or-before read", move |store| {
                store.latest_on_or_before(&t, Day(target), Interval::Daily)
            })
            .await
            .flatten();

        match (fallback, failure) {
            (Some(point), _) => {
                debug!("Using {} for {} on {}", point.day(), ticker, target);
                Ok(point.with_source(PriceSource::Stale))
            }
            (None, Some(e @ PriceError::TickerNotFound(_))) => Err(e),
            (None, Some(e)) => Err(PriceError::unavailable(
                ticker,
                format!("no price on or before {}: {}", target, e),
            )),
            (None, None) => Err(PriceError::unavailable(
                ticker,
                format!("no price on or before {}", target),
            )),
        }
    }

    async fn get_price_history(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> std::result::Result<Vec<PricePoint>, PriceError> {
        self.resolve_history(ticker, start, end, interval, None).await
    }

    async fn get_batch_prices(
        &self,
        tickers: &[Ticker],
    ) -> std::result::Result<HashMap<Ticker, PricePoint>, PriceError> {
        let mut seen = HashSet::new();
        let unique: Vec<Ticker> = tickers
            .iter()
            .filter(|t| seen.insert(*t))
            .cloned()
            .collect();
        let limit = self.config.max_concurrency;

        let looked_up: Vec<(Ticker, Lookup)> = stream::iter(unique)
            .map(|ticker| self.batch_lookup(ticker).boxed())
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut outcomes = Vec::with_capacity(looked_up.len());
        let mut uncovered = Vec::new();
        let mut covered = Vec::new();
        for (ticker, lookup) in looked_up {
            match lookup {
                Lookup::Resolved(outcome) => outcomes.push((ticker, outcome)),
                Lookup::NeedsUpstream(fallback) if fallback.is_empty() => {
                    uncovered.push((ticker, fallback))
                }
                Lookup::NeedsUpstream(fallback) => covered.push((ticker, fallback)),
            }
        }
        debug!(
            "Batch needs upstream for {} tickers without a fallback and {} with one",
            uncovered.len(),
            covered.len()
        );

        // Tokens go to tickers that would otherwise be omitted first.
        let exhausted = AtomicBool::new(false);
        for wave in [uncovered, covered] {
            let fetched: Vec<(Ticker, std::result::Result<PricePoint, PriceError>)> =
                stream::iter(wave)
                    .map(|(ticker, fallback)| self.batch_fetch(ticker, fallback, &exhausted).boxed())
                    .buffer_unordered(limit)
                    .collect()
                    .await;
            outcomes.extend(fetched);
        }

        let mut prices = HashMap::with_capacity(outcomes.len());
        for (ticker, outcome) in outcomes {
            match outcome {
                Ok(point) => {
                    prices.insert(ticker, point);
                }
                Err(e) => warn!("Omitting {} from batch: {}", ticker, e),
            }
        }

        info!(
            "Batch resolved {} of {} tickers{}",
            prices.len(),
            seen.len(),
            if exhausted.load(Ordering::SeqCst) {
                " (rate budget exhausted)"
            } else {
                ""
            }
        );
        Ok(prices)
    }
}
