use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pricevault_core::cache::PriceCache;
use pricevault_core::calendar::TradingCalendar;
use pricevault_core::prices::{PriceService, PriceServiceConfig, PriceStore};
use pricevault_core::rate_limit::{RateLimitConfig, RateLimiter};
use pricevault_core::utils::{Clock, SystemClock};
use pricevault_market_data::{AlphaVantageProvider, MarketDataProvider};
use pricevault_storage_sqlite::{open, PriceRepository, SqliteBudgetStore};

use crate::config::{Config, LogFormat};

/// Wired engine plus the handles the commands use directly.
pub struct Engine {
    pub service: PriceService,
    pub limiter: Arc<RateLimiter>,
    pub durable: Arc<dyn PriceStore>,
}

/// Logs go to stderr so that stdout carries only command output.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Opens the database and wires every tier. Must run inside the Tokio runtime.
pub fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let (pool, writer) = open(&config.db_path)
        .with_context(|| format!("opening database at {}", config.db_path))?;
    tracing::info!("Database path in use: {}", config.db_path);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig {
            requests_per_minute: config.requests_per_minute,
            requests_per_day: config.requests_per_day,
            timezone: config.market_tz,
        },
        Arc::new(SqliteBudgetStore::new(pool.clone(), writer.clone())),
        clock.clone(),
    )?);

    let durable: Arc<dyn PriceStore> = Arc::new(PriceRepository::new(pool, writer));

    let provider: Arc<dyn MarketDataProvider> = Arc::new(AlphaVantageProvider::with_timeout(
        config.require_api_key()?.to_string(),
        config.upstream_timeout,
    ));

    let service_config = PriceServiceConfig {
        upstream_timeout: config.upstream_timeout,
        market_timezone: config.market_tz,
        max_concurrency: config.requests_per_minute as usize,
        ..Default::default()
    };

    let service = PriceService::new(
        Arc::new(PriceCache::in_memory()),
        durable.clone(),
        provider,
        limiter.clone(),
        Arc::new(TradingCalendar::nyse()),
        clock,
        service_config,
    )?;

    Ok(Engine {
        service,
        limiter,
        durable,
    })
}
