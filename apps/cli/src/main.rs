//! PriceVault CLI: serves prices through the tiered cache engine.
//!
//! Commands:
//! - `current` - best available current price for one or more tickers
//! - `at` - price in effect at an instant
//! - `history` - observations for a date range
//! - `budget` - remaining upstream request budget
//! - `prune` - drop stored observations before a date

mod config;
mod main_lib;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use pricevault_core::prices::{Day, PriceServiceTrait, Ticker};
use pricevault_market_data::Interval;

use config::Config;
use main_lib::{build_engine, init_tracing};

#[derive(Parser)]
#[command(name = "pricevault", about = "Rate-limited market price cache")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Current price; several tickers share one budget.
    Current {
        #[arg(required = true)]
        tickers: Vec<String>,
    },
    /// Price in effect at an RFC 3339 instant.
    At {
        ticker: String,
        /// e.g. 2024-01-12T20:00:00Z
        at: String,
    },
    /// Observations between two dates (YYYY-MM-DD), inclusive.
    History {
        ticker: String,
        start: String,
        end: String,
        /// 1d, 1h or 5m.
        #[arg(long, default_value = "1d")]
        interval: String,
    },
    /// Show the upstream request budget.
    Budget,
    /// Delete stored observations dated before the given day.
    Prune { before: String },
}

fn parse_ticker(raw: &str) -> Result<Ticker> {
    Ticker::new(raw).with_context(|| format!("invalid ticker {:?}", raw))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date {:?}, expected YYYY-MM-DD", raw))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);
    let engine = build_engine(&config)?;

    match cli.command {
        Commands::Current { tickers } => {
            let tickers = tickers
                .iter()
                .map(|t| parse_ticker(t))
                .collect::<Result<Vec<_>>>()?;

            if let [ticker] = tickers.as_slice() {
                let point = engine.service.get_current_price(ticker).await?;
                print_json(&point)?;
            } else {
                let prices = engine.service.get_batch_prices(&tickers).await?;
                let mut ordered: Vec<_> = prices.into_values().collect();
                ordered.sort_by(|a, b| a.ticker.cmp(&b.ticker));
                print_json(&ordered)?;
            }
        }
        Commands::At { ticker, at } => {
            let at: DateTime<Utc> = DateTime::parse_from_rfc3339(&at)
                .with_context(|| format!("invalid instant {:?}", at))?
                .with_timezone(&Utc);
            let point = engine.service.get_price_at(&parse_ticker(&ticker)?, at).await?;
            print_json(&point)?;
        }
        Commands::History {
            ticker,
            start,
            end,
            interval,
        } => {
            let interval: Interval = match interval.parse() {
                Ok(i) => i,
                Err(e) => bail!("{}", e),
            };
            let points = engine
                .service
                .get_price_history(
                    &parse_ticker(&ticker)?,
                    parse_date(&start)?,
                    parse_date(&end)?,
                    interval,
                )
                .await?;
            tracing::info!("{} observations", points.len());
            print_json(&points)?;
        }
        Commands::Budget => {
            let budget = engine.limiter.budget().await?;
            let wait = engine.limiter.time_until_available().await;
            print_json(&serde_json::json!({
                "budget": budget,
                "requestsPerMinute": engine.limiter.config().requests_per_minute,
                "requestsPerDay": engine.limiter.config().requests_per_day,
                "secondsUntilAvailable": wait.as_secs(),
            }))?;
        }
        Commands::Prune { before } => {
            let removed = engine.durable.delete_before(Day(parse_date(&before)?)).await?;
            tracing::info!("Removed {} stored observations before {}", removed, before);
        }
    }

    Ok(())
}
