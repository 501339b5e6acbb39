//! Pricevault Market Data Crate
//!
//! This crate talks to the upstream market data provider on behalf of the
//! fetch & cache engine in `pricevault-core`.
//!
//! # Overview
//!
//! The market data crate supports:
//! - A provider-agnostic [`MarketDataProvider`] trait (latest quote + history)
//! - Daily, hourly and 5-minute bars
//! - The Alpha Vantage provider
//! - Quote validation before data reaches the caches
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |  Fetch Engine    | --> |  symbol + range  |
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    Provider      |  (Alpha Vantage)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  QuoteValidator  |
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |     Quote        |  (market data)
//!                          +------------------+
//! ```
//!
//! The provider does not rate-limit itself. Its published quota is exposed
//! through [`RateLimit`] so the caller can own and enforce the budget.

pub mod errors;
pub mod models;
pub mod provider;
pub mod validation;

pub use models::{Currency, Interval, ProviderId, Quote};

pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub use validation::QuoteValidator;
