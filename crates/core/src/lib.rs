//! PriceVault Core - the market data fetch and cache engine.
//!
//! This crate holds the trading calendar, the request budget, the fast cache
//! tier and the orchestrator that ties them together. It is
//! database-agnostic and defines traits that are implemented by the
//! `storage-sqlite` crate.

pub mod cache;
pub mod calendar;
pub mod errors;
pub mod prices;
pub mod rate_limit;
pub mod utils;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
