//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that the upstream provider implements
//! - Provider capabilities and published quota
//! - The Alpha Vantage implementation
//!
//! Providers are thin: they translate a symbol and a window into one HTTP
//! call and parse the result. Budgeting, caching and fallback belong to the
//! caller.

mod capabilities;
mod traits;

pub mod alpha_vantage;

pub use capabilities::{ProviderCapabilities, RateLimit};
pub use traits::MarketDataProvider;
