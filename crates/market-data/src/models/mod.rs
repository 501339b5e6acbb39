//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Type aliases for common identifiers (ProviderId, Currency)
//! - `interval` - Bar granularity (daily, hourly, 5-minute)
//! - `quote` - Quote data structure returned by providers

mod interval;
mod quote;
mod types;

pub use interval::Interval;
pub use quote::Quote;
pub use types::{Currency, ProviderId};
