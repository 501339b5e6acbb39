//! Prices module - price observations and the tiered fetch orchestrator.

mod client;
mod constants;
mod errors;
mod model;
mod service;
mod store;
mod types;


pub use client::{quote_to_point, UpstreamClient};
pub use constants::*;
pub use errors::PriceError;
pub use model::{session_day, Money, Ohlcv, PricePoint, PriceSource};
pub use service::{PriceService, PriceServiceConfig, PriceServiceTrait};
pub use store::PriceStore;
pub use types::{CacheKey, Day, Ticker};
