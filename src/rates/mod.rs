//! Exchange rates into the base currency.
//!
//! Rates are stored as "1 unit of X = r units of base". The upstream API
//! quotes the other way round, so every value is inverted on the way in.

mod frankfurter;
mod service;
mod source;

pub use frankfurter::FrankfurterRateSource;
pub use service::RateService;
pub use source::{NoopRateSource, RateSource};
