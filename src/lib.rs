pub mod audit;
pub mod clock;
pub mod config;
pub mod duration;
pub mod format;
pub mod identity;
pub mod models;
pub mod rates;
pub mod snapshots;
pub mod staleness;
pub mod storage;
pub mod trends;
pub mod valuation;
