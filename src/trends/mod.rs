//! Balance history over time: stored snapshots, lazy backfill for sparse
//! histories, and an unpersisted fallback series.

mod models;
mod seeder;
mod service;
mod synthetic;

pub use models::{DaysBack, SeriesSource, TrendSeries};
pub use seeder::{backfill_walk, SeedReport, Seeder};
pub use service::TrendService;
pub use synthetic::{seed_from_id, virtual_series};
