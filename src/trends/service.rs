use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, warn};

use super::models::{DaysBack, SeriesSource, TrendSeries};
use super::seeder::Seeder;
use super::synthetic::virtual_series;
use crate::audit::{record_best_effort, EventRecorder, TracingEventRecorder};
use crate::clock::{Clock, SystemClock};
use crate::identity::Identity;
use crate::models::{Scope, TrendPoint};
use crate::rates::RateService;
use crate::storage::{query_snapshots, Storage};
use crate::valuation::{aggregate_total, RatesMap};

const DEFAULT_SPARSITY_THRESHOLD: u64 = 10;
const DEFAULT_MIN_POINTS: usize = 5;
const DEFAULT_SEED_WINDOW_DAYS: u32 = 90;

/// Answers "how has my balance moved over the last N days".
///
/// Every answer is ascending by date. A sparse history is backfilled first;
/// if it is still too thin a deterministic virtual series is returned, as
/// long as the scope has at least one account.
pub struct TrendService {
    storage: Arc<dyn Storage>,
    rates: Arc<RateService>,
    recorder: Arc<dyn EventRecorder>,
    clock: Arc<dyn Clock>,
    sparsity_threshold: u64,
    min_points: usize,
    seed_window_days: u32,
    rng_seed: Option<u64>,
}

impl TrendService {
    pub fn new(storage: Arc<dyn Storage>, rates: Arc<RateService>) -> Self {
        Self {
            storage,
            rates,
            recorder: Arc::new(TracingEventRecorder),
            clock: Arc::new(SystemClock),
            sparsity_threshold: DEFAULT_SPARSITY_THRESHOLD,
            min_points: DEFAULT_MIN_POINTS,
            seed_window_days: DEFAULT_SEED_WINDOW_DAYS,
            rng_seed: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sparsity_threshold(mut self, threshold: u64) -> Self {
        self.sparsity_threshold = threshold;
        self
    }

    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    pub fn with_seed_window_days(mut self, days: u32) -> Self {
        self.seed_window_days = days;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    fn seeder(&self) -> Seeder {
        let seeder = Seeder::new(self.storage.clone(), self.rates.clone())
            .with_clock(self.clock.clone())
            .with_window_days(self.seed_window_days);
        match self.rng_seed {
            Some(seed) => seeder.with_rng_seed(seed),
            None => seeder,
        }
    }

    /// Trend for whoever `identity` is. `None` when nobody is signed in.
    pub async fn get_trend(
        &self,
        identity: Option<&Identity>,
        days_back: DaysBack,
    ) -> Result<Option<TrendSeries>> {
        let Some(identity) = identity else {
            debug!("no identity; returning nothing");
            return Ok(None);
        };

        let scope = Scope::for_identity(identity);
        debug!(user = %identity.id, scope = scope.label(), "scope resolved");

        let count = match self.storage.count_snapshots(&scope).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(scope = scope.label(), error = %e, "snapshot count failed; skipping seeding");
                None
            }
        };
        debug!(scope = scope.label(), count = ?count, "sparsity checked");

        let mut source = SeriesSource::Real;
        if let Some(count) = count.filter(|c| *c < self.sparsity_threshold) {
            match self.seeder().seed_scope(&scope).await {
                Ok(report) => {
                    debug!(
                        scope = scope.label(),
                        existing = count,
                        rows = report.rows_written,
                        "seeded"
                    );
                    if report.rows_written > 0 {
                        source = SeriesSource::Seeded;
                    }
                }
                Err(e) => warn!(scope = scope.label(), error = %e, "seeding failed; continuing"),
            }
        }

        record_best_effort(
            self.recorder.as_ref(),
            &identity.id,
            "trend_fetch",
            json!({
                "scope": scope.label(),
                "count": count,
                "days_back": days_back.as_raw(),
            }),
        )
        .await;

        let today = self.clock.today();
        let (start, end) = days_back.date_range(today);
        let mut points = match query_snapshots(self.storage.as_ref(), &scope, start, end).await {
            Ok(points) => points,
            Err(e) => {
                warn!(
                    scope = scope.label(),
                    error = %e,
                    "snapshot query failed; treating history as empty"
                );
                Vec::new()
            }
        };
        points.sort_by_key(|p| p.date);
        debug!(
            scope = scope.label(),
            start = %start,
            end = %end,
            points = points.len(),
            "range queried"
        );

        if points.len() < self.min_points {
            if let Some(virtual_points) = self.virtual_fallback(identity, &scope, days_back).await {
                debug!(scope = scope.label(), points = virtual_points.len(), "virtual fallback");
                points = virtual_points;
                source = SeriesSource::Virtual;
            }
        }

        Ok(Some(TrendSeries {
            scope: scope.label().to_string(),
            source,
            base_currency: self.rates.base_currency().to_string(),
            points,
        }))
    }

    /// `None` when the scope has no accounts, or they cannot be read.
    async fn virtual_fallback(
        &self,
        identity: &Identity,
        scope: &Scope,
        days_back: DaysBack,
    ) -> Option<Vec<TrendPoint>> {
        let accounts = match self.storage.list_accounts(scope.user()).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(scope = scope.label(), error = %e, "accounts unavailable; no virtual series");
                return None;
            }
        };
        if accounts.is_empty() {
            return None;
        }

        let base = self.rates.base_currency();
        let rates = match self.rates.rates_map().await {
            Ok(rates) => rates,
            Err(e) => {
                warn!(error = %e, "rates unavailable; valuing virtual series at 1:1");
                RatesMap::from([(base.to_string(), Decimal::ONE)])
            }
        };
        let anchor = aggregate_total(&accounts, &rates, base);

        Some(virtual_series(
            identity.id.as_str(),
            anchor,
            self.clock.today(),
            days_back.virtual_days(),
        ))
    }
}
