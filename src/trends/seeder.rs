use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Days;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::models::{Account, Id, NewSnapshot, Scope};
use crate::rates::RateService;
use crate::storage::Storage;
use crate::valuation::aggregate_total;

const DEFAULT_WINDOW_DAYS: u32 = 90;
const MIN_STEP: f64 = 0.004;
const MAX_STEP: f64 = 0.008;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub owners_seeded: usize,
    pub rows_written: usize,
}

/// Random walk backwards from `anchor`.
///
/// Index 0 is today and always equals `anchor`; index `i` is `i` days earlier,
/// each step moving 0.4%-0.8% up or down from the later day.
pub fn backfill_walk<R: Rng + ?Sized>(anchor: i64, days: u32, rng: &mut R) -> Vec<i64> {
    let mut values = Vec::with_capacity(days as usize);
    let mut current = anchor;
    for i in 0..days {
        if i > 0 {
            let step = rng.gen_range(MIN_STEP..MAX_STEP);
            let signed = if rng.gen_bool(0.5) { step } else { -step };
            current = (current as f64 * (1.0 + signed)).round() as i64;
        }
        values.push(current);
    }
    values
}

/// Fills missing days of a sparse history with plausible values anchored at
/// each owner's real current total.
pub struct Seeder {
    storage: Arc<dyn Storage>,
    rates: Arc<RateService>,
    clock: Arc<dyn Clock>,
    window_days: u32,
    rng_seed: Option<u64>,
}

impl Seeder {
    pub fn new(storage: Arc<dyn Storage>, rates: Arc<RateService>) -> Self {
        Self {
            storage,
            rates,
            clock: Arc::new(SystemClock),
            window_days: DEFAULT_WINDOW_DAYS,
            rng_seed: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    /// Make the walk reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Backfill every owner in `scope` and write all new rows in one batch.
    pub async fn seed_scope(&self, scope: &Scope) -> Result<SeedReport> {
        let accounts = self.storage.list_accounts(scope.user()).await?;
        if accounts.is_empty() {
            debug!(scope = scope.label(), "no accounts; nothing to seed");
            return Ok(SeedReport::default());
        }

        let mut by_owner: BTreeMap<Id, Vec<Account>> = BTreeMap::new();
        for account in accounts {
            by_owner
                .entry(account.owner_id.clone())
                .or_default()
                .push(account);
        }

        let rates = self.rates.rates_map().await?;
        let base = self.rates.base_currency();
        let existing = self.storage.snapshot_keys(scope).await?;
        let today = self.clock.today();
        let created_at = self.clock.now();

        let mut rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut report = SeedReport::default();
        let mut rows = Vec::new();
        for (owner, owner_accounts) in &by_owner {
            if owner_accounts.iter().all(|a| a.balance_minor == 0) {
                debug!(owner = %owner, "all balances zero; skipping");
                continue;
            }
            let anchor = aggregate_total(owner_accounts, &rates, base);
            let walk = backfill_walk(anchor, self.window_days, &mut rng);

            let before = rows.len();
            for (offset, value) in walk.into_iter().enumerate() {
                let Some(date) = today.checked_sub_days(Days::new(offset as u64)) else {
                    break;
                };
                if existing.contains(&(owner.clone(), date)) {
                    continue;
                }
                rows.push(NewSnapshot::new(owner.clone(), date, value, base, created_at));
            }
            if rows.len() > before {
                report.owners_seeded += 1;
            }
        }

        report.rows_written = self.storage.insert_snapshots(&rows).await?;
        info!(
            scope = scope.label(),
            owners = report.owners_seeded,
            rows = report.rows_written,
            window_days = self.window_days,
            "seeded snapshot history"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_starts_at_anchor() {
        let mut rng = StdRng::seed_from_u64(7);
        let walk = backfill_walk(100000, 90, &mut rng);
        assert_eq!(walk.len(), 90);
        assert_eq!(walk[0], 100000);
    }

    #[test]
    fn each_step_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let walk = backfill_walk(10_000_000, 90, &mut rng);
        for pair in walk.windows(2) {
            let ratio = pair[1] as f64 / pair[0] as f64;
            let delta = (ratio - 1.0).abs();
            assert!(
                (0.0039..=0.0081).contains(&delta),
                "step {delta} outside 0.4%-0.8%"
            );
        }
    }

    #[test]
    fn zero_anchor_stays_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(backfill_walk(0, 10, &mut rng).iter().all(|v| *v == 0));
    }
}
