//! Writing today's totals.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::identity::Identity;
use crate::models::{DailySnapshot, Id, NewSnapshot};
use crate::rates::RateService;
use crate::storage::Storage;
use crate::valuation::aggregate_total;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("only admins can snapshot every user")]
    Forbidden,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct SnapshotService {
    storage: Arc<dyn Storage>,
    rates: Arc<RateService>,
    clock: Arc<dyn Clock>,
}

impl SnapshotService {
    pub fn new(storage: Arc<dyn Storage>, rates: Arc<RateService>) -> Self {
        Self {
            storage,
            rates,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Explicit "snapshot my balance now". Failures reach the caller.
    pub async fn create_today_snapshot(
        &self,
        identity: Option<&Identity>,
    ) -> Result<DailySnapshot, SnapshotError> {
        let identity = identity.ok_or(SnapshotError::Unauthenticated)?;
        Ok(self.snapshot_user(&identity.id).await?)
    }

    /// Upsert today's row for `user_id` from current accounts and rates.
    ///
    /// A user without accounts gets a zero total.
    pub async fn snapshot_user(&self, user_id: &Id) -> anyhow::Result<DailySnapshot> {
        let accounts = self.storage.list_accounts(Some(user_id)).await?;
        let rates = self.rates.rates_map().await?;
        let base = self.rates.base_currency();
        let total = aggregate_total(&accounts, &rates, base);

        let row = NewSnapshot::new(
            user_id.clone(),
            self.clock.today(),
            total,
            base,
            self.clock.now(),
        );
        let stored = self.storage.upsert_snapshot(&row).await?;
        info!(
            user = %user_id,
            date = %stored.snapshot_date,
            total = stored.total_balance_minor,
            "snapshot saved"
        );
        Ok(stored)
    }

    /// Refresh today's snapshot in the background after an account change.
    ///
    /// Never fails the caller. The handle is only useful to callers that want
    /// to wait, such as a CLI about to exit.
    pub fn snapshot_after_mutation(&self, user_id: Id) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.snapshot_user(&user_id).await {
                warn!(user = %user_id, error = %e, "post-mutation snapshot failed");
            }
        })
    }

    /// Recompute every user's total for `date` (default today) in one
    /// set-based write. Admin only.
    pub async fn snapshot_all_users(
        &self,
        identity: Option<&Identity>,
        date: Option<NaiveDate>,
    ) -> Result<usize, SnapshotError> {
        let identity = identity.ok_or(SnapshotError::Unauthenticated)?;
        if !identity.is_admin() {
            return Err(SnapshotError::Forbidden);
        }

        self.rates.ensure_fresh().await?;
        let date = date.unwrap_or_else(|| self.clock.today());
        let written = self
            .storage
            .replace_snapshots_for_date(date, self.rates.base_currency(), self.clock.now())
            .await?;
        info!(admin = %identity.id, date = %date, users = written, "snapshotted all users");
        Ok(written)
    }
}
