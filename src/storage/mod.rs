mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{Account, DailySnapshot, ExchangeRate, Id, NewSnapshot, Scope, TrendPoint};

/// Storage trait for accounts, exchange rates and daily snapshots.
///
/// Snapshot queries return rows newest-first; callers that need chronological
/// order sort for themselves.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    // Accounts
    /// All accounts, or only those owned by `owner`.
    async fn list_accounts(&self, owner: Option<&Id>) -> Result<Vec<Account>>;
    async fn get_account(&self, id: &Id) -> Result<Option<Account>>;
    async fn save_account(&self, account: &Account) -> Result<()>;
    /// Returns false when the account did not exist.
    async fn delete_account(&self, id: &Id) -> Result<bool>;
    /// Distinct currency codes held by any account.
    async fn account_currency_codes(&self) -> Result<Vec<String>>;

    // Exchange rates
    async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>>;
    /// Insert or update each rate keyed on its currency code.
    async fn upsert_exchange_rates(&self, rates: &[ExchangeRate]) -> Result<()>;

    // Snapshots
    /// Insert or update the row for `(user_id, snapshot_date)` in one statement.
    ///
    /// On conflict the total and currency are replaced; `id` and `created_at`
    /// of the existing row are kept.
    async fn upsert_snapshot(&self, snapshot: &NewSnapshot) -> Result<DailySnapshot>;

    /// Replace every snapshot on `date` with one freshly aggregated row per
    /// account owner, computed from the stored accounts and rates.
    ///
    /// Runs as a single transaction. Returns the number of rows written.
    async fn replace_snapshots_for_date(
        &self,
        date: NaiveDate,
        base_currency: &str,
        created_at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Insert rows in one batch, skipping any `(user_id, snapshot_date)` that
    /// already exists. Returns the number of rows actually inserted.
    async fn insert_snapshots(&self, snapshots: &[NewSnapshot]) -> Result<usize>;

    /// One user's snapshots with `start <= snapshot_date <= end`.
    async fn user_snapshots(
        &self,
        user_id: &Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySnapshot>>;

    /// Totals summed across every user, one point per date in `[start, end]`.
    async fn daily_totals(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TrendPoint>>;

    async fn count_snapshots(&self, scope: &Scope) -> Result<u64>;

    /// Existing `(user_id, snapshot_date)` keys within `scope`.
    async fn snapshot_keys(&self, scope: &Scope) -> Result<HashSet<(Id, NaiveDate)>>;
}

/// Points for `scope` in `[start, end]`, in storage order.
pub async fn query_snapshots(
    storage: &dyn Storage,
    scope: &Scope,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TrendPoint>> {
    match scope {
        Scope::User(user_id) => Ok(storage
            .user_snapshots(user_id, start, end)
            .await?
            .iter()
            .map(TrendPoint::from)
            .collect()),
        Scope::All => storage.daily_totals(start, end).await,
    }
}
