//! In-memory storage implementation for testing.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use super::Storage;
use crate::models::{Account, DailySnapshot, ExchangeRate, Id, NewSnapshot, Scope, TrendPoint};
use crate::valuation::{aggregate_by_owner, rates_from_slice};

#[derive(Default)]
struct SnapshotTable {
    next_id: i64,
    rows: HashMap<(Id, NaiveDate), DailySnapshot>,
}

impl SnapshotTable {
    fn insert(&mut self, snapshot: NewSnapshot) -> DailySnapshot {
        self.next_id += 1;
        let row = snapshot.into_snapshot(self.next_id);
        self.rows
            .insert((row.user_id.clone(), row.snapshot_date), row.clone());
        row
    }
}

/// In-memory storage for testing purposes.
pub struct MemoryStorage {
    accounts: Mutex<HashMap<Id, Account>>,
    rates: Mutex<HashMap<String, ExchangeRate>>,
    snapshots: Mutex<SnapshotTable>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            rates: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(SnapshotTable::default()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(mut rows: Vec<DailySnapshot>) -> Vec<DailySnapshot> {
    rows.sort_by(|a, b| b.snapshot_date.cmp(&a.snapshot_date));
    rows
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn list_accounts(&self, owner: Option<&Id>) -> Result<Vec<Account>> {
        let accounts = self.accounts.lock().await;
        let mut out: Vec<Account> = accounts
            .values()
            .filter(|a| owner.map_or(true, |o| &a.owner_id == o))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (&a.owner_id, &a.account_name, &a.id).cmp(&(&b.owner_id, &b.account_name, &b.id))
        });
        Ok(out)
    }

    async fn get_account(&self, id: &Id) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(id).cloned())
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn delete_account(&self, id: &Id) -> Result<bool> {
        let mut accounts = self.accounts.lock().await;
        Ok(accounts.remove(id).is_some())
    }

    async fn account_currency_codes(&self) -> Result<Vec<String>> {
        let accounts = self.accounts.lock().await;
        let mut codes: Vec<String> = accounts.values().map(|a| a.currency_code.clone()).collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }

    async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>> {
        let rates = self.rates.lock().await;
        let mut out: Vec<ExchangeRate> = rates.values().cloned().collect();
        out.sort_by(|a, b| a.currency_code.cmp(&b.currency_code));
        Ok(out)
    }

    async fn upsert_exchange_rates(&self, new_rates: &[ExchangeRate]) -> Result<()> {
        let mut rates = self.rates.lock().await;
        for rate in new_rates {
            rates.insert(rate.currency_code.clone(), rate.clone());
        }
        Ok(())
    }

    async fn upsert_snapshot(&self, snapshot: &NewSnapshot) -> Result<DailySnapshot> {
        let mut table = self.snapshots.lock().await;
        let key = (snapshot.user_id.clone(), snapshot.snapshot_date);
        if let Some(existing) = table.rows.get_mut(&key) {
            existing.total_balance_minor = snapshot.total_balance_minor;
            existing.currency_code = snapshot.currency_code.clone();
            return Ok(existing.clone());
        }
        Ok(table.insert(snapshot.clone()))
    }

    async fn replace_snapshots_for_date(
        &self,
        date: NaiveDate,
        base_currency: &str,
        created_at: DateTime<Utc>,
    ) -> Result<usize> {
        // Lock order: accounts, rates, snapshots.
        let accounts = self.accounts.lock().await;
        let rates = self.rates.lock().await;
        let mut table = self.snapshots.lock().await;

        let accounts: Vec<Account> = accounts.values().cloned().collect();
        let rate_list: Vec<ExchangeRate> = rates.values().cloned().collect();
        let rates_map = rates_from_slice(&rate_list, base_currency);
        let totals: BTreeMap<Id, i64> = aggregate_by_owner(&accounts, &rates_map, base_currency);

        table.rows.retain(|(_, d), _| *d != date);
        for (owner, total) in &totals {
            table.insert(NewSnapshot::new(
                owner.clone(),
                date,
                *total,
                base_currency,
                created_at,
            ));
        }
        Ok(totals.len())
    }

    async fn insert_snapshots(&self, snapshots: &[NewSnapshot]) -> Result<usize> {
        let mut table = self.snapshots.lock().await;
        let mut inserted = 0;
        for snapshot in snapshots {
            let key = (snapshot.user_id.clone(), snapshot.snapshot_date);
            if !table.rows.contains_key(&key) {
                table.insert(snapshot.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn user_snapshots(
        &self,
        user_id: &Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySnapshot>> {
        let table = self.snapshots.lock().await;
        let rows = table
            .rows
            .values()
            .filter(|s| &s.user_id == user_id && s.snapshot_date >= start && s.snapshot_date <= end)
            .cloned()
            .collect();
        Ok(newest_first(rows))
    }

    async fn daily_totals(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TrendPoint>> {
        let table = self.snapshots.lock().await;
        let mut totals: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for s in table.rows.values() {
            if s.snapshot_date >= start && s.snapshot_date <= end {
                let entry = totals.entry(s.snapshot_date).or_insert(0);
                *entry = entry.saturating_add(s.total_balance_minor);
            }
        }
        Ok(totals
            .into_iter()
            .rev()
            .map(|(date, total)| TrendPoint::new(date, total))
            .collect())
    }

    async fn count_snapshots(&self, scope: &Scope) -> Result<u64> {
        let table = self.snapshots.lock().await;
        let count = match scope {
            Scope::All => table.rows.len(),
            Scope::User(user) => table.rows.keys().filter(|(u, _)| u == user).count(),
        };
        Ok(count as u64)
    }

    async fn snapshot_keys(&self, scope: &Scope) -> Result<HashSet<(Id, NaiveDate)>> {
        let table = self.snapshots.lock().await;
        Ok(table
            .rows
            .keys()
            .filter(|(u, _)| scope.user().map_or(true, |user| u == user))
            .cloned()
            .collect())
    }
}
