//! SQLite-backed storage.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::debug;

use super::Storage;
use crate::audit::EventRecorder;
use crate::models::{Account, DailySnapshot, ExchangeRate, Id, NewSnapshot, Scope, TrendPoint};

const SNAPSHOT_COLUMNS: &str =
    "id, user_id, total_balance_minor, currency_code, snapshot_date, created_at";

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }
        let mut conn = Connection::open(path)
            .with_context(|| format!("Open DB at {}", path.display()))?;
        init_schema(&mut conn)?;
        debug!(path = %path.display(), "opened sqlite storage");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("Open in-memory DB")?;
        init_schema(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS accounts(
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        currency_code TEXT NOT NULL,
        balance_minor INTEGER NOT NULL,
        bank_name TEXT NOT NULL DEFAULT '',
        account_name TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts(owner_id);

    CREATE TABLE IF NOT EXISTS exchange_rates(
        currency_code TEXT PRIMARY KEY,
        rate_to_base TEXT NOT NULL, -- 1 unit = rate_to_base units of base
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS daily_snapshots(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        total_balance_minor INTEGER NOT NULL,
        currency_code TEXT NOT NULL,
        snapshot_date TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(user_id, snapshot_date)
    );
    CREATE INDEX IF NOT EXISTS idx_daily_snapshots_date ON daily_snapshots(snapshot_date);

    CREATE TABLE IF NOT EXISTS audit_events(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        actor_id TEXT NOT NULL,
        event_name TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    )
    .context("Failed to initialize schema")?;
    Ok(())
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: Id::from(row.get::<_, String>(0)?),
        owner_id: Id::from(row.get::<_, String>(1)?),
        currency_code: row.get(2)?,
        balance_minor: row.get(3)?,
        bank_name: row.get(4)?,
        account_name: row.get(5)?,
    })
}

fn rate_from_row(row: &Row<'_>) -> rusqlite::Result<ExchangeRate> {
    let raw: String = row.get(1)?;
    let rate_to_base = Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    Ok(ExchangeRate {
        currency_code: row.get(0)?,
        rate_to_base,
        updated_at: row.get(2)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<DailySnapshot> {
    Ok(DailySnapshot {
        id: row.get(0)?,
        user_id: Id::from(row.get::<_, String>(1)?),
        total_balance_minor: row.get(2)?,
        currency_code: row.get(3)?,
        snapshot_date: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[async_trait::async_trait]
impl Storage for SqliteStorage {
    async fn list_accounts(&self, owner: Option<&Id>) -> Result<Vec<Account>> {
        let conn = self.conn.lock().await;
        let sql = "SELECT id, owner_id, currency_code, balance_minor, bank_name, account_name
                   FROM accounts
                   WHERE ?1 IS NULL OR owner_id = ?1
                   ORDER BY owner_id, account_name, id";
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![owner.map(Id::as_str)], account_from_row)?;
        let accounts = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    async fn get_account(&self, id: &Id) -> Result<Option<Account>> {
        let conn = self.conn.lock().await;
        let account = conn
            .query_row(
                "SELECT id, owner_id, currency_code, balance_minor, bank_name, account_name
                 FROM accounts WHERE id = ?1",
                params![id.as_str()],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO accounts(id, owner_id, currency_code, balance_minor, bank_name, account_name)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                owner_id=excluded.owner_id,
                currency_code=excluded.currency_code,
                balance_minor=excluded.balance_minor,
                bank_name=excluded.bank_name,
                account_name=excluded.account_name",
            params![
                account.id.as_str(),
                account.owner_id.as_str(),
                account.currency_code,
                account.balance_minor,
                account.bank_name,
                account.account_name,
            ],
        )
        .with_context(|| format!("Failed to save account {}", account.id))?;
        Ok(())
    }

    async fn delete_account(&self, id: &Id) -> Result<bool> {
        let conn = self.conn.lock().await;
        let removed = conn.execute("DELETE FROM accounts WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }

    async fn account_currency_codes(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT DISTINCT currency_code FROM accounts ORDER BY currency_code")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT currency_code, rate_to_base, updated_at
             FROM exchange_rates ORDER BY currency_code",
        )?;
        let rows = stmt.query_map([], rate_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn upsert_exchange_rates(&self, rates: &[ExchangeRate]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO exchange_rates(currency_code, rate_to_base, updated_at)
                 VALUES(?1, ?2, ?3)
                 ON CONFLICT(currency_code) DO UPDATE SET
                    rate_to_base=excluded.rate_to_base,
                    updated_at=excluded.updated_at",
            )?;
            for rate in rates {
                stmt.execute(params![
                    rate.currency_code,
                    rate.rate_to_base.to_string(),
                    rate.updated_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn upsert_snapshot(&self, snapshot: &NewSnapshot) -> Result<DailySnapshot> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "INSERT INTO daily_snapshots(user_id, total_balance_minor, currency_code, snapshot_date, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, snapshot_date) DO UPDATE SET
                total_balance_minor=excluded.total_balance_minor,
                currency_code=excluded.currency_code
             RETURNING {SNAPSHOT_COLUMNS}"
        );
        let row = conn
            .query_row(
                &sql,
                params![
                    snapshot.user_id.as_str(),
                    snapshot.total_balance_minor,
                    snapshot.currency_code,
                    snapshot.snapshot_date,
                    snapshot.created_at,
                ],
                snapshot_from_row,
            )
            .with_context(|| {
                format!(
                    "Failed to upsert snapshot for {} on {}",
                    snapshot.user_id, snapshot.snapshot_date
                )
            })?;
        Ok(row)
    }

    async fn replace_snapshots_for_date(
        &self,
        date: NaiveDate,
        base_currency: &str,
        created_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM daily_snapshots WHERE snapshot_date = ?1",
            params![date],
        )?;
        // Missing rates count as 1. ROUND is half away from zero, per term.
        let written = tx.execute(
            "INSERT INTO daily_snapshots(user_id, total_balance_minor, currency_code, snapshot_date, created_at)
             SELECT a.owner_id,
                    SUM(CASE
                        WHEN a.currency_code = ?2 THEN a.balance_minor
                        ELSE CAST(ROUND(a.balance_minor * COALESCE(CAST(r.rate_to_base AS REAL), 1.0)) AS INTEGER)
                    END),
                    ?2, ?1, ?3
             FROM accounts a
             LEFT JOIN exchange_rates r ON r.currency_code = a.currency_code
             GROUP BY a.owner_id",
            params![date, base_currency, created_at],
        )?;
        tx.commit()?;
        debug!(date = %date, removed, written, "replaced snapshots for date");
        Ok(written)
    }

    async fn insert_snapshots(&self, snapshots: &[NewSnapshot]) -> Result<usize> {
        if snapshots.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO daily_snapshots(user_id, total_balance_minor, currency_code, snapshot_date, created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5)",
            )?;
            for s in snapshots {
                inserted += stmt.execute(params![
                    s.user_id.as_str(),
                    s.total_balance_minor,
                    s.currency_code,
                    s.snapshot_date,
                    s.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    async fn user_snapshots(
        &self,
        user_id: &Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySnapshot>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM daily_snapshots
             WHERE user_id = ?1 AND snapshot_date >= ?2 AND snapshot_date <= ?3
             ORDER BY snapshot_date DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id.as_str(), start, end], snapshot_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn daily_totals(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TrendPoint>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT snapshot_date, SUM(total_balance_minor) FROM daily_snapshots
             WHERE snapshot_date >= ?1 AND snapshot_date <= ?2
             GROUP BY snapshot_date
             ORDER BY snapshot_date DESC",
        )?;
        let rows = stmt.query_map(params![start, end], |r| {
            Ok(TrendPoint::new(r.get(0)?, r.get(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn count_snapshots(&self, scope: &Scope) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM daily_snapshots WHERE ?1 IS NULL OR user_id = ?1",
            params![scope.user().map(Id::as_str)],
            |r| r.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn snapshot_keys(&self, scope: &Scope) -> Result<HashSet<(Id, NaiveDate)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT user_id, snapshot_date FROM daily_snapshots
             WHERE ?1 IS NULL OR user_id = ?1",
        )?;
        let rows = stmt.query_map(params![scope.user().map(Id::as_str)], |r| {
            Ok((Id::from(r.get::<_, String>(0)?), r.get::<_, NaiveDate>(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<HashSet<_>>>()?)
    }
}

#[async_trait::async_trait]
impl EventRecorder for SqliteStorage {
    async fn record_event(
        &self,
        actor_id: &Id,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO audit_events(actor_id, event_name, payload) VALUES(?1, ?2, ?3)",
            params![actor_id.as_str(), event_name, payload.to_string()],
        )?;
        Ok(())
    }
}
