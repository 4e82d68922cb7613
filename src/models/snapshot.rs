use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Id;
use crate::identity::Identity;

/// A persisted total for one user on one calendar day, in the base currency.
///
/// There is at most one row per `(user_id, snapshot_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub id: i64,
    pub user_id: Id,
    pub total_balance_minor: i64,
    pub currency_code: String,
    pub snapshot_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A snapshot row that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub user_id: Id,
    pub total_balance_minor: i64,
    pub currency_code: String,
    pub snapshot_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl NewSnapshot {
    pub fn new(
        user_id: Id,
        snapshot_date: NaiveDate,
        total_balance_minor: i64,
        currency_code: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            total_balance_minor,
            currency_code: currency_code.to_string(),
            snapshot_date,
            created_at,
        }
    }

    pub fn into_snapshot(self, id: i64) -> DailySnapshot {
        DailySnapshot {
            id,
            user_id: self.user_id,
            total_balance_minor: self.total_balance_minor,
            currency_code: self.currency_code,
            snapshot_date: self.snapshot_date,
            created_at: self.created_at,
        }
    }
}

/// One point of a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub total_balance: i64,
}

impl TrendPoint {
    pub fn new(date: NaiveDate, total_balance: i64) -> Self {
        Self {
            date,
            total_balance,
        }
    }
}

impl From<&DailySnapshot> for TrendPoint {
    fn from(snapshot: &DailySnapshot) -> Self {
        Self::new(snapshot.snapshot_date, snapshot.total_balance_minor)
    }
}

/// Which snapshots a query covers.
///
/// `All` is the family-wide view: rows from every user, summed per date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    User(Id),
    All,
}

impl Scope {
    pub fn for_identity(identity: &Identity) -> Self {
        if identity.is_admin() {
            Scope::All
        } else {
            Scope::User(identity.id.clone())
        }
    }

    /// The single owner this scope is restricted to, if any.
    pub fn user(&self) -> Option<&Id> {
        match self {
            Scope::User(id) => Some(id),
            Scope::All => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Scope::User(_) => "user",
            Scope::All => "all",
        }
    }
}
