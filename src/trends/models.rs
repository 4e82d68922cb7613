use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::TrendPoint;

/// Lookback used for "all history".
const ALL_HISTORY_DAYS: u64 = 5 * 365;

/// Shortest virtual series, in days.
const MIN_VIRTUAL_DAYS: u32 = 30;

/// Longest virtual series, in days.
const MAX_VIRTUAL_DAYS: u32 = ALL_HISTORY_DAYS as u32;

/// Virtual series length when all history was requested.
const ALL_HISTORY_VIRTUAL_DAYS: u32 = 365;

/// How far back a trend request reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaysBack {
    /// Everything, bounded to five years.
    All,
    /// The last `n` calendar days, today included, bounded like `All`.
    Days(u32),
}

impl DaysBack {
    /// Parse the wire form: `-1` for all history, otherwise a positive count.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            -1 => Some(DaysBack::All),
            n if n > 0 => u32::try_from(n).ok().map(DaysBack::Days),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            DaysBack::All => -1,
            DaysBack::Days(n) => i64::from(n),
        }
    }

    /// Inclusive `[start, end]` ending at `today`.
    pub fn date_range(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let back = match self {
            DaysBack::All => ALL_HISTORY_DAYS,
            DaysBack::Days(n) => u64::from(n.saturating_sub(1)).min(ALL_HISTORY_DAYS),
        };
        let start = today
            .checked_sub_days(Days::new(back))
            .unwrap_or(NaiveDate::MIN);
        (start, today)
    }

    /// Number of days a virtual series spans for this request.
    pub fn virtual_days(self) -> u32 {
        match self {
            DaysBack::All => ALL_HISTORY_VIRTUAL_DAYS,
            DaysBack::Days(n) => n.clamp(MIN_VIRTUAL_DAYS, MAX_VIRTUAL_DAYS),
        }
    }
}

/// Which tier produced a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSource {
    /// Stored snapshots only.
    Real,
    /// Stored snapshots after a backfill during this request.
    Seeded,
    /// Generated on the fly, not stored.
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSeries {
    pub scope: String,
    pub source: SeriesSource,
    pub base_currency: String,
    /// Ascending by date.
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    pub fn first(&self) -> Option<&TrendPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TrendPoint> {
        self.points.last()
    }

    /// Difference between the last and first totals.
    pub fn change(&self) -> Option<i64> {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => Some(last.total_balance.saturating_sub(first.total_balance)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn raw_days_back() {
        assert_eq!(DaysBack::from_raw(-1), Some(DaysBack::All));
        assert_eq!(DaysBack::from_raw(30), Some(DaysBack::Days(30)));
        assert_eq!(DaysBack::from_raw(0), None);
        assert_eq!(DaysBack::from_raw(-7), None);
        assert_eq!(DaysBack::Days(7).as_raw(), 7);
        assert_eq!(DaysBack::All.as_raw(), -1);
    }

    #[test]
    fn range_holds_exactly_n_days() {
        let today = date(2026, 3, 15);
        assert_eq!(DaysBack::Days(30).date_range(today), (date(2026, 2, 14), today));
        assert_eq!(DaysBack::Days(1).date_range(today), (today, today));
    }

    #[test]
    fn all_history_is_five_years() {
        let today = date(2026, 3, 15);
        let (start, end) = DaysBack::All.date_range(today);
        assert_eq!(end, today);
        assert_eq!((today - start).num_days(), 1825);
    }

    #[test]
    fn long_ranges_stop_at_five_years() {
        let today = date(2026, 3, 15);
        let all = DaysBack::All.date_range(today);
        assert_eq!(DaysBack::Days(1826).date_range(today), all);
        assert_eq!(DaysBack::Days(u32::MAX).date_range(today), all);
        let (start, _) = DaysBack::Days(1825).date_range(today);
        assert_eq!((today - start).num_days(), 1824);
    }

    #[test]
    fn virtual_days_are_bounded() {
        assert_eq!(DaysBack::Days(7).virtual_days(), 30);
        assert_eq!(DaysBack::Days(90).virtual_days(), 90);
        assert_eq!(DaysBack::Days(1825).virtual_days(), 1825);
        assert_eq!(DaysBack::Days(1826).virtual_days(), 1825);
        assert_eq!(DaysBack::Days(u32::MAX).virtual_days(), 1825);
        assert_eq!(DaysBack::All.virtual_days(), 365);
    }

    #[test]
    fn change_is_last_minus_first() {
        let series = TrendSeries {
            scope: "user".to_string(),
            source: SeriesSource::Real,
            base_currency: "CNY".to_string(),
            points: vec![
                TrendPoint::new(date(2026, 3, 14), 1000),
                TrendPoint::new(date(2026, 3, 15), 1250),
            ],
        };
        assert_eq!(series.change(), Some(250));

        let empty = TrendSeries { points: vec![], ..series };
        assert_eq!(empty.change(), None);
    }
}
