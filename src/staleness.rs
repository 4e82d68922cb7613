//! Staleness detection for stored exchange rates.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::duration::format_duration;
use crate::models::ExchangeRate;

/// Result of a staleness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessCheck {
    pub is_stale: bool,
    /// Age of the oldest required rate. `None` when one is missing or none
    /// are required.
    pub age: Option<Duration>,
    pub threshold: Duration,
}

impl StalenessCheck {
    pub fn stale(age: Duration, threshold: Duration) -> Self {
        Self { is_stale: true, age: Some(age), threshold }
    }

    pub fn fresh(age: Duration, threshold: Duration) -> Self {
        Self { is_stale: false, age: Some(age), threshold }
    }

    pub fn missing(threshold: Duration) -> Self {
        Self { is_stale: true, age: None, threshold }
    }

    pub fn not_required(threshold: Duration) -> Self {
        Self { is_stale: false, age: None, threshold }
    }
}

/// Rates for `required` codes are stale when any code has no stored row or
/// when any of their rows is older than `threshold`.
///
/// Rows for codes outside `required` are ignored.
pub fn check_rate_staleness(
    rates: &[ExchangeRate],
    required: &[String],
    threshold: Duration,
    now: DateTime<Utc>,
) -> StalenessCheck {
    let mut oldest: Option<DateTime<Utc>> = None;
    for code in required {
        let Some(rate) = rates.iter().find(|r| &r.currency_code == code) else {
            return StalenessCheck::missing(threshold);
        };
        oldest = Some(oldest.map_or(rate.updated_at, |o| o.min(rate.updated_at)));
    }
    let Some(oldest) = oldest else {
        return StalenessCheck::not_required(threshold);
    };
    // Rates stamped in the future count as brand new.
    let age = (now - oldest).to_std().unwrap_or(Duration::ZERO);
    if age > threshold {
        StalenessCheck::stale(age, threshold)
    } else {
        StalenessCheck::fresh(age, threshold)
    }
}

pub fn log_rate_staleness(check: &StalenessCheck, required: usize) {
    let status = if check.is_stale { "stale" } else { "fresh" };
    let age_str = check
        .age
        .map(format_duration)
        .unwrap_or_else(|| "never".to_string());

    info!(
        required = required,
        oldest_age = %age_str,
        threshold = %format_duration(check.threshold),
        status = status,
        "exchange rate staleness check"
    );
}
