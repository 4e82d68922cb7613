use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::normalize_currency_code;

/// Decimal places kept after inverting a quoted rate.
const RATE_SCALE: u32 = 10;

/// "1 unit of `currency_code` = `rate_to_base` units of the base currency".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub currency_code: String,
    pub rate_to_base: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(currency_code: &str, rate_to_base: Decimal, updated_at: DateTime<Utc>) -> Self {
        Self {
            currency_code: normalize_currency_code(currency_code),
            rate_to_base,
            updated_at,
        }
    }

    /// Build a rate from an upstream quote expressed as "1 base = `units_per_base` units".
    ///
    /// Returns `None` for quotes that cannot be inverted (zero, negative, NaN).
    pub fn from_units_per_base(
        currency_code: &str,
        units_per_base: f64,
        updated_at: DateTime<Utc>,
    ) -> Option<Self> {
        if !units_per_base.is_finite() || units_per_base <= 0.0 {
            return None;
        }
        let quoted = Decimal::from_f64(units_per_base)?;
        let inverted = Decimal::ONE.checked_div(quoted)?.round_dp(RATE_SCALE);
        Some(Self::new(currency_code, inverted.normalize(), updated_at))
    }
}
