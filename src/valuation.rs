//! Converting account balances into the base currency.
//!
//! Every converted term is rounded to a whole minor unit before it is added,
//! so sums never accumulate fractional drift.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use crate::models::{normalize_currency_code, Account, ExchangeRate, Id};

/// Currency code to "units of base per one unit".
pub type RatesMap = HashMap<String, Decimal>;

/// Build a rates map from stored rows. The base currency always maps to 1.
pub fn rates_from_slice(rates: &[ExchangeRate], base_currency: &str) -> RatesMap {
    let mut map: RatesMap = rates
        .iter()
        .map(|r| (r.currency_code.clone(), r.rate_to_base))
        .collect();
    map.insert(normalize_currency_code(base_currency), Decimal::ONE);
    map
}

/// Convert one balance to base-currency minor units.
///
/// A currency with no rate is treated as if it were already the base currency.
pub fn convert_to_base(
    balance_minor: i64,
    currency_code: &str,
    rates: &RatesMap,
    base_currency: &str,
) -> i64 {
    if currency_code == base_currency {
        return balance_minor;
    }
    let rate = rates.get(currency_code).copied().unwrap_or(Decimal::ONE);
    match Decimal::from(balance_minor).checked_mul(rate) {
        Some(value) => {
            let rounded =
                value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            rounded.to_i64().unwrap_or(if rounded.is_sign_negative() {
                i64::MIN
            } else {
                i64::MAX
            })
        }
        None if (balance_minor < 0) != rate.is_sign_negative() => i64::MIN,
        None => i64::MAX,
    }
}

fn warn_missing_rates<'a>(
    accounts: impl IntoIterator<Item = &'a Account>,
    rates: &RatesMap,
    base_currency: &str,
) {
    let missing: BTreeSet<&str> = accounts
        .into_iter()
        .map(|a| a.currency_code.as_str())
        .filter(|code| *code != base_currency && !rates.contains_key(*code))
        .collect();
    for code in missing {
        warn!(currency = code, base = base_currency, "no exchange rate; counting at 1:1");
    }
}

/// Sum of every account converted to base-currency minor units.
pub fn aggregate_total(accounts: &[Account], rates: &RatesMap, base_currency: &str) -> i64 {
    warn_missing_rates(accounts, rates, base_currency);
    accounts.iter().fold(0i64, |sum, a| {
        sum.saturating_add(convert_to_base(
            a.balance_minor,
            &a.currency_code,
            rates,
            base_currency,
        ))
    })
}

/// Per-owner totals in base-currency minor units.
pub fn aggregate_by_owner(
    accounts: &[Account],
    rates: &RatesMap,
    base_currency: &str,
) -> BTreeMap<Id, i64> {
    warn_missing_rates(accounts, rates, base_currency);
    let mut totals = BTreeMap::new();
    for a in accounts {
        let converted = convert_to_base(a.balance_minor, &a.currency_code, rates, base_currency);
        let entry = totals.entry(a.owner_id.clone()).or_insert(0i64);
        *entry = entry.saturating_add(converted);
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn rates(pairs: &[(&str, &str)]) -> RatesMap {
        let rows: Vec<ExchangeRate> = pairs
            .iter()
            .map(|(code, r)| ExchangeRate::new(code, Decimal::from_str(r).unwrap(), Utc::now()))
            .collect();
        rates_from_slice(&rows, "CNY")
    }

    #[test]
    fn base_currency_passes_through() {
        let map = rates(&[]);
        assert_eq!(map.get("CNY"), Some(&Decimal::ONE));
        assert_eq!(convert_to_base(12345, "CNY", &map, "CNY"), 12345);
    }

    #[test]
    fn converts_and_rounds_each_term() {
        let map = rates(&[("USD", "7.2")]);
        assert_eq!(convert_to_base(100000, "USD", &map, "CNY"), 720000);
        let map = rates(&[("USD", "7.25")]);
        assert_eq!(convert_to_base(15, "USD", &map, "CNY"), 109);
        assert_eq!(convert_to_base(1, "USD", &map, "CNY"), 7);
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        let map = rates(&[("HKD", "0.5")]);
        assert_eq!(convert_to_base(3, "HKD", &map, "CNY"), 2);
        assert_eq!(convert_to_base(-3, "HKD", &map, "CNY"), -2);
    }

    #[test]
    fn missing_rate_counts_one_to_one() {
        let map = rates(&[]);
        let accounts = vec![
            Account::new("mei", "Savings", "CNY", 50000),
            Account::new("mei", "Brokerage", "USD", 10000),
        ];
        assert_eq!(aggregate_total(&accounts, &map, "CNY"), 60000);
    }

    #[test]
    fn mixed_currency_total() {
        let map = rates(&[("USD", "7.1"), ("EUR", "7.8")]);
        let accounts = vec![
            Account::new("mei", "Savings", "CNY", 100000),
            Account::new("mei", "Checking", "USD", 10000),
            Account::new("jun", "Euro", "EUR", 5000),
        ];
        assert_eq!(aggregate_total(&accounts, &map, "CNY"), 100000 + 71000 + 39000);

        let by_owner = aggregate_by_owner(&accounts, &map, "CNY");
        assert_eq!(by_owner[&Id::from("mei")], 171000);
        assert_eq!(by_owner[&Id::from("jun")], 39000);
    }

    #[test]
    fn empty_accounts_total_zero() {
        assert_eq!(aggregate_total(&[], &rates(&[]), "CNY"), 0);
        assert!(aggregate_by_owner(&[], &rates(&[]), "CNY").is_empty());
    }
}
