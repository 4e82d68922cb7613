mod account;
mod exchange_rate;
mod id;
mod snapshot;

pub use account::Account;
pub use exchange_rate::ExchangeRate;
pub use id::Id;
pub use snapshot::{DailySnapshot, NewSnapshot, Scope, TrendPoint};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid currency code {value:?}: expected three ASCII letters")]
pub struct CurrencyCodeError {
    value: String,
}

/// Trim and upper-case a currency code.
pub fn normalize_currency_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Normalize a currency code, rejecting anything that is not an ISO-4217 shaped code.
pub fn parse_currency_code(code: &str) -> Result<String, CurrencyCodeError> {
    let normalized = normalize_currency_code(code);
    if normalized.len() == 3 && normalized.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(normalized)
    } else {
        Err(CurrencyCodeError {
            value: code.to_string(),
        })
    }
}
