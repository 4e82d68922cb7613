use rust_decimal::Decimal;

use crate::config::DisplayConfig;

/// Largest scale `Decimal` supports.
const MAX_SCALE: u32 = 28;

/// Convert integer minor units to a decimal amount with `decimals` places.
///
/// `minor_to_decimal(123456, 2)` is `1234.56`.
pub fn minor_to_decimal(minor: i64, decimals: u32) -> Decimal {
    Decimal::new(minor, decimals.min(MAX_SCALE))
}

fn group_int_digits(int_part: &str) -> String {
    // Insert commas every 3 digits, preserving any leading zeros.
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        out.push(ch);
        let remaining = len.saturating_sub(i + 1);
        if remaining > 0 && remaining % 3 == 0 {
            out.push(',');
        }
    }
    out
}

fn group_number_string(s: &str) -> String {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    let grouped = group_int_digits(int_part);
    match frac_part {
        Some(f) if !f.is_empty() => format!("{grouped}.{f}"),
        _ => grouped,
    }
}

/// Format a minor-unit amount for human display.
///
/// The fraction always has exactly `currency_decimals` digits. When no symbol
/// is configured the currency code is appended instead.
pub fn format_minor_units(minor: i64, currency_code: &str, display: &DisplayConfig) -> String {
    let value = minor_to_decimal(minor, display.currency_decimals);
    let negative = value.is_sign_negative() && !value.is_zero();

    let mut digits = value.abs().to_string();
    if display.currency_grouping {
        digits = group_number_string(&digits);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    match display.currency_symbol.as_deref() {
        Some(sym) => {
            out.push_str(sym);
            out.push_str(&digits);
        }
        None => {
            out.push_str(&digits);
            out.push(' ');
            out.push_str(currency_code);
        }
    }
    out
}
