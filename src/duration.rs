//! Human-readable durations like "6h" or "15s" for config files.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Supported units, largest first.
const UNITS: [(char, u64); 4] = [('d', 24 * 60 * 60), ('h', 60 * 60), ('m', 60), ('s', 1)];

/// Parse a duration string like "14d", "6h", "30m", "15s".
///
/// The input is case-insensitive and whitespace is trimmed.
///
/// ```
/// use nestegg::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("6h").unwrap(), Duration::from_secs(6 * 60 * 60));
/// assert_eq!(parse_duration(" 15S ").unwrap(), Duration::from_secs(15));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let unit = s.chars().last().context("Duration is empty")?;
    let secs_per_unit = UNITS
        .iter()
        .find(|(u, _)| *u == unit)
        .map(|(_, secs)| *secs)
        .with_context(|| format!("Duration {s:?} must end with d, h, m, or s"))?;

    let number = &s[..s.len() - unit.len_utf8()];
    let count: u64 = number
        .trim()
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;
    let secs = count
        .checked_mul(secs_per_unit)
        .context("Duration is too large")?;

    Ok(Duration::from_secs(secs))
}

/// Format a duration using the largest unit that divides it evenly, so the
/// result parses back to the same value.
///
/// ```
/// use nestegg::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(6 * 60 * 60)), "6h");
/// assert_eq!(format_duration(Duration::from_secs(90)), "90s");
/// ```
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    for (unit, size) in UNITS {
        if secs % size == 0 {
            return format!("{}{unit}", secs / size);
        }
    }
    format!("{secs}s")
}

pub fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

pub fn serialize_duration<S>(d: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(2 * 86_400));
        assert_eq!(parse_duration("6h").unwrap(), Duration::from_secs(21_600));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("6").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("sixh").is_err());
        assert!(parse_duration("-1h").is_err());
        assert!(parse_duration("99999999999999999999d").is_err());
    }

    #[test]
    fn format_round_trips() {
        for input in ["6h", "14d", "90s", "45m", "0s"] {
            let parsed = parse_duration(input).unwrap();
            assert_eq!(format_duration(parsed), input);
        }
    }

    #[test]
    fn format_prefers_largest_even_unit() {
        assert_eq!(format_duration(Duration::from_secs(86_400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(90 * 60)), "90m");
    }
}
