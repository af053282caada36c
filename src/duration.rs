//! Human-readable durations for cache settings ("20m", "1h", "45s", "1d").

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{de, Deserialize, Deserializer, Serializer};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Parse a duration such as `"20m"` or `"1h"`.
///
/// Units are `d`, `h`, `m` and `s`; input is trimmed and case-insensitive.
///
/// ```
/// use assetbook::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("20m").unwrap(), Duration::from_secs(20 * 60));
/// assert_eq!(parse_duration(" 1H ").unwrap(), Duration::from_secs(60 * 60));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_ascii_lowercase();
    let Some(unit) = s.chars().last() else {
        bail!("Duration is empty");
    };

    let multiplier = match unit {
        'd' => DAY,
        'h' => HOUR,
        'm' => MINUTE,
        's' => 1,
        _ => bail!("Duration must end with d, h, m, or s"),
    };

    let count: u64 = s[..s.len() - 1]
        .trim()
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;

    let secs = count
        .checked_mul(multiplier)
        .context("Duration is too large")?;
    Ok(Duration::from_secs(secs))
}

/// Render a duration with the largest unit that divides it evenly.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    for (unit, size) in [('d', DAY), ('h', HOUR), ('m', MINUTE)] {
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
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(DAY));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(2 * HOUR));
        assert_eq!(parse_duration("20m").unwrap(), Duration::from_secs(20 * MINUTE));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("10w").is_err());
        assert!(parse_duration("-5m").is_err());
        assert!(parse_duration("99999999999999999999d").is_err());
    }

    #[test]
    fn formats_with_largest_even_unit() {
        assert_eq!(format_duration(Duration::from_secs(20 * MINUTE)), "20m");
        assert_eq!(format_duration(Duration::from_secs(HOUR)), "1h");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
