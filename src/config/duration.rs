//! Duration strings in configuration files.
//!
//! Durations are written as one or more `<number><unit>` groups, e.g.
//! `"30s"`, `"1m30s"`, `"1.5h"`, `"250ms"`. Supported units are `ns`,
//! `us` (or `µs`), `ms`, `s`, `m` and `h`. The bare string `"0"` is zero.
//!
//! An empty string means "unset" and decodes to [`Duration::ZERO`] so the
//! field keeps its default. Anything else that does not parse is an error
//! that fails the whole configuration load.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Error produced when a duration string cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("negative duration {0:?} is not allowed")]
    Negative(String),
    #[error("duration {0:?} overflows")]
    Overflow(String),
}

const NANOS_PER_UNIT: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 60 * 60 * 1_000_000_000),
];

/// Parse a duration string.
///
/// Returns `Duration::ZERO` for the empty string.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() || s == "0" {
        return Ok(Duration::ZERO);
    }

    let s = match s.strip_prefix('+') {
        Some(rest) => rest,
        None if s.starts_with('-') => return Err(DurationError::Negative(input.to_string())),
        None => s,
    };
    if s.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        // Leading number, with an optional fraction.
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(DurationError::Invalid(input.to_string()));
        }
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        rest = &rest[unit_len..];

        let scale = NANOS_PER_UNIT
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| DurationError::UnknownUnit {
                unit: unit.to_string(),
                input: input.to_string(),
            })?;

        total = total
            .checked_add(scaled_nanos(number, scale, input)?)
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;
    }

    let nanos = u64::try_from(total).map_err(|_| DurationError::Overflow(input.to_string()))?;
    Ok(Duration::from_nanos(nanos))
}

/// Multiply a decimal literal by a unit scale, truncating below one nanosecond.
fn scaled_nanos(number: &str, scale: u128, input: &str) -> Result<u128, DurationError> {
    let overflow = || DurationError::Overflow(input.to_string());
    let invalid = || DurationError::Invalid(input.to_string());

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

    let mut divisor: u128 = 1;
    let mut fraction_value: u128 = 0;
    for digit in fraction.chars() {
        // Digits beyond nanosecond precision cannot contribute.
        if divisor > scale {
            break;
        }
        let d = digit.to_digit(10).ok_or_else(invalid)?;
        fraction_value = fraction_value * 10 + u128::from(d);
        divisor *= 10;
    }
    nanos = nanos
        .checked_add(fraction_value * scale / divisor)
        .ok_or_else(overflow)?;
    Ok(nanos)
}

/// Render a duration in the same notation [`parse_duration`] accepts.
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }
    let nanos = duration.as_nanos();
    if nanos < 1_000_000_000 {
        return match nanos {
            n if n % 1_000_000 == 0 => format!("{}ms", n / 1_000_000),
            n if n % 1_000 == 0 => format!("{}us", n / 1_000),
            n => format!("{}ns", n),
        };
    }

    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    let sub = duration.subsec_nanos();
    if sub == 0 {
        out.push_str(&format!("{}s", seconds));
    } else {
        let fraction = format!("{:09}", sub);
        out.push_str(&format!("{}.{}s", seconds, fraction.trim_end_matches('0')));
    }
    out
}

/// Serde adapter: `#[serde(with = "crate::config::duration")]`.
///
/// JSON `null` counts as unset, like `""`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_duration(&raw).map_err(serde::de::Error::custom),
        None => Ok(Duration::ZERO),
    }
}

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*duration))
}
