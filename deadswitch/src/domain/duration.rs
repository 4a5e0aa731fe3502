//! The `<number><unit>` duration grammar shared by request bodies and
//! configuration values (units: `ns|us|ms|s|m|h`).

use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,
    #[error("unrecognized duration unit in '{0}'")]
    UnknownUnit(String),
    #[error("invalid number in duration '{0}'")]
    InvalidNumber(String),
}

/// Parses a literal like `"24h"`, `"30m"`, `"1500ms"` into a [`Duration`].
///
/// Fractional numbers are accepted (`"1.5h"`) and truncate to nanosecond
/// precision. A bare number with no unit is rejected, matching the
/// strictness of the source grammar.
pub fn parse_duration(literal: &str) -> Result<Duration, DurationParseError> {
    let literal = literal.trim();
    if literal.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let split_at = literal
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| DurationParseError::UnknownUnit(literal.to_string()))?;

    let (number_part, unit_part) = literal.split_at(split_at);
    if number_part.is_empty() {
        return Err(DurationParseError::InvalidNumber(literal.to_string()));
    }

    let value: f64 = number_part
        .parse()
        .map_err(|_| DurationParseError::InvalidNumber(literal.to_string()))?;
    if value < 0.0 || !value.is_finite() {
        return Err(DurationParseError::InvalidNumber(literal.to_string()));
    }

    let nanos_per_unit: f64 = match unit_part {
        "ns" => 1.0,
        "us" | "\u{b5}s" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        "m" => 60.0 * 1_000_000_000.0,
        "h" => 3_600.0 * 1_000_000_000.0,
        _ => return Err(DurationParseError::UnknownUnit(literal.to_string())),
    };

    let total_nanos = value * nanos_per_unit;
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_units() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse_duration("1500ms").unwrap(), Duration::from_millis(1_500));
        assert_eq!(parse_duration("1ms").unwrap(), Duration::from_millis(1));
    }

    #[test]
    fn rejects_empty_and_unitless() {
        assert_eq!(parse_duration(""), Err(DurationParseError::Empty));
        assert!(parse_duration("42").is_err());
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(matches!(
            parse_duration("5days"),
            Err(DurationParseError::UnknownUnit(_))
        ));
    }

    #[test]
    fn accepts_fractional_values() {
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5_400));
    }
}
