use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Empty interval")]
    Empty,
    #[error("Invalid interval '{0}': expected a number followed by ms, s, m or h (e.g. 30s, 1m)")]
    Invalid(String),
    #[error("Interval must be greater than zero")]
    Zero,
}

/// Parse a tick interval such as `500ms`, `30s`, `1m`, `2h` or `1m30s`.
///
/// Units are required for every component. Zero is rejected since the
/// scheduler cannot tick at a zero period.
///
/// # Examples
///
/// ```
/// use gator::util::parse_interval;
/// use std::time::Duration;
///
/// assert_eq!(parse_interval("1m30s").unwrap(), Duration::from_secs(90));
/// assert!(parse_interval("10").is_err());
/// ```
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(IntervalError::Empty);
    }
    let invalid = || IntervalError::Invalid(s.to_string());

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let component = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60).ok_or_else(invalid)?),
            "h" => Duration::from_secs(value.checked_mul(3600).ok_or_else(invalid)?),
            _ => return Err(invalid()),
        };
        total = total.checked_add(component).ok_or_else(invalid)?;
        rest = &rest[unit_len..];
    }

    if total.is_zero() {
        return Err(IntervalError::Zero);
    }
    Ok(total)
}
