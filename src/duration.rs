//! Human duration strings: `"90"`, `"1h30m"`, `"2w"`.

use thiserror::Error;

/// Errors from [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("unknown duration unit '{0}'")]
    InvalidUnit(char),
    #[error("duration unit '{0}' has no number in front of it")]
    MissingNumber(char),
    #[error("duration too large")]
    Overflow,
}

fn unit_seconds(unit: char) -> Option<u64> {
    match unit {
        's' | 'S' => Some(1),
        'm' | 'M' => Some(60),
        'h' | 'H' => Some(60 * 60),
        'd' | 'D' => Some(60 * 60 * 24),
        'w' | 'W' => Some(60 * 60 * 24 * 7),
        'y' | 'Y' => Some(60 * 60 * 24 * 365),
        _ => None,
    }
}

/// Parse a duration in seconds.
///
/// A bare number is seconds. Otherwise the string is a sequence of
/// `<number><unit>` groups with units `s m h d w y`, summed; a trailing
/// number without a unit counts as seconds.
pub fn parse_duration(s: &str) -> Result<u64, DurationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total: u64 = 0;
    let mut current: Option<u64> = None;

    for c in s.chars() {
        if let Some(digit) = c.to_digit(10) {
            let value = current
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(digit)))
                .ok_or(DurationError::Overflow)?;
            current = Some(value);
            continue;
        }

        let multiplier = unit_seconds(c).ok_or(DurationError::InvalidUnit(c))?;
        let value = current.take().ok_or(DurationError::MissingNumber(c))?;
        total = value
            .checked_mul(multiplier)
            .and_then(|v| total.checked_add(v))
            .ok_or(DurationError::Overflow)?;
    }

    if let Some(value) = current {
        total = total.checked_add(value).ok_or(DurationError::Overflow)?;
    }

    Ok(total)
}

/// Render seconds as `1w2d3h4m5s`, omitting zero groups (`0s` for zero).
pub fn format_duration(mut secs: u64) -> String {
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [
        ('y', 60 * 60 * 24 * 365),
        ('w', 60 * 60 * 24 * 7),
        ('d', 60 * 60 * 24),
        ('h', 60 * 60),
        ('m', 60),
        ('s', 1),
    ] {
        let count = secs / size;
        if count > 0 {
            out.push_str(&count.to_string());
            out.push(unit);
            secs %= size;
        }
    }
    out
}
