//! Run schedule parsing.

use std::time::Duration;

use regex::Regex;

use crate::error::{AppError, Result};

/// Parse a run schedule into a fixed interval.
///
/// Accepts the cron step form `*/N * * * *` (every N minutes, 1..=59), the
/// every-minute form `* * * * *`, or a plain duration such as `90s`, `15m`,
/// `1h`.
pub fn parse_schedule(expr: &str) -> Result<Duration> {
    let expr = expr.trim();
    let invalid = || AppError::config(format!("unsupported schedule '{expr}'"));

    if expr.split_whitespace().collect::<Vec<_>>() == ["*", "*", "*", "*", "*"] {
        return Ok(Duration::from_secs(60));
    }

    let cron_step = Regex::new(r"^\*/(\d{1,2})\s+\*\s+\*\s+\*\s+\*$")
        .map_err(|e| AppError::config(e.to_string()))?;
    if let Some(caps) = cron_step.captures(expr) {
        let minutes: u64 = caps[1].parse().map_err(|_| invalid())?;
        if !(1..=59).contains(&minutes) {
            return Err(invalid());
        }
        return Ok(Duration::from_secs(minutes * 60));
    }

    let plain = Regex::new(r"^(\d{1,6})\s*(s|m|h)$").map_err(|e| AppError::config(e.to_string()))?;
    if let Some(caps) = plain.captures(expr) {
        let amount: u64 = caps[1].parse().map_err(|_| invalid())?;
        if amount == 0 {
            return Err(invalid());
        }
        let secs = match &caps[2] {
            "s" => amount,
            "m" => amount * 60,
            _ => amount * 3600,
        };
        return Ok(Duration::from_secs(secs));
    }

    Err(invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cron_step() {
        assert_eq!(parse_schedule("*/15 * * * *").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_schedule("  */5  * * * * ").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_every_minute() {
        assert_eq!(parse_schedule("* * * * *").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_plain_durations() {
        assert_eq!(parse_schedule("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_schedule("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_schedule("2 h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_rejects_unsupported() {
        assert!(parse_schedule("0 9 * * 1").is_err());
        assert!(parse_schedule("*/0 * * * *").is_err());
        assert!(parse_schedule("*/75 * * * *").is_err());
        assert!(parse_schedule("0m").is_err());
        assert!(parse_schedule("soon").is_err());
    }
}
