//! Utility functions for regionmeta

use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h", "7d")
pub fn parse_duration(s: &str) -> crate::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else {
        let split = s.len() - s.chars().last().map(char::len_utf8).unwrap_or(0);
        (&s[..split], &s[split..])
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let secs_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(num)),
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };
    let secs = num
        .checked_mul(secs_per_unit)
        .ok_or_else(|| crate::Error::InvalidConfig(format!("duration out of range: {}", s)))?;
    Ok(Duration::from_secs(secs))
}

/// Get current Unix timestamp (milliseconds)
pub fn timestamp_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Exponential backoff for the given retry (0-based), capped at `max`,
/// with up to 25% random jitter added below the cap.
pub fn backoff_delay(initial: Duration, retry: usize, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(retry.min(31) as u32).unwrap_or(u32::MAX);
    let base = initial.saturating_mul(factor).min(max);

    let jitter_ceiling = (base.as_millis() / 4) as u64;
    if jitter_ceiling == 0 {
        return base;
    }
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ceiling));
    (base + jitter).min(max)
}

/// Render a binary row key for logs; region names are usually printable.
pub fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604800));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(matches!(
            parse_duration("999999999999999999d"),
            Err(crate::Error::InvalidConfig(_))
        ));
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let initial = Duration::from_millis(100);
        let max = Duration::from_secs(1);

        let first = backoff_delay(initial, 0, max);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));

        let third = backoff_delay(initial, 2, max);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));

        assert_eq!(backoff_delay(initial, 40, max), max);
    }

    #[test]
    fn test_backoff_zero_initial() {
        assert_eq!(
            backoff_delay(Duration::ZERO, 3, Duration::from_secs(1)),
            Duration::ZERO
        );
    }
}
