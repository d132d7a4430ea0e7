//! Human-readable renderings used in task comments.

use chrono::{DateTime, SecondsFormat};

/// Milliseconds as a compact duration: `1h30m0s`, `1m0.5s`, `45s`, `250ms`.
pub fn ms_human(ms: i64) -> String {
    if ms == 0 {
        return "0s".to_string();
    }
    let sign = if ms < 0 { "-" } else { "" };
    let abs = ms.unsigned_abs();
    if abs < 1000 {
        return format!("{sign}{abs}ms");
    }

    let hours = abs / 3_600_000;
    let minutes = (abs / 60_000) % 60;
    let seconds = (abs / 1000) % 60;
    let millis = abs % 1000;

    let mut out = sign.to_string();
    if hours > 0 {
        out.push_str(&format!("{hours}h{minutes}m"));
    } else if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&seconds.to_string());
    if millis > 0 {
        let frac = format!("{millis:03}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out.push('s');
    out
}

/// Millisecond epoch as RFC 3339 in UTC, truncated to seconds.
pub fn rfc3339(ms: i64) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => ms.to_string(),
    }
}

/// Whole seconds of a millisecond epoch, rounding toward negative infinity.
pub fn unix_secs(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_human() {
        assert_eq!(ms_human(0), "0s");
        assert_eq!(ms_human(250), "250ms");
        assert_eq!(ms_human(45_000), "45s");
        assert_eq!(ms_human(1_500), "1.5s");
        assert_eq!(ms_human(60_500), "1m0.5s");
        assert_eq!(ms_human(5_400_000), "1h30m0s");
        assert_eq!(ms_human(7_200_000), "2h0m0s");
        assert_eq!(ms_human(-90_000), "-1m30s");
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(rfc3339(1_700_000_000_000), "2023-11-14T22:13:20Z");
        assert_eq!(rfc3339(1_700_000_000_999), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_unix_secs() {
        assert_eq!(unix_secs(1_700_000_000_999), 1_700_000_000);
        assert_eq!(unix_secs(-1), -1);
    }
}
