//! Time-range parsing and the retention clamp.
//!
//! Callers express range bounds as relative tokens (`30m`, `6h`, `2d`),
//! RFC 3339 instants, or integer epoch milliseconds. Whatever the
//! form, the resolved range obeys `start < end <= now`, and lookback
//! beyond the platform retention window is clamped, not rejected.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use hearth_core::config::RETENTION_DAYS_MAX;
use hearth_core::error::{Error, Result};

/// A resolved, clamped query window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Set when the requested start predates the retention window and
    /// was clamped forward. A warning, not an error.
    pub exceeds_retention: bool,
}

impl ResolvedRange {
    /// Window length.
    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

/// Parse one bound: a relative token resolved against `now`, an
/// RFC 3339 instant, or integer epoch milliseconds.
pub fn parse_bound(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidTimeRange("empty time bound".to_string()));
    }

    if let Some(span) = parse_relative(raw)? {
        return Ok(now - span);
    }

    if raw.chars().all(|c| c.is_ascii_digit()) {
        let millis: i64 = raw
            .parse()
            .map_err(|_| Error::InvalidTimeRange(format!("'{raw}' is not valid epoch milliseconds")))?;
        return match Utc.timestamp_millis_opt(millis) {
            chrono::LocalResult::Single(t) => Ok(t),
            _ => Err(Error::InvalidTimeRange(format!(
                "'{raw}' is out of range for epoch milliseconds"
            ))),
        };
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| {
            Error::InvalidTimeRange(format!(
                "'{raw}' is neither a relative token (30m, 6h, 2d), an ISO-8601 instant, nor epoch milliseconds"
            ))
        })
}

/// Parse a `<N>[mhd]` token. `Ok(None)` when the shape does not match
/// at all, so the caller can try the absolute forms.
///
/// Magnitudes beyond the retention window parse fine; the retention
/// clamp in [`resolve_range`] pulls them forward, so `"30d"` means
/// "as far back as allowed", not an error.
fn parse_relative(raw: &str) -> Result<Option<Duration>> {
    let Some(unit) = raw.chars().last() else {
        return Ok(None);
    };
    if !matches!(unit, 'm' | 'h' | 'd') {
        return Ok(None);
    }
    let digits = &raw[..raw.len() - 1];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    let value: i64 = digits
        .parse()
        .map_err(|_| Error::InvalidTimeRange(format!("'{raw}' has an unparseable magnitude")))?;

    let span = match unit {
        'm' => Duration::try_minutes(value),
        'h' => Duration::try_hours(value),
        _ => Duration::try_days(value),
    };
    match span {
        Some(span) => Ok(Some(span)),
        None => Err(Error::InvalidTimeRange(format!(
            "'{raw}' is too large to represent"
        ))),
    }
}

/// Resolve optional bounds into a clamped window.
///
/// Defaults are `end = now` and `start = now - 24h`. A future end is
/// pulled back to `now`. A start older than `retention_days` is
/// clamped forward and the result flagged; a window lying entirely
/// outside retention is an error.
pub fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
    retention_days: i64,
) -> Result<ResolvedRange> {
    let retention_days = retention_days.min(RETENTION_DAYS_MAX);
    let mut end = match end {
        Some(raw) => parse_bound(raw, now)?,
        None => now,
    };
    if end > now {
        tracing::debug!(%end, %now, "future end bound clamped to now");
        end = now;
    }

    let start = match start {
        Some(raw) => parse_bound(raw, now)?,
        None => now - Duration::hours(24),
    };

    if start >= end {
        return Err(Error::InvalidTimeRange(format!(
            "start ({start}) must precede end ({end})"
        )));
    }

    let horizon = now - Duration::days(retention_days);
    if start < horizon {
        if end <= horizon {
            return Err(Error::InvalidTimeRange(format!(
                "the window ends before the {retention_days}-day retention horizon"
            )));
        }
        tracing::debug!(requested = %start, clamped = %horizon, "start clamped to retention horizon");
        return Ok(ResolvedRange {
            start: horizon,
            end,
            exceeds_retention: true,
        });
    }

    Ok(ResolvedRange {
        start,
        end,
        exceeds_retention: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_tokens() {
        assert_eq!(parse_bound("30m", now()).unwrap(), now() - Duration::minutes(30));
        assert_eq!(parse_bound("6h", now()).unwrap(), now() - Duration::hours(6));
        assert_eq!(parse_bound(" 2d ", now()).unwrap(), now() - Duration::days(2));
    }

    #[test]
    fn test_oversized_tokens_parse_for_clamping() {
        // Magnitudes past the retention window are not errors; the
        // clamp handles them downstream.
        assert_eq!(parse_bound("30d", now()).unwrap(), now() - Duration::days(30));
        assert_eq!(parse_bound("200h", now()).unwrap(), now() - Duration::hours(200));
        assert_eq!(
            parse_bound("20000m", now()).unwrap(),
            now() - Duration::minutes(20000)
        );
        // Only magnitudes that cannot be represented at all fail.
        assert!(parse_bound("99999999999999999d", now()).is_err());
    }

    #[test]
    fn test_absolute_forms() {
        let iso = parse_bound("2026-07-15T10:00:00Z", now()).unwrap();
        assert_eq!(iso, Utc.with_ymd_and_hms(2026, 7, 15, 10, 0, 0).unwrap());

        let offset = parse_bound("2026-07-15T12:00:00+02:00", now()).unwrap();
        assert_eq!(offset, iso);

        let millis = iso.timestamp_millis().to_string();
        assert_eq!(parse_bound(&millis, now()).unwrap(), iso);
    }

    #[test]
    fn test_garbage_rejected() {
        for bad in ["yesterday", "12x", "", "m", "2026-07-15"] {
            assert!(parse_bound(bad, now()).is_err(), "accepted '{bad}'");
        }
    }

    #[test]
    fn test_defaults() {
        let range = resolve_range(None, None, now(), 7).unwrap();
        assert_eq!(range.end, now());
        assert_eq!(range.start, now() - Duration::hours(24));
        assert!(!range.exceeds_retention);
    }

    #[test]
    fn test_retention_clamp_on_relative_token() {
        let range = resolve_range(Some("30d"), None, now(), 7).unwrap();
        assert_eq!(range.start, now() - Duration::days(7));
        assert_eq!(range.end, now());
        assert!(range.exceeds_retention);
        assert!(now() - range.start <= Duration::days(7));
    }

    #[test]
    fn test_retention_clamp_on_absolute_bound() {
        let old = (now() - Duration::days(30)).to_rfc3339();
        let range = resolve_range(Some(&old), None, now(), 7).unwrap();
        assert_eq!(range.start, now() - Duration::days(7));
        assert!(range.exceeds_retention);
    }

    #[test]
    fn test_window_entirely_outside_retention() {
        let start = (now() - Duration::days(30)).to_rfc3339();
        let end = (now() - Duration::days(20)).to_rfc3339();
        assert!(resolve_range(Some(&start), Some(&end), now(), 7).is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let result = resolve_range(Some("1h"), Some("2h"), now(), 7);
        assert!(matches!(result, Err(Error::InvalidTimeRange(_))));
    }

    #[test]
    fn test_future_end_clamped_to_now() {
        let future = (now() + Duration::hours(5)).to_rfc3339();
        let range = resolve_range(Some("1h"), Some(&future), now(), 7).unwrap();
        assert_eq!(range.end, now());
    }

    #[test]
    fn test_retention_never_exceeds_platform_limit() {
        let old = (now() - Duration::days(30)).to_rfc3339();
        // A misconfigured caller asking for 30 days still gets 7.
        let range = resolve_range(Some(&old), None, now(), 30).unwrap();
        assert_eq!(range.start, now() - Duration::days(7));
    }
}
