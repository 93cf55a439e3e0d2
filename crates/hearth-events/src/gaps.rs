//! Connectivity-gap detection over event streams.
//!
//! A gap is the inter-arrival interval between two consecutive events
//! of one device. Short gaps are normal reporting cadence; long ones
//! suggest the device fell off the network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hearth_core::event::DeviceEvent;

/// Gaps shorter than this are normal cadence and not reported.
pub const GAP_IGNORE_HOURS: i64 = 1;
/// Below this a reported gap is low severity.
pub const GAP_MEDIUM_HOURS: i64 = 6;
/// Below this a reported gap is medium severity; at or above, high
/// and flagged as a likely connectivity issue.
pub const GAP_HIGH_HOURS: i64 = 24;

/// Severity of one silence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapSeverity {
    Low,
    Medium,
    High,
}

/// One silence interval between consecutive events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGap {
    /// Time of the event before the silence.
    pub start: DateTime<Utc>,
    /// Time of the event that ended it.
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
    pub severity: GapSeverity,
    /// Set for gaps of a day or more.
    pub likely_connectivity_issue: bool,
}

/// Scan consecutive pairs of an ascending event sequence and report
/// every inter-arrival interval of at least one hour.
pub fn detect_gaps(events_ascending: &[DeviceEvent]) -> Vec<EventGap> {
    let mut gaps = Vec::new();
    for pair in events_ascending.windows(2) {
        let duration = pair[1].time - pair[0].time;
        let hours = duration.num_hours();
        if hours < GAP_IGNORE_HOURS {
            continue;
        }
        let severity = if hours < GAP_MEDIUM_HOURS {
            GapSeverity::Low
        } else if hours < GAP_HIGH_HOURS {
            GapSeverity::Medium
        } else {
            GapSeverity::High
        };
        gaps.push(EventGap {
            start: pair[0].time,
            end: pair[1].time,
            duration_ms: duration.num_milliseconds(),
            severity,
            likely_connectivity_issue: severity == GapSeverity::High,
        });
    }
    gaps
}

/// The longest reported gap, in milliseconds.
pub fn largest_gap_ms(gaps: &[EventGap]) -> Option<i64> {
    gaps.iter().map(|gap| gap.duration_ms).max()
}

/// Render a duration compactly: `45m`, `30h`, `30h 30m`, `3d 2h`.
/// Hours stay whole up to two days so a thirty-hour outage reads as
/// `30h`, not `1d 6h`.
pub fn format_duration_ms(ms: i64) -> String {
    let total_seconds = ms / 1000;
    let total_minutes = total_seconds / 60;
    let total_hours = total_minutes / 60;

    if total_minutes < 1 {
        return format!("{total_seconds}s");
    }
    if total_hours < 1 {
        return format!("{total_minutes}m");
    }
    if total_hours < 48 {
        let minutes = total_minutes % 60;
        return if minutes == 0 {
            format!("{total_hours}h")
        } else {
            format!("{total_hours}h {minutes}m")
        };
    }
    let days = total_hours / 24;
    let hours = total_hours % 24;
    if hours == 0 {
        format!("{days}d")
    } else {
        format!("{days}d {hours}h")
    }
}
