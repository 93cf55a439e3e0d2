//! OAuth token expiry accounting.
//!
//! Token storage and refresh live outside the core; what remains here
//! is turning a token's lifetime into something a status report can
//! show and an "expiring soon" flag consumers can act on.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A token becomes "expiring soon" below this many remaining hours.
pub const EXPIRY_WARNING_HOURS: i64 = 2;

/// What the core knows about a credential.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Expiry summary for status output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenStatus {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Pretty remaining lifetime, `expired` once past.
    pub remaining: String,
    pub expired: bool,
    pub expiring_soon: bool,
}

/// Evaluate a token against `now`.
pub fn token_status(token: &TokenInfo, now: DateTime<Utc>) -> TokenStatus {
    let left = token.expires_at - now;
    let expired = left <= Duration::zero();
    TokenStatus {
        created_at: token.created_at,
        expires_at: token.expires_at,
        remaining: if expired {
            "expired".to_string()
        } else {
            format_span(left)
        },
        expired,
        expiring_soon: !expired && left < Duration::hours(EXPIRY_WARNING_HOURS),
    }
}

fn format_span(span: Duration) -> String {
    let minutes = span.num_minutes();
    if minutes < 1 {
        return format!("{}s", span.num_seconds().max(0));
    }
    if minutes < 60 {
        return format!("{minutes}m");
    }
    let hours = span.num_hours();
    if hours < 24 {
        let rest = minutes % 60;
        return if rest == 0 {
            format!("{hours}h")
        } else {
            format!("{hours}h {rest}m")
        };
    }
    let days = span.num_days();
    let rest_hours = hours % 24;
    if rest_hours == 0 {
        format!("{days}d")
    } else {
        format!("{days}d {rest_hours}h")
    }
}
