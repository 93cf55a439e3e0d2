//! Outbound command tracking for the Hearth bridge.
//!
//! Every device command the bridge sends produces exactly one
//! [`CommandAttempt`] record. The tracker keeps a bounded ring of
//! them, classifies failures, accounts rate-limit pressure, and feeds
//! the system status report.

pub mod attempt;
pub mod token;
pub mod tracker;

pub use attempt::{CommandAttempt, CommandOutcome, CommandSource, FailureKind};
pub use token::{token_status, TokenInfo, TokenStatus, EXPIRY_WARNING_HOURS};
pub use tracker::{
    CommandStats, CommandTracker, RateLimitHit, RateLimitStatus, RateWindow, STATS_WINDOW_HOURS,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
