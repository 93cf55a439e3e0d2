//! Command tracker.
//!
//! A bounded ring of recent command attempts with single-writer,
//! multi-reader discipline. Readers get snapshots; no read ever sees a
//! half-applied record. Statistics age out after a configurable window
//! so an old burst of failures does not haunt today's success rate.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use hearth_core::config::defaults;
use hearth_core::ids::DeviceId;

use crate::attempt::{CommandAttempt, CommandOutcome, FailureKind};

/// Window used for statistics when the caller does not pick one.
pub const STATS_WINDOW_HOURS: i64 = 24;

/// One observed rate-limit rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitHit {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// A platform-declared rate window, when the platform declares one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    /// Calls allowed per window.
    pub limit: u32,
    pub window_hours: u32,
}

/// Aggregated command counters over a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStats {
    pub window_hours: i64,
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    /// `success / total`, `1.0` for an empty window.
    pub success_rate: f64,
    pub by_failure_kind: HashMap<String, usize>,
}

/// Rate-limit pressure over a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub window_hours: i64,
    pub hits: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_hit: Option<DateTime<Utc>>,
    pub per_endpoint: HashMap<String, usize>,
    /// Estimated calls left before throttling, when the platform
    /// declared a window. `None` means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_remaining: Option<u32>,
}

struct TrackerInner {
    ring: VecDeque<CommandAttempt>,
    rate_hits: VecDeque<RateLimitHit>,
}

/// Bounded history of outbound commands.
pub struct CommandTracker {
    inner: RwLock<TrackerInner>,
    capacity: usize,
    declared_window: Option<RateWindow>,
}

impl CommandTracker {
    /// Tracker with the default ring capacity.
    pub fn new() -> Self {
        Self::with_capacity(defaults::COMMAND_RING_SIZE)
    }

    /// Tracker with an explicit ring capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(TrackerInner {
                ring: VecDeque::with_capacity(capacity.min(1024)),
                rate_hits: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            declared_window: None,
        }
    }

    /// Declare the platform's rate window so `rate_limit_status` can
    /// estimate remaining calls.
    pub fn with_declared_window(mut self, window: RateWindow) -> Self {
        self.declared_window = Some(window);
        self
    }

    /// Append one attempt, evicting the oldest past capacity. A
    /// rate-limited failure also records a [`RateLimitHit`].
    pub async fn record(&self, attempt: CommandAttempt) {
        let mut inner = self.inner.write().await;
        if let CommandOutcome::Failure {
            kind: FailureKind::RateLimited,
            retry_after_secs,
            ..
        } = &attempt.outcome
        {
            inner.rate_hits.push_back(RateLimitHit {
                timestamp: attempt.completed_at(),
                endpoint: attempt.endpoint.clone(),
                retry_after_secs: *retry_after_secs,
            });
            while inner.rate_hits.len() > self.capacity {
                inner.rate_hits.pop_front();
            }
            tracing::warn!(
                device_id = %attempt.device_id,
                endpoint = %attempt.endpoint,
                "rate limit hit recorded"
            );
        }
        if !attempt.is_success() {
            tracing::debug!(
                device_id = %attempt.device_id,
                command = %attempt.command,
                "command failure recorded"
            );
        }
        inner.ring.push_back(attempt);
        while inner.ring.len() > self.capacity {
            inner.ring.pop_front();
        }
    }

    /// Most recent failures, newest first, optionally for one device.
    pub async fn failed_commands(
        &self,
        limit: usize,
        device: Option<&DeviceId>,
    ) -> Vec<CommandAttempt> {
        let inner = self.inner.read().await;
        inner
            .ring
            .iter()
            .rev()
            .filter(|attempt| !attempt.is_success())
            .filter(|attempt| device.map_or(true, |id| &attempt.device_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Commands recorded for one device whose completion falls inside
    /// `[start, end]`. Detectors use this to correlate transitions with
    /// commands.
    pub async fn commands_for_device(
        &self,
        device: &DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<CommandAttempt> {
        let inner = self.inner.read().await;
        inner
            .ring
            .iter()
            .filter(|attempt| &attempt.device_id == device)
            .filter(|attempt| {
                let completed = attempt.completed_at();
                completed >= start && completed <= end
            })
            .cloned()
            .collect()
    }

    /// Counters over the window ending at `now`.
    pub async fn stats(&self, window_hours: Option<i64>, now: DateTime<Utc>) -> CommandStats {
        let window_hours = window_hours.unwrap_or(STATS_WINDOW_HOURS);
        let horizon = now - Duration::hours(window_hours);
        let inner = self.inner.read().await;

        let mut success = 0;
        let mut failure = 0;
        let mut by_failure_kind: HashMap<String, usize> = HashMap::new();
        for attempt in inner.ring.iter().filter(|a| a.started_at >= horizon) {
            match &attempt.outcome {
                CommandOutcome::Success => success += 1,
                CommandOutcome::Failure { kind, .. } => {
                    failure += 1;
                    *by_failure_kind.entry(kind.as_str().to_string()).or_insert(0) += 1;
                }
            }
        }
        let total = success + failure;
        CommandStats {
            window_hours,
            total,
            success,
            failure,
            success_rate: if total == 0 {
                1.0
            } else {
                success as f64 / total as f64
            },
            by_failure_kind,
        }
    }

    /// Rate-limit pressure over the window ending at `now`.
    pub async fn rate_limit_status(
        &self,
        window_hours: Option<i64>,
        now: DateTime<Utc>,
    ) -> RateLimitStatus {
        let window_hours = window_hours.unwrap_or(STATS_WINDOW_HOURS);
        let horizon = now - Duration::hours(window_hours);
        let inner = self.inner.read().await;

        let hits: Vec<&RateLimitHit> = inner
            .rate_hits
            .iter()
            .filter(|hit| hit.timestamp >= horizon)
            .collect();
        let mut per_endpoint: HashMap<String, usize> = HashMap::new();
        for hit in &hits {
            *per_endpoint.entry(hit.endpoint.clone()).or_insert(0) += 1;
        }

        let estimated_remaining = self.declared_window.map(|window| {
            let window_horizon = now - Duration::hours(window.window_hours as i64);
            let calls = inner
                .ring
                .iter()
                .filter(|attempt| attempt.started_at >= window_horizon)
                .count() as u32;
            window.limit.saturating_sub(calls)
        });

        RateLimitStatus {
            window_hours,
            hits: hits.len(),
            last_hit: hits.last().map(|hit| hit.timestamp),
            per_endpoint,
            estimated_remaining,
        }
    }

    /// Number of attempts currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.ring.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.ring.is_empty()
    }
}

impl Default for CommandTracker {
    fn default() -> Self {
        Self::new()
    }
}
