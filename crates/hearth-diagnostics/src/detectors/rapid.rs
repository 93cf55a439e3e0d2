//! Rapid-change detector.
//!
//! Three or more transitions of one attribute inside ten seconds is a
//! flapping relay, a bouncing sensor, or two automations fighting.

use chrono::Duration;

use crate::pattern::{EventRef, Pattern, PatternType, Severity};

use super::{group_by_attribute, transitions, DetectorInput, PatternDetector};

const WINDOW_SECS: i64 = 10;
const MIN_TRANSITIONS: usize = 3;

/// Flags bursts of same-attribute transitions.
pub struct RapidChangeDetector {
    window: Duration,
}

impl RapidChangeDetector {
    pub fn new() -> Self {
        Self {
            window: Duration::seconds(WINDOW_SECS),
        }
    }
}

impl Default for RapidChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector for RapidChangeDetector {
    fn name(&self) -> &'static str {
        "rapid_change"
    }

    fn detect(&self, input: &DetectorInput<'_>) -> Vec<Pattern> {
        let mut patterns = Vec::new();

        for ((_, attribute), group) in group_by_attribute(input.events) {
            let changes = transitions(&group);
            if changes.len() < MIN_TRANSITIONS {
                continue;
            }

            // Densest window of transitions, two pointers.
            let mut best: Option<(usize, usize)> = None; // (start index, count)
            let mut lo = 0;
            for hi in 0..changes.len() {
                while changes[hi].time - changes[lo].time > self.window {
                    lo += 1;
                }
                let count = hi - lo + 1;
                if best.map_or(true, |(_, best_count)| count > best_count) {
                    best = Some((lo, count));
                }
            }
            let Some((start, count)) = best else {
                continue;
            };
            if count < MIN_TRANSITIONS {
                continue;
            }

            let burst = &changes[start..start + count];
            let score = 1.0 - (-(count as f64) / 3.0).exp();
            let severity = if count <= 4 {
                Severity::Medium
            } else {
                Severity::High
            };
            let first = burst[0];
            let last = burst[burst.len() - 1];

            patterns.push(
                Pattern::new(
                    input.device.id.clone(),
                    PatternType::RapidChange,
                    format!(
                        "{attribute} changed {count} times within {}s",
                        (last.time - first.time).num_seconds().max(1)
                    ),
                    severity,
                    score,
                    score,
                    first.time,
                    last.time,
                )
                .with_evidence(burst.iter().map(|e| EventRef::from_event(e)).collect())
                .with_detail("attribute", attribute)
                .with_detail("count", count.to_string()),
            );
        }

        patterns
    }
}
