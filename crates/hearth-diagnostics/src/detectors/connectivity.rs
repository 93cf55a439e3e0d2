//! Connectivity-gap detector.
//!
//! Consumes the gap metadata computed by the event query engine. Only
//! high gaps (a day or more of silence) become findings; shorter ones
//! stay in the query metadata.

use crate::pattern::{EventRef, Pattern, PatternType, Severity};

use super::{DetectorInput, PatternDetector};

use hearth_events::gaps::{format_duration_ms, GapSeverity};

/// Gaps at or past this many hours are critical.
const CRITICAL_HOURS: i64 = 72;

/// Turns day-plus silences into findings.
pub struct ConnectivityGapDetector;

impl ConnectivityGapDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConnectivityGapDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector for ConnectivityGapDetector {
    fn name(&self) -> &'static str {
        "connectivity_gap"
    }

    fn detect(&self, input: &DetectorInput<'_>) -> Vec<Pattern> {
        let mut patterns = Vec::new();

        for gap in input.gaps {
            if gap.severity != GapSeverity::High {
                continue;
            }
            let hours = gap.duration_ms / 3_600_000;
            let severity = if hours >= CRITICAL_HOURS {
                Severity::Critical
            } else {
                Severity::High
            };
            let duration = format_duration_ms(gap.duration_ms);

            // The events bounding the silence are the evidence.
            let evidence: Vec<EventRef> = input
                .events
                .iter()
                .filter(|event| event.time == gap.start || event.time == gap.end)
                .map(EventRef::from_event)
                .collect();
            if evidence.is_empty() {
                // Gap metadata that does not line up with the event
                // sequence cannot be cited; skip rather than guess.
                tracing::warn!(
                    device_id = %input.device.id,
                    "gap boundaries not found in event sequence, skipping finding"
                );
                continue;
            }

            let score = (hours as f64 / CRITICAL_HOURS as f64).clamp(0.0, 1.0);
            patterns.push(
                Pattern::new(
                    input.device.id.clone(),
                    PatternType::ConnectivityGap,
                    format!(
                        "no events for {duration} (between {} and {})",
                        gap.start.to_rfc3339(),
                        gap.end.to_rfc3339()
                    ),
                    severity,
                    score,
                    1.0,
                    gap.start,
                    gap.end,
                )
                .with_evidence(evidence)
                .with_detail("duration", duration)
                .with_detail(
                    "likely_connectivity_issue",
                    gap.likely_connectivity_issue.to_string(),
                ),
            );
        }

        patterns
    }
}
