//! Automation-conflict detector.
//!
//! Two opposing transitions of one attribute within seconds, each
//! preceded by its own outbound command, means two controllers are
//! fighting over the device. Attribution needs command-source
//! metadata; without it the finding is reported at reduced confidence
//! and the description says so plainly.

use chrono::Duration;

use crate::pattern::{CommandRef, EventRef, Pattern, PatternType, Severity};

use super::{command_preceding, group_by_attribute, transitions, DetectorInput, PatternDetector};

/// Opposing transitions this close together form a conflict pair.
const CONFLICT_WINDOW_SECS: i64 = 2;
/// A command completing within this window before a transition is its
/// cause.
const CORRELATION_WINDOW_SECS: i64 = 5;

/// Detects dueling controllers.
pub struct AutomationConflictDetector {
    conflict_window: Duration,
    correlation_window: Duration,
}

impl AutomationConflictDetector {
    pub fn new() -> Self {
        Self {
            conflict_window: Duration::seconds(CONFLICT_WINDOW_SECS),
            correlation_window: Duration::seconds(CORRELATION_WINDOW_SECS),
        }
    }
}

impl Default for AutomationConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector for AutomationConflictDetector {
    fn name(&self) -> &'static str {
        "automation_conflict"
    }

    fn detect(&self, input: &DetectorInput<'_>) -> Vec<Pattern> {
        let mut patterns = Vec::new();

        for ((_, attribute), group) in group_by_attribute(input.events) {
            let changes = transitions(&group);
            for pair in changes.windows(2) {
                let (first, second) = (pair[0], pair[1]);
                if second.time - first.time > self.conflict_window {
                    continue;
                }
                if first.value == second.value {
                    continue;
                }

                // Both transitions must trace back to commands; an
                // uncommanded reversal is trigger territory, not a
                // conflict between controllers.
                let first_cmd =
                    command_preceding(input.commands, first.time, self.correlation_window);
                let second_cmd =
                    command_preceding(input.commands, second.time, self.correlation_window);
                let (Some(first_cmd), Some(second_cmd)) = (first_cmd, second_cmd) else {
                    continue;
                };

                let sources = (
                    first_cmd.source.as_ref().map(|source| source.id()),
                    second_cmd.source.as_ref().map(|source| source.id()),
                );

                let (severity, confidence, description) = match sources {
                    (Some(a), Some(b)) if a != b => (
                        Severity::High,
                        0.9,
                        format!(
                            "{attribute} reversed within {}s: '{}' from {a}, then '{}' from {b}",
                            CONFLICT_WINDOW_SECS, first_cmd.command, second_cmd.command
                        ),
                    ),
                    (Some(_), Some(_)) => {
                        // Same source toggling quickly is covered by
                        // the rapid-change detector.
                        continue;
                    }
                    _ => (
                        Severity::Medium,
                        0.5,
                        format!(
                            "{attribute} reversed within {}s after two commands; command \
                             source metadata is unavailable, so which controllers disagreed \
                             cannot be confirmed",
                            CONFLICT_WINDOW_SECS
                        ),
                    ),
                };

                patterns.push(
                    Pattern::new(
                        input.device.id.clone(),
                        PatternType::AutomationConflict,
                        description,
                        severity,
                        confidence,
                        confidence,
                        first.time,
                        second.time,
                    )
                    .with_evidence(vec![
                        EventRef::from_event(first),
                        EventRef::from_event(second),
                    ])
                    .with_command_evidence(vec![
                        CommandRef::from_attempt(first_cmd),
                        CommandRef::from_attempt(second_cmd),
                    ])
                    .with_detail("attribute", attribute),
                );
            }
        }

        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    use hearth_core::capability::Capability;
    use hearth_core::device::Device;
    use hearth_core::event::DeviceEvent;
    use hearth_core::ids::{DeviceId, Platform};
    use hearth_commands::{CommandAttempt, CommandOutcome, CommandSource};

    fn id() -> DeviceId {
        DeviceId::new(Platform::Virtual, "sw1").unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap()
    }

    fn device() -> Device {
        Device::new(id(), "Hall Light")
            .unwrap()
            .with_capability(Capability::Switch)
    }

    fn switch_at(seconds: i64, value: &str) -> DeviceEvent {
        DeviceEvent::new(
            id(),
            t0() + Duration::seconds(seconds),
            Capability::Switch,
            "switch",
            value,
        )
    }

    fn command_at(seconds: i64, verb: &str, source: Option<CommandSource>) -> CommandAttempt {
        let mut attempt = CommandAttempt::new(
            id(),
            Capability::Switch,
            verb,
            t0() + Duration::seconds(seconds),
            0,
            CommandOutcome::Success,
            "/devices/sw1/commands",
        );
        if let Some(source) = source {
            attempt = attempt.with_source(source);
        }
        attempt
    }

    fn rule(rule_id: &str) -> CommandSource {
        CommandSource::Rule {
            rule_id: rule_id.into(),
        }
    }

    #[test]
    fn test_distinct_sources_full_confidence() {
        let device = device();
        let events = vec![switch_at(10, "on"), switch_at(12, "off")];
        let commands = vec![
            command_at(9, "on", Some(rule("morning"))),
            command_at(11, "off", Some(rule("evening"))),
        ];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &commands,
        };
        let patterns = AutomationConflictDetector::new().detect(&input);
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.severity, Severity::High);
        assert!(pattern.confidence > 0.5);
        assert!(pattern.description.contains("rule:morning"));
        assert!(pattern.description.contains("rule:evening"));
        assert_eq!(pattern.command_evidence.len(), 2);
    }

    #[test]
    fn test_missing_sources_degrade_confidence() {
        let device = device();
        let events = vec![switch_at(10, "on"), switch_at(12, "off")];
        let commands = vec![command_at(9, "on", None), command_at(11, "off", None)];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &commands,
        };
        let patterns = AutomationConflictDetector::new().detect(&input);
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert!(pattern.confidence <= 0.5);
        assert_eq!(pattern.severity, Severity::Medium);
        assert!(pattern.description.contains("cannot be confirmed"));
    }

    #[test]
    fn test_same_source_is_not_a_conflict() {
        let device = device();
        let events = vec![switch_at(10, "on"), switch_at(12, "off")];
        let commands = vec![
            command_at(9, "on", Some(rule("same"))),
            command_at(11, "off", Some(rule("same"))),
        ];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &commands,
        };
        assert!(AutomationConflictDetector::new().detect(&input).is_empty());
    }

    #[test]
    fn test_uncommanded_reversal_ignored() {
        let device = device();
        let events = vec![switch_at(10, "on"), switch_at(12, "off")];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &[],
        };
        assert!(AutomationConflictDetector::new().detect(&input).is_empty());
    }

    #[test]
    fn test_slow_reversal_ignored() {
        let device = device();
        let events = vec![switch_at(10, "on"), switch_at(20, "off")];
        let commands = vec![
            command_at(9, "on", Some(rule("a"))),
            command_at(19, "off", Some(rule("b"))),
        ];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &commands,
        };
        assert!(AutomationConflictDetector::new().detect(&input).is_empty());
    }
}
