//! Unexplained-transition detector.
//!
//! An actuator attribute that changes with no outbound command shortly
//! before it was driven by something other than this bridge, which on
//! a single-controller installation means a platform automation.
//! Confidence climbs with how many unexplained transitions cluster
//! together.

use chrono::Duration;

use crate::pattern::{EventRef, Pattern, PatternType, Severity};

use super::{command_preceding, group_by_attribute, transitions, DetectorInput, PatternDetector};

/// A command completing within this window before a transition
/// explains it.
const CORRELATION_WINDOW_SECS: i64 = 5;
/// Transitions clustering within this window raise confidence.
const CLUSTER_WINDOW_SECS: i64 = 600;

/// Detects attribute transitions with no correlated outbound command.
pub struct AutomationTriggerDetector {
    correlation_window: Duration,
}

impl AutomationTriggerDetector {
    pub fn new() -> Self {
        Self {
            correlation_window: Duration::seconds(CORRELATION_WINDOW_SECS),
        }
    }
}

impl Default for AutomationTriggerDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector for AutomationTriggerDetector {
    fn name(&self) -> &'static str {
        "automation_trigger"
    }

    fn detect(&self, input: &DetectorInput<'_>) -> Vec<Pattern> {
        let mut patterns = Vec::new();

        for ((capability, attribute), group) in group_by_attribute(input.events) {
            // Sensor attributes change on their own; only commandable
            // capabilities can have an "unexplained" transition.
            if !capability.is_actuator() {
                continue;
            }

            let unexplained: Vec<_> = transitions(&group)
                .into_iter()
                .filter(|event| {
                    command_preceding(input.commands, event.time, self.correlation_window)
                        .is_none()
                })
                .collect();
            if unexplained.is_empty() {
                continue;
            }

            // Densest 10-minute cluster decides confidence.
            let times: Vec<_> = unexplained.iter().map(|event| event.time).collect();
            let mut cluster = 1usize;
            for (i, start) in times.iter().enumerate() {
                let close = times[i..]
                    .iter()
                    .take_while(|t| **t - *start <= Duration::seconds(CLUSTER_WINDOW_SECS))
                    .count();
                cluster = cluster.max(close);
            }

            let confidence = match cluster {
                0 | 1 => 0.70,
                2 => 0.85,
                _ => 0.95,
            };
            let severity = if confidence >= 0.85 {
                Severity::High
            } else {
                Severity::Medium
            };
            let first = unexplained[0];
            let last = unexplained[unexplained.len() - 1];
            let description = format!(
                "{attribute} changed {} time(s) with no bridge command within \
                 {CORRELATION_WINDOW_SECS}s; an external automation is driving this device",
                unexplained.len()
            );

            patterns.push(
                Pattern::new(
                    input.device.id.clone(),
                    PatternType::AutomationTrigger,
                    description,
                    severity,
                    confidence,
                    confidence,
                    first.time,
                    last.time,
                )
                .with_evidence(unexplained.iter().map(|e| EventRef::from_event(e)).collect())
                .with_detail("attribute", attribute)
                .with_detail("count", unexplained.len().to_string()),
            );
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
    use hearth_commands::{CommandAttempt, CommandOutcome};

    fn id() -> DeviceId {
        DeviceId::new(Platform::Virtual, "sw1").unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap()
    }

    fn device() -> Device {
        Device::new(id(), "Porch Light")
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

    fn command_at(seconds_before: i64, event_seconds: i64) -> CommandAttempt {
        CommandAttempt::new(
            id(),
            Capability::Switch,
            "on",
            t0() + Duration::seconds(event_seconds - seconds_before),
            0,
            CommandOutcome::Success,
            "/devices/sw1/commands",
        )
    }

    #[test]
    fn test_three_unexplained_transitions_high_confidence() {
        let device = device();
        let events = vec![switch_at(0, "on"), switch_at(3, "off"), switch_at(8, "on")];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &[],
        };
        let patterns = AutomationTriggerDetector::new().detect(&input);
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert!(pattern.confidence >= 0.95);
        assert_eq!(pattern.severity, Severity::High);
        assert_eq!(pattern.evidence.len(), 3);
    }

    #[test]
    fn test_commanded_transitions_are_explained() {
        let device = device();
        let events = vec![switch_at(0, "on"), switch_at(3, "off"), switch_at(8, "on")];
        let commands = vec![command_at(1, 0), command_at(2, 3), command_at(1, 8)];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &commands,
        };
        assert!(AutomationTriggerDetector::new().detect(&input).is_empty());
    }

    #[test]
    fn test_two_in_ten_minutes_medium_confidence() {
        let device = device();
        let events = vec![switch_at(0, "on"), switch_at(300, "off")];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &[],
        };
        let patterns = AutomationTriggerDetector::new().detect(&input);
        assert_eq!(patterns.len(), 1);
        assert!((patterns[0].confidence - 0.85).abs() < 1e-9);
        assert_eq!(patterns[0].severity, Severity::High);
    }

    #[test]
    fn test_command_outside_window_does_not_explain() {
        let device = device();
        let events = vec![switch_at(60, "on"), switch_at(90, "off")];
        // Command completed 30s before the first event, outside 5s.
        let commands = vec![command_at(30, 60)];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &commands,
        };
        let patterns = AutomationTriggerDetector::new().detect(&input);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].evidence.len(), 2);
    }

    #[test]
    fn test_sensor_attributes_ignored() {
        let device = Device::new(id(), "Door Sensor")
            .unwrap()
            .with_capability(Capability::ContactSensor);
        let events = vec![
            DeviceEvent::new(
                id(),
                t0(),
                Capability::ContactSensor,
                "contact",
                "open",
            ),
            DeviceEvent::new(
                id(),
                t0() + Duration::seconds(5),
                Capability::ContactSensor,
                "contact",
                "closed",
            ),
        ];
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &[],
        };
        assert!(AutomationTriggerDetector::new().detect(&input).is_empty());
    }
}
