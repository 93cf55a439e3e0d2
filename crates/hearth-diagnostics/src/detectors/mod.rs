//! Pattern detectors.
//!
//! Each detector is independent: it reads one device's event sequence
//! (sorted ascending), the gap list from the event query engine, and
//! the outbound commands recorded in the window, and returns zero or
//! more patterns. The chain runs them all, drops anything that fails
//! the evidence rule, collapses overlapping duplicates, and ranks the
//! rest.

mod automation;
mod battery;
mod conflict;
mod connectivity;
mod rapid;

pub use automation::AutomationTriggerDetector;
pub use battery::BatteryDeclineDetector;
pub use conflict::AutomationConflictDetector;
pub use connectivity::ConnectivityGapDetector;
pub use rapid::RapidChangeDetector;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use hearth_core::capability::Capability;
use hearth_core::device::Device;
use hearth_core::event::DeviceEvent;
use hearth_commands::CommandAttempt;
use hearth_events::gaps::EventGap;

use crate::pattern::{dedup_overlapping, rank, EventRef, Pattern, PatternType, Severity};

/// Everything a detector may look at for one device.
pub struct DetectorInput<'a> {
    pub device: &'a Device,
    /// Events sorted ascending by time. Detectors never mutate them.
    pub events: &'a [DeviceEvent],
    /// Gaps computed by the event query engine over the same window.
    pub gaps: &'a [EventGap],
    /// Outbound commands recorded for this device in the window.
    pub commands: &'a [CommandAttempt],
}

/// One independent detector.
pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, input: &DetectorInput<'_>) -> Vec<Pattern>;
}

/// Events grouped by `(capability, attribute)`, ascending within each
/// group. `BTreeMap` keeps iteration deterministic.
pub fn group_by_attribute<'a>(
    events: &'a [DeviceEvent],
) -> BTreeMap<(Capability, &'a str), Vec<&'a DeviceEvent>> {
    let mut groups: BTreeMap<(Capability, &str), Vec<&DeviceEvent>> = BTreeMap::new();
    for event in events {
        groups
            .entry((event.capability, event.attribute.as_str()))
            .or_default()
            .push(event);
    }
    groups
}

/// The value-changing events of one attribute group. The first event
/// counts: it is the transition from the unobserved prior state.
pub fn transitions<'a>(group: &[&'a DeviceEvent]) -> Vec<&'a DeviceEvent> {
    let mut out = Vec::new();
    let mut previous: Option<&DeviceEvent> = None;
    for event in group {
        let changed = match previous {
            Some(prev) => prev.value != event.value,
            None => true,
        };
        if changed {
            out.push(*event);
        }
        previous = Some(event);
    }
    out
}

/// The most recent command on the device completing within `window`
/// before `time`. A transition so preceded is explained by that
/// command.
pub fn command_preceding<'a>(
    commands: &'a [CommandAttempt],
    time: DateTime<Utc>,
    window: Duration,
) -> Option<&'a CommandAttempt> {
    commands
        .iter()
        .filter(|attempt| {
            let completed = attempt.completed_at();
            completed <= time && time - completed <= window
        })
        .max_by_key(|attempt| attempt.completed_at())
}

/// The standard detector chain.
pub struct DetectorChain {
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl DetectorChain {
    /// All five detectors with their default windows.
    pub fn standard() -> Self {
        Self {
            detectors: vec![
                Box::new(AutomationTriggerDetector::new()),
                Box::new(RapidChangeDetector::new()),
                Box::new(ConnectivityGapDetector::new()),
                Box::new(BatteryDeclineDetector::new()),
                Box::new(AutomationConflictDetector::new()),
            ],
        }
    }

    /// A chain with an explicit detector set.
    pub fn with_detectors(detectors: Vec<Box<dyn PatternDetector>>) -> Self {
        Self { detectors }
    }

    /// Run every detector, enforce the evidence rule, dedup, rank.
    ///
    /// When nothing abnormal is found over a non-empty sequence, one
    /// `normal` pattern citing the window boundaries is returned so
    /// consumers can tell "quiet" from "not analyzed".
    pub fn run(&self, input: &DetectorInput<'_>) -> Vec<Pattern> {
        let mut patterns = Vec::new();
        for detector in &self.detectors {
            let found = detector.detect(input);
            tracing::debug!(
                detector = detector.name(),
                device_id = %input.device.id,
                found = found.len(),
                "detector finished"
            );
            patterns.extend(found);
        }

        patterns.retain(|pattern| {
            if pattern.has_evidence() {
                true
            } else {
                tracing::warn!(
                    device_id = %pattern.device_id,
                    pattern_type = pattern.pattern_type.as_str(),
                    "pattern dropped: no evidence cited"
                );
                false
            }
        });

        let mut patterns = dedup_overlapping(patterns);
        if patterns.is_empty() {
            if let (Some(first), Some(last)) = (input.events.first(), input.events.last()) {
                patterns.push(
                    Pattern::new(
                        input.device.id.clone(),
                        PatternType::Normal,
                        format!(
                            "{} event(s) observed, none matching an abnormal pattern",
                            input.events.len()
                        ),
                        Severity::Low,
                        0.0,
                        1.0,
                        first.time,
                        last.time,
                    )
                    .with_evidence(vec![
                        EventRef::from_event(first),
                        EventRef::from_event(last),
                    ]),
                );
            }
        }

        rank(&mut patterns);
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hearth_core::ids::{DeviceId, Platform};

    fn device() -> Device {
        Device::new(
            DeviceId::new(Platform::Virtual, "d1").unwrap(),
            "Test Switch",
        )
        .unwrap()
        .with_capability(Capability::Switch)
    }

    fn event_at(seconds: i64, value: &str) -> DeviceEvent {
        DeviceEvent::new(
            DeviceId::new(Platform::Virtual, "d1").unwrap(),
            Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap() + Duration::seconds(seconds),
            Capability::Switch,
            "switch",
            value,
        )
    }

    #[test]
    fn test_transitions_counts_first_event() {
        let events = vec![
            event_at(0, "on"),
            event_at(10, "on"),
            event_at(20, "off"),
            event_at(30, "off"),
            event_at(40, "on"),
        ];
        let groups = group_by_attribute(&events);
        let group = groups
            .get(&(Capability::Switch, "switch"))
            .expect("group exists");
        let t = transitions(group);
        assert_eq!(t.len(), 3);
        assert_eq!(t[0].time, events[0].time);
        assert_eq!(t[1].time, events[2].time);
        assert_eq!(t[2].time, events[4].time);
    }

    #[test]
    fn test_quiet_stream_yields_normal_pattern() {
        // A sensor reporting at a steady cadence triggers nothing.
        let device = Device::new(
            DeviceId::new(Platform::Virtual, "d1").unwrap(),
            "Hallway Thermometer",
        )
        .unwrap()
        .with_capability(Capability::TemperatureMeasurement);
        let t0 = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
        let events: Vec<DeviceEvent> = (0..4)
            .map(|i| {
                DeviceEvent::new(
                    device.id.clone(),
                    t0 + Duration::minutes(i * 10),
                    Capability::TemperatureMeasurement,
                    "temperature",
                    hearth_core::event::EventValue::Decimal(21.0 + i as f64 * 0.1),
                )
            })
            .collect();
        let input = DetectorInput {
            device: &device,
            events: &events,
            gaps: &[],
            commands: &[],
        };
        let patterns = DetectorChain::standard().run(&input);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pattern_type, PatternType::Normal);
        assert!(patterns[0].has_evidence());
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        let device = device();
        let input = DetectorInput {
            device: &device,
            events: &[],
            gaps: &[],
            commands: &[],
        };
        assert!(DetectorChain::standard().run(&input).is_empty());
    }
}
