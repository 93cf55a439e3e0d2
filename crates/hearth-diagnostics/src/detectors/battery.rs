//! Battery-decline detector.
//!
//! Fits a least-squares line through the battery samples in the
//! window. A slope of one percent per day or steeper, landing on an
//! already-low level, is worth a finding; a healthy level declining
//! normally is not.

use hearth_core::capability::Capability;

use crate::pattern::{EventRef, Pattern, PatternType, Severity};

use super::{DetectorInput, PatternDetector};

/// Declines shallower than this (%/day) are normal drain.
const SLOPE_THRESHOLD: f64 = -1.0;

/// Flags batteries that are both declining and low.
pub struct BatteryDeclineDetector;

impl BatteryDeclineDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BatteryDeclineDetector {
    fn default() -> Self {
        Self::new()
    }
}

struct Fit {
    slope_per_day: f64,
    r_squared: f64,
}

/// Least-squares slope of `(days, value)` samples.
fn fit_line(samples: &[(f64, f64)]) -> Option<Fit> {
    let n = samples.len() as f64;
    if samples.len() < 2 {
        return None;
    }
    let mean_x = samples.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in samples {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x) * (x - mean_x);
        var_y += (y - mean_y) * (y - mean_y);
    }
    if var_x == 0.0 {
        return None;
    }
    let slope_per_day = cov / var_x;
    let r_squared = if var_y == 0.0 {
        // A perfectly flat line fits itself perfectly.
        1.0
    } else {
        (cov * cov) / (var_x * var_y)
    };
    Some(Fit {
        slope_per_day,
        r_squared,
    })
}

impl PatternDetector for BatteryDeclineDetector {
    fn name(&self) -> &'static str {
        "battery_decline"
    }

    fn detect(&self, input: &DetectorInput<'_>) -> Vec<Pattern> {
        let samples: Vec<_> = input
            .events
            .iter()
            .filter(|event| {
                event.capability == Capability::Battery && event.attribute == "battery"
            })
            .filter_map(|event| event.value.as_f64().map(|value| (event, value)))
            .collect();
        if samples.len() < 2 {
            return Vec::new();
        }

        let origin = samples[0].0.time;
        let points: Vec<(f64, f64)> = samples
            .iter()
            .map(|(event, value)| {
                let days = (event.time - origin).num_seconds() as f64 / 86_400.0;
                (days, *value)
            })
            .collect();
        let Some(fit) = fit_line(&points) else {
            return Vec::new();
        };
        if fit.slope_per_day > SLOPE_THRESHOLD {
            return Vec::new();
        }

        let (last_event, latest) = samples[samples.len() - 1];
        let severity = if latest < 10.0 {
            Severity::Critical
        } else if latest < 20.0 {
            Severity::High
        } else if latest < 30.0 {
            Severity::Medium
        } else {
            // Declining but still healthy; not worth a finding.
            return Vec::new();
        };

        let rate = -fit.slope_per_day;
        let pattern = Pattern::new(
            input.device.id.clone(),
            PatternType::BatteryDecline,
            format!(
                "battery declining about {rate:.1}%/day over {} sample(s), now at {latest:.0}%",
                samples.len()
            ),
            severity,
            (rate / 10.0).clamp(0.0, 1.0),
            fit.r_squared.clamp(0.0, 1.0),
            origin,
            last_event.time,
        )
        .with_evidence(
            samples
                .iter()
                .map(|(event, _)| EventRef::from_event(event))
                .collect(),
        )
        .with_detail("battery", format!("{latest:.0}"))
        .with_detail("rate", format!("{rate:.1}"));

        vec![pattern]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use hearth_core::device::Device;
    use hearth_core::event::{DeviceEvent, EventValue};
    use hearth_core::ids::{DeviceId, Platform};

    fn id() -> DeviceId {
        DeviceId::new(Platform::Virtual, "b1").unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()
    }

    fn device() -> Device {
        Device::new(id(), "Door Sensor")
            .unwrap()
            .with_capability(Capability::Battery)
    }

    fn battery_events(levels_per_day: &[i64]) -> Vec<DeviceEvent> {
        levels_per_day
            .iter()
            .enumerate()
            .map(|(day, level)| {
                DeviceEvent::new(
                    id(),
                    t0() + Duration::days(day as i64),
                    Capability::Battery,
                    "battery",
                    EventValue::Integer(*level),
                )
                .with_unit("%")
            })
            .collect()
    }

    fn run(events: &[DeviceEvent]) -> Vec<Pattern> {
        let device = device();
        let input = DetectorInput {
            device: &device,
            events,
            gaps: &[],
            commands: &[],
        };
        BatteryDeclineDetector::new().detect(&input)
    }

    #[test]
    fn test_steep_decline_to_low_level() {
        // 3%/day landing at 14%.
        let events = battery_events(&[26, 23, 20, 17, 14]);
        let patterns = run(&events);
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.severity, Severity::High);
        assert_eq!(pattern.details.get("battery").map(String::as_str), Some("14"));
        assert_eq!(pattern.details.get("rate").map(String::as_str), Some("3.0"));
        // A clean linear decline fits perfectly.
        assert!(pattern.confidence > 0.99);
        assert_eq!(pattern.evidence.len(), 5);
    }

    #[test]
    fn test_critical_below_ten() {
        let events = battery_events(&[21, 17, 13, 9]);
        let patterns = run(&events);
        assert_eq!(patterns[0].severity, Severity::Critical);
    }

    #[test]
    fn test_medium_below_thirty() {
        let events = battery_events(&[33, 31, 29]);
        let patterns = run(&events);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].severity, Severity::Medium);
    }

    #[test]
    fn test_healthy_level_omitted() {
        // Declining fast but still at 80%.
        let events = battery_events(&[90, 85, 80]);
        assert!(run(&events).is_empty());
    }

    #[test]
    fn test_shallow_decline_omitted() {
        // Half a percent per day.
        let events = battery_events(&[25, 25, 24]);
        assert!(run(&events).is_empty());
    }

    #[test]
    fn test_single_sample_omitted() {
        let events = battery_events(&[9]);
        assert!(run(&events).is_empty());
    }
}
