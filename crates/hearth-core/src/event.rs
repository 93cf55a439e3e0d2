//! Device events.
//!
//! An event is one observed change to one attribute at a point in time.
//! Events are ephemeral: they flow from the adapter through the query
//! engine into the detectors and are never stored by the core.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::Capability;
use crate::ids::DeviceId;

/// Attribute value, tagged by shape. Formatters switch on the tag
/// instead of sniffing JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    Object(Value),
}

impl EventValue {
    /// Interpret the value as a number when it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EventValue::Integer(n) => Some(*n as f64),
            EventValue::Decimal(f) => Some(*f),
            _ => None,
        }
    }

    /// Borrow the value as text when it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert an arbitrary JSON value into the tagged form.
    pub fn from_json(value: Value) -> EventValue {
        match value {
            Value::Bool(b) => EventValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    EventValue::Integer(i)
                } else {
                    EventValue::Decimal(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => EventValue::Text(s),
            other => EventValue::Object(other),
        }
    }
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::Bool(b) => write!(f, "{b}"),
            EventValue::Integer(n) => write!(f, "{n}"),
            EventValue::Decimal(d) => write!(f, "{d}"),
            EventValue::Text(s) => f.write_str(s),
            EventValue::Object(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for EventValue {
    fn from(s: &str) -> Self {
        EventValue::Text(s.to_string())
    }
}

impl From<i64> for EventValue {
    fn from(n: i64) -> Self {
        EventValue::Integer(n)
    }
}

impl From<f64> for EventValue {
    fn from(f: f64) -> Self {
        EventValue::Decimal(f)
    }
}

impl From<bool> for EventValue {
    fn from(b: bool) -> Self {
        EventValue::Bool(b)
    }
}

/// One observed attribute change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// The device that reported the change.
    pub device_id: DeviceId,
    /// When the platform observed it (UTC).
    pub time: DateTime<Utc>,
    /// The capability the attribute belongs to.
    pub capability: Capability,
    /// Attribute name, e.g. `switch` or `temperature`.
    pub attribute: String,
    /// New value.
    pub value: EventValue,
    /// Unit suffix, e.g. `%` or `°C`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Device component; `main` for single-component devices.
    #[serde(default = "default_component")]
    pub component: String,
    /// Platform-provided display text, preferred by formatters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Localized attribute name, when the platform provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_attribute: Option<String>,
    /// Localized value, when the platform provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_value: Option<String>,
}

fn default_component() -> String {
    "main".to_string()
}

impl DeviceEvent {
    /// Create an event with the mandatory fields.
    pub fn new(
        device_id: DeviceId,
        time: DateTime<Utc>,
        capability: Capability,
        attribute: impl Into<String>,
        value: impl Into<EventValue>,
    ) -> Self {
        Self {
            device_id,
            time,
            capability,
            attribute: attribute.into(),
            value: value.into(),
            unit: None,
            component: default_component(),
            text: None,
            translated_attribute: None,
            translated_value: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Whether this event belongs to the default component.
    pub fn is_main_component(&self) -> bool {
        self.component == "main"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Platform;
    use chrono::TimeZone;

    fn event() -> DeviceEvent {
        DeviceEvent::new(
            DeviceId::new(Platform::SmartThings, "d1").unwrap(),
            Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap(),
            Capability::Switch,
            "switch",
            "on",
        )
    }

    #[test]
    fn test_value_tagging() {
        assert_eq!(
            EventValue::from_json(serde_json::json!(42)),
            EventValue::Integer(42)
        );
        assert_eq!(
            EventValue::from_json(serde_json::json!(71.5)),
            EventValue::Decimal(71.5)
        );
        assert_eq!(
            EventValue::from_json(serde_json::json!("on")),
            EventValue::Text("on".into())
        );
        assert_eq!(
            EventValue::from_json(serde_json::json!(true)),
            EventValue::Bool(true)
        );
        assert!(matches!(
            EventValue::from_json(serde_json::json!({"hue": 30})),
            EventValue::Object(_)
        ));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(EventValue::Integer(85).to_string(), "85");
        assert_eq!(EventValue::Text("open".into()).to_string(), "open");
        assert_eq!(EventValue::Bool(false).to_string(), "false");
    }

    #[test]
    fn test_event_defaults() {
        let e = event();
        assert!(e.is_main_component());
        assert!(e.unit.is_none());
        assert!(e.text.is_none());
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let e = event().with_unit("%").with_text("Switch is on");
        let json = serde_json::to_string(&e).unwrap();
        let back: DeviceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
