//! Device capabilities and their command vocabulary.
//!
//! A capability is a semantic ability a device declares (switch, lock,
//! battery, ...). The set is closed: each capability carries a static
//! table of the command verbs it accepts and the attribute it reports.
//! The tables are compiled into the binary; nothing registers
//! capabilities at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic device abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Switch,
    SwitchLevel,
    Battery,
    MotionSensor,
    ContactSensor,
    TemperatureMeasurement,
    RelativeHumidityMeasurement,
    ColorControl,
    Lock,
    Thermostat,
    PowerMeter,
    Refresh,
}

impl Capability {
    /// Every known capability.
    pub fn all() -> &'static [Capability] {
        use Capability::*;
        &[
            Switch,
            SwitchLevel,
            Battery,
            MotionSensor,
            ContactSensor,
            TemperatureMeasurement,
            RelativeHumidityMeasurement,
            ColorControl,
            Lock,
            Thermostat,
            PowerMeter,
            Refresh,
        ]
    }

    /// camelCase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Switch => "switch",
            Capability::SwitchLevel => "switchLevel",
            Capability::Battery => "battery",
            Capability::MotionSensor => "motionSensor",
            Capability::ContactSensor => "contactSensor",
            Capability::TemperatureMeasurement => "temperatureMeasurement",
            Capability::RelativeHumidityMeasurement => "relativeHumidityMeasurement",
            Capability::ColorControl => "colorControl",
            Capability::Lock => "lock",
            Capability::Thermostat => "thermostat",
            Capability::PowerMeter => "powerMeter",
            Capability::Refresh => "refresh",
        }
    }

    /// Parse a camelCase wire name.
    pub fn parse(s: &str) -> Option<Capability> {
        let s = s.trim();
        Capability::all().iter().copied().find(|c| c.as_str() == s)
    }

    /// Command verbs this capability accepts. Sensor-only capabilities
    /// accept none.
    pub fn commands(&self) -> &'static [&'static str] {
        match self {
            Capability::Switch => &["on", "off"],
            Capability::SwitchLevel => &["setLevel"],
            Capability::ColorControl => &["setColor", "setHue", "setSaturation"],
            Capability::Lock => &["lock", "unlock"],
            Capability::Thermostat => &[
                "setHeatingSetpoint",
                "setCoolingSetpoint",
                "setThermostatMode",
            ],
            Capability::Refresh => &["refresh"],
            Capability::Battery
            | Capability::MotionSensor
            | Capability::ContactSensor
            | Capability::TemperatureMeasurement
            | Capability::RelativeHumidityMeasurement
            | Capability::PowerMeter => &[],
        }
    }

    /// Whether the verb is legal for this capability.
    pub fn supports_command(&self, command: &str) -> bool {
        self.commands().contains(&command)
    }

    /// The attribute the capability reports, when it reports one.
    pub fn primary_attribute(&self) -> Option<&'static str> {
        match self {
            Capability::Switch => Some("switch"),
            Capability::SwitchLevel => Some("level"),
            Capability::Battery => Some("battery"),
            Capability::MotionSensor => Some("motion"),
            Capability::ContactSensor => Some("contact"),
            Capability::TemperatureMeasurement => Some("temperature"),
            Capability::RelativeHumidityMeasurement => Some("humidity"),
            Capability::ColorControl => Some("color"),
            Capability::Lock => Some("lock"),
            Capability::Thermostat => Some("thermostatMode"),
            Capability::PowerMeter => Some("power"),
            Capability::Refresh => None,
        }
    }

    /// Whether the capability can be commanded at all.
    pub fn is_actuator(&self) -> bool {
        !self.commands().is_empty()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
