//! Device identifiers.
//!
//! Every device is addressed as `<platform>:<native-id>`. Parsing and
//! formatting of that form live here; the rest of the workspace treats
//! ids as opaque tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Source platform a device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// The primary cloud platform.
    SmartThings,
    /// Philips Hue bridge devices.
    Hue,
    /// TP-Link Kasa devices.
    Kasa,
    /// Locally simulated devices (tests and demos).
    Virtual,
}

impl Platform {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::SmartThings => "smartthings",
            Platform::Hue => "hue",
            Platform::Kasa => "kasa",
            Platform::Virtual => "virtual",
        }
    }

    /// Parse a lowercase wire name.
    pub fn parse(s: &str) -> Option<Platform> {
        match s.trim().to_lowercase().as_str() {
            "smartthings" => Some(Platform::SmartThings),
            "hue" => Some(Platform::Hue),
            "kasa" => Some(Platform::Kasa),
            "virtual" => Some(Platform::Virtual),
            _ => None,
        }
    }

    /// All known platforms.
    pub fn all() -> &'static [Platform] {
        &[
            Platform::SmartThings,
            Platform::Hue,
            Platform::Kasa,
            Platform::Virtual,
        ]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque device identifier, unique across the process and never reused.
///
/// Rendered as `<platform>:<native-id>`, e.g. `smartthings:6f3a-9c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    platform: Platform,
    native_id: String,
}

impl DeviceId {
    /// Build an id from its parts. The native id is trimmed; an empty
    /// native id is rejected.
    pub fn new(platform: Platform, native_id: impl Into<String>) -> Result<Self, Error> {
        let native_id = native_id.into().trim().to_string();
        if native_id.is_empty() {
            return Err(Error::invalid_input("native_id", "must not be empty"));
        }
        if native_id.contains(':') {
            return Err(Error::invalid_input(
                "native_id",
                "must not contain ':' (reserved separator)",
            ));
        }
        Ok(Self {
            platform,
            native_id,
        })
    }

    /// The platform this id belongs to.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The platform-native portion of the id.
    pub fn native_id(&self) -> &str {
        &self.native_id
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.native_id)
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (platform, native) = s.split_once(':').ok_or_else(|| {
            Error::invalid_input("device_id", format!("'{s}' is not of the form <platform>:<id>"))
        })?;
        let platform = Platform::parse(platform).ok_or_else(|| {
            Error::invalid_input("device_id", format!("unknown platform '{platform}'"))
        })?;
        DeviceId::new(platform, native)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let id = DeviceId::new(Platform::SmartThings, "abc-123").unwrap();
        assert_eq!(id.to_string(), "smartthings:abc-123");
        let parsed: DeviceId = "smartthings:abc-123".parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.platform(), Platform::SmartThings);
        assert_eq!(parsed.native_id(), "abc-123");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("no-separator".parse::<DeviceId>().is_err());
        assert!("zwave:abc".parse::<DeviceId>().is_err());
        assert!(DeviceId::new(Platform::Hue, "").is_err());
        assert!(DeviceId::new(Platform::Hue, "a:b").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let id = DeviceId::new(Platform::Hue, "bulb-7").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"hue:bulb-7\"");
        let back: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_trims_whitespace() {
        let parsed: DeviceId = "  kasa:plug-1 ".parse().unwrap();
        assert_eq!(parsed.native_id(), "plug-1");
    }
}
