//! Device descriptors.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::Capability;
use crate::error::Error;
use crate::ids::{DeviceId, Platform};

fn default_online() -> bool {
    true
}

/// A controllable or sensing endpoint known to the bridge.
///
/// The id is immutable after creation. Capabilities form a set: order
/// carries no meaning and duplicates collapse. Fields the current
/// version does not know about are preserved in `extra` so snapshots
/// written by newer versions survive a load/save round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique identifier, `<platform>:<native-id>`.
    pub id: DeviceId,
    /// Display name, never empty.
    pub name: String,
    /// User-assigned alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Room assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Declared abilities.
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Last known reachability.
    #[serde(default = "default_online")]
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Free-form platform metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Unknown snapshot attributes, kept for forward compatibility.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Device {
    /// Create a device with the mandatory fields. The name is trimmed;
    /// an empty name is rejected.
    pub fn new(id: DeviceId, name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(Error::invalid_input("name", "must not be empty"));
        }
        Ok(Self {
            id,
            name,
            label: None,
            room: None,
            capabilities: BTreeSet::new(),
            online: true,
            manufacturer: None,
            model: None,
            metadata: HashMap::new(),
            extra: HashMap::new(),
        })
    }

    /// Set the user alias.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the room.
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Add one capability.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Add several capabilities.
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    /// Mark the device offline.
    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The platform this device lives on (derived from the id).
    pub fn platform(&self) -> Platform {
        self.id.platform()
    }

    /// Whether the device declares the capability.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// The name users see: the alias when set, the display name otherwise.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Partial update for a device. `None` fields are left untouched.
///
/// The id is immutable: a patch carrying an id different from the
/// target device is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicePatch {
    /// Must match the target device when present.
    pub id: Option<DeviceId>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub room: Option<String>,
    pub capabilities: Option<BTreeSet<Capability>>,
    pub online: Option<bool>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
}

impl DevicePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn relabel(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn move_to_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn set_online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }

    pub fn set_capabilities(
        mut self,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        self.capabilities = Some(capabilities.into_iter().collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(native: &str) -> DeviceId {
        DeviceId::new(Platform::SmartThings, native).unwrap()
    }

    #[test]
    fn test_builder() {
        let device = Device::new(id("d1"), "Living Room Light")
            .unwrap()
            .with_label("the big lamp")
            .with_room("Living Room")
            .with_capability(Capability::Switch)
            .with_capability(Capability::SwitchLevel)
            .with_capability(Capability::Switch)
            .with_manufacturer("Acme");

        assert_eq!(device.capabilities.len(), 2);
        assert_eq!(device.display_name(), "the big lamp");
        assert_eq!(device.platform(), Platform::SmartThings);
        assert!(device.has_capability(Capability::Switch));
        assert!(device.online);
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(Device::new(id("d1"), "   ").is_err());
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let json = serde_json::json!({
            "id": "smartthings:d1",
            "name": "Sensor",
            "capabilities": ["battery"],
            "firmwareChannel": "beta"
        });
        let device: Device = serde_json::from_value(json).unwrap();
        assert_eq!(
            device.extra.get("firmwareChannel"),
            Some(&serde_json::json!("beta"))
        );

        let back = serde_json::to_value(&device).unwrap();
        assert_eq!(back["firmwareChannel"], serde_json::json!("beta"));
    }

    #[test]
    fn test_capability_set_is_order_insensitive() {
        let a: Device = serde_json::from_value(serde_json::json!({
            "id": "smartthings:d1",
            "name": "X",
            "capabilities": ["switch", "battery"]
        }))
        .unwrap();
        let b: Device = serde_json::from_value(serde_json::json!({
            "id": "smartthings:d1",
            "name": "X",
            "capabilities": ["battery", "switch", "battery"]
        }))
        .unwrap();
        assert_eq!(a.capabilities, b.capabilities);
    }
}
