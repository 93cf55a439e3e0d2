//! Platform adapter contract.
//!
//! The cloud platform client lives outside the core. Everything the
//! core needs from it is expressed here as an async trait; adapter
//! implementations translate platform-native failures into the shared
//! error taxonomy before they cross this boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hearth_core::capability::Capability;
use hearth_core::device::Device;
use hearth_core::error::{Error, Result};
use hearth_core::event::{DeviceEvent, EventValue};
use hearth_core::ids::DeviceId;

use crate::registry::DeviceFilter;

/// Last known attribute values, per capability.
pub type DeviceState = HashMap<Capability, HashMap<String, EventValue>>;

/// An outbound device command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub device_id: DeviceId,
    pub capability: Capability,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl CommandRequest {
    pub fn new(device_id: DeviceId, capability: Capability, command: impl Into<String>) -> Self {
        Self {
            device_id,
            capability,
            command: command.into(),
            args: None,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }
}

/// Acknowledgment for an accepted command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReceipt {
    /// The platform endpoint that served the call, used for rate-limit
    /// accounting.
    pub endpoint: String,
}

/// Parameters for an event-history fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRequest {
    pub device_id: DeviceId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Server-side capability filter, honored when the platform
    /// supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<Capability>>,
    /// Server-side attribute filter, honored when the platform
    /// supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,
    pub limit: usize,
    pub oldest_first: bool,
    /// Forwarded to the platform for query efficiency when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

/// A platform location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
}

/// A room within a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

/// A platform scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

/// The cloud platform, seen from the core.
///
/// These calls are the only suspension points in the core. Every error
/// crossing this boundary carries a classified kind from the shared
/// taxonomy.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Devices known to the platform, optionally filtered.
    async fn list_devices(&self, filter: Option<&DeviceFilter>) -> Result<Vec<Device>>;

    /// One device by id.
    async fn get_device(&self, id: &DeviceId) -> Result<Device>;

    /// Last known attribute values for one device.
    async fn get_device_state(&self, id: &DeviceId) -> Result<DeviceState>;

    /// Execute a command. Success or a classified error; the platform
    /// may still apply the command asynchronously.
    async fn execute_command(&self, request: &CommandRequest) -> Result<CommandReceipt>;

    /// Events for one device within `[start, end]`. Capability and
    /// attribute filters are applied server-side when
    /// [`PlatformAdapter::filters_events_server_side`] reports support.
    async fn list_events(&self, request: &EventRequest) -> Result<Vec<DeviceEvent>>;

    async fn list_locations(&self) -> Result<Vec<Location>>;

    async fn list_rooms(&self, location_id: Option<&str>) -> Result<Vec<Room>>;

    async fn list_scenes(&self, filter: Option<&str>) -> Result<Vec<Scene>>;

    async fn execute_scene(&self, scene_id: &str) -> Result<()>;

    /// Whether `list_events` honors capability/attribute filters
    /// server-side. When false the caller filters client-side.
    fn filters_events_server_side(&self) -> bool {
        false
    }
}

/// Shared adapter handle.
pub type DynAdapter = Arc<dyn PlatformAdapter>;

/// Run an adapter call under a deadline. Expiry maps to
/// [`Error::AdapterTimeout`] so callers degrade instead of hanging.
pub async fn with_deadline<T, F>(timeout_ms: u64, call: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
        Ok(result) => result,
        Err(_) => Err(Error::AdapterTimeout(timeout_ms)),
    }
}

/// Optional semantic search collaborator. Consumers fall back to
/// exact/fuzzy registry resolution when no index is wired in.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Ranked `(device, score)` pairs for a natural-language query.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<(DeviceId, f64)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let result = with_deadline(1000, async { Ok::<_, Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);

        let result: Result<u32> =
            with_deadline(1000, async { Err(Error::AdapterUnavailable("down".into())) }).await;
        assert!(matches!(result, Err(Error::AdapterUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_maps_to_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, Error>(1)
        };
        let result = with_deadline(50, slow).await;
        assert!(matches!(result, Err(Error::AdapterTimeout(50))));
    }
}
