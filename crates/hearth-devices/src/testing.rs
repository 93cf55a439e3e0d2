//! Scripted in-memory platform adapter.
//!
//! Backs unit and integration tests across the workspace: canned
//! devices, event streams, and states, plus per-method failure and
//! latency injection. Not gated behind `cfg(test)` so downstream
//! crates can drive it from their own test suites.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use hearth_core::device::Device;
use hearth_core::error::{Error, Result};
use hearth_core::event::DeviceEvent;
use hearth_core::ids::DeviceId;

use crate::adapter::{
    CommandReceipt, CommandRequest, DeviceState, EventRequest, Location, PlatformAdapter, Room,
    Scene,
};
use crate::registry::DeviceFilter;

#[derive(Default)]
struct SimState {
    devices: Vec<Device>,
    states: HashMap<DeviceId, DeviceState>,
    events: HashMap<DeviceId, Vec<DeviceEvent>>,
    locations: Vec<Location>,
    rooms: Vec<Room>,
    scenes: Vec<Scene>,
    fail: HashMap<&'static str, Error>,
    latency: Option<Duration>,
    command_log: Vec<CommandRequest>,
    executed_scenes: Vec<String>,
}

/// Scripted adapter. Construct with the builder methods, then hand an
/// `Arc` of it wherever a [`PlatformAdapter`] is expected.
#[derive(Default)]
pub struct SimulatedAdapter {
    state: Mutex<SimState>,
}

impl SimulatedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a device.
    pub fn with_device(self, device: Device) -> Self {
        {
            let mut state = self.lock();
            state.devices.push(device);
        }
        self
    }

    /// Seed an event stream for a device. Events are served in the
    /// order given; callers sort.
    pub fn with_events(self, id: DeviceId, events: Vec<DeviceEvent>) -> Self {
        {
            let mut state = self.lock();
            state.events.entry(id).or_default().extend(events);
        }
        self
    }

    /// Seed last known state for a device.
    pub fn with_state(self, id: DeviceId, device_state: DeviceState) -> Self {
        {
            let mut state = self.lock();
            state.states.insert(id, device_state);
        }
        self
    }

    pub fn with_location(self, location: Location) -> Self {
        {
            let mut state = self.lock();
            state.locations.push(location);
        }
        self
    }

    pub fn with_room(self, room: Room) -> Self {
        {
            let mut state = self.lock();
            state.rooms.push(room);
        }
        self
    }

    pub fn with_scene(self, scene: Scene) -> Self {
        {
            let mut state = self.lock();
            state.scenes.push(scene);
        }
        self
    }

    /// Make one adapter method fail with the given error. Method names
    /// match the trait: `"list_events"`, `"execute_command"`, ...
    pub fn fail_on(self, method: &'static str, error: Error) -> Self {
        {
            let mut state = self.lock();
            state.fail.insert(method, error);
        }
        self
    }

    /// Delay every call, for deadline tests.
    pub fn with_latency(self, latency: Duration) -> Self {
        {
            let mut state = self.lock();
            state.latency = Some(latency);
        }
        self
    }

    /// Commands received so far, in arrival order.
    pub fn command_log(&self) -> Vec<CommandRequest> {
        self.lock().command_log.clone()
    }

    /// Scene ids executed so far.
    pub fn executed_scenes(&self) -> Vec<String> {
        self.lock().executed_scenes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn gate(&self, method: &'static str) -> Result<()> {
        let (latency, failure) = {
            let state = self.lock();
            (state.latency, state.fail.get(method).cloned())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformAdapter for SimulatedAdapter {
    async fn list_devices(&self, filter: Option<&DeviceFilter>) -> Result<Vec<Device>> {
        self.gate("list_devices").await?;
        let state = self.lock();
        let devices = state
            .devices
            .iter()
            .filter(|device| match filter {
                Some(filter) => {
                    filter
                        .room
                        .as_ref()
                        .map_or(true, |room| device.room.as_deref() == Some(room.as_str()))
                        && filter.platform.map_or(true, |p| device.platform() == p)
                        && filter
                            .capability
                            .map_or(true, |c| device.has_capability(c))
                        && filter.online.map_or(true, |o| device.online == o)
                }
                None => true,
            })
            .cloned()
            .collect();
        Ok(devices)
    }

    async fn get_device(&self, id: &DeviceId) -> Result<Device> {
        self.gate("get_device").await?;
        let state = self.lock();
        state
            .devices
            .iter()
            .find(|device| &device.id == id)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound {
                query: id.to_string(),
                near_matches: Vec::new(),
            })
    }

    async fn get_device_state(&self, id: &DeviceId) -> Result<DeviceState> {
        self.gate("get_device_state").await?;
        let state = self.lock();
        state
            .states
            .get(id)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound {
                query: id.to_string(),
                near_matches: Vec::new(),
            })
    }

    async fn execute_command(&self, request: &CommandRequest) -> Result<CommandReceipt> {
        self.gate("execute_command").await?;
        let mut state = self.lock();
        state.command_log.push(request.clone());
        Ok(CommandReceipt {
            endpoint: format!("/devices/{}/commands", request.device_id),
        })
    }

    async fn list_events(&self, request: &EventRequest) -> Result<Vec<DeviceEvent>> {
        self.gate("list_events").await?;
        let state = self.lock();
        let mut events: Vec<DeviceEvent> = state
            .events
            .get(&request.device_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| event.time >= request.start && event.time <= request.end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // The simulated platform does not filter server-side; like the
        // real one it windows, orders, and caps.
        events.sort_by_key(|event| event.time);
        if !request.oldest_first {
            events.reverse();
        }
        events.truncate(request.limit);
        Ok(events)
    }

    async fn list_locations(&self) -> Result<Vec<Location>> {
        self.gate("list_locations").await?;
        Ok(self.lock().locations.clone())
    }

    async fn list_rooms(&self, location_id: Option<&str>) -> Result<Vec<Room>> {
        self.gate("list_rooms").await?;
        let state = self.lock();
        Ok(state
            .rooms
            .iter()
            .filter(|room| match location_id {
                Some(location_id) => room.location_id.as_deref() == Some(location_id),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn list_scenes(&self, filter: Option<&str>) -> Result<Vec<Scene>> {
        self.gate("list_scenes").await?;
        let state = self.lock();
        Ok(state
            .scenes
            .iter()
            .filter(|scene| match filter {
                Some(needle) => scene.name.to_lowercase().contains(&needle.to_lowercase()),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn execute_scene(&self, scene_id: &str) -> Result<()> {
        self.gate("execute_scene").await?;
        let mut state = self.lock();
        let known = state.scenes.iter().any(|scene| scene.id == scene_id);
        if !known {
            return Err(Error::DeviceNotFound {
                query: scene_id.to_string(),
                near_matches: Vec::new(),
            });
        }
        state.executed_scenes.push(scene_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hearth_core::capability::Capability;
    use hearth_core::ids::Platform;

    fn id(native: &str) -> DeviceId {
        DeviceId::new(Platform::Virtual, native).unwrap()
    }

    #[tokio::test]
    async fn test_event_windowing() {
        let t0 = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let events = vec![
            DeviceEvent::new(id("d1"), t0, Capability::Switch, "switch", "on"),
            DeviceEvent::new(
                id("d1"),
                t0 + chrono::Duration::hours(2),
                Capability::Switch,
                "switch",
                "off",
            ),
        ];
        let adapter = SimulatedAdapter::new().with_events(id("d1"), events);

        let request = EventRequest {
            device_id: id("d1"),
            start: t0 + chrono::Duration::hours(1),
            end: t0 + chrono::Duration::hours(3),
            capabilities: None,
            attributes: None,
            limit: 100,
            oldest_first: true,
            location_id: None,
        };
        let got = adapter.list_events(&request).await.unwrap();
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let adapter =
            SimulatedAdapter::new().fail_on("list_locations", Error::AdapterUnavailable("down".into()));
        assert!(adapter.list_locations().await.is_err());
        // Other methods are unaffected.
        assert!(adapter.list_devices(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_command_log() {
        let adapter = SimulatedAdapter::new();
        let request = CommandRequest::new(id("d1"), Capability::Switch, "on");
        adapter.execute_command(&request).await.unwrap();
        let log = adapter.command_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].command, "on");
    }
}
