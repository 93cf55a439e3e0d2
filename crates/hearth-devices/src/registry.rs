//! Device registry.
//!
//! Primary store plus five secondary indices (normalized name, alias,
//! room, platform, capability). One writer lock guards the whole inner
//! state, so every mutation lands in the primary map and all indices
//! atomically; readers never observe a torn state.
//!
//! Iteration order is insertion order: each device carries a monotonic
//! sequence assigned on add. `all()` returns devices in that order, and
//! the same order breaks ties in fuzzy resolution and feeds the
//! deterministic system-status sample.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use hearth_core::capability::Capability;
use hearth_core::config::defaults;
use hearth_core::device::{Device, DevicePatch};
use hearth_core::error::{Error, Result};
use hearth_core::fuzzy;
use hearth_core::ids::{DeviceId, Platform};

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// How a query matched a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactId,
    ExactName,
    Alias,
    Fuzzy,
}

/// A resolved device with the match evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub device: Device,
    pub match_type: MatchType,
    /// Present only for fuzzy matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Index-backed device filter. All present fields must hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceFilter {
    pub room: Option<String>,
    pub platform: Option<Platform>,
    pub capability: Option<Capability>,
    pub online: Option<bool>,
    /// Regex applied to the display name.
    pub name_pattern: Option<String>,
}

impl DeviceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn on_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }

    pub fn matching_name(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }
}

/// Registry counters, a read-only projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub rooms: usize,
    pub by_platform: HashMap<String, usize>,
    pub by_capability: HashMap<String, usize>,
}

/// Result of the secondary-index consistency probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexHealth {
    pub devices: usize,
    pub name_entries: usize,
    pub alias_entries: usize,
    pub room_entries: usize,
    pub platform_entries: usize,
    pub capability_entries: usize,
    pub consistent: bool,
    /// Human-readable descriptions of any violations found.
    pub problems: Vec<String>,
}

struct StoredDevice {
    device: Device,
    seq: u64,
}

struct RoomEntry {
    display: String,
    ids: HashSet<DeviceId>,
}

#[derive(Default)]
struct RegistryInner {
    devices: HashMap<DeviceId, StoredDevice>,
    order: Vec<DeviceId>,
    by_name: HashMap<String, DeviceId>,
    by_alias: HashMap<String, DeviceId>,
    by_room: HashMap<String, RoomEntry>,
    by_platform: HashMap<Platform, HashSet<DeviceId>>,
    by_capability: HashMap<Capability, HashSet<DeviceId>>,
    next_seq: u64,
}

impl RegistryInner {
    fn index_device(&mut self, device: &Device) {
        let id = device.id.clone();
        self.by_name.insert(normalize(&device.name), id.clone());
        if let Some(label) = &device.label {
            let key = normalize(label);
            if !key.is_empty() {
                self.by_alias.insert(key, id.clone());
            }
        }
        if let Some(room) = &device.room {
            let key = normalize(room);
            if !key.is_empty() {
                let entry = self.by_room.entry(key).or_insert_with(|| RoomEntry {
                    display: room.trim().to_string(),
                    ids: HashSet::new(),
                });
                entry.ids.insert(id.clone());
            }
        }
        self.by_platform
            .entry(device.platform())
            .or_default()
            .insert(id.clone());
        for capability in &device.capabilities {
            self.by_capability
                .entry(*capability)
                .or_default()
                .insert(id.clone());
        }
    }

    fn deindex_device(&mut self, device: &Device) {
        let id = &device.id;
        self.by_name.remove(&normalize(&device.name));
        if let Some(label) = &device.label {
            self.by_alias.remove(&normalize(label));
        }
        if let Some(room) = &device.room {
            let key = normalize(room);
            let emptied = match self.by_room.get_mut(&key) {
                Some(entry) => {
                    entry.ids.remove(id);
                    entry.ids.is_empty()
                }
                None => false,
            };
            if emptied {
                self.by_room.remove(&key);
            }
        }
        if let Some(set) = self.by_platform.get_mut(&device.platform()) {
            set.remove(id);
            if set.is_empty() {
                self.by_platform.remove(&device.platform());
            }
        }
        for capability in device.capabilities.clone() {
            let emptied = match self.by_capability.get_mut(&capability) {
                Some(set) => {
                    set.remove(id);
                    set.is_empty()
                }
                None => false,
            };
            if emptied {
                self.by_capability.remove(&capability);
            }
        }
    }

    /// Reject a name/alias that would collide with a different device.
    fn check_unique(&self, device: &Device, exclude: Option<&DeviceId>) -> Result<()> {
        let name_key = normalize(&device.name);
        if let Some(holder) = self.by_name.get(&name_key) {
            if Some(holder) != exclude {
                return Err(Error::invalid_input(
                    "name",
                    format!("'{}' is already used by {}", device.name, holder),
                ));
            }
        }
        if let Some(label) = &device.label {
            let alias_key = normalize(label);
            if !alias_key.is_empty() {
                if let Some(holder) = self.by_alias.get(&alias_key) {
                    if Some(holder) != exclude {
                        return Err(Error::invalid_input(
                            "label",
                            format!("alias '{label}' is already used by {holder}"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Fuzzy candidates in insertion order: each device contributes its
    /// name and, when present, its alias.
    fn fuzzy_candidates(&self) -> Vec<(String, DeviceId)> {
        let mut candidates = Vec::with_capacity(self.order.len() * 2);
        for id in &self.order {
            if let Some(stored) = self.devices.get(id) {
                candidates.push((stored.device.name.clone(), id.clone()));
                if let Some(label) = &stored.device.label {
                    candidates.push((label.clone(), id.clone()));
                }
            }
        }
        candidates
    }

    fn devices_in_order(&self, ids: impl IntoIterator<Item = DeviceId>) -> Vec<Device> {
        let mut found: Vec<&StoredDevice> = ids
            .into_iter()
            .filter_map(|id| self.devices.get(&id))
            .collect();
        found.sort_by_key(|stored| stored.seq);
        found.iter().map(|stored| stored.device.clone()).collect()
    }
}

/// Shared device store with exact, alias, and fuzzy resolution.
pub struct DeviceRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    fuzzy_threshold: f64,
}

impl DeviceRegistry {
    /// Empty registry with the default fuzzy threshold.
    pub fn new() -> Self {
        Self::with_threshold(defaults::FUZZY_THRESHOLD)
    }

    /// Empty registry with an explicit fuzzy threshold.
    pub fn with_threshold(fuzzy_threshold: f64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner::default())),
            fuzzy_threshold,
        }
    }

    /// Insert a device into the primary store and every index.
    ///
    /// Re-adding a known id is a no-op and returns `false`. A name or
    /// alias colliding with a different device is rejected, keeping
    /// both unique indices one-to-one.
    pub async fn add(&self, device: Device) -> Result<bool> {
        if device.name.trim().is_empty() {
            return Err(Error::invalid_input("name", "must not be empty"));
        }

        let mut inner = self.inner.write().await;
        if inner.devices.contains_key(&device.id) {
            tracing::debug!(device_id = %device.id, "add skipped, id already registered");
            return Ok(false);
        }
        inner.check_unique(&device, None)?;

        let id = device.id.clone();
        inner.index_device(&device);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push(id.clone());
        inner.devices.insert(id.clone(), StoredDevice { device, seq });
        tracing::debug!(device_id = %id, seq, "device added");
        Ok(true)
    }

    /// Remove a device from the primary store and every index.
    /// Returns `false` when the id is unknown.
    pub async fn remove(&self, id: &DeviceId) -> bool {
        let mut inner = self.inner.write().await;
        let stored = match inner.devices.remove(id) {
            Some(stored) => stored,
            None => return false,
        };
        inner.deindex_device(&stored.device);
        inner.order.retain(|other| other != id);
        tracing::debug!(device_id = %id, "device removed");
        true
    }

    /// Apply a partial update. Only indices whose keys change are
    /// touched. Returns `false` when the id is unknown.
    pub async fn update(&self, id: &DeviceId, patch: DevicePatch) -> Result<bool> {
        if let Some(patch_id) = &patch.id {
            if patch_id != id {
                return Err(Error::invalid_input("id", "device ids are immutable"));
            }
        }

        let mut inner = self.inner.write().await;
        let old = match inner.devices.get(id) {
            Some(stored) => stored.device.clone(),
            None => return Ok(false),
        };

        let mut updated = old.clone();
        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(Error::invalid_input("name", "must not be empty"));
            }
            updated.name = name;
        }
        if let Some(label) = patch.label {
            let label = label.trim().to_string();
            updated.label = if label.is_empty() { None } else { Some(label) };
        }
        if let Some(room) = patch.room {
            let room = room.trim().to_string();
            updated.room = if room.is_empty() { None } else { Some(room) };
        }
        if let Some(capabilities) = patch.capabilities {
            updated.capabilities = capabilities;
        }
        if let Some(online) = patch.online {
            updated.online = online;
        }
        if let Some(manufacturer) = patch.manufacturer {
            updated.manufacturer = Some(manufacturer);
        }
        if let Some(model) = patch.model {
            updated.model = Some(model);
        }
        if let Some(metadata) = patch.metadata {
            updated.metadata = metadata;
        }

        inner.check_unique(&updated, Some(id))?;

        // Swap index entries only where the keys moved.
        inner.deindex_device(&old);
        inner.index_device(&updated);
        if let Some(stored) = inner.devices.get_mut(id) {
            stored.device = updated;
        }
        tracing::debug!(device_id = %id, "device updated");
        Ok(true)
    }

    /// O(1) lookup by id.
    pub async fn get(&self, id: &DeviceId) -> Option<Device> {
        let inner = self.inner.read().await;
        inner.devices.get(id).map(|stored| stored.device.clone())
    }

    /// Resolve a free-form query to a device.
    ///
    /// Resolution order is strict: exact id, exact normalized name,
    /// exact normalized alias, then fuzzy over every indexed name and
    /// alias. Fuzzy ties go to the highest score, then to the earliest
    /// inserted device, so repeated calls against the same state return
    /// the same match.
    pub async fn resolve(&self, query: &str) -> Option<Resolution> {
        let inner = self.inner.read().await;

        if let Ok(id) = query.parse::<DeviceId>() {
            if let Some(stored) = inner.devices.get(&id) {
                return Some(Resolution {
                    device: stored.device.clone(),
                    match_type: MatchType::ExactId,
                    confidence: None,
                });
            }
        }

        let key = normalize(query);
        if let Some(id) = inner.by_name.get(&key) {
            let device = inner.devices.get(id)?.device.clone();
            return Some(Resolution {
                device,
                match_type: MatchType::ExactName,
                confidence: None,
            });
        }
        if let Some(id) = inner.by_alias.get(&key) {
            let device = inner.devices.get(id)?.device.clone();
            return Some(Resolution {
                device,
                match_type: MatchType::Alias,
                confidence: None,
            });
        }

        let candidates = inner.fuzzy_candidates();
        let names: Vec<&str> = candidates.iter().map(|(name, _)| name.as_str()).collect();
        let best = fuzzy::best_match(query, &names, self.fuzzy_threshold)?;
        let (_, id) = &candidates[best.index];
        let device = inner.devices.get(id)?.device.clone();
        Some(Resolution {
            device,
            match_type: MatchType::Fuzzy,
            confidence: Some(best.score),
        })
    }

    /// Like [`DeviceRegistry::resolve`], but a miss is an error
    /// carrying the closest names for the caller's message.
    pub async fn resolve_required(&self, query: &str) -> Result<Resolution> {
        if let Some(resolution) = self.resolve(query).await {
            return Ok(resolution);
        }
        let near_matches = self.near_matches(query, 3).await;
        Err(Error::DeviceNotFound {
            query: query.to_string(),
            near_matches,
        })
    }

    /// Closest indexed names to a query, best first, even below the
    /// resolve threshold. Used for "did you mean" error payloads.
    pub async fn near_matches(&self, query: &str, limit: usize) -> Vec<String> {
        let inner = self.inner.read().await;
        let candidates = inner.fuzzy_candidates();
        let names: Vec<&str> = candidates.iter().map(|(name, _)| name.as_str()).collect();
        let mut seen = HashSet::new();
        fuzzy::top_matches(query, &names, 0.3, None)
            .into_iter()
            .filter_map(|m| {
                let (_, id) = &candidates[m.index];
                let stored = inner.devices.get(id)?;
                if seen.insert(stored.device.id.clone()) {
                    Some(stored.device.name.clone())
                } else {
                    None
                }
            })
            .take(limit)
            .collect()
    }

    /// Index-backed filtered lookup.
    ///
    /// Starts from the smallest bound index set and narrows; a filter
    /// key absent from its index short-circuits to empty. Results come
    /// back in insertion order.
    pub async fn find(&self, filter: &DeviceFilter) -> Result<Vec<Device>> {
        let pattern = match &filter.name_pattern {
            Some(pattern) => Some(regex::Regex::new(pattern).map_err(|e| {
                Error::invalid_input("name_pattern", format!("invalid regex: {e}"))
            })?),
            None => None,
        };

        let inner = self.inner.read().await;
        let mut bound_sets: Vec<&HashSet<DeviceId>> = Vec::new();

        if let Some(room) = &filter.room {
            match inner.by_room.get(&normalize(room)) {
                Some(entry) => bound_sets.push(&entry.ids),
                None => return Ok(Vec::new()),
            }
        }
        if let Some(platform) = filter.platform {
            match inner.by_platform.get(&platform) {
                Some(set) => bound_sets.push(set),
                None => return Ok(Vec::new()),
            }
        }
        if let Some(capability) = filter.capability {
            match inner.by_capability.get(&capability) {
                Some(set) => bound_sets.push(set),
                None => return Ok(Vec::new()),
            }
        }

        bound_sets.sort_by_key(|set| set.len());
        let ids: Vec<DeviceId> = match bound_sets.split_first() {
            None => inner.order.clone(),
            Some((smallest, rest)) => smallest
                .iter()
                .filter(|id| rest.iter().all(|set| set.contains(*id)))
                .cloned()
                .collect(),
        };

        let devices = inner
            .devices_in_order(ids)
            .into_iter()
            .filter(|device| {
                if let Some(online) = filter.online {
                    if device.online != online {
                        return false;
                    }
                }
                if let Some(pattern) = &pattern {
                    if !pattern.is_match(&device.name) {
                        return false;
                    }
                }
                true
            })
            .collect();
        Ok(devices)
    }

    /// All known room display names, sorted.
    pub async fn rooms(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<String> = inner
            .by_room
            .values()
            .map(|entry| entry.display.clone())
            .collect();
        rooms.sort();
        rooms
    }

    /// Resolve a room query to its display name. An exact normalized
    /// match wins; otherwise a unique substring match is accepted, and
    /// several substring matches are reported as ambiguous.
    pub async fn room_by_name(&self, query: &str) -> Result<Option<String>> {
        let inner = self.inner.read().await;
        let key = normalize(query);
        if key.is_empty() {
            return Err(Error::invalid_input("room", "must not be empty"));
        }
        if let Some(entry) = inner.by_room.get(&key) {
            return Ok(Some(entry.display.clone()));
        }
        let mut matches: Vec<&RoomEntry> = inner
            .by_room
            .values()
            .filter(|entry| normalize(&entry.display).contains(&key))
            .collect();
        matches.sort_by(|a, b| a.display.cmp(&b.display));
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0].display.clone())),
            _ => Err(Error::Ambiguous {
                query: query.to_string(),
                candidates: matches.iter().map(|entry| entry.display.clone()).collect(),
            }),
        }
    }

    /// Devices assigned to a room, in insertion order.
    pub async fn devices_in_room(&self, room: &str) -> Vec<Device> {
        let inner = self.inner.read().await;
        match inner.by_room.get(&normalize(room)) {
            Some(entry) => inner.devices_in_order(entry.ids.iter().cloned().collect::<Vec<_>>()),
            None => Vec::new(),
        }
    }

    /// Every device, in insertion order.
    pub async fn all(&self) -> Vec<Device> {
        let inner = self.inner.read().await;
        inner.devices_in_order(inner.order.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.devices.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.devices.is_empty()
    }

    /// Drop everything, primary store and indices alike.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        *inner = RegistryInner::default();
        tracing::debug!("registry cleared");
    }

    /// Read-only counters.
    pub async fn stats(&self) -> RegistryStats {
        let inner = self.inner.read().await;
        let online = inner
            .devices
            .values()
            .filter(|stored| stored.device.online)
            .count();
        RegistryStats {
            total: inner.devices.len(),
            online,
            offline: inner.devices.len() - online,
            rooms: inner.by_room.len(),
            by_platform: inner
                .by_platform
                .iter()
                .map(|(platform, set)| (platform.as_str().to_string(), set.len()))
                .collect(),
            by_capability: inner
                .by_capability
                .iter()
                .map(|(capability, set)| (capability.as_str().to_string(), set.len()))
                .collect(),
        }
    }

    /// Verify that every secondary-index entry points at a device in
    /// the primary store. Violations are reported, not thrown; the
    /// system-status probe renders them.
    pub async fn verify_indices(&self) -> IndexHealth {
        let inner = self.inner.read().await;
        let mut problems = Vec::new();

        for (key, id) in &inner.by_name {
            if !inner.devices.contains_key(id) {
                problems.push(format!("name index entry '{key}' points at unknown {id}"));
            }
        }
        for (key, id) in &inner.by_alias {
            if !inner.devices.contains_key(id) {
                problems.push(format!("alias index entry '{key}' points at unknown {id}"));
            }
        }
        let mut room_entries = 0;
        for entry in inner.by_room.values() {
            room_entries += entry.ids.len();
            for id in &entry.ids {
                if !inner.devices.contains_key(id) {
                    problems.push(format!(
                        "room index '{}' holds unknown {id}",
                        entry.display
                    ));
                }
            }
        }
        let mut platform_entries = 0;
        for (platform, set) in &inner.by_platform {
            platform_entries += set.len();
            for id in set {
                if !inner.devices.contains_key(id) {
                    problems.push(format!("platform index '{platform}' holds unknown {id}"));
                }
            }
        }
        let mut capability_entries = 0;
        for (capability, set) in &inner.by_capability {
            capability_entries += set.len();
            for id in set {
                if !inner.devices.contains_key(id) {
                    problems.push(format!("capability index '{capability}' holds unknown {id}"));
                }
            }
        }
        for id in &inner.order {
            if !inner.devices.contains_key(id) {
                problems.push(format!("insertion order holds unknown {id}"));
            }
        }

        if !problems.is_empty() {
            tracing::error!(count = problems.len(), "registry index inconsistency");
        }

        IndexHealth {
            devices: inner.devices.len(),
            name_entries: inner.by_name.len(),
            alias_entries: inner.by_alias.len(),
            room_entries,
            platform_entries,
            capability_entries,
            consistent: problems.is_empty(),
            problems,
        }
    }

    /// Write the primary store to a self-describing JSON snapshot, in
    /// insertion order.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let devices = self.all().await;
        let json = serde_json::to_string_pretty(&devices)
            .map_err(|e| Error::Internal(format!("snapshot encode failed: {e}")))?;
        std::fs::write(path.as_ref(), json)
            .map_err(|e| Error::Internal(format!("snapshot write failed: {e}")))?;
        tracing::info!(count = devices.len(), path = %path.as_ref().display(), "registry saved");
        Ok(())
    }

    /// Clear, then re-add every device from a snapshot, rebuilding all
    /// indices. Records that fail validation are skipped with a
    /// warning. Returns the number of devices loaded.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<usize> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Internal(format!("snapshot read failed: {e}")))?;
        let devices: Vec<Device> = serde_json::from_str(&raw)
            .map_err(|e| Error::Internal(format!("snapshot decode failed: {e}")))?;

        self.clear().await;
        let mut loaded = 0;
        for device in devices {
            let id = device.id.clone();
            match self.add(device).await {
                Ok(true) => loaded += 1,
                Ok(false) => {
                    tracing::warn!(device_id = %id, "duplicate id in snapshot, skipped")
                }
                Err(e) => tracing::warn!(device_id = %id, error = %e, "invalid snapshot record, skipped"),
            }
        }
        tracing::info!(count = loaded, path = %path.as_ref().display(), "registry loaded");
        Ok(loaded)
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
