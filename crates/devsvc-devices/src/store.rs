//! Device store - the local mirror of the devices this service manages.
//!
//! Devices are held as `Arc<Device>` so lookups hand out shared, immutable
//! snapshots. Every mutation happens under a single write lock, which keeps
//! the id index and the name index consistent with each other and makes
//! `put` an atomic compare-and-decide. The lock is synchronous and never
//! held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::Device;

/// What a `put` did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// No entry existed for the id.
    Created,
    /// The entry existed and its protocols changed; the driver must be told.
    UpdatedLocally,
    /// The entry existed and only fields the driver does not see changed.
    UpdatedRemoteOnly,
}

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, Arc<Device>>,
    /// name -> id
    by_name: HashMap<String, String>,
}

impl Entries {
    fn insert(&mut self, device: Arc<Device>) -> Option<Arc<Device>> {
        let previous = self.by_id.insert(device.id.clone(), Arc::clone(&device));

        if let Some(prev) = &previous {
            if prev.name != device.name
                && self.by_name.get(&prev.name).map(String::as_str) == Some(prev.id.as_str())
            {
                self.by_name.remove(&prev.name);
            }
        }

        if let Some(other_id) = self.by_name.get(&device.name) {
            if other_id != &device.id {
                warn!(
                    "Device name '{}' moved from id {} to id {}",
                    device.name, other_id, device.id
                );
            }
        }
        self.by_name.insert(device.name.clone(), device.id.clone());

        previous
    }

    fn remove(&mut self, id: &str) -> Option<Arc<Device>> {
        let removed = self.by_id.remove(id)?;
        if self.by_name.get(&removed.name).map(String::as_str) == Some(id) {
            self.by_name.remove(&removed.name);
        }
        Some(removed)
    }
}

/// Concurrent device store keyed by id and by name.
#[derive(Default)]
pub struct DeviceStore {
    entries: RwLock<Entries>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a device by id.
    pub fn get(&self, id: &str) -> Option<Arc<Device>> {
        self.entries.read().by_id.get(id).cloned()
    }

    /// Look up a device by name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Device>> {
        let entries = self.entries.read();
        let id = entries.by_name.get(name)?;
        entries.by_id.get(id).cloned()
    }

    /// Insert or replace a device and report what kind of change it was.
    ///
    /// Only the protocol lists are compared; administrative state, name and
    /// profile changes count as remote-only.
    pub fn put(&self, device: Device) -> ReconcileOutcome {
        let device = Arc::new(device);
        let mut entries = self.entries.write();
        match entries.insert(Arc::clone(&device)) {
            None => ReconcileOutcome::Created,
            Some(previous) if previous.protocols_match(&device) => {
                ReconcileOutcome::UpdatedRemoteOnly
            }
            Some(_) => ReconcileOutcome::UpdatedLocally,
        }
    }

    /// Remove a device, returning the snapshot that was stored.
    pub fn remove(&self, id: &str) -> Option<Arc<Device>> {
        self.entries.write().remove(id)
    }

    /// Snapshot of every device, sorted by name.
    pub fn list(&self) -> Vec<Arc<Device>> {
        let mut devices: Vec<_> = self.entries.read().by_id.values().cloned().collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    pub fn len(&self) -> usize {
        self.entries.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole contents with `devices`.
    pub fn load(&self, devices: impl IntoIterator<Item = Device>) -> usize {
        let mut fresh = Entries::default();
        for device in devices {
            fresh.insert(Arc::new(device));
        }
        let count = fresh.by_id.len();
        *self.entries.write() = fresh;
        count
    }

    pub fn clear(&self) {
        *self.entries.write() = Entries::default();
    }
}
