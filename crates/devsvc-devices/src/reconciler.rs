//! Lifecycle reconciliation.
//!
//! The metadata authority pushes `(action, device id)` notifications. For an
//! upsert the reconciler fetches the authoritative definition and decides
//! whether the device is newly owned, changed, unchanged as far as the driver
//! is concerned, or has moved to another service. The store is updated
//! accordingly and the matching lifecycle hook fires.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapter::DriverAdapter;
use crate::hooks::HookRegistry;
use crate::metadata::MetadataClient;
use crate::model::ProtocolDescriptor;
use crate::store::{DeviceStore, ReconcileOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Device created or updated at the authority.
    Upsert,
    /// Device deleted at the authority.
    Delete,
}

/// A lifecycle notification that passed transport validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleNotification {
    pub action: LifecycleAction,
    pub device_id: String,
}

impl LifecycleNotification {
    pub fn upsert(device_id: impl Into<String>) -> Self {
        Self {
            action: LifecycleAction::Upsert,
            device_id: device_id.into(),
        }
    }

    pub fn delete(device_id: impl Into<String>) -> Self {
        Self {
            action: LifecycleAction::Delete,
            device_id: device_id.into(),
        }
    }
}

/// What handling a notification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileReport {
    /// The device is owned and was written to the store.
    Stored(ReconcileOutcome),
    /// The device was deleted and removed from the store.
    Removed,
    /// Delete for a device that was not in the store.
    NotPresent,
    /// The device now belongs to another service.
    OwnershipLost { owner: String, was_present: bool },
    /// The notification could not be processed and was dropped.
    Dropped(String),
}

pub struct LifecycleReconciler {
    service_name: String,
    store: Arc<DeviceStore>,
    metadata: Arc<dyn MetadataClient>,
    hooks: Arc<HookRegistry>,
    driver: Arc<dyn DriverAdapter>,
}

impl LifecycleReconciler {
    pub fn new(
        service_name: impl Into<String>,
        store: Arc<DeviceStore>,
        metadata: Arc<dyn MetadataClient>,
        hooks: Arc<HookRegistry>,
        driver: Arc<dyn DriverAdapter>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            store,
            metadata,
            hooks,
            driver,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Apply one notification. Failures are logged and reported, never
    /// retried.
    pub async fn handle(&self, notification: LifecycleNotification) -> ReconcileReport {
        let LifecycleNotification { action, device_id } = notification;
        match action {
            LifecycleAction::Delete => self.handle_delete(&device_id).await,
            LifecycleAction::Upsert => self.handle_upsert(&device_id).await,
        }
    }

    async fn handle_delete(&self, id: &str) -> ReconcileReport {
        let Some(removed) = self.store.remove(id) else {
            debug!("Delete for unknown device {}, ignoring", id);
            return ReconcileReport::NotPresent;
        };

        info!("Device {} ({}) deleted", removed.name, id);
        self.hooks.fire_remove(&removed.name, &removed.protocols);
        self.disconnect(&removed.name, &removed.protocols).await;
        ReconcileReport::Removed
    }

    async fn handle_upsert(&self, id: &str) -> ReconcileReport {
        // No store lock is held across the fetch.
        let device = match self.metadata.fetch_device(id).await {
            Ok(device) => device,
            Err(e) => {
                warn!("Dropping update for device {}: {}", id, e);
                return ReconcileReport::Dropped(e.to_string());
            }
        };

        if device.id != id {
            warn!(
                "Metadata returned device {} for requested id {}, dropping",
                device.id, id
            );
            return ReconcileReport::Dropped(format!("id mismatch: {}", device.id));
        }

        if !device.is_owned_by(&self.service_name) {
            let owner = device.service.name.clone();
            let was_present = self.store.remove(id).is_some();
            if was_present {
                info!("Device {} ({}) moved to service '{}'", device.name, id, owner);
                self.hooks.fire_remove(&device.name, &device.protocols);
                self.disconnect(&device.name, &device.protocols).await;
            } else {
                debug!("Device {} belongs to service '{}', ignoring", id, owner);
            }
            return ReconcileReport::OwnershipLost { owner, was_present };
        }

        let name = device.name.clone();
        let protocols = device.protocols.clone();
        let admin_state = device.admin_state;

        let outcome = self.store.put(device);
        match outcome {
            ReconcileOutcome::Created => {
                info!("Device {} ({}) added", name, id);
                self.hooks.fire_add(&name, &protocols, admin_state);
            }
            ReconcileOutcome::UpdatedLocally => {
                info!("Device {} ({}) updated", name, id);
                self.hooks.fire_update(&name, &protocols, admin_state);
            }
            ReconcileOutcome::UpdatedRemoteOnly => {
                debug!("Device {} ({}) metadata refreshed", name, id);
            }
        }
        ReconcileReport::Stored(outcome)
    }

    async fn disconnect(&self, name: &str, protocols: &[ProtocolDescriptor]) {
        if let Err(e) = self.driver.disconnect(protocols).await {
            warn!(
                "Driver {} failed to disconnect device {}: {}",
                self.driver.name(),
                name,
                e
            );
        }
    }
}
