//! Device Service - the runtime that hosts a driver.
//!
//! `DeviceService` wires the store, reconciler, command bridge and hook
//! registry around one driver and one metadata client, and owns the
//! start/stop lifecycle. The transport talks only to this type.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use devsvc_core::ServiceConfig;

use crate::adapter::{AdapterError, DriverAdapter, DriverContext};
use crate::bridge::{CommandBridge, CommandError, Reading};
use crate::hooks::{DeviceLifecycleHooks, HookError, HookRegistry};
use crate::metadata::{MetadataClient, MetadataError, MetadataResult};
use crate::model::{Device, DeviceProfile};
use crate::profiles::{ProfileCache, ProfileError};
use crate::reconciler::{LifecycleNotification, LifecycleReconciler, ReconcileReport};
use crate::store::DeviceStore;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Driver initialization failed: {0}")]
    DriverInit(#[source] AdapterError),

    #[error("Initial device sync failed: {0}")]
    InitialSync(#[from] MetadataError),

    #[error("Device profile upload failed: {0}")]
    Profiles(#[from] ProfileError),

    #[error("Service already started")]
    AlreadyStarted,

    #[error("Service is not running")]
    NotRunning,

    #[error("Discovery already in progress")]
    DiscoveryInProgress,

    #[error(transparent)]
    Hooks(#[from] HookError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// How a command caller identifies a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKey<'a> {
    Id(&'a str),
    Name(&'a str),
}

impl std::fmt::Display for DeviceKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => write!(f, "name:{}", name),
        }
    }
}

pub struct DeviceService {
    config: ServiceConfig,
    store: Arc<DeviceStore>,
    hooks: Arc<HookRegistry>,
    driver: Arc<dyn DriverAdapter>,
    metadata: Arc<dyn MetadataClient>,
    profiles: ProfileCache,
    reconciler: LifecycleReconciler,
    bridge: CommandBridge,
    running: AtomicBool,
    discovering: AtomicBool,
}

impl DeviceService {
    pub fn new(
        config: ServiceConfig,
        driver: Arc<dyn DriverAdapter>,
        metadata: Arc<dyn MetadataClient>,
    ) -> Self {
        let store = Arc::new(DeviceStore::new());
        let hooks = Arc::new(HookRegistry::new());
        let reconciler = LifecycleReconciler::new(
            config.service.name.clone(),
            Arc::clone(&store),
            Arc::clone(&metadata),
            Arc::clone(&hooks),
            Arc::clone(&driver),
        );
        let bridge = CommandBridge::new(Arc::clone(&store), Arc::clone(&driver));
        let profiles = ProfileCache::new(Arc::clone(&metadata));

        Self {
            config,
            store,
            hooks,
            driver,
            metadata,
            profiles,
            reconciler,
            bridge,
            running: AtomicBool::new(false),
            discovering: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.service.name
    }

    pub fn version(&self) -> &str {
        &self.config.service.version
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    pub fn bridge(&self) -> &CommandBridge {
        &self.bridge
    }

    pub fn driver(&self) -> &Arc<dyn DriverAdapter> {
        &self.driver
    }

    /// Register lifecycle hooks. Only allowed before [`start`](Self::start).
    pub fn register_lifecycle_hooks(
        &self,
        hooks: Arc<dyn DeviceLifecycleHooks>,
    ) -> ServiceResult<()> {
        self.hooks.register(hooks)?;
        Ok(())
    }

    /// Initialize the driver, upload device profiles, load the devices
    /// assigned to this service and start accepting notifications and
    /// commands.
    ///
    /// Devices present at start are loaded silently; hooks fire only for
    /// changes that arrive afterwards. If anything after driver init fails,
    /// the driver is stopped again.
    pub async fn start(&self) -> ServiceResult<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(ServiceError::AlreadyStarted);
        }
        info!(
            "Starting device service '{}' with driver {}",
            self.name(),
            self.driver.name()
        );

        let ctx = DriverContext::new(self.name(), self.config.driver.clone());
        self.driver
            .init(&ctx)
            .await
            .map_err(ServiceError::DriverInit)?;

        let count = match self.initial_sync().await {
            Ok(count) => count,
            Err(e) => {
                if let Err(stop_err) = self.driver.stop(true).await {
                    warn!("Driver {} failed to stop: {}", self.driver.name(), stop_err);
                }
                return Err(e);
            }
        };

        self.hooks.mark_started();
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ServiceError::AlreadyStarted);
        }
        info!("Device service '{}' started with {} devices", self.name(), count);
        Ok(())
    }

    async fn initial_sync(&self) -> ServiceResult<usize> {
        if let Some(dir) = &self.config.service.profiles_dir {
            let uploaded = self.profiles.upload_dir(dir).await?;
            info!("Uploaded {} device profiles", uploaded);
        }

        let devices = self.metadata.devices_for_service(self.name()).await?;
        let owned: Vec<Device> = devices
            .into_iter()
            .filter(|d| {
                let owned = d.is_owned_by(self.name());
                if !owned {
                    warn!(
                        "Metadata listed device {} owned by '{}', skipping",
                        d.id, d.service.name
                    );
                }
                owned
            })
            .collect();
        for device in &owned {
            self.profiles.remember(&device.profile);
        }
        Ok(self.store.load(owned))
    }

    /// Stop serving and shut the driver down.
    pub async fn stop(&self, force: bool) -> ServiceResult<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Err(ServiceError::NotRunning);
        }
        info!("Stopping device service '{}' (force: {})", self.name(), force);
        if let Err(e) = self.driver.stop(force).await {
            error!("Driver {} failed to stop: {}", self.driver.name(), e);
        }
        self.store.clear();
        self.profiles.clear();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> ServiceResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ServiceError::NotRunning)
        }
    }

    /// Apply a lifecycle notification from the authority.
    pub async fn handle_notification(
        &self,
        notification: LifecycleNotification,
    ) -> ServiceResult<ReconcileReport> {
        self.ensure_running()?;
        debug!(
            "Lifecycle notification {:?} for device {}",
            notification.action, notification.device_id
        );
        let id = notification.device_id.clone();
        let report = self.reconciler.handle(notification).await;
        if matches!(report, ReconcileReport::Stored(_)) {
            if let Some(device) = self.store.get(&id) {
                self.profiles.remember(&device.profile);
            }
        }
        Ok(report)
    }

    /// Device profile by name, fetched from the authority if not cached.
    pub async fn profile(&self, name: &str) -> MetadataResult<Arc<DeviceProfile>> {
        self.profiles.get(name).await
    }

    /// Every device profile known to this service.
    pub fn profiles(&self) -> Vec<Arc<DeviceProfile>> {
        self.profiles.list()
    }

    pub fn device(&self, key: DeviceKey<'_>) -> Option<Arc<Device>> {
        match key {
            DeviceKey::Id(id) => self.store.get(id),
            DeviceKey::Name(name) => self.store.get_by_name(name),
        }
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.store.list()
    }

    fn require_device(&self, key: DeviceKey<'_>) -> ServiceResult<Arc<Device>> {
        self.device(key)
            .ok_or_else(|| CommandError::DeviceNotFound(key.to_string()).into())
    }

    /// Read a profile command from a device.
    pub async fn read_command(
        &self,
        key: DeviceKey<'_>,
        command: &str,
    ) -> ServiceResult<(Arc<Device>, Vec<Reading>)> {
        self.ensure_running()?;
        let device = self.require_device(key)?;
        let readings = self.bridge.read_command(&device, command).await?;
        Ok((device, readings))
    }

    /// Write a profile command to a device.
    pub async fn write_command(
        &self,
        key: DeviceKey<'_>,
        command: &str,
        values: &HashMap<String, String>,
    ) -> ServiceResult<()> {
        self.ensure_running()?;
        let device = self.require_device(key)?;
        self.bridge.write_command(&device, command, values).await?;
        Ok(())
    }

    /// Run driver discovery in the background. Only one run at a time.
    pub fn spawn_discovery(self: &Arc<Self>) -> ServiceResult<()> {
        self.ensure_running()?;
        if self
            .discovering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ServiceError::DiscoveryInProgress);
        }

        let service = Arc::clone(self);
        tokio::spawn(async move {
            info!("Discovery started on driver {}", service.driver.name());
            match service.driver.discover().await {
                Ok(()) => info!("Discovery finished"),
                Err(e) => error!("Discovery failed: {}", e),
            }
            service.discovering.store(false, Ordering::Release);
        });
        Ok(())
    }

    pub fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::Acquire)
    }
}
