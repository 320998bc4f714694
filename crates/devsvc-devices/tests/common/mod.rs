//! Common test utilities: an in-memory metadata authority, a hook set that
//! records every call and a driver whose behavior tests can script.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use devsvc_core::ServiceConfig;
use devsvc_devices::{
    AdapterError, AdapterResult, AdminState, CommandRequest, CommandValue, Device,
    DeviceLifecycleHooks, DeviceProfile, DeviceService, DriverAdapter, DriverContext,
    MetadataClient, MetadataError, MetadataResult, ProtocolDescriptor, ValueType,
};

pub const SERVICE: &str = "device-test";

pub fn modbus(addr: &str) -> ProtocolDescriptor {
    ProtocolDescriptor::new("modbus").with_property("addr", addr)
}

/// Device `d1`-style fixture owned by `owner`.
pub fn device(id: &str, name: &str, owner: &str, addr: &str) -> Device {
    Device::new(id, name, owner).with_protocol(modbus(addr))
}

// ---------------------------------------------------------------------------
// Metadata authority
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryMetadata {
    devices: Mutex<HashMap<String, Device>>,
    profiles: Mutex<HashMap<String, DeviceProfile>>,
    uploads: Mutex<Vec<String>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
    profile_fetches: AtomicUsize,
}

impl InMemoryMetadata {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn upsert(&self, device: Device) {
        self.devices.lock().insert(device.id.clone(), device);
    }

    pub fn remove(&self, id: &str) {
        self.devices.lock().remove(id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn add_profile(&self, profile: DeviceProfile) {
        self.profiles.lock().insert(profile.name.clone(), profile);
    }

    pub fn profile_fetch_count(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    /// Raw YAML documents received through `upload_profile`.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl MetadataClient for InMemoryMetadata {
    async fn fetch_device(&self, id: &str) -> MetadataResult<Device> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MetadataError::Request("connection refused".into()));
        }
        self.devices
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(id.to_string()))
    }

    async fn devices_for_service(&self, service_name: &str) -> MetadataResult<Vec<Device>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MetadataError::Request("connection refused".into()));
        }
        Ok(self
            .devices
            .lock()
            .values()
            .filter(|d| d.is_owned_by(service_name))
            .cloned()
            .collect())
    }

    async fn fetch_profile(&self, name: &str) -> MetadataResult<DeviceProfile> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MetadataError::Request("connection refused".into()));
        }
        self.profiles
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(name.to_string()))
    }

    async fn upload_profile(&self, yaml: &str) -> MetadataResult<()> {
        let name = yaml
            .lines()
            .find_map(|line| line.strip_prefix("name:"))
            .map(|name| name.trim().trim_matches('"').to_string())
            .ok_or_else(|| MetadataError::Decode("profile has no name".into()))?;
        self.uploads.lock().push(yaml.to_string());
        self.add_profile(DeviceProfile::new(name));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    Add {
        name: String,
        protocols: Vec<ProtocolDescriptor>,
        admin_state: AdminState,
    },
    Update {
        name: String,
        protocols: Vec<ProtocolDescriptor>,
        admin_state: AdminState,
    },
    Remove {
        name: String,
        protocols: Vec<ProtocolDescriptor>,
    },
}

#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<HookEvent>>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().clone()
    }
}

impl DeviceLifecycleHooks for RecordingHooks {
    fn on_add(&self, name: &str, protocols: &[ProtocolDescriptor], admin_state: AdminState) {
        self.events.lock().push(HookEvent::Add {
            name: name.to_string(),
            protocols: protocols.to_vec(),
            admin_state,
        });
    }

    fn on_update(&self, name: &str, protocols: &[ProtocolDescriptor], admin_state: AdminState) {
        self.events.lock().push(HookEvent::Update {
            name: name.to_string(),
            protocols: protocols.to_vec(),
            admin_state,
        });
    }

    fn on_remove(&self, name: &str, protocols: &[ProtocolDescriptor]) {
        self.events.lock().push(HookEvent::Remove {
            name: name.to_string(),
            protocols: protocols.to_vec(),
        });
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// How the scripted driver answers a `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetBehavior {
    /// One value per request: the last value put, or the resource name.
    Echo,
    /// Fail the whole batch.
    Fail,
    /// Return one value fewer than requested.
    Truncate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Init(HashMap<String, String>),
    Get { device: String, resources: Vec<String> },
    Put { device: String, values: Vec<(String, CommandValue)> },
    Disconnect(Vec<ProtocolDescriptor>),
    Discover,
    Stop(bool),
}

pub struct ScriptedDriver {
    calls: Mutex<Vec<DriverCall>>,
    stored: Mutex<HashMap<String, CommandValue>>,
    behavior: Mutex<GetBehavior>,
    unsupported: Mutex<Vec<ValueType>>,
    fail_init: AtomicBool,
    fail_disconnect: AtomicBool,
}

impl ScriptedDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            stored: Mutex::new(HashMap::new()),
            behavior: Mutex::new(GetBehavior::Echo),
            unsupported: Mutex::new(Vec::new()),
            fail_init: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
        })
    }

    pub fn set_behavior(&self, behavior: GetBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn set_unsupported(&self, types: Vec<ValueType>) {
        *self.unsupported.lock() = types;
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    pub fn preset(&self, resource: &str, value: CommandValue) {
        self.stored.lock().insert(resource.to_string(), value);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().clone()
    }

    pub fn get_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, DriverCall::Get { .. }))
            .count()
    }

    pub fn disconnects(&self) -> Vec<Vec<ProtocolDescriptor>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                DriverCall::Disconnect(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DriverAdapter for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn init(&self, ctx: &DriverContext) -> AdapterResult<()> {
        self.calls.lock().push(DriverCall::Init(ctx.config.clone()));
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(AdapterError::Configuration("scripted init failure".into()));
        }
        Ok(())
    }

    async fn discover(&self) -> AdapterResult<()> {
        self.calls.lock().push(DriverCall::Discover);
        Ok(())
    }

    async fn get(
        &self,
        device_name: &str,
        _protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
    ) -> AdapterResult<Vec<CommandValue>> {
        self.calls.lock().push(DriverCall::Get {
            device: device_name.to_string(),
            resources: requests.iter().map(|r| r.resource.clone()).collect(),
        });

        let behavior = *self.behavior.lock();
        if behavior == GetBehavior::Fail {
            return Err(AdapterError::Communication("scripted get failure".into()));
        }

        let stored = self.stored.lock();
        let mut values: Vec<CommandValue> = requests
            .iter()
            .map(|r| {
                stored
                    .get(&r.resource)
                    .cloned()
                    .unwrap_or_else(|| CommandValue::String(r.resource.clone()))
            })
            .collect();
        if behavior == GetBehavior::Truncate {
            values.pop();
        }
        Ok(values)
    }

    async fn put(
        &self,
        device_name: &str,
        _protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
        values: &[CommandValue],
    ) -> AdapterResult<()> {
        let pairs: Vec<_> = requests
            .iter()
            .zip(values)
            .map(|(r, v)| (r.resource.clone(), v.clone()))
            .collect();
        self.calls.lock().push(DriverCall::Put {
            device: device_name.to_string(),
            values: pairs.clone(),
        });
        self.stored.lock().extend(pairs);
        Ok(())
    }

    async fn disconnect(&self, protocols: &[ProtocolDescriptor]) -> AdapterResult<()> {
        self.calls
            .lock()
            .push(DriverCall::Disconnect(protocols.to_vec()));
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(AdapterError::Connection("scripted disconnect failure".into()));
        }
        Ok(())
    }

    async fn stop(&self, force: bool) -> AdapterResult<()> {
        self.calls.lock().push(DriverCall::Stop(force));
        Ok(())
    }

    fn supports(&self, value_type: ValueType) -> bool {
        !self.unsupported.lock().contains(&value_type)
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct Harness {
    pub service: Arc<DeviceService>,
    pub metadata: Arc<InMemoryMetadata>,
    pub driver: Arc<ScriptedDriver>,
    pub hooks: Arc<RecordingHooks>,
}

/// A service named [`SERVICE`] with recording hooks registered, not started.
pub fn harness() -> Harness {
    harness_with(|_| {})
}

/// Same as [`harness`], with `configure` applied to the configuration first.
pub fn harness_with(configure: impl FnOnce(&mut ServiceConfig)) -> Harness {
    let mut config = ServiceConfig::default();
    config.service.name = SERVICE.to_string();
    config
        .driver
        .insert("Mode".to_string(), "test".to_string());
    configure(&mut config);

    let metadata = InMemoryMetadata::new();
    let driver = ScriptedDriver::new();
    let hooks = RecordingHooks::new();
    let service = Arc::new(DeviceService::new(config, driver.clone(), metadata.clone()));
    service
        .register_lifecycle_hooks(hooks.clone())
        .expect("hooks register before start");

    Harness {
        service,
        metadata,
        driver,
        hooks,
    }
}

/// Same as [`harness`], already started.
pub async fn started() -> Harness {
    let h = harness();
    h.service.start().await.expect("service starts");
    h
}
