//! Common test utilities for API tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use devsvc_api::ServerState;
use devsvc_core::ServiceConfig;
use devsvc_devices::{
    AdapterError, AdapterResult, CommandRequest, CommandValue, Device, DeviceProfile,
    DeviceResource, DeviceService, DriverAdapter, DriverContext, MetadataClient, MetadataError,
    MetadataResult, ProfileCommand, ProtocolDescriptor, ResourceMode, ValueType,
};

pub const SERVICE: &str = "device-api-test";

#[derive(Default)]
pub struct StaticMetadata {
    pub devices: Mutex<HashMap<String, Device>>,
}

#[async_trait]
impl MetadataClient for StaticMetadata {
    async fn fetch_device(&self, id: &str) -> MetadataResult<Device> {
        self.devices
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(id.to_string()))
    }

    async fn devices_for_service(&self, service_name: &str) -> MetadataResult<Vec<Device>> {
        Ok(self
            .devices
            .lock()
            .values()
            .filter(|d| d.is_owned_by(service_name))
            .cloned()
            .collect())
    }

    async fn fetch_profile(&self, name: &str) -> MetadataResult<DeviceProfile> {
        Err(MetadataError::NotFound(name.to_string()))
    }

    async fn upload_profile(&self, _yaml: &str) -> MetadataResult<()> {
        Ok(())
    }
}

/// Driver backed by a map of resource values. Resource "fault" always fails.
#[derive(Default)]
pub struct MemoryDriver {
    pub values: Mutex<HashMap<String, CommandValue>>,
}

#[async_trait]
impl DriverAdapter for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    async fn init(&self, _ctx: &DriverContext) -> AdapterResult<()> {
        Ok(())
    }

    async fn get(
        &self,
        _device_name: &str,
        _protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
    ) -> AdapterResult<Vec<CommandValue>> {
        let values = self.values.lock();
        requests
            .iter()
            .map(|r| {
                if r.resource == "fault" {
                    return Err(AdapterError::Communication("bus fault".into()));
                }
                Ok(values
                    .get(&r.resource)
                    .cloned()
                    .unwrap_or(CommandValue::Uint16(0)))
            })
            .collect()
    }

    async fn put(
        &self,
        _device_name: &str,
        _protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
        values: &[CommandValue],
    ) -> AdapterResult<()> {
        let mut stored = self.values.lock();
        for (request, value) in requests.iter().zip(values) {
            stored.insert(request.resource.clone(), value.clone());
        }
        Ok(())
    }
}

pub fn thermostat(id: &str, name: &str, owner: &str) -> Device {
    let profile = DeviceProfile::new("thermostat")
        .with_resource(DeviceResource::new("setpoint", ValueType::Uint16))
        .with_resource(
            DeviceResource::new("ambient", ValueType::Uint16).with_mode(ResourceMode::Read),
        )
        .with_resource(
            DeviceResource::new("fault", ValueType::Uint16).with_mode(ResourceMode::Read),
        )
        .with_command(ProfileCommand {
            name: "status".into(),
            get: vec!["setpoint".into(), "ambient".into()],
            set: vec!["setpoint".into()],
        });
    Device::new(id, name, owner)
        .with_protocol(ProtocolDescriptor::new("bacnet").with_property("instance", "7"))
        .with_profile(profile)
}

pub struct TestServer {
    pub state: ServerState,
    pub metadata: Arc<StaticMetadata>,
    pub driver: Arc<MemoryDriver>,
}

/// Create a server state whose service owns `devices` and is not started.
pub fn create_test_server(devices: Vec<Device>) -> TestServer {
    let mut config = ServiceConfig::default();
    config.service.name = SERVICE.to_string();
    config.service.version = "9.9.9".to_string();

    let metadata = Arc::new(StaticMetadata::default());
    for device in devices {
        metadata.devices.lock().insert(device.id.clone(), device);
    }
    let driver = Arc::new(MemoryDriver::default());
    let service = Arc::new(DeviceService::new(config, driver.clone(), metadata.clone()));

    TestServer {
        state: ServerState::new(service),
        metadata,
        driver,
    }
}

/// Same as [`create_test_server`], with the service started.
pub async fn create_started_server(devices: Vec<Device>) -> TestServer {
    let server = create_test_server(devices);
    server.state.service.start().await.expect("service starts");
    server
}
