//! Command bridge between callers and the driver.
//!
//! The bridge resolves a device, hands its name and protocols to the driver
//! together with the request batch, and checks the driver kept its side of
//! the contract: one value per request, each of a type it declares.

use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, error};

use crate::adapter::{AdapterError, DriverAdapter};
use crate::command::{CommandRequest, CommandValue};
use crate::model::{Device, DeviceResource};
use crate::store::DeviceStore;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Command '{command}' not found on device {device}")]
    CommandNotFound { device: String, command: String },

    #[error("Device {0} is locked")]
    DeviceLocked(String),

    #[error("Resource '{0}' is not readable")]
    NotReadable(String),

    #[error("Resource '{0}' is not writable")]
    NotWritable(String),

    #[error("Invalid value for '{resource}': {reason}")]
    InvalidValue { resource: String, reason: String },

    #[error("{requests} requests but {values} values")]
    LengthMismatch { requests: usize, values: usize },

    #[error("Driver failure: {0}")]
    Driver(#[from] AdapterError),

    /// The driver returned something it was not allowed to.
    #[error("Driver contract violation: {0}")]
    DriverContract(String),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// A named value read from a device resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub resource: String,
    pub value: CommandValue,
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Reading", 3)?;
        state.serialize_field("name", &self.resource)?;
        state.serialize_field("value", &self.value.to_reading_string())?;
        state.serialize_field("valueType", &self.value.value_type())?;
        state.end()
    }
}

pub struct CommandBridge {
    store: Arc<DeviceStore>,
    driver: Arc<dyn DriverAdapter>,
}

impl CommandBridge {
    pub fn new(store: Arc<DeviceStore>, driver: Arc<dyn DriverAdapter>) -> Self {
        Self { store, driver }
    }

    fn lookup(&self, device_id: &str) -> CommandResult<Arc<Device>> {
        self.store
            .get(device_id)
            .ok_or_else(|| CommandError::DeviceNotFound(device_id.to_string()))
    }

    /// Read every request from the device. `results[i]` answers `requests[i]`.
    pub async fn execute_get(
        &self,
        device_id: &str,
        requests: &[CommandRequest],
    ) -> CommandResult<Vec<CommandValue>> {
        let device = self.lookup(device_id)?;
        self.get_from(&device, requests).await
    }

    /// Write `values[i]` to `requests[i]` on the device.
    pub async fn execute_put(
        &self,
        device_id: &str,
        requests: &[CommandRequest],
        values: &[CommandValue],
    ) -> CommandResult<()> {
        let device = self.lookup(device_id)?;
        self.put_to(&device, requests, values).await
    }

    async fn get_from(
        &self,
        device: &Device,
        requests: &[CommandRequest],
    ) -> CommandResult<Vec<CommandValue>> {
        ensure_unlocked(device)?;
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        debug!("get {} resources from {}", requests.len(), device.name);
        let values = self
            .driver
            .get(&device.name, &device.protocols, requests)
            .await
            .map_err(|e| {
                error!("Driver {} get on {} failed: {}", self.driver.name(), device.name, e);
                CommandError::Driver(e)
            })?;

        if values.len() != requests.len() {
            return Err(CommandError::DriverContract(format!(
                "{} values returned for {} requests",
                values.len(),
                requests.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| !self.driver.supports(v.value_type())) {
            return Err(CommandError::DriverContract(format!(
                "unsupported result type {}",
                bad.value_type()
            )));
        }
        Ok(values)
    }

    async fn put_to(
        &self,
        device: &Device,
        requests: &[CommandRequest],
        values: &[CommandValue],
    ) -> CommandResult<()> {
        if requests.len() != values.len() {
            return Err(CommandError::LengthMismatch {
                requests: requests.len(),
                values: values.len(),
            });
        }
        ensure_unlocked(device)?;
        if requests.is_empty() {
            return Ok(());
        }

        debug!("put {} resources to {}", requests.len(), device.name);
        self.driver
            .put(&device.name, &device.protocols, requests, values)
            .await
            .map_err(|e| {
                error!("Driver {} put on {} failed: {}", self.driver.name(), device.name, e);
                CommandError::Driver(e)
            })
    }

    /// Run a profile command (or a single resource by name) and return
    /// named readings.
    pub async fn read_command(
        &self,
        device: &Device,
        command: &str,
    ) -> CommandResult<Vec<Reading>> {
        let resources = resolve(device, command, Access::Read)?;
        let requests: Vec<_> = resources.iter().copied().map(to_request).collect();
        let values = self.get_from(device, &requests).await?;
        Ok(resources
            .into_iter()
            .zip(values)
            .map(|(resource, value)| Reading {
                resource: resource.name.clone(),
                value,
            })
            .collect())
    }

    /// Write a profile command (or a single resource by name).
    ///
    /// `values` maps resource name to its string form; every resource the
    /// command sets must be present.
    pub async fn write_command(
        &self,
        device: &Device,
        command: &str,
        values: &HashMap<String, String>,
    ) -> CommandResult<()> {
        let resources = resolve(device, command, Access::Write)?;
        let mut requests = Vec::with_capacity(resources.len());
        let mut parsed = Vec::with_capacity(resources.len());
        for resource in resources {
            let raw = values.get(&resource.name).ok_or_else(|| CommandError::InvalidValue {
                resource: resource.name.clone(),
                reason: "missing value".to_string(),
            })?;
            let value = CommandValue::parse(resource.value_type, raw).map_err(|reason| {
                CommandError::InvalidValue {
                    resource: resource.name.clone(),
                    reason,
                }
            })?;
            requests.push(to_request(resource));
            parsed.push(value);
        }
        self.put_to(device, &requests, &parsed).await
    }
}

#[derive(Clone, Copy)]
enum Access {
    Read,
    Write,
}

fn ensure_unlocked(device: &Device) -> CommandResult<()> {
    if device.admin_state.is_enabled() {
        Ok(())
    } else {
        Err(CommandError::DeviceLocked(device.name.clone()))
    }
}

fn to_request(resource: &DeviceResource) -> CommandRequest {
    CommandRequest {
        resource: resource.name.clone(),
        attributes: resource.attributes.clone(),
        value_type: Some(resource.value_type),
    }
}

/// Resolve a command name to the ordered resources it touches.
fn resolve<'a>(
    device: &'a Device,
    command: &str,
    access: Access,
) -> CommandResult<Vec<&'a DeviceResource>> {
    let profile = &device.profile;
    let not_found = || CommandError::CommandNotFound {
        device: device.name.clone(),
        command: command.to_string(),
    };

    let names: Vec<&str> = match profile.command(command) {
        Some(cmd) => {
            let list = match access {
                Access::Read => &cmd.get,
                Access::Write => &cmd.set,
            };
            list.iter().map(String::as_str).collect()
        }
        None if profile.resource(command).is_some() => vec![command],
        None => return Err(not_found()),
    };

    let mut resources = Vec::with_capacity(names.len());
    for name in names {
        let resource = profile.resource(name).ok_or_else(not_found)?;
        match access {
            Access::Read if !resource.read_write.readable() => {
                return Err(CommandError::NotReadable(name.to_string()))
            }
            Access::Write if !resource.read_write.writable() => {
                return Err(CommandError::NotWritable(name.to_string()))
            }
            _ => {}
        }
        resources.push(resource);
    }

    if resources.is_empty() {
        return Err(match access {
            Access::Read => CommandError::NotReadable(command.to_string()),
            Access::Write => CommandError::NotWritable(command.to_string()),
        });
    }
    Ok(resources)
}
