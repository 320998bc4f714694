//! Driver adapter interface.
//!
//! A driver implements the protocol-specific half of a device service. The
//! runtime owns device bookkeeping and hands the driver only what it needs
//! to address a device: its name and protocol descriptors.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::command::{CommandRequest, CommandValue, ValueType};
use crate::model::ProtocolDescriptor;

/// Driver errors.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// The driver does not handle this resource
    #[error("Unsupported resource: {0}")]
    UnsupportedResource(String),

    /// Timeout
    #[error("Timeout")]
    Timeout,

    /// Driver has been stopped
    #[error("Driver stopped")]
    Stopped,

    /// Other error
    #[error("Driver error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type for driver operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Context handed to a driver at init.
#[derive(Debug, Clone)]
pub struct DriverContext {
    /// Name of the service hosting the driver
    pub service_name: String,
    /// Flat `[driver]` configuration section
    pub config: HashMap<String, String>,
    /// Span drivers should log under
    pub span: tracing::Span,
}

impl DriverContext {
    pub fn new(service_name: impl Into<String>, config: HashMap<String, String>) -> Self {
        let service_name = service_name.into();
        let span = tracing::info_span!("driver", service = %service_name);
        Self {
            service_name,
            config,
            span,
        }
    }

    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }
}

/// Protocol driver.
///
/// `get` and `put` operate on whole batches: a driver either returns one
/// value per request, in request order, or fails the batch.
#[async_trait]
pub trait DriverAdapter: Send + Sync {
    /// Driver name, used in logs.
    fn name(&self) -> &str;

    /// Prepare the driver. Called once before the service starts serving.
    async fn init(&self, ctx: &DriverContext) -> AdapterResult<()>;

    /// Look for new devices. Drivers without discovery keep the default.
    async fn discover(&self) -> AdapterResult<()> {
        Ok(())
    }

    /// Read every requested resource from the device.
    async fn get(
        &self,
        device_name: &str,
        protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
    ) -> AdapterResult<Vec<CommandValue>>;

    /// Write `values[i]` to `requests[i]` on the device.
    async fn put(
        &self,
        device_name: &str,
        protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
        values: &[CommandValue],
    ) -> AdapterResult<()>;

    /// Release any connection held for a device that is no longer managed.
    async fn disconnect(&self, _protocols: &[ProtocolDescriptor]) -> AdapterResult<()> {
        Ok(())
    }

    /// Shut the driver down. `force` asks it not to wait for in-flight work.
    async fn stop(&self, _force: bool) -> AdapterResult<()> {
        Ok(())
    }

    /// Whether the driver can produce values of this type.
    fn supports(&self, _value_type: ValueType) -> bool {
        true
    }
}
