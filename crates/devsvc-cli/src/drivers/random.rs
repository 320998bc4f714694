//! Random-number driver.
//!
//! Resources pick their behavior through profile attributes:
//!
//! - `SensorType = "1"` reads a random `Uint64` below 100
//! - `SensorType = "2"` reads a random `Uint64` below 1000
//! - `SwitchID` reads the switch state as `Bool`
//!
//! Writing a `Bool` to the `Switch` resource sets the switch state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use async_trait::async_trait;
use rand::Rng;

use devsvc_devices::{
    AdapterError, AdapterResult, CommandRequest, CommandValue, DriverAdapter, DriverContext,
    ProtocolDescriptor, ValueType,
};

pub const SENSOR_TYPE: &str = "SensorType";
pub const SWITCH_ID: &str = "SwitchID";
pub const SWITCH_RESOURCE: &str = "Switch";

#[derive(Default)]
pub struct RandomDriver {
    switch: AtomicBool,
    span: OnceLock<tracing::Span>,
}

impl RandomDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn span(&self) -> tracing::Span {
        self.span.get().cloned().unwrap_or_else(tracing::Span::none)
    }

    fn read(&self, request: &CommandRequest) -> AdapterResult<CommandValue> {
        if let Some(sensor) = request.attribute(SENSOR_TYPE) {
            let bound = match sensor {
                "1" => 100,
                "2" => 1000,
                other => {
                    return Err(AdapterError::Configuration(format!(
                        "{} is not a valid SensorType",
                        other
                    )))
                }
            };
            return Ok(CommandValue::Uint64(rand::thread_rng().gen_range(0..bound)));
        }
        if request.attribute(SWITCH_ID).is_some() {
            return Ok(CommandValue::Bool(self.switch.load(Ordering::Acquire)));
        }
        Err(AdapterError::UnsupportedResource(request.resource.clone()))
    }
}

#[async_trait]
impl DriverAdapter for RandomDriver {
    fn name(&self) -> &str {
        "random"
    }

    async fn init(&self, ctx: &DriverContext) -> AdapterResult<()> {
        let _ = self.span.set(ctx.span.clone());
        self.switch.store(false, Ordering::Release);
        ctx.span.in_scope(|| tracing::debug!("Init"));
        Ok(())
    }

    async fn get(
        &self,
        device_name: &str,
        _protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
    ) -> AdapterResult<Vec<CommandValue>> {
        self.span().in_scope(|| {
            tracing::debug!("GET {} resources on {}", requests.len(), device_name);
            requests.iter().map(|r| self.read(r)).collect()
        })
    }

    async fn put(
        &self,
        device_name: &str,
        _protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
        values: &[CommandValue],
    ) -> AdapterResult<()> {
        self.span().in_scope(|| {
            for (request, value) in requests.iter().zip(values) {
                match (request.resource.as_str(), value) {
                    (SWITCH_RESOURCE, CommandValue::Bool(on)) => {
                        tracing::debug!("Switch on {} set to {}", device_name, on);
                        self.switch.store(*on, Ordering::Release);
                    }
                    (SWITCH_RESOURCE, other) => {
                        return Err(AdapterError::Communication(format!(
                            "Switch expects Bool, got {}",
                            other.value_type()
                        )))
                    }
                    (resource, _) => {
                        tracing::error!("PUT not valid for resource {}", resource);
                        return Err(AdapterError::UnsupportedResource(resource.to_string()));
                    }
                }
            }
            Ok(())
        })
    }

    fn supports(&self, value_type: ValueType) -> bool {
        matches!(value_type, ValueType::Uint64 | ValueType::Bool)
    }
}
