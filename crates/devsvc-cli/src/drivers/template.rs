//! Template driver: a starting point for real drivers.
//!
//! Every call is logged with the protocols and attributes it was given, and
//! every read answers with the same string. It also logs device lifecycle
//! transitions.

use std::sync::OnceLock;

use async_trait::async_trait;
use tracing::debug;

use devsvc_devices::{
    AdapterResult, AdminState, CommandRequest, CommandValue, DeviceLifecycleHooks, DriverAdapter,
    DriverContext, ProtocolDescriptor, ValueType,
};

pub const TEMPLATE_RESULT: &str = "Template result";

#[derive(Default)]
pub struct TemplateDriver {
    span: OnceLock<tracing::Span>,
}

impl TemplateDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn span(&self) -> tracing::Span {
        self.span.get().cloned().unwrap_or_else(tracing::Span::none)
    }
}

fn dump_protocols(protocols: &[ProtocolDescriptor]) {
    for protocol in protocols {
        debug!(" [{}] protocol:", protocol.name);
        for (key, value) in &protocol.properties {
            debug!("    {} = {}", key, value);
        }
    }
}

fn dump_attributes(request: &CommandRequest) {
    for (key, value) in &request.attributes {
        debug!("    {} = {}", key, value);
    }
}

#[async_trait]
impl DriverAdapter for TemplateDriver {
    fn name(&self) -> &str {
        "template"
    }

    async fn init(&self, ctx: &DriverContext) -> AdapterResult<()> {
        let _ = self.span.set(ctx.span.clone());
        ctx.span.in_scope(|| {
            debug!("Init");
            for (key, value) in &ctx.config {
                debug!("  config {} = {}", key, value);
            }
        });
        Ok(())
    }

    async fn discover(&self) -> AdapterResult<()> {
        self.span().in_scope(|| debug!("Discovery requested"));
        Ok(())
    }

    async fn get(
        &self,
        device_name: &str,
        protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
    ) -> AdapterResult<Vec<CommandValue>> {
        let values: Vec<CommandValue> = self.span().in_scope(|| {
            debug!("GET on device {}:", device_name);
            dump_protocols(protocols);
            requests
                .iter()
                .enumerate()
                .map(|(i, request)| {
                    debug!("  Requested reading {} ({}):", i, request.resource);
                    dump_attributes(request);
                    CommandValue::String(TEMPLATE_RESULT.to_string())
                })
                .collect()
        });
        Ok(values)
    }

    async fn put(
        &self,
        device_name: &str,
        protocols: &[ProtocolDescriptor],
        requests: &[CommandRequest],
        values: &[CommandValue],
    ) -> AdapterResult<()> {
        self.span().in_scope(|| {
            debug!("PUT on device {}:", device_name);
            dump_protocols(protocols);
            for (i, (request, value)) in requests.iter().zip(values).enumerate() {
                debug!("  Requested device write {} ({}):", i, request.resource);
                dump_attributes(request);
                debug!("  Value: {} ({})", value, value.value_type());
            }
        });
        Ok(())
    }

    async fn disconnect(&self, protocols: &[ProtocolDescriptor]) -> AdapterResult<()> {
        self.span().in_scope(|| {
            debug!("Disconnect:");
            dump_protocols(protocols);
        });
        Ok(())
    }

    async fn stop(&self, force: bool) -> AdapterResult<()> {
        self.span().in_scope(|| debug!("Stop (force: {})", force));
        Ok(())
    }

    fn supports(&self, value_type: ValueType) -> bool {
        value_type == ValueType::String
    }
}

impl DeviceLifecycleHooks for TemplateDriver {
    fn on_add(&self, name: &str, protocols: &[ProtocolDescriptor], admin_state: AdminState) {
        self.span().in_scope(|| {
            debug!("Device {} added ({})", name, admin_state);
            dump_protocols(protocols);
        });
    }

    fn on_update(&self, name: &str, protocols: &[ProtocolDescriptor], admin_state: AdminState) {
        self.span().in_scope(|| {
            debug!("Device {} updated ({})", name, admin_state);
            dump_protocols(protocols);
        });
    }

    fn on_remove(&self, name: &str, protocols: &[ProtocolDescriptor]) {
        self.span().in_scope(|| {
            debug!("Device {} removed", name);
            dump_protocols(protocols);
        });
    }
}
