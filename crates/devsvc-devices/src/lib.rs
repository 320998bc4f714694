//! Device Service Runtime Crate
//!
//! This crate lets a protocol driver be exposed as a managed device service.
//!
//! ## Architecture
//!
//! - **DeviceStore**: local mirror of the devices assigned to this service,
//!   keyed by id and by name
//! - **LifecycleReconciler**: applies create/update/delete notifications from
//!   the metadata authority to the store
//! - **CommandBridge**: turns command requests into driver get/put batches
//! - **HookRegistry**: user callbacks fired on device lifecycle transitions
//! - **ProfileCache**: device profiles by name, backed by the authority
//! - **DriverAdapter**: protocol-specific driver interface
//! - **DeviceService**: composes all of the above around one driver

pub mod adapter;
pub mod bridge;
pub mod command;
pub mod hooks;
pub mod metadata;
pub mod model;
pub mod profiles;
pub mod reconciler;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use adapter::{AdapterError, AdapterResult, DriverAdapter, DriverContext};
pub use bridge::{CommandBridge, CommandError, CommandResult, Reading};
pub use command::{CommandRequest, CommandValue, ValueType};
pub use hooks::{DeviceLifecycleHooks, HookError, HookRegistry};
pub use metadata::{HttpMetadataClient, MetadataClient, MetadataError, MetadataResult};
pub use model::{
    AdminState, AutoEvent, Device, DeviceProfile, DeviceResource, OperatingState, ProfileCommand,
    ProtocolDescriptor, ResourceMode, ServiceRef,
};
pub use profiles::{ProfileCache, ProfileError};
pub use reconciler::{
    LifecycleAction, LifecycleNotification, LifecycleReconciler, ReconcileReport,
};
pub use service::{DeviceKey, DeviceService, ServiceError, ServiceResult};
pub use store::{DeviceStore, ReconcileOutcome};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
