//! Core types shared by the devsvc crates.
//!
//! This crate holds the service configuration model and the constants the
//! other crates agree on (API paths, environment variable names, defaults).

pub mod config;

pub use config::{ConfigError, LoggingConfig, MetadataConfig, ServiceConfig, ServiceSection};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// REST paths served by a device service.
pub mod paths {
    pub const CALLBACK: &str = "/api/v1/callback";
    pub const PING: &str = "/api/v1/ping";
    pub const DISCOVERY: &str = "/api/v1/discovery";
    pub const DEVICE_COMMAND: &str = "/api/v1/device/:id/:command";
    pub const DEVICE_NAME_COMMAND: &str = "/api/v1/device/name/:name/:command";
    /// Authority endpoint returning one device by id.
    pub const METADATA_DEVICE: &str = "/api/v1/device";
    /// Authority endpoint returning every device owned by a service.
    pub const METADATA_DEVICES_FOR_SERVICE: &str = "/api/v1/device/servicename";
    /// Authority endpoint returning one device profile by name.
    pub const METADATA_PROFILE: &str = "/api/v1/deviceprofile/name";
    /// Authority endpoint accepting a device profile as a YAML document.
    pub const METADATA_PROFILE_UPLOAD: &str = "/api/v1/deviceprofile/upload";
}

/// Lifecycle notification type tag for device changes.
pub const DEVICE_CALLBACK_TYPE: &str = "DEVICE";
