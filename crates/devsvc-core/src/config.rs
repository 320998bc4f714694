//! Service configuration.
//!
//! Configuration is read from a TOML file, then environment overrides are
//! applied, then the result is validated:
//!
//! ```toml
//! [service]
//! name = "device-random"
//! port = 49988
//! profiles_dir = "/etc/devsvc/profiles"
//!
//! [metadata]
//! host = "edgex-core-metadata"
//! port = 48081
//!
//! [driver]
//! SensorCount = "2"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default values for every configuration section.
pub mod defaults {
    pub const SERVICE_NAME: &str = "device-service";
    pub const SERVICE_HOST: &str = "127.0.0.1";
    pub const SERVICE_PORT: u16 = 49990;
    pub const METADATA_HOST: &str = "localhost";
    pub const METADATA_PORT: u16 = 48081;
    pub const METADATA_TIMEOUT_MS: u64 = 5000;
    pub const LOG_LEVEL: &str = "info";
}

/// Environment variable names
pub mod env_vars {
    pub const SERVICE_NAME: &str = "DEVSVC_SERVICE_NAME";
    pub const SERVICE_HOST: &str = "DEVSVC_HOST";
    pub const SERVICE_PORT: &str = "DEVSVC_PORT";
    pub const METADATA_HOST: &str = "DEVSVC_METADATA_HOST";
    pub const METADATA_PORT: &str = "DEVSVC_METADATA_PORT";
    pub const LOG_JSON: &str = "DEVSVC_LOG_JSON";
    pub const PROFILES_DIR: &str = "DEVSVC_PROFILES_DIR";
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv { var: String, value: String },

    /// The configuration parsed but is not usable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete device service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    pub metadata: MetadataConfig,
    /// Flat driver configuration handed to the driver's `init`.
    pub driver: HashMap<String, String>,
    pub logging: LoggingConfig,
}

/// Identity and listen address of this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    /// Service name; devices are owned by the service with this exact name.
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Version reported by the ping endpoint.
    pub version: String,
    /// Directory of YAML device profiles uploaded to the authority at start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles_dir: Option<PathBuf>,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: defaults::SERVICE_NAME.to_string(),
            host: defaults::SERVICE_HOST.to_string(),
            port: defaults::SERVICE_PORT,
            version: crate::VERSION.to_string(),
            profiles_dir: None,
        }
    }
}

/// Location of the metadata authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout for authority calls
    pub timeout_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            host: defaults::METADATA_HOST.to_string(),
            port: defaults::METADATA_PORT,
            timeout_ms: defaults::METADATA_TIMEOUT_MS,
        }
    }
}

impl MetadataConfig {
    /// Base URL of the authority, without a trailing slash.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from an optional file, then apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file without applying overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(env_vars::SERVICE_NAME) {
            self.service.name = name;
        }
        if let Some(host) = lookup(env_vars::SERVICE_HOST) {
            self.service.host = host;
        }
        if let Some(port) = lookup(env_vars::SERVICE_PORT) {
            self.service.port = parse_env(env_vars::SERVICE_PORT, port)?;
        }
        if let Some(host) = lookup(env_vars::METADATA_HOST) {
            self.metadata.host = host;
        }
        if let Some(port) = lookup(env_vars::METADATA_PORT) {
            self.metadata.port = parse_env(env_vars::METADATA_PORT, port)?;
        }
        if let Some(dir) = lookup(env_vars::PROFILES_DIR) {
            self.service.profiles_dir = Some(PathBuf::from(dir));
        }
        if let Some(json) = lookup(env_vars::LOG_JSON) {
            self.logging.json = parse_env(env_vars::LOG_JSON, json)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.name.trim().is_empty() {
            return Err(ConfigError::Invalid("service name must not be empty".into()));
        }
        if self.service.port == 0 {
            return Err(ConfigError::Invalid("service port must not be 0".into()));
        }
        if self.metadata.host.trim().is_empty() {
            return Err(ConfigError::Invalid("metadata host must not be empty".into()));
        }
        Ok(())
    }

    /// Address the transport binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }

    /// Render the configuration back to TOML.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.service.name, defaults::SERVICE_NAME);
        assert_eq!(config.metadata.base_url(), "http://localhost:48081");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [service]
            name = "device-random"

            [driver]
            SensorCount = "2"
            "#,
        )
        .unwrap();

        assert_eq!(config.service.name, "device-random");
        assert_eq!(config.service.port, defaults::SERVICE_PORT);
        assert_eq!(config.driver.get("SensorCount").map(String::as_str), Some("2"));
        assert!(!config.logging.json);
    }

    #[test]
    fn test_overrides() {
        let mut config = ServiceConfig::default();
        config
            .apply_overrides(|var| match var {
                env_vars::SERVICE_NAME => Some("device-modbus".to_string()),
                env_vars::METADATA_PORT => Some("59881".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.service.name, "device-modbus");
        assert_eq!(config.metadata.port, 59881);
        assert!(config.service.profiles_dir.is_none());
    }

    #[test]
    fn test_profiles_dir() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [service]
            profiles_dir = "/etc/devsvc/profiles"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.service.profiles_dir.as_deref(),
            Some(Path::new("/etc/devsvc/profiles"))
        );
        assert!(config.to_toml_string().contains("profiles_dir"));

        let mut config = ServiceConfig::default();
        config
            .apply_overrides(|var| {
                (var == env_vars::PROFILES_DIR).then(|| "./profiles".to_string())
            })
            .unwrap();
        assert_eq!(config.service.profiles_dir, Some(PathBuf::from("./profiles")));
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = ServiceConfig::default();
        let result = config.apply_overrides(|var| {
            (var == env_vars::SERVICE_PORT).then(|| "not-a-port".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut config = ServiceConfig::default();
        config.service.name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_with_scheme() {
        let metadata = MetadataConfig {
            host: "https://meta.local/".to_string(),
            port: 443,
            timeout_ms: 1000,
        };
        assert_eq!(metadata.base_url(), "https://meta.local:443");
    }
}
