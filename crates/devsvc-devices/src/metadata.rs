//! Client for the metadata authority.
//!
//! The authority is the source of truth for device definitions. This runtime
//! reads devices from it once per lifecycle notification and once at start
//! to populate the store. It also fetches device profiles on demand and
//! uploads the profiles found in the configured profiles directory.
//!
//! Responses are decoded straight from the body bytes so that protocol
//! objects keep their document order.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{debug, warn};

use devsvc_core::{paths, MetadataConfig};

use crate::model::{Device, DeviceProfile};

/// Errors talking to the metadata authority.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The authority has no device or profile with this id or name
    #[error("Not found in metadata: {0}")]
    NotFound(String),

    /// The request could not be sent or timed out
    #[error("Metadata request failed: {0}")]
    Request(String),

    /// The authority answered with an unexpected status
    #[error("Metadata returned {status} for {url}")]
    Status { status: u16, url: String },

    /// The response body is not what was asked for
    #[error("Failed to decode metadata response: {0}")]
    Decode(String),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Read access to the authority's device definitions, plus profile upload.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Fetch the authoritative definition of one device.
    async fn fetch_device(&self, id: &str) -> MetadataResult<Device>;

    /// All devices currently assigned to the named service.
    async fn devices_for_service(&self, service_name: &str) -> MetadataResult<Vec<Device>>;

    /// Fetch a device profile by name.
    async fn fetch_profile(&self, name: &str) -> MetadataResult<DeviceProfile>;

    /// Create a device profile from its YAML document.
    async fn upload_profile(&self, yaml: &str) -> MetadataResult<()>;
}

/// HTTP implementation of [`MetadataClient`].
pub struct HttpMetadataClient {
    client: Client,
    base_url: String,
}

impl HttpMetadataClient {
    pub fn new(config: &MetadataConfig) -> MetadataResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| MetadataError::Request(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, segment: &str) -> String {
        format!("{}{}/{}", self.base_url, path, urlencoding::encode(segment))
    }

    async fn get_bytes(&self, url: &str, what: &str) -> MetadataResult<Vec<u8>> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))?;

        check_status(response.status(), url, what)?;

        let body = response
            .bytes()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl MetadataClient for HttpMetadataClient {
    async fn fetch_device(&self, id: &str) -> MetadataResult<Device> {
        let url = self.url(paths::METADATA_DEVICE, id);
        let body = self.get_bytes(&url, id).await?;
        decode_device(&body)
    }

    async fn devices_for_service(&self, service_name: &str) -> MetadataResult<Vec<Device>> {
        let url = self.url(paths::METADATA_DEVICES_FOR_SERVICE, service_name);
        let body = self.get_bytes(&url, service_name).await?;
        decode_device_list(&body)
    }

    async fn fetch_profile(&self, name: &str) -> MetadataResult<DeviceProfile> {
        let url = self.url(paths::METADATA_PROFILE, name);
        let body = self.get_bytes(&url, name).await?;
        decode_profile(&body)
    }

    async fn upload_profile(&self, yaml: &str) -> MetadataResult<()> {
        let url = format!("{}{}", self.base_url, paths::METADATA_PROFILE_UPLOAD);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-yaml")
            .body(yaml.to_string())
            .send()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }
}

/// Map an authority response status to an error. `what` names the requested
/// device or profile for `NotFound`.
pub fn check_status(status: StatusCode, url: &str, what: &str) -> MetadataResult<()> {
    if status == StatusCode::NOT_FOUND {
        return Err(MetadataError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        return Err(MetadataError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(())
}

fn decode_error(e: serde_json::Error) -> MetadataError {
    MetadataError::Decode(e.to_string())
}

pub fn decode_device(body: &[u8]) -> MetadataResult<Device> {
    serde_json::from_slice(body).map_err(decode_error)
}

pub fn decode_profile(body: &[u8]) -> MetadataResult<DeviceProfile> {
    serde_json::from_slice(body).map_err(decode_error)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListEntry {
    Device(Device),
    Invalid(IgnoredAny),
}

/// Decode a device list, skipping entries that are not valid devices.
///
/// A `null` body is an empty list; any other non-list body is an error.
pub fn decode_device_list(body: &[u8]) -> MetadataResult<Vec<Device>> {
    let entries: Option<Vec<ListEntry>> = serde_json::from_slice(body).map_err(decode_error)?;

    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match entry {
            ListEntry::Device(device) => Some(device),
            ListEntry::Invalid(_) => {
                warn!("Skipping invalid device at index {} in metadata response", index);
                None
            }
        })
        .collect())
}
