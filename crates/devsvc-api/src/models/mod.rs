//! Request and response models for the REST API.

use serde::{Deserialize, Serialize};

use devsvc_devices::Reading;

pub mod error;

pub use error::{ApiResult, ErrorResponse};

/// Response to a command read.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingsResponse {
    /// Event id
    pub id: String,
    /// Device name
    pub device: String,
    /// Milliseconds since the Unix epoch
    pub origin: i64,
    pub readings: Vec<Reading>,
}

/// Response to ping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub service: String,
    pub version: String,
}
