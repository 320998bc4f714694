//! Error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use devsvc_devices::{CommandError, ServiceError};

/// JSON error body returned by every handler.
///
/// ```json
/// { "code": "NOT_FOUND", "message": "Device not found: d9" }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ErrorResponse>;

impl ErrorResponse {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn locked(message: impl Into<String>) -> Self {
        Self::new(StatusCode::LOCKED, "LOCKED", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl From<CommandError> for ErrorResponse {
    fn from(err: CommandError) -> Self {
        let message = err.to_string();
        match err {
            CommandError::DeviceNotFound(_) | CommandError::CommandNotFound { .. } => {
                Self::not_found(message)
            }
            CommandError::DeviceLocked(_) => Self::locked(message),
            CommandError::NotReadable(_) | CommandError::NotWritable(_) => {
                Self::method_not_allowed(message)
            }
            CommandError::InvalidValue { .. } | CommandError::LengthMismatch { .. } => {
                Self::bad_request(message)
            }
            CommandError::Driver(_) | CommandError::DriverContract(_) => Self::internal(message),
        }
    }
}

impl From<ServiceError> for ErrorResponse {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Command(e) => e.into(),
            ServiceError::NotRunning => Self::service_unavailable(err.to_string()),
            ServiceError::DiscoveryInProgress => Self::conflict(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}
