//! Lifecycle callback handler.
//!
//! The metadata authority calls back with `{"type": "DEVICE", "id": "..."}`
//! whenever a device is created, changed or deleted. POST and PUT mean the
//! device should be re-fetched; DELETE means it is gone.

use axum::extract::State;
use axum::http::{Method, StatusCode};
use serde_json::Value;

use devsvc_core::DEVICE_CALLBACK_TYPE;
use devsvc_devices::LifecycleNotification;

use super::ServerState;
use crate::models::{ApiResult, ErrorResponse};

/// Validate a callback body and turn it into a notification.
///
/// Validation happens before anything touches the store.
pub fn parse_callback(method: &Method, body: &str) -> ApiResult<LifecycleNotification> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ErrorResponse::bad_request(format!("Callback body is not JSON: {}", e)))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ErrorResponse::bad_request("Callback is missing 'type'"))?;
    if kind != DEVICE_CALLBACK_TYPE {
        return Err(ErrorResponse::not_implemented(format!(
            "Callbacks of type '{}' are not supported",
            kind
        )));
    }

    let id = value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ErrorResponse::bad_request("Callback is missing 'id'"))?;

    if method == Method::POST || method == Method::PUT {
        Ok(LifecycleNotification::upsert(id))
    } else if method == Method::DELETE {
        Ok(LifecycleNotification::delete(id))
    } else {
        Err(ErrorResponse::not_implemented(format!(
            "Callback method {} is not supported",
            method
        )))
    }
}

/// Handle a lifecycle callback.
///
/// Returns 200 once the notification has been processed, including when it
/// was dropped because the authority could not be reached.
pub async fn callback_handler(
    State(state): State<ServerState>,
    method: Method,
    body: String,
) -> ApiResult<StatusCode> {
    let notification = parse_callback(&method, &body).inspect_err(|e| {
        tracing::warn!("Rejected callback: {}", e.message);
    })?;

    let report = state.service.handle_notification(notification).await?;
    tracing::debug!("Callback handled: {:?}", report);
    Ok(StatusCode::OK)
}
