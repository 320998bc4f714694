//! Device command handlers.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use devsvc_devices::DeviceKey;

use super::ServerState;
use crate::models::{ApiResult, ErrorResponse, ReadingsResponse};

async fn read(
    state: &ServerState,
    key: DeviceKey<'_>,
    command: &str,
) -> ApiResult<Json<ReadingsResponse>> {
    let (device, readings) = state.service.read_command(key, command).await?;
    Ok(Json(ReadingsResponse {
        id: uuid::Uuid::new_v4().to_string(),
        device: device.name.clone(),
        origin: chrono::Utc::now().timestamp_millis(),
        readings,
    }))
}

async fn write(
    state: &ServerState,
    key: DeviceKey<'_>,
    command: &str,
    body: &str,
) -> ApiResult<StatusCode> {
    let values = parse_write_body(body)?;
    state.service.write_command(key, command, &values).await?;
    Ok(StatusCode::OK)
}

/// Parse a PUT body: a JSON object of resource name to value.
///
/// Values may be strings, numbers or booleans; they are handed on in string
/// form and parsed against the resource's declared type later.
pub fn parse_write_body(body: &str) -> ApiResult<HashMap<String, String>> {
    let object = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return Err(ErrorResponse::bad_request("Body must be a JSON object")),
        Err(e) => return Err(ErrorResponse::bad_request(format!("Invalid JSON: {}", e))),
    };

    object
        .into_iter()
        .map(|(resource, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(ErrorResponse::bad_request(format!(
                        "Value for '{}' must be a string, number or boolean, got {}",
                        resource, other
                    )))
                }
            };
            Ok((resource, value))
        })
        .collect()
}

/// `GET /api/v1/device/:id/:command`
pub async fn get_command_handler(
    State(state): State<ServerState>,
    Path((id, command)): Path<(String, String)>,
) -> ApiResult<Json<ReadingsResponse>> {
    read(&state, DeviceKey::Id(&id), &command).await
}

/// `PUT /api/v1/device/:id/:command`
pub async fn put_command_handler(
    State(state): State<ServerState>,
    Path((id, command)): Path<(String, String)>,
    body: String,
) -> ApiResult<StatusCode> {
    write(&state, DeviceKey::Id(&id), &command, &body).await
}

/// `GET /api/v1/device/name/:name/:command`
pub async fn get_command_by_name_handler(
    State(state): State<ServerState>,
    Path((name, command)): Path<(String, String)>,
) -> ApiResult<Json<ReadingsResponse>> {
    read(&state, DeviceKey::Name(&name), &command).await
}

/// `PUT /api/v1/device/name/:name/:command`
pub async fn put_command_by_name_handler(
    State(state): State<ServerState>,
    Path((name, command)): Path<(String, String)>,
    body: String,
) -> ApiResult<StatusCode> {
    write(&state, DeviceKey::Name(&name), &command, &body).await
}
