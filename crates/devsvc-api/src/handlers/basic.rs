//! Basic handlers - ping and discovery.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::ServerState;
use crate::models::{ApiResult, PingResponse};

/// Report the service name and version.
pub async fn ping_handler(State(state): State<ServerState>) -> Json<PingResponse> {
    Json(PingResponse {
        service: state.service.name().to_string(),
        version: state.service.version().to_string(),
    })
}

/// Kick off driver discovery in the background.
pub async fn discovery_handler(State(state): State<ServerState>) -> ApiResult<StatusCode> {
    state.service.spawn_discovery()?;
    Ok(StatusCode::ACCEPTED)
}
