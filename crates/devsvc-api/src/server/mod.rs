//! HTTP server: shared state, router and serve loop.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use devsvc_core::paths;
use devsvc_devices::DeviceService;

use crate::handlers::{basic, callback, commands};

/// Maximum request body size (1 MB)
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

/// Server state shared across all handlers.
#[derive(Clone)]
pub struct ServerState {
    pub service: Arc<DeviceService>,
}

impl ServerState {
    pub fn new(service: Arc<DeviceService>) -> Self {
        Self { service }
    }
}

/// Create the application router.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route(paths::PING, get(basic::ping_handler))
        .route(paths::CALLBACK, any(callback::callback_handler))
        .route(paths::DISCOVERY, post(basic::discovery_handler))
        .route(
            paths::DEVICE_NAME_COMMAND,
            get(commands::get_command_by_name_handler).put(commands::put_command_by_name_handler),
        )
        .route(
            paths::DEVICE_COMMAND,
            get(commands::get_command_handler).put(commands::put_command_handler),
        )
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(state: ServerState, addr: &str, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
