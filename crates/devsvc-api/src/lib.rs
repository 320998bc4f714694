//! REST transport for a device service.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | any | `/api/v1/callback` | lifecycle notifications from the metadata authority |
//! | GET/PUT | `/api/v1/device/:id/:command` | read or write a device command |
//! | GET/PUT | `/api/v1/device/name/:name/:command` | same, addressed by device name |
//! | POST | `/api/v1/discovery` | start driver discovery |
//! | GET | `/api/v1/ping` | service name and version |

pub mod handlers;
pub mod models;
pub mod server;

pub use models::{ApiResult, ErrorResponse};
pub use server::{create_router, serve, ServerState};
