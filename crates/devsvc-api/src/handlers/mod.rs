//! API handlers organized by domain.

pub mod basic;
pub mod callback;
pub mod commands;

// Re-export ServerState so handlers can use it
pub use crate::server::ServerState;

pub use basic::{discovery_handler, ping_handler};
pub use callback::callback_handler;
pub use commands::{
    get_command_by_name_handler, get_command_handler, put_command_by_name_handler,
    put_command_handler,
};
