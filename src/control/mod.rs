//! Operator control channel
//!
//! Commands come in as JSON text frames, status lines go out as plain text.
//! The listener also answers plain HTTP liveness checks on the same port.

mod command;
mod server;
mod status;

pub use command::ControlCommand;
pub use server::{ControlServer, CONNECTED_GREETING, HEALTH_BODY};
pub use status::StatusReporter;

use thiserror::Error;

/// Control channel errors
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Engine is gone")]
    EngineClosed,
}
