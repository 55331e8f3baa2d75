//! WebSocket client library
//!
//! Provides a reusable WebSocket client with automatic reconnection,
//! ping/pong handling, and configurable delay between attempts.

mod client;
mod types;

pub use client::WsClient;
pub use types::{WsConfig, WsError, WsMessage};
