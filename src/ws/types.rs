//! WebSocket types and configuration

use std::time::Duration;
use thiserror::Error;

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Maximum reconnection attempts before giving up (0 = infinite)
    pub max_reconnect_attempts: u32,
    /// Initial delay before first reconnection attempt
    pub initial_reconnect_delay: Duration,
    /// Maximum delay between reconnection attempts
    pub max_reconnect_delay: Duration,
    /// Interval for sending ping frames
    pub ping_interval: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_reconnect_attempts: 0,
            initial_reconnect_delay: Duration::from_secs(5),
            max_reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl WsConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set maximum reconnection attempts
    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.max_reconnect_attempts = n;
        self
    }

    /// Set initial reconnection delay
    pub fn initial_delay(mut self, d: Duration) -> Self {
        self.initial_reconnect_delay = d;
        self
    }

    /// Set maximum reconnection delay
    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_reconnect_delay = d;
        self
    }

    /// Reconnect after the same delay every time
    pub fn fixed_delay(self, d: Duration) -> Self {
        self.initial_delay(d).max_delay(d)
    }

    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }
}

/// Events emitted by the client task
#[derive(Debug, Clone)]
pub enum WsMessage {
    /// Text frame from the server
    Text(String),
    /// Connection established (also after every reconnect)
    Connected,
    /// Transport-level failure; the connection is being torn down
    Error(String),
    /// Connection lost, a single reconnect is scheduled after `delay`
    Reconnecting { attempt: u32, delay: Duration },
    /// Client gave up or was shut down locally; no more events follow
    Disconnected,
}

/// WebSocket errors
#[derive(Debug, Clone, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Maximum reconnection attempts exceeded")]
    MaxReconnectsExceeded,
    #[error("Send failed: {0}")]
    SendFailed(String),
}
