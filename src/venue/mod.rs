//! Trading venue connection
//!
//! The engine talks to the venue through [`VenueLink`]; [`VenueSession`] is
//! the live Deriv implementation on top of the reconnecting WebSocket client.

mod protocol;
mod session;

pub use protocol::{
    decimal_from_value, BuyRequest, ContractId, ContractParameters, ContractUpdate,
    ProposalRequest, VenueMessage, VenueRequest, CURRENCY,
};
pub use session::{VenueSession, DERIV_WS_URL};

use crate::engine::RunId;
use std::time::Duration;
use thiserror::Error;

/// Venue errors
#[derive(Debug, Clone, Error)]
pub enum VenueError {
    #[error("Not connected")]
    NotConnected,
    #[error("Outbound queue full")]
    QueueFull,
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Malformed message: {0}")]
    Malformed(String),
}

/// Everything the session reports upward
#[derive(Debug, Clone, PartialEq)]
pub enum VenueEvent {
    /// Transport is up; authorization has been sent
    Connected,
    Message(VenueMessage),
    /// A frame that could not be parsed
    Malformed(String),
    TransportError(String),
    /// Transport closed; one reconnect fires after `delay`
    Reconnecting { attempt: u32, delay: Duration },
    /// Session is gone for good
    Ended,
}

/// Outbound side of a venue connection
pub trait VenueLink: Send {
    /// Open a session for `run`, authorizing with `token` on every connect
    fn connect(&mut self, run: RunId, token: &str);
    /// Queue a request on the open session
    fn send(&mut self, request: &VenueRequest) -> Result<(), VenueError>;
    /// Close the session; no further events reach the engine
    fn disconnect(&mut self);
}
