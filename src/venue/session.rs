//! Live Deriv session over the reconnecting WebSocket client

use super::{VenueError, VenueEvent, VenueLink, VenueMessage, VenueRequest};
use crate::config::VenueConfig;
use crate::engine::{EngineEvent, RunId};
use crate::ws::{WsClient, WsConfig, WsMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Deriv public WebSocket endpoint
pub const DERIV_WS_URL: &str = "wss://ws.binaryws.com/websockets/v3?app_id=1089";

struct ActiveSession {
    run: RunId,
    outbound: mpsc::Sender<String>,
    forwarder: JoinHandle<()>,
}

/// One venue connection at a time, feeding [`EngineEvent::Venue`]
pub struct VenueSession {
    config: VenueConfig,
    events: mpsc::Sender<EngineEvent>,
    active: Option<ActiveSession>,
}

impl VenueSession {
    pub fn new(config: VenueConfig, events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            config,
            events,
            active: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }
}

impl VenueLink for VenueSession {
    fn connect(&mut self, run: RunId, token: &str) {
        self.disconnect();

        let ws_config = WsConfig::new(&self.config.url)
            .max_reconnects(0)
            .fixed_delay(self.config.reconnect_delay());
        let (ws_rx, ws_tx) = WsClient::new(ws_config).connect();

        let forwarder = tokio::spawn(forward(
            run,
            token.to_string(),
            ws_rx,
            ws_tx.clone(),
            self.events.clone(),
        ));

        tracing::info!(%run, url = %self.config.url, "Venue session opened");
        self.active = Some(ActiveSession {
            run,
            outbound: ws_tx,
            forwarder,
        });
    }

    fn send(&mut self, request: &VenueRequest) -> Result<(), VenueError> {
        let active = self.active.as_ref().ok_or(VenueError::NotConnected)?;
        let json = request.to_json()?;

        tracing::debug!(run = %active.run, kind = request.kind(), "Sending venue request");
        active.outbound.try_send(json).map_err(|e| match e {
            TrySendError::Full(_) => VenueError::QueueFull,
            TrySendError::Closed(_) => VenueError::NotConnected,
        })
    }

    fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            // Dropping the forwarder's receiver stops the socket task, even mid-backoff
            active.forwarder.abort();
            tracing::info!(run = %active.run, "Venue session closed");
        }
    }
}

impl Drop for VenueSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Translate socket events for the engine and authorize on every connect
async fn forward(
    run: RunId,
    token: String,
    mut ws_rx: mpsc::Receiver<WsMessage>,
    ws_tx: mpsc::Sender<String>,
    events: mpsc::Sender<EngineEvent>,
) {
    while let Some(msg) = ws_rx.recv().await {
        let event = match msg {
            WsMessage::Connected => {
                match VenueRequest::authorize(token.as_str()).to_json() {
                    Ok(json) => {
                        if ws_tx.send(json).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to encode authorize request"),
                }
                VenueEvent::Connected
            }
            WsMessage::Text(text) => match VenueMessage::parse(&text) {
                Ok(message) => VenueEvent::Message(message),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        preview = %text.chars().take(100).collect::<String>(),
                        "Failed to parse venue message"
                    );
                    VenueEvent::Malformed(e.to_string())
                }
            },
            WsMessage::Error(e) => VenueEvent::TransportError(e),
            WsMessage::Reconnecting { attempt, delay } => VenueEvent::Reconnecting { attempt, delay },
            WsMessage::Disconnected => VenueEvent::Ended,
        };

        let ended = matches!(event, VenueEvent::Ended);
        if events.send(EngineEvent::Venue { run, event }).await.is_err() || ended {
            break;
        }
    }
}
