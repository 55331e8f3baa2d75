//! WebSocket client with automatic reconnection

use super::types::{WsConfig, WsError, WsMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a single connection ended
#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    /// The server closed the connection; reconnect
    RemoteClosed,
    /// The local side dropped its channels; stop for good
    Shutdown,
}

/// Reusable WebSocket client with automatic reconnection and ping handling
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    /// Create a new WebSocket client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Create a new client with just a URL using default config
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WsConfig::new(url))
    }

    /// Get the configured URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Connect and return `(events, outbound)` channels.
    ///
    /// A background task owns the socket. Every close or failure schedules
    /// exactly one reconnect after the configured delay. Dropping the outbound
    /// sender closes the socket; dropping the event receiver stops the task,
    /// including while it waits to reconnect.
    pub fn connect(&self) -> (mpsc::Receiver<WsMessage>, mpsc::Sender<String>) {
        let (msg_tx, msg_rx) = mpsc::channel(1024);
        let (send_tx, send_rx) = mpsc::channel(256);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::run_connection_loop(config, msg_tx, send_rx).await {
                tracing::error!(error = %e, "WebSocket connection loop failed");
            }
        });

        (msg_rx, send_tx)
    }

    /// Run the connection loop with automatic reconnection
    async fn run_connection_loop(
        config: WsConfig,
        tx: mpsc::Sender<WsMessage>,
        mut send_rx: mpsc::Receiver<String>,
    ) -> Result<(), WsError> {
        let mut reconnect_attempts = 0;
        let mut reconnect_delay = config.initial_reconnect_delay;

        loop {
            tracing::info!(url = %config.url, "Connecting to WebSocket");

            match connect_async(&config.url).await {
                Ok((socket, _response)) => {
                    tracing::info!("WebSocket connected");
                    reconnect_attempts = 0;
                    reconnect_delay = config.initial_reconnect_delay;

                    if tx.send(WsMessage::Connected).await.is_err() {
                        return Ok(());
                    }

                    match Self::stream(&config, socket, &tx, &mut send_rx).await {
                        Ok(StreamEnd::Shutdown) => {
                            tracing::info!("WebSocket shut down locally");
                            let _ = tx.send(WsMessage::Disconnected).await;
                            return Ok(());
                        }
                        Ok(StreamEnd::RemoteClosed) => {
                            tracing::info!("WebSocket closed by server");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "WebSocket stream error");
                            let _ = tx.send(WsMessage::Error(e.to_string())).await;
                        }
                    }
                }
                Err(e) => {
                    let err = WsError::ConnectionFailed(e.to_string());
                    tracing::warn!(error = %err, "WebSocket connect failed");
                    let _ = tx.send(WsMessage::Error(err.to_string())).await;
                }
            }

            reconnect_attempts += 1;

            // Check max reconnects (0 = infinite)
            if config.max_reconnect_attempts > 0
                && reconnect_attempts >= config.max_reconnect_attempts
            {
                tracing::error!("Max reconnection attempts reached");
                let _ = tx.send(WsMessage::Disconnected).await;
                return Err(WsError::MaxReconnectsExceeded);
            }

            if tx.is_closed() {
                tracing::info!("Receiver dropped, stopping reconnection");
                return Ok(());
            }

            tracing::warn!(
                attempt = reconnect_attempts,
                delay_ms = reconnect_delay.as_millis() as u64,
                "WebSocket reconnecting"
            );
            let _ = tx
                .send(WsMessage::Reconnecting {
                    attempt: reconnect_attempts,
                    delay: reconnect_delay,
                })
                .await;

            tokio::select! {
                _ = sleep(reconnect_delay) => {}
                _ = tx.closed() => {
                    tracing::info!("Receiver dropped while waiting to reconnect");
                    return Ok(());
                }
            }
            reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay);
        }
    }

    /// Pump one established connection until it ends
    async fn stream(
        config: &WsConfig,
        socket: Socket,
        tx: &mpsc::Sender<WsMessage>,
        send_rx: &mut mpsc::Receiver<String>,
    ) -> Result<StreamEnd, WsError> {
        let (mut write, mut read) = socket.split();

        let mut ping_interval = tokio::time::interval(config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately
        ping_interval.tick().await;
        let mut waiting_for_pong = false;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(WsMessage::Text(text)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(StreamEnd::Shutdown);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            waiting_for_pong = false;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Received close frame");
                            return Ok(StreamEnd::RemoteClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Ok(StreamEnd::RemoteClosed);
                        }
                    }
                }

                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            write.send(Message::Text(text)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(StreamEnd::Shutdown);
                        }
                    }
                }

                _ = tx.closed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(StreamEnd::Shutdown);
                }

                _ = ping_interval.tick() => {
                    if waiting_for_pong {
                        return Err(WsError::ConnectionFailed("Pong timeout".into()));
                    }
                    write.send(Message::Ping(vec![])).await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    waiting_for_pong = true;
                }
            }
        }
    }
}
