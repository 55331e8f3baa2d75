//! Control WebSocket server with an HTTP liveness answer on the same port

use super::{ControlCommand, ControlError, StatusReporter};
use crate::engine::EngineEvent;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

/// First line every control client receives
pub const CONNECTED_GREETING: &str = "🟢 Connected to backend";
/// Body of the liveness response
pub const HEALTH_BODY: &str = "Deriv bot backend running";

const MAX_HEADER_BYTES: usize = 8192;
const HEADER_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts control clients and relays between them and the engine
pub struct ControlServer {
    listener: TcpListener,
    status: StatusReporter,
    events: mpsc::Sender<EngineEvent>,
}

impl ControlServer {
    pub async fn bind(
        addr: &str,
        status: StatusReporter,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<Self, ControlError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ControlError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            status,
            events,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ControlError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the engine goes away
    pub async fn run(self) -> Result<(), ControlError> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Control server listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let status = self.status.clone();
                            let events = self.events.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer, status, events).await {
                                    tracing::debug!(%peer, error = %e, "Control connection ended with error");
                                }
                            });
                        }
                        Err(e) => tracing::error!(error = %e, "Failed to accept connection"),
                    }
                }
                _ = self.events.closed() => {
                    tracing::info!("Engine stopped, closing control server");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    status: StatusReporter,
    events: mpsc::Sender<EngineEvent>,
) -> Result<(), ControlError> {
    if !is_websocket_upgrade(&stream).await? {
        return answer_health(&mut stream).await;
    }

    let ws = accept_async(stream).await?;
    tracing::info!(%peer, "Control client connected");

    let (mut write, mut read) = ws.split();
    // Subscribe before greeting so nothing reported meanwhile is missed
    let mut statuses = status.subscribe();
    write.send(Message::Text(CONNECTED_GREETING.to_string())).await?;

    let result = loop {
        tokio::select! {
            line = statuses.recv() => match line {
                Ok(line) => {
                    if let Err(e) = write.send(Message::Text(line)).await {
                        break Err(e.into());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(%peer, skipped, "Control client lagging, status lines dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break Ok(()),
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match ControlCommand::parse(&text) {
                    Ok(Some(command)) => {
                        tracing::info!(%peer, ?command, "Control command");
                        if events.send(EngineEvent::Control(command)).await.is_err() {
                            break Err(ControlError::EngineClosed);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(%peer, error = %e, "Bad control message");
                        if let Err(e) = write.send(Message::Text("ERROR: Invalid JSON".to_string())).await {
                            break Err(e.into());
                        }
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        break Err(e.into());
                    }
                }
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
            },
        }
    };

    tracing::info!(%peer, "Control client disconnected");
    let _ = events.send(EngineEvent::ControlDisconnected).await;
    result
}

/// Peek at the request head without consuming it
async fn is_websocket_upgrade(stream: &TcpStream) -> Result<bool, ControlError> {
    let mut buf = vec![0u8; MAX_HEADER_BYTES];
    let deadline = tokio::time::Instant::now() + HEADER_TIMEOUT;

    loop {
        let n = stream.peek(&mut buf).await?;
        let head = &buf[..n];
        let complete = n == 0 || n == buf.len() || head.windows(4).any(|w| w == b"\r\n\r\n");
        if complete || tokio::time::Instant::now() >= deadline {
            let head = String::from_utf8_lossy(head).to_ascii_lowercase();
            return Ok(head
                .lines()
                .any(|line| line.starts_with("upgrade:") && line.contains("websocket")));
        }
        // Partial head: peek returns the same bytes until more arrive
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn answer_health(stream: &mut TcpStream) -> Result<(), ControlError> {
    let mut scratch = [0u8; 1024];
    let _ = stream.read(&mut scratch).await?;

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        HEALTH_BODY.len(),
        HEALTH_BODY
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
