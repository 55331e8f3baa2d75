//! Control server over a real local socket

use futures_util::{SinkExt, Stream, StreamExt};
use martingale_bot::control::{
    ControlCommand, ControlServer, StatusReporter, CONNECTED_GREETING, HEALTH_BODY,
};
use martingale_bot::engine::EngineEvent;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

async fn serve() -> (SocketAddr, StatusReporter, mpsc::Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::channel(16);
    let status = StatusReporter::default();
    let server = ControlServer::bind("127.0.0.1:0", status.clone(), tx)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (addr, status, rx)
}

async fn next_text<S>(read: &mut S) -> String
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

async fn next_event(rx: &mut mpsc::Receiver<EngineEvent>) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for engine event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_client_greeted_and_commands_forwarded() {
    let (addr, _status, mut rx) = serve().await;
    let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let (mut write, mut read) = ws.split();

    assert_eq!(next_text(&mut read).await, CONNECTED_GREETING);

    write
        .send(Message::Text(r#"{"command":"start","baseStake":"25"}"#.to_string()))
        .await
        .unwrap();
    match next_event(&mut rx).await {
        EngineEvent::Control(ControlCommand::Start(overrides)) => {
            assert_eq!(overrides.base_stake, Some(serde_json::json!("25")));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    write
        .send(Message::Text(r#"{"command":"stop"}"#.to_string()))
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut rx).await,
        EngineEvent::Control(ControlCommand::Stop)
    ));
}

#[tokio::test]
async fn test_invalid_json_answered_and_unknown_ignored() {
    let (addr, _status, mut rx) = serve().await;
    let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let (mut write, mut read) = ws.split();
    next_text(&mut read).await;

    write
        .send(Message::Text(r#"{"command":"dance"}"#.to_string()))
        .await
        .unwrap();
    write.send(Message::Text("{oops".to_string())).await.unwrap();

    assert_eq!(next_text(&mut read).await, "ERROR: Invalid JSON");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_status_lines_reach_client() {
    let (addr, status, _rx) = serve().await;
    let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let (_write, mut read) = ws.split();
    next_text(&mut read).await;

    status.report("♻️ Starting cycle 1");
    status.report("🎯 Bought contract on R_10 | ID: 42");

    assert_eq!(next_text(&mut read).await, "♻️ Starting cycle 1");
    assert_eq!(next_text(&mut read).await, "🎯 Bought contract on R_10 | ID: 42");
}

#[tokio::test]
async fn test_client_close_reports_disconnect() {
    let (addr, _status, mut rx) = serve().await;
    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    ws.next().await;

    ws.close(None).await.unwrap();

    assert!(matches!(
        next_event(&mut rx).await,
        EngineEvent::ControlDisconnected
    ));
}

#[tokio::test]
async fn test_plain_http_gets_liveness_text() {
    let (addr, _status, mut rx) = serve().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with(HEALTH_BODY));
    // A health probe is not a control client
    assert!(rx.try_recv().is_err());
}
