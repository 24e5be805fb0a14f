//! WebSocket signaling client for E2E tests.
//!
//! Frames are handled as `serde_json::Value` so tests assert on the wire
//! format clients actually see.

use crate::server_harness::TestCoordinatorServer;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long `next_event` waits before giving up.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// One browser tab's signaling connection.
pub struct SignalingClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    socket_id: String,
}

impl SignalingClient {
    /// Connect and consume the `connected` greeting.
    pub async fn connect(server: &TestCoordinatorServer) -> Result<Self, anyhow::Error> {
        let (ws, _response) = connect_async(server.ws_url())
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {}", e))?;

        let mut client = Self {
            ws,
            socket_id: String::new(),
        };

        let greeting = client
            .next_event()
            .await
            .ok_or_else(|| anyhow::anyhow!("Connection closed before greeting"))?;
        if greeting["event"] != "connected" {
            anyhow::bail!("Expected connected greeting, got {}", greeting);
        }
        client.socket_id = greeting["data"]["socketId"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Greeting without socketId"))?
            .to_string();

        Ok(client)
    }

    /// Server-assigned connection id.
    pub fn socket_id(&self) -> &str {
        &self.socket_id
    }

    /// Send `{ "event": event, "data": data }`.
    pub async fn send(&mut self, event: &str, data: Value) -> Result<(), anyhow::Error> {
        let frame = json!({ "event": event, "data": data }).to_string();
        self.send_raw(frame).await
    }

    /// Send a payload-less event.
    pub async fn send_bare(&mut self, event: &str) -> Result<(), anyhow::Error> {
        self.send_raw(json!({ "event": event }).to_string()).await
    }

    /// Send an arbitrary text frame.
    pub async fn send_raw(&mut self, text: String) -> Result<(), anyhow::Error> {
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send failed: {}", e))
    }

    /// Next server event, skipping transport frames.
    ///
    /// Returns `None` when the server closes the connection or nothing
    /// arrives within [`EVENT_TIMEOUT`].
    pub async fn next_event(&mut self) -> Option<Value> {
        loop {
            let message = tokio::time::timeout(EVENT_TIMEOUT, self.ws.next())
                .await
                .ok()??
                .ok()?;
            match message {
                Message::Text(text) => {
                    return Some(serde_json::from_str(&text).expect("server sent invalid JSON"))
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
    }

    /// Skip events until one named `event` arrives.
    ///
    /// # Panics
    ///
    /// If the connection closes or times out first.
    pub async fn expect_event(&mut self, event: &str) -> Value {
        loop {
            match self.next_event().await {
                Some(frame) if frame["event"] == event => return frame,
                Some(_) => {}
                None => panic!("connection ended while waiting for {event}"),
            }
        }
    }

    /// Assert nothing but transport frames arrives within `window`.
    ///
    /// # Panics
    ///
    /// If a server event arrives.
    pub async fn expect_silence(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let Ok(next) = tokio::time::timeout_at(deadline, self.ws.next()).await else {
                return;
            };
            match next {
                Some(Ok(Message::Text(text))) => panic!("unexpected event: {text}"),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    }

    /// Wait for the server to close the connection, discarding events.
    ///
    /// Returns false if the connection is still open after `timeout`.
    pub async fn wait_for_close(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => return false,
                Ok(None | Some(Err(_) | Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => {}
            }
        }
    }

    /// Wait for the server to close the connection without answering its
    /// pings in the meantime.
    ///
    /// The underlying stream queues pong replies until it is polled, so
    /// sleeping first keeps the connection silent from the server's view.
    pub async fn go_silent_then_wait_for_close(&mut self, silence: Duration) -> bool {
        tokio::time::sleep(silence).await;
        self.wait_for_close(EVENT_TIMEOUT).await
    }

    /// Send a close frame.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Create a meeting over `client` and return its id.
///
/// # Panics
///
/// If the host is not admitted.
pub async fn host_meeting(client: &mut SignalingClient, host_name: &str, meeting_id: Option<&str>) -> String {
    let mut data = json!({ "hostName": host_name });
    if let Some(id) = meeting_id {
        data["meetingId"] = json!(id);
    }
    client.send("join-as-host", data).await.expect("send join-as-host");

    let joined = client.expect_event("joined-meeting").await;
    assert_eq!(joined["data"]["isHost"], true);
    joined["data"]["meetingId"]
        .as_str()
        .expect("joined-meeting without meetingId")
        .to_string()
}

/// Join `meeting_id` over `client` and return the `joined-meeting` frame.
///
/// # Panics
///
/// If the participant is not admitted.
pub async fn join_meeting(client: &mut SignalingClient, meeting_id: &str, name: &str) -> Value {
    client
        .send(
            "join-meeting",
            json!({ "meetingId": meeting_id, "participantName": name }),
        )
        .await
        .expect("send join-meeting");
    client.expect_event("joined-meeting").await
}
