//! WebSocket signaling transport.
//!
//! Each connection runs two halves:
//!
//! - a reader loop (this task) that parses frames and routes them, treating
//!   `heartbeat_timeout` of silence as a disconnect
//! - a writer task that drains the connection's outbound queue and sends a
//!   ping every `heartbeat_interval`
//!
//! Whatever ends the reader (close frame, error, timeout, kick, shutdown),
//! the connection leaves its meeting through the same idempotent path.

use crate::actors::{ConnectionOutbox, MeetingDirectory};
use crate::observability::metrics as prom;
use crate::protocol::{session, ClientEvent, ServerEvent};
use crate::routes::AppState;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Largest accepted inbound frame. SDP offers stay well below this.
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// How long cleanup waits for the writer to flush.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport-level liveness settings.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    /// Server ping period.
    pub interval: Duration,
    /// Silence after which the connection is dropped.
    pub timeout: Duration,
}

/// Why the reader loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    ClientClosed,
    StreamEnded,
    HeartbeatTimeout,
    ServerClosed,
}

impl Disconnect {
    const fn as_str(self) -> &'static str {
        match self {
            Disconnect::ClientClosed => "client_closed",
            Disconnect::StreamEnded => "stream_ended",
            Disconnect::HeartbeatTimeout => "heartbeat_timeout",
            Disconnect::ServerClosed => "server_closed",
        }
    }
}

/// `GET /ws` upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let directory = Arc::clone(&state.directory);
    let heartbeat = state.heartbeat;

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_failed_upgrade(|error| {
            warn!(target: "coord.transport.ws", error = %error, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(socket, directory, heartbeat))
}

/// Drive one signaling connection until it closes.
#[instrument(skip_all, name = "coord.transport.ws", fields(connection_id = tracing::field::Empty))]
pub async fn handle_socket(socket: WebSocket, directory: Arc<MeetingDirectory>, heartbeat: Heartbeat) {
    let (handle, outbox) = directory.connections().register();
    let connection_id = handle.connection_id().to_string();
    tracing::Span::current().record("connection_id", connection_id.as_str());
    let cancel_token = outbox.cancel_token();

    info!(target: "coord.transport.ws", connection_id = %connection_id, "Connection opened");

    directory.connections().send(
        &connection_id,
        &ServerEvent::Connected {
            socket_id: connection_id.clone(),
        },
    );

    let (ws_sender, ws_receiver) = socket.split();
    let writer = tokio::spawn(write_loop(ws_sender, outbox, heartbeat.interval));

    let reason = read_loop(
        &directory,
        &connection_id,
        ws_receiver,
        &cancel_token,
        heartbeat.timeout,
    )
    .await;

    directory.leave(&connection_id).await;
    directory.connections().unregister(&connection_id);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        debug!(target: "coord.transport.ws", connection_id = %connection_id, "Writer did not finish draining");
    }

    info!(
        target: "coord.transport.ws",
        connection_id = %connection_id,
        reason = reason.as_str(),
        "Connection closed"
    );
}

async fn read_loop(
    directory: &MeetingDirectory,
    connection_id: &str,
    mut receiver: SplitStream<WebSocket>,
    cancel_token: &CancellationToken,
    heartbeat_timeout: Duration,
) -> Disconnect {
    loop {
        let next = tokio::select! {
            () = cancel_token.cancelled() => return Disconnect::ServerClosed,
            next = tokio::time::timeout(heartbeat_timeout, receiver.next()) => next,
        };

        let message = match next {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                debug!(target: "coord.transport.ws", connection_id = %connection_id, error = %e, "WebSocket error");
                return Disconnect::StreamEnded;
            }
            Ok(None) => return Disconnect::StreamEnded,
            Err(_) => {
                prom::record_heartbeat_timeout();
                warn!(
                    target: "coord.transport.ws",
                    connection_id = %connection_id,
                    timeout_secs = heartbeat_timeout.as_secs(),
                    "Heartbeat timeout"
                );
                return Disconnect::HeartbeatTimeout;
            }
        };

        match message {
            Message::Text(text) => match ClientEvent::from_frame(&text) {
                Ok(event) => session::route(directory, connection_id, event).await,
                Err(e) => {
                    debug!(
                        target: "coord.transport.ws",
                        connection_id = %connection_id,
                        error = %e,
                        "Unparseable frame"
                    );
                    session::reject_frame(directory, connection_id);
                }
            },
            Message::Binary(_) => session::reject_frame(directory, connection_id),
            Message::Close(_) => return Disconnect::ClientClosed,
            // Pongs only refresh the heartbeat; pings are answered by axum.
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbox: ConnectionOutbox,
    ping_interval: Duration,
) {
    let cancel_token = outbox.cancel_token();
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            biased;

            frame = outbox.recv() => match frame {
                Some(frame) => {
                    if sender.send(Message::Text(frame.to_string())).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
            () = cancel_token.cancelled() => break,
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    return;
                }
            }
        }
    }

    // Flush what was queued before the close, e.g. `kicked-from-meeting`.
    while let Some(frame) = outbox.try_recv() {
        if sender.send(Message::Text(frame.to_string())).await.is_err() {
            return;
        }
    }
    let _ = sender.send(Message::Close(None)).await;
    let _ = sender.close().await;
}
