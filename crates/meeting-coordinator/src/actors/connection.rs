//! Connection registry and best-effort outbound delivery.
//!
//! Each signaling connection gets:
//! - a bounded outbound queue of pre-serialized JSON frames
//! - a cancellation token (child of the process root token) that the
//!   transport watches; cancelling it force-closes the connection
//!
//! Delivery uses `try_send` only. A full or closed queue drops the frame and
//! records the drop, so a slow client never stalls the meeting actor that is
//! notifying it.

use crate::protocol::{Notification, ServerEvent};

use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

/// A serialized server event, shared across recipients of a broadcast.
pub type OutboundFrame = Arc<str>;

/// Sending side of one connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    connection_id: String,
    sender: mpsc::Sender<OutboundFrame>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl ConnectionHandle {
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Queue a frame without waiting. Returns false if it was dropped.
    pub fn try_deliver(&self, frame: OutboundFrame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => {
                self.mailbox.record_enqueue();
                true
            }
            Err(_) => {
                self.mailbox.record_drop();
                false
            }
        }
    }

    /// Force-close the connection. Queued frames are still flushed.
    pub fn close(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Receiving side of one connection, owned by its transport writer.
#[derive(Debug)]
pub struct ConnectionOutbox {
    connection_id: String,
    receiver: mpsc::Receiver<OutboundFrame>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl ConnectionOutbox {
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Token cancelled when the connection must close.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Wait for the next frame. `None` once every handle is gone.
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        let frame = self.receiver.recv().await;
        if frame.is_some() {
            self.mailbox.record_dequeue();
        }
        frame
    }

    /// Take a queued frame without waiting.
    pub fn try_recv(&mut self) -> Option<OutboundFrame> {
        let frame = self.receiver.try_recv().ok();
        if frame.is_some() {
            self.mailbox.record_dequeue();
        }
        frame
    }
}

/// Process-wide map of open signaling connections.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, ConnectionHandle>>,
    buffer: usize,
    parent_token: CancellationToken,
    metrics: Arc<ActorMetrics>,
}

impl ConnectionRegistry {
    /// Create a registry whose connections hold `buffer` outbound frames.
    #[must_use]
    pub fn new(buffer: usize, parent_token: CancellationToken, metrics: Arc<ActorMetrics>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
            parent_token,
            metrics,
        }
    }

    /// Register a new connection under a fresh identifier.
    pub fn register(&self) -> (ConnectionHandle, ConnectionOutbox) {
        let connection_id = Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::channel(self.buffer);
        let cancel_token = self.parent_token.child_token();
        let mailbox = Arc::new(MailboxMonitor::new(ActorType::Connection, &connection_id));

        let handle = ConnectionHandle {
            connection_id: connection_id.clone(),
            sender,
            cancel_token: cancel_token.clone(),
            mailbox: Arc::clone(&mailbox),
        };
        let outbox = ConnectionOutbox {
            connection_id: connection_id.clone(),
            receiver,
            cancel_token,
            mailbox,
        };

        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection_id.clone(), handle.clone());
        self.metrics.connection_created();

        debug!(target: "coord.connections", connection_id = %connection_id, "Connection registered");
        (handle, outbox)
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn unregister(&self, connection_id: &str) -> bool {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id);

        match removed {
            Some(handle) => {
                handle.close();
                self.metrics.connection_closed();
                debug!(target: "coord.connections", connection_id = %connection_id, "Connection unregistered");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, connection_id: &str) -> Option<ConnectionHandle> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connection_id)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(connection_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send one event to one connection.
    pub fn send(&self, connection_id: &str, event: &ServerEvent) -> bool {
        match encode(event) {
            Some(frame) => self.deliver_frame(&[connection_id], &frame) == 1,
            None => false,
        }
    }

    /// Deliver a notification to each of its recipients.
    ///
    /// Serializes once. Returns how many recipients accepted the frame;
    /// unknown recipients are skipped.
    pub fn deliver(&self, notification: &Notification) -> usize {
        if notification.recipients.is_empty() {
            return 0;
        }
        match encode(&notification.event) {
            Some(frame) => {
                let recipients: Vec<&str> =
                    notification.recipients.iter().map(String::as_str).collect();
                self.deliver_frame(&recipients, &frame)
            }
            None => 0,
        }
    }

    /// Force-close a connection. Returns false if it is not registered.
    pub fn close(&self, connection_id: &str) -> bool {
        match self.get(connection_id) {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    fn deliver_frame(&self, recipients: &[&str], frame: &OutboundFrame) -> usize {
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        recipients
            .iter()
            .filter_map(|id| connections.get(*id))
            .filter(|handle| handle.try_deliver(Arc::clone(frame)))
            .count()
    }
}

fn encode(event: &ServerEvent) -> Option<OutboundFrame> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            error!(target: "coord.connections", event = event.name(), error = %e, "Failed to serialize event");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn registry(buffer: usize) -> ConnectionRegistry {
        ConnectionRegistry::new(buffer, CancellationToken::new(), ActorMetrics::new())
    }

    fn parse(frame: &OutboundFrame) -> ServerEvent {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn test_register_and_send() {
        let registry = registry(8);
        let (handle, mut outbox) = registry.register();
        assert_eq!(handle.connection_id(), outbox.connection_id());
        assert!(registry.contains(handle.connection_id()));

        assert!(registry.send(handle.connection_id(), &ServerEvent::MeetingEnded));
        let frame = outbox.recv().await.unwrap();
        assert_eq!(parse(&frame), ServerEvent::MeetingEnded);
    }

    #[tokio::test]
    async fn test_deliver_to_many_skips_unknown() {
        let registry = registry(8);
        let (a, mut a_out) = registry.register();
        let (b, mut b_out) = registry.register();

        let delivered = registry.deliver(&Notification::to_many(
            vec![
                a.connection_id().to_string(),
                "gone".to_string(),
                b.connection_id().to_string(),
            ],
            ServerEvent::KickedFromMeeting,
        ));
        assert_eq!(delivered, 2);
        assert_eq!(parse(&a_out.recv().await.unwrap()), ServerEvent::KickedFromMeeting);
        assert_eq!(parse(&b_out.recv().await.unwrap()), ServerEvent::KickedFromMeeting);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let registry = registry(1);
        let (handle, mut outbox) = registry.register();
        let id = handle.connection_id().to_string();

        assert!(registry.send(&id, &ServerEvent::MadeCohost));
        assert!(!registry.send(&id, &ServerEvent::RemovedCohost));
        assert!(outbox.try_recv().is_some());
        assert!(outbox.try_recv().is_none());
    }

    #[test]
    fn test_unregister_is_idempotent_and_closes() {
        let metrics = ActorMetrics::new();
        let registry = ConnectionRegistry::new(4, CancellationToken::new(), Arc::clone(&metrics));
        let (handle, outbox) = registry.register();
        assert_eq!(metrics.connection_count(), 1);

        assert!(registry.unregister(handle.connection_id()));
        assert!(!registry.unregister(handle.connection_id()));
        assert!(outbox.cancel_token().is_cancelled());
        assert!(!registry.send(handle.connection_id(), &ServerEvent::MeetingEnded));
        assert_eq!(metrics.connection_count(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_close_cancels_connection_token() {
        let registry = registry(4);
        let (handle, outbox) = registry.register();
        assert!(registry.close(handle.connection_id()));
        assert!(handle.is_closed());
        assert!(outbox.cancel_token().is_cancelled());
        assert!(!registry.close("unknown"));
    }

    #[test]
    fn test_parent_cancel_reaches_connections() {
        let root = CancellationToken::new();
        let registry = ConnectionRegistry::new(4, root.clone(), ActorMetrics::new());
        let (handle, _outbox) = registry.register();
        root.cancel();
        assert!(handle.is_closed());
    }
}
