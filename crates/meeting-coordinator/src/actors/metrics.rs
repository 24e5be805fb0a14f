//! Queue pressure tracking and process-wide counters.
//!
//! Two kinds of queue are watched:
//!
//! | Queue | Elevated above | Critical above |
//! |-------|----------------|----------------|
//! | Meeting mailbox | 100 | 500 |
//! | Connection outbound | 32 | 48 |
//!
//! Outbound limits sit below the default outbound buffer (64) so a slow
//! client shows up in logs before its queue starts dropping. Pressure
//! changes are logged once per transition, not once per message.

use crate::observability::metrics as prom;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which kind of task owns a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `MeetingActor` mailbox (one per meeting).
    Meeting,
    /// Outbound queue of one signaling connection.
    Connection,
}

impl ActorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Meeting => "meeting",
            ActorType::Connection => "connection",
        }
    }

    /// Depth limits used to classify pressure.
    #[must_use]
    pub const fn limits(&self) -> PressureLimits {
        match self {
            ActorType::Meeting => PressureLimits {
                elevated: 100,
                critical: 500,
            },
            ActorType::Connection => PressureLimits {
                elevated: 32,
                critical: 48,
            },
        }
    }
}

/// Depth above which a queue counts as elevated or critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressureLimits {
    pub elevated: usize,
    pub critical: usize,
}

impl PressureLimits {
    #[must_use]
    pub const fn classify(&self, depth: usize) -> Pressure {
        if depth > self.critical {
            Pressure::Critical
        } else if depth > self.elevated {
            Pressure::Elevated
        } else {
            Pressure::Normal
        }
    }
}

/// Queue pressure level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Pressure {
    Normal = 0,
    Elevated = 1,
    Critical = 2,
}

impl Pressure {
    const fn from_u8(value: u8) -> Self {
        match value {
            2 => Pressure::Critical,
            1 => Pressure::Elevated,
            _ => Pressure::Normal,
        }
    }
}

/// Depth and drop accounting for one queue.
///
/// Shared by senders (enqueue, drop) and the consumer (dequeue).
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// Meeting id or connection id.
    owner_id: String,
    depth: AtomicUsize,
    high_water: AtomicUsize,
    pressure: AtomicU8,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, owner_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            owner_id: owner_id.into(),
            depth: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            pressure: AtomicU8::new(Pressure::Normal as u8),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn record_enqueue(&self) {
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.high_water.fetch_max(depth, Ordering::Relaxed);
        self.observe(depth);
    }

    pub fn record_dequeue(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            })
            .unwrap_or_else(|d| d);
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.observe(previous.saturating_sub(1));
    }

    /// Count a message lost to a full or closed queue.
    pub fn record_drop(&self) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        prom::record_message_dropped(self.actor_type.as_str());
        warn!(
            target: "coord.actor.mailbox",
            actor_type = self.actor_type.as_str(),
            owner_id = %self.owner_id,
            dropped,
            "Message dropped due to backpressure"
        );
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn pressure(&self) -> Pressure {
        Pressure::from_u8(self.pressure.load(Ordering::Relaxed))
    }

    /// Log when the queue moves between pressure levels.
    fn observe(&self, depth: usize) {
        let now = self.actor_type.limits().classify(depth);
        let before = Pressure::from_u8(self.pressure.swap(now as u8, Ordering::Relaxed));
        if now == before {
            return;
        }

        match now {
            Pressure::Critical => warn!(
                target: "coord.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                owner_id = %self.owner_id,
                depth,
                "Mailbox depth critical"
            ),
            Pressure::Elevated if before == Pressure::Normal => debug!(
                target: "coord.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                owner_id = %self.owner_id,
                depth,
                "Mailbox depth elevated"
            ),
            Pressure::Normal if before == Pressure::Critical => info!(
                target: "coord.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                owner_id = %self.owner_id,
                high_water = self.high_water(),
                "Mailbox drained"
            ),
            _ => {}
        }
    }
}

/// Process-wide counters for the coordinator.
///
/// Every change is mirrored to the Prometheus gauges so `/metrics` and
/// `/ready` agree.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    meetings: AtomicUsize,
    connections: AtomicUsize,
    participants: AtomicUsize,
    panics: AtomicU64,
}

/// Point-in-time copy of [`ActorMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorMetricsSnapshot {
    pub meetings: usize,
    pub connections: usize,
    pub participants: usize,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn meeting_created(&self) {
        prom::set_meetings_active(adjust(&self.meetings, Delta::Up(1)));
    }

    pub fn meeting_removed(&self) {
        prom::set_meetings_active(adjust(&self.meetings, Delta::Down(1)));
    }

    pub fn connection_created(&self) {
        prom::set_connections_active(adjust(&self.connections, Delta::Up(1)));
    }

    pub fn connection_closed(&self) {
        prom::set_connections_active(adjust(&self.connections, Delta::Down(1)));
    }

    pub fn participants_joined(&self, n: usize) {
        prom::set_participants_active(adjust(&self.participants, Delta::Up(n)));
    }

    pub fn participants_left(&self, n: usize) {
        prom::set_participants_active(adjust(&self.participants, Delta::Down(n)));
    }

    /// Record a meeting or connection task that panicked.
    pub fn record_panic(&self, actor_type: ActorType) {
        let total = self.panics.fetch_add(1, Ordering::Relaxed) + 1;
        prom::record_actor_panic(actor_type.as_str());
        tracing::error!(
            target: "coord.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = total,
            "Actor panic detected - indicates bug, investigation required"
        );
    }

    #[must_use]
    pub fn meeting_count(&self) -> usize {
        self.meetings.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> ActorMetricsSnapshot {
        ActorMetricsSnapshot {
            meetings: self.meeting_count(),
            connections: self.connection_count(),
            participants: self.participant_count(),
        }
    }
}

#[derive(Clone, Copy)]
enum Delta {
    Up(usize),
    Down(usize),
}

/// Apply `delta` without wrapping and return the new value for the gauge.
fn adjust(counter: &AtomicUsize, delta: Delta) -> u64 {
    let apply = |v: usize| match delta {
        Delta::Up(n) => v.saturating_add(n),
        Delta::Down(n) => v.saturating_sub(n),
    };
    let previous = counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(apply(v)))
        .unwrap_or_else(|v| v);
    apply(previous) as u64
}
