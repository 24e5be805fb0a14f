//! Actor model implementation for the Meeting Coordinator.
//!
//! ```text
//! MeetingDirectory (one per process)
//! ├── meeting id -> MeetingActor (one task per live meeting, owns its state)
//! └── connection id -> Membership
//!
//! ConnectionRegistry (one per process)
//! └── connection id -> bounded outbound queue + cancellation token
//! ```
//!
//! # Key Design Decisions
//!
//! - **One meeting per connection**: a connection hosts or joins at most one meeting
//! - **Serialized meetings**: every action for a meeting is a message to its actor
//! - **Best-effort delivery**: notifications use `try_send`, so a slow client
//!   never stalls its meeting
//! - **CancellationToken propagation**: actors and connections hold child
//!   tokens of the process root token
//!
//! # Modules
//!
//! - [`directory`] - `MeetingDirectory`, create/join/leave/kick and actor supervision
//! - [`meeting`] - `MeetingActor` per live meeting
//! - [`membership`] - connection to meeting map shared by directory and actors
//! - [`connection`] - `ConnectionRegistry` and per-connection outbound queues
//! - [`messages`] - message types for actor communication
//! - [`metrics`] - mailbox monitoring and actor metrics

pub mod connection;
pub mod directory;
pub mod meeting;
pub mod membership;
pub mod messages;
pub mod metrics;

// Re-export primary types
pub use connection::{ConnectionHandle, ConnectionOutbox, ConnectionRegistry, OutboundFrame};
pub use directory::MeetingDirectory;
pub use meeting::{MeetingActor, MeetingActorHandle};
pub use membership::{Membership, MembershipTable};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorMetricsSnapshot, ActorType, MailboxMonitor, Pressure};
