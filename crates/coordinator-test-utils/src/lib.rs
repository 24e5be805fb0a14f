//! # Coordinator Test Utilities
//!
//! Shared test utilities for the Meeting Coordinator.
//!
//! This crate provides:
//! - Server test harness (`TestCoordinatorServer` for E2E tests)
//! - WebSocket signaling client (`SignalingClient`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coordinator_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestCoordinatorServer::spawn().await?;
//!     let mut host = SignalingClient::connect(&server).await?;
//!
//!     host.send("join-as-host", serde_json::json!({ "hostName": "Alice" })).await?;
//!     let joined = host.expect_event("joined-meeting").await;
//!     assert_eq!(joined["data"]["isHost"], true);
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod signaling_client;

// Re-export commonly used items
pub use server_harness::*;
pub use signaling_client::*;
