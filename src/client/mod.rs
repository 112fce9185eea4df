//! Client Module
//!
//! The client half of the synchronization core: one owned session object
//! per active space subscription, a pure backoff scheduler driving its
//! reconnects, the REST durable-write path, and the reconciler that merges
//! optimistic local edits with broadcast events from other members.
//!
//! # Typical wiring
//!
//! ```rust,no_run
//! use snipspace::client::{RestClient, SpaceConnection, SpaceReconciler};
//! use snipspace::shared::SyncConfig;
//! use uuid::Uuid;
//!
//! # async fn example(token: String) {
//! let config = SyncConfig::builder()
//!     .server_url("http://127.0.0.1:3000")
//!     .build()
//!     .unwrap();
//! let (space_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());
//!
//! let (connection, mut events) = SpaceConnection::spawn(config.clone(), space_id, user_id);
//! connection.join_space(token.clone());
//! connection.connect();
//!
//! let api = RestClient::new(config, token);
//! let mut reconciler =
//!     SpaceReconciler::new(api, space_id, user_id).with_connection(connection.handle());
//! reconciler.refetch().await.unwrap();
//! # }
//! ```

/// Reconnect backoff scheduling
pub mod backoff;

/// Connection lifecycle state machine
pub mod connection;

/// Client-side error types
pub mod error;

/// Client reconciler and view-state
pub mod reconciler;

/// REST durable-write path
pub mod rest;

/// Session socket over one WebSocket connection
pub mod socket;

/// Re-export commonly used types for convenience
pub use backoff::ReconnectBackoff;
pub use connection::{ConnectionHandle, ConnectionState, SessionErrorKind, SessionEvent, SpaceConnection};
pub use error::ClientError;
pub use reconciler::{SpaceReconciler, SpaceViewState};
pub use rest::{DurableWrites, RestClient};
pub use socket::{SessionSocket, SocketEvent};
