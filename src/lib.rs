//! Snipspace - Main Library
//!
//! Snipspace is a collaborative "snippet space": a canvas of positioned,
//! taggable code-snippet cards that several authenticated users can view
//! and edit concurrently, with in-progress changes propagated live to
//! every other connected viewer of the same space.
//!
//! # Overview
//!
//! This library provides the real-time synchronization core:
//! - The per-space WebSocket session protocol and its JSON frame vocabulary
//! - The client connection-lifecycle state machine with exponential
//!   reconnect backoff
//! - The server-side authorization gate, membership registry, and mutation
//!   broadcaster
//! - The client reconciler that merges optimistic local edits with
//!   broadcast events from other members
//!
//! # Module Structure
//!
//! The library is organized into three main modules:
//!
//! - **`shared`** - Types shared between client and server
//!   - Wire protocol frames and mutation events
//!   - Snippet model, role hierarchy, configuration
//!   - Error types
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum server with the space-scoped WebSocket endpoint
//!   - Membership registry and per-space broadcast fan-out
//!   - Authorization gate over the space directory boundary
//!   - Snippet REST write path and JWT verification
//!
//! - **`client`** - Client-side session and reconciliation
//!   - One owned session object per active space subscription
//!   - Pure backoff scheduler driving reconnects
//!   - REST durable-write path and the view-state reconciler
//!
//! # Feature Flags
//!
//! - **`ssr`** - Enables the backend modules and the server binary.
//!   On by default; disable it for client-only builds.
//!
//! # Control Flow
//!
//! A user action flows: optimistic view-state mutation -> durable REST
//! write -> (on success) mutation frame over the joined session -> server
//! re-authorizes, stamps, and fans out -> each peer's reconciler merges
//! the event unless it originated from that peer itself.
//!
//! # Thread Safety
//!
//! - **Server**: registry, directory, and store are `Arc<RwLock<>>`-shared;
//!   per-space broadcast channels fan events out without cross-talk
//! - **Client**: each session runs its transitions on a single driver
//!   task, so a reconnect can never race a manual disconnect

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;

/// Client session and reconciliation
pub mod client;
