//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! the client and the server. These types are used for serialization and
//! communication over the space-scoped WebSocket protocol and the REST API.
//!
//! # Overview
//!
//! The shared module provides platform-agnostic types that can be used
//! in both server and client code. All types are designed for serialization
//! and transmission as JSON.

/// Snippet card model and patch types
pub mod snippet;

/// Wire protocol frames and mutation events
pub mod protocol;

/// Effective role hierarchy
pub mod role;

/// Shared error types
pub mod error;

/// Session configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use error::SharedError;
pub use protocol::{Mutation, MutationEvent, WireMessage};
pub use role::SpaceRole;
pub use snippet::{PositionUpdate, SpaceSnapshot, Snippet, SnippetPatch};
