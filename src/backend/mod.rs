/**
 * Backend Module
 *
 * Server-side half of the synchronization core: the WebSocket session
 * endpoint and its membership registry, the authorization gate and its
 * directory boundary, the snippet durable-write path, and the Axum server
 * plumbing around them.
 */

/// JWT credential verification
pub mod auth;

/// Authorization gate
pub mod authz;

/// Space directory boundary
pub mod directory;

/// Backend error types
pub mod error;

/// HTTP middleware
pub mod middleware;

/// Membership registry and WebSocket sessions
pub mod realtime;

/// Router configuration
pub mod routes;

/// Server state, config, and initialization
pub mod server;

/// Snippet store and REST handlers
pub mod snippets;
