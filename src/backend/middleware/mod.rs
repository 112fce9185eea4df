/**
 * Middleware Module
 *
 * HTTP middleware for the backend server.
 */

pub mod auth;

pub use auth::{auth_middleware, AuthUser, AuthenticatedUser};
