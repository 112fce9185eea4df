/**
 * Routes Module
 *
 * Router configuration for the backend server.
 */

pub mod router;

pub use router::create_router;
