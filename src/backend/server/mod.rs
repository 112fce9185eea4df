/**
 * Server Module
 *
 * Application state, configuration, and initialization for the Axum
 * server.
 */

pub mod config;
pub mod init;
pub mod state;

pub use config::ServerSettings;
pub use state::AppState;
