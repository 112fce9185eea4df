/**
 * Server Initialization
 *
 * This module handles the initialization and setup of the Axum HTTP
 * server: state creation, environment-driven settings, and route
 * configuration.
 *
 * # Initialization Process
 *
 * 1. Load settings from the environment
 * 2. Create the shared application state (registry, directory, store)
 * 3. Create and configure the router
 */

use crate::backend::routes::router::create_router;
use crate::backend::server::config::ServerSettings;
use crate::backend::server::state::AppState;
use axum::Router;

/// Create and configure the Axum application
///
/// # Returns
///
/// Configured Axum Router ready to serve requests
pub async fn create_app() -> Router<()> {
    tracing::info!("Initializing snipspace backend server");

    let settings = ServerSettings::from_env();
    let app_state = AppState::with_settings(settings);

    tracing::info!("Membership registry and stores initialized");

    create_router(app_state)
}

/// Create the application around existing state.
///
/// Integration tests use this to seed spaces, collaborators, and snippets
/// before (and while) the server runs.
pub fn create_app_with_state(app_state: AppState) -> Router<()> {
    create_router(app_state)
}
