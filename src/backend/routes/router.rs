/**
 * Router Configuration
 *
 * This module provides the main router creation function that combines
 * all route configurations into a single Axum router.
 *
 * # Route Order
 *
 * Routes are added in a specific order to ensure proper matching:
 * 1. WebSocket route (unauthenticated upgrade; credentials arrive in the
 *    `join` frame)
 * 2. REST API routes (Bearer-token middleware)
 * 3. Health check and fallback handler
 */

use crate::backend::middleware::auth::auth_middleware;
use crate::backend::realtime::session::handle_space_socket;
use crate::backend::server::state::AppState;
use crate::backend::snippets::handlers::{
    create_snippet, create_space, delete_snippet, list_snippets, move_snippet,
    remove_collaborator, set_collaborator, update_snippet,
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the Axum router with all routes configured
///
/// # Route Details
///
/// ## Real-time
///
/// - `GET /ws/space/{space_id}` - Space-scoped WebSocket session
///
/// ## REST API (Bearer JWT)
///
/// - `POST /api/spaces` - Create a space
/// - `PUT/DELETE /api/spaces/{space_id}/collaborators/{user_id}` - Roles
/// - `GET/POST /api/spaces/{space_id}/snippets` - Snapshot / create
/// - `PATCH/DELETE /api/snippets/{id}` - Update / delete
/// - `PUT /api/snippets/{id}/position` - Move
///
/// ## Misc
///
/// - `GET /health` - Liveness probe
/// - Fallback handler returns 404 for unknown routes
pub fn create_router(app_state: AppState) -> Router<()> {
    let api = Router::new()
        .route("/api/spaces", post(create_space))
        .route(
            "/api/spaces/{space_id}/collaborators/{user_id}",
            put(set_collaborator).delete(remove_collaborator),
        )
        .route(
            "/api/spaces/{space_id}/snippets",
            get(list_snippets).post(create_snippet),
        )
        .route(
            "/api/snippets/{id}",
            axum::routing::patch(update_snippet).delete(delete_snippet),
        )
        .route("/api/snippets/{id}/position", put(move_snippet))
        .route_layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/ws/space/{space_id}", get(handle_space_socket))
        .merge(api)
        .route("/health", get(|| async { "ok" }))
        .fallback(|| async { "404 Not Found" })
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
