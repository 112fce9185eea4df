/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct serves as the central state container for the
 * application, holding:
 * - The membership registry (live space memberships and broadcast fan-out)
 * - The space directory (authorization gate's read boundary)
 * - The snippet store (durable write path)
 * - Server settings (keepalive interval)
 *
 * # Thread Safety
 *
 * Every field is clone-shared: the registry, directory, and store all keep
 * their data behind `Arc<RwLock<>>`, so handlers may clone `AppState`
 * freely and still observe one shared world.
 */

use crate::backend::directory::InMemoryDirectory;
use crate::backend::realtime::registry::MembershipRegistry;
use crate::backend::server::config::ServerSettings;
use crate::backend::snippets::store::InMemorySnippetStore;
use axum::extract::FromRef;

/// Application state shared by the WebSocket sessions and REST handlers
#[derive(Clone)]
pub struct AppState {
    /// Live space memberships and per-space broadcast channels
    pub registry: MembershipRegistry,

    /// Spaces, collaborators, and the global-admin flag
    pub directory: InMemoryDirectory,

    /// Snippet persistence behind the durable-write boundary
    pub snippets: InMemorySnippetStore,

    /// Keepalive and other server tunables
    pub settings: ServerSettings,
}

impl AppState {
    /// Fresh state with empty stores and default settings.
    pub fn new() -> Self {
        Self {
            registry: MembershipRegistry::new(),
            directory: InMemoryDirectory::new(),
            snippets: InMemorySnippetStore::new(),
            settings: ServerSettings::default(),
        }
    }

    /// Fresh state with explicit settings.
    pub fn with_settings(settings: ServerSettings) -> Self {
        Self {
            settings,
            ..Self::new()
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Implement FromRef for MembershipRegistry
///
/// This allows Axum handlers to extract the registry directly from
/// `AppState` without taking the whole state.
impl FromRef<AppState> for MembershipRegistry {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.registry.clone()
    }
}

/// Implement FromRef for InMemoryDirectory
impl FromRef<AppState> for InMemoryDirectory {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.directory.clone()
    }
}

/// Implement FromRef for InMemorySnippetStore
impl FromRef<AppState> for InMemorySnippetStore {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.snippets.clone()
    }
}
