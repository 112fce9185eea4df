//! Shared helpers for integration tests: a real server on an ephemeral
//! port, plus seeding shortcuts for spaces, collaborators, and snippets.

#![allow(dead_code)]

use snipspace::backend::auth::sessions::create_token;
use snipspace::backend::directory::SpaceRecord;
use snipspace::backend::server::init::create_app_with_state;
use snipspace::backend::server::state::AppState;
use snipspace::backend::snippets::store::SnippetStore;
use snipspace::shared::{SpaceRole, Snippet, SyncConfig};
use std::time::Duration;
use uuid::Uuid;

/// A running backend server bound to an ephemeral local port.
pub struct TestServer {
    pub state: AppState,
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with_state(AppState::new()).await
    }

    pub async fn spawn_with_state(state: AppState) -> Self {
        let app = create_app_with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        Self {
            state,
            base_url: format!("http://{}", addr),
            handle,
        }
    }

    /// Session config pointing at this server with defaults.
    pub fn config(&self) -> SyncConfig {
        SyncConfig::builder()
            .server_url(&self.base_url)
            .build()
            .expect("valid config")
    }

    /// Session config with short timers, for reconnect tests.
    pub fn fast_config(&self) -> SyncConfig {
        SyncConfig::builder()
            .server_url(&self.base_url)
            .base_delay(Duration::from_millis(50))
            .max_reconnect_attempts(3)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .expect("valid config")
    }

    /// Seed a space and return its id.
    pub async fn seed_space(&self, owner_id: Uuid, public: bool) -> Uuid {
        let space = SpaceRecord {
            id: Uuid::new_v4(),
            owner_id,
            title: "test canvas".to_string(),
            public,
        };
        self.state.directory.insert_space(space.clone()).await;
        space.id
    }

    /// Grant a collaborator role directly in the directory.
    pub async fn grant(&self, space_id: Uuid, user_id: Uuid, role: SpaceRole) {
        self.state
            .directory
            .set_collaborator(space_id, user_id, role)
            .await;
    }

    /// Seed a snippet straight into the store.
    pub async fn seed_snippet(&self, space_id: Uuid, owner_id: Uuid) -> Snippet {
        let snippet = Snippet::new(
            Uuid::new_v4(),
            space_id,
            owner_id,
            "seeded".to_string(),
            "fn seeded() {}".to_string(),
        );
        self.state
            .snippets
            .insert(snippet.clone())
            .await
            .expect("seed snippet")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Mint a JWT for a user against the development secret.
pub fn token_for(user_id: Uuid) -> String {
    create_token(user_id).expect("mint token")
}

/// A fresh snippet draft for client-side creation.
pub fn draft_snippet(space_id: Uuid, owner_id: Uuid, title: &str) -> Snippet {
    Snippet::new(
        Uuid::new_v4(),
        space_id,
        owner_id,
        title.to_string(),
        "fn demo() {}".to_string(),
    )
}
