/**
 * Snippet Store
 *
 * The durable write path's storage boundary. Query shapes behind this
 * trait are not this core's concern; the in-memory implementation is what
 * the server runs with, and what the integration tests seed.
 */

use crate::backend::error::BackendError;
use crate::shared::{SpaceSnapshot, Snippet, SnippetPatch};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence interface for snippets.
#[allow(async_fn_in_trait)]
pub trait SnippetStore: Send + Sync {
    /// All snippets of a space plus the explicit display order.
    async fn snapshot(&self, space_id: Uuid) -> Result<SpaceSnapshot, BackendError>;

    /// Fetch one snippet.
    async fn get(&self, id: Uuid) -> Result<Option<Snippet>, BackendError>;

    /// Persist a new snippet. Idempotent on id: re-inserting an existing
    /// id returns the stored entity unchanged.
    async fn insert(&self, snippet: Snippet) -> Result<Snippet, BackendError>;

    /// Apply a partial update; `None` when the snippet does not exist.
    async fn update(&self, id: Uuid, patch: &SnippetPatch) -> Result<Option<Snippet>, BackendError>;

    /// Persist a position change; `None` when the snippet does not exist.
    async fn set_position(&self, id: Uuid, x: i32, y: i32) -> Result<Option<Snippet>, BackendError>;

    /// Delete by id; `false` when nothing was there.
    async fn delete(&self, id: Uuid) -> Result<bool, BackendError>;
}

/// In-memory snippet store
///
/// Thread-safe via `Arc<RwLock<>>`; clones share the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnippetStore {
    snippets: Arc<RwLock<HashMap<Uuid, Snippet>>>,
}

impl InMemorySnippetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnippetStore for InMemorySnippetStore {
    async fn snapshot(&self, space_id: Uuid) -> Result<SpaceSnapshot, BackendError> {
        let snippets = self.snippets.read().await;
        let mut items: Vec<Snippet> = snippets
            .values()
            .filter(|s| s.space_id == space_id)
            .cloned()
            .collect();
        // Display order is creation order; ids break ties so the order is
        // stable across fetches.
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let order = items.iter().map(|s| s.id).collect();
        Ok(SpaceSnapshot {
            snippets: items,
            order,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Snippet>, BackendError> {
        let snippets = self.snippets.read().await;
        Ok(snippets.get(&id).cloned())
    }

    async fn insert(&self, snippet: Snippet) -> Result<Snippet, BackendError> {
        let mut snippets = self.snippets.write().await;
        if let Some(existing) = snippets.get(&snippet.id) {
            return Ok(existing.clone());
        }
        snippets.insert(snippet.id, snippet.clone());
        Ok(snippet)
    }

    async fn update(&self, id: Uuid, patch: &SnippetPatch) -> Result<Option<Snippet>, BackendError> {
        let mut snippets = self.snippets.write().await;
        Ok(snippets.get_mut(&id).map(|snippet| {
            patch.apply_to(snippet, Utc::now());
            snippet.clone()
        }))
    }

    async fn set_position(&self, id: Uuid, x: i32, y: i32) -> Result<Option<Snippet>, BackendError> {
        let mut snippets = self.snippets.write().await;
        Ok(snippets.get_mut(&id).map(|snippet| {
            snippet.set_position(x, y, Utc::now());
            snippet.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, BackendError> {
        let mut snippets = self.snippets.write().await;
        Ok(snippets.remove(&id).is_some())
    }
}
