/**
 * Space Directory
 *
 * The authorization gate's view of the persistence layer: spaces, their
 * collaborator records, and the global-admin flag. The query shapes behind
 * this boundary are not this core's concern; `InMemoryDirectory` is the
 * concrete implementation the server runs with.
 */

use crate::backend::error::BackendError;
use crate::shared::SpaceRole;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A space as the gate needs to see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    /// Public spaces grant VIEWER to anyone authenticated.
    pub public: bool,
}

/// One collaborator's explicit role in a space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollaboratorRecord {
    pub user_id: Uuid,
    pub role: SpaceRole,
}

/// Read interface the authorization gate depends on.
///
/// Implementations may be backed by anything; the gate only needs these
/// three lookups, and runs the space and collaborator fetches concurrently.
#[allow(async_fn_in_trait)]
pub trait SpaceDirectory: Send + Sync {
    /// Fetch a space by id, or `None` if it does not exist.
    async fn space(&self, space_id: Uuid) -> Result<Option<SpaceRecord>, BackendError>;

    /// Fetch a caller's explicit collaborator record for a space, if any.
    async fn collaborator(
        &self,
        space_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CollaboratorRecord>, BackendError>;

    /// Whether the user holds the global ADMIN flag.
    async fn is_global_admin(&self, user_id: Uuid) -> Result<bool, BackendError>;
}

#[derive(Debug, Default)]
struct DirectoryInner {
    spaces: HashMap<Uuid, SpaceRecord>,
    collaborators: HashMap<(Uuid, Uuid), SpaceRole>,
    global_admins: HashSet<Uuid>,
}

/// In-memory directory implementation
///
/// Thread-safe via `Arc<RwLock<>>`; clones share the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    inner: Arc<RwLock<DirectoryInner>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a space.
    pub async fn insert_space(&self, space: SpaceRecord) {
        let mut inner = self.inner.write().await;
        inner.spaces.insert(space.id, space);
    }

    /// Remove a space and its collaborator records.
    pub async fn remove_space(&self, space_id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        inner.collaborators.retain(|(sid, _), _| *sid != space_id);
        inner.spaces.remove(&space_id).is_some()
    }

    /// Grant or change a collaborator's role in a space.
    pub async fn set_collaborator(&self, space_id: Uuid, user_id: Uuid, role: SpaceRole) {
        let mut inner = self.inner.write().await;
        inner.collaborators.insert((space_id, user_id), role);
    }

    /// Revoke a collaborator's explicit record.
    pub async fn remove_collaborator(&self, space_id: Uuid, user_id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        inner.collaborators.remove(&(space_id, user_id)).is_some()
    }

    /// Grant the global ADMIN flag.
    pub async fn grant_global_admin(&self, user_id: Uuid) {
        let mut inner = self.inner.write().await;
        inner.global_admins.insert(user_id);
    }
}

impl SpaceDirectory for InMemoryDirectory {
    async fn space(&self, space_id: Uuid) -> Result<Option<SpaceRecord>, BackendError> {
        let inner = self.inner.read().await;
        Ok(inner.spaces.get(&space_id).cloned())
    }

    async fn collaborator(
        &self,
        space_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CollaboratorRecord>, BackendError> {
        let inner = self.inner.read().await;
        Ok(inner
            .collaborators
            .get(&(space_id, user_id))
            .map(|role| CollaboratorRecord {
                user_id,
                role: *role,
            }))
    }

    async fn is_global_admin(&self, user_id: Uuid) -> Result<bool, BackendError> {
        let inner = self.inner.read().await;
        Ok(inner.global_admins.contains(&user_id))
    }
}
