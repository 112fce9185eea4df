//! # Client Reconciler
//!
//! Maintains the locally-rendered set of snippets for the open space,
//! keeping it consistent with both local user intent and remote broadcasts.
//!
//! ## Local mutations
//!
//! Every mutating user action follows the same protocol:
//!
//! 1. Apply the change to view-state immediately (optimistic)
//! 2. Issue the durable REST write; on failure roll back to the pre-change
//!    snapshot, or refetch the whole space when no snapshot exists
//! 3. On write success, emit the mutation over the joined session so other
//!    live viewers update without waiting for their next refetch
//!
//! ## Remote events
//!
//! Broadcast events stamped with the local user's own id are discarded
//! (echo suppression); everything else is merged last-write-wins per field.
//! Duplicate delivery of `create` and `delete` is idempotent.

use crate::client::connection::ConnectionHandle;
use crate::client::error::ClientError;
use crate::client::rest::DurableWrites;
use crate::shared::protocol::{
    CreatePayload, DeletePayload, MovePayload, Mutation, MutationEvent, UpdatePayload,
};
use crate::shared::{SpaceSnapshot, Snippet, SnippetPatch};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

/// The client-held mirror of a space's snippet set, with an explicit
/// ordering list. Never authoritative; the REST response or a full refetch
/// wins on conflict.
#[derive(Debug, Default, Clone)]
pub struct SpaceViewState {
    snippets: HashMap<Uuid, Snippet>,
    order: Vec<Uuid>,
}

impl SpaceViewState {
    pub fn get(&self, id: Uuid) -> Option<&Snippet> {
        self.snippets.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.snippets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Snippets in display order.
    pub fn ordered(&self) -> Vec<&Snippet> {
        self.order.iter().filter_map(|id| self.snippets.get(id)).collect()
    }

    pub fn order(&self) -> &[Uuid] {
        &self.order
    }

    /// Insert or replace; appends to the order list only when new.
    pub fn upsert(&mut self, snippet: Snippet) {
        if !self.snippets.contains_key(&snippet.id) {
            self.order.push(snippet.id);
        }
        self.snippets.insert(snippet.id, snippet);
    }

    /// Remove by id, also dropping it from the ordering list. Returns the
    /// removed snippet and its former position, for rollback.
    pub fn remove(&mut self, id: Uuid) -> Option<(Snippet, usize)> {
        let snippet = self.snippets.remove(&id)?;
        let index = self.order.iter().position(|x| *x == id).unwrap_or(0);
        self.order.retain(|x| *x != id);
        Some((snippet, index))
    }

    /// Reinsert a previously removed snippet at its old position.
    fn restore(&mut self, snippet: Snippet, index: usize) {
        let index = index.min(self.order.len());
        self.order.insert(index, snippet.id);
        self.snippets.insert(snippet.id, snippet);
    }

    /// Replace the whole view from an authoritative snapshot.
    pub fn load(&mut self, snapshot: SpaceSnapshot) {
        self.snippets = snapshot.snippets.into_iter().map(|s| (s.id, s)).collect();
        // Only keep order entries that actually resolve.
        self.order = snapshot
            .order
            .into_iter()
            .filter(|id| self.snippets.contains_key(id))
            .collect();
        for id in self.snippets.keys() {
            if !self.order.contains(id) {
                self.order.push(*id);
            }
        }
    }

    /// Merge one stamped remote event. Returns whether anything changed.
    pub fn apply_event(&mut self, event: &MutationEvent) -> bool {
        match event {
            MutationEvent::Moved(stamped) => {
                match self.snippets.get_mut(&stamped.body.snippet_id) {
                    Some(snippet) => {
                        snippet.set_position(stamped.body.x, stamped.body.y, stamped.timestamp);
                        true
                    }
                    None => {
                        tracing::debug!(
                            "[Reconcile] Move for unknown snippet {}",
                            stamped.body.snippet_id
                        );
                        false
                    }
                }
            }
            MutationEvent::Created(stamped) => {
                // Idempotent against duplicate delivery.
                if self.contains(stamped.body.snippet.id) {
                    return false;
                }
                self.upsert(stamped.body.snippet.clone());
                true
            }
            MutationEvent::Updated(stamped) => {
                match self.snippets.get_mut(&stamped.body.snippet_id) {
                    Some(snippet) => {
                        stamped.body.patch.apply_to(snippet, stamped.timestamp);
                        true
                    }
                    None => false,
                }
            }
            MutationEvent::Deleted(stamped) => self.remove(stamped.body.snippet_id).is_some(),
        }
    }
}

/// Top-level consumer of the sync core on the client side.
pub struct SpaceReconciler<D: DurableWrites> {
    view: SpaceViewState,
    api: D,
    space_id: Uuid,
    local_user: Uuid,
    connection: Option<ConnectionHandle>,
}

impl<D: DurableWrites> SpaceReconciler<D> {
    pub fn new(api: D, space_id: Uuid, local_user: Uuid) -> Self {
        Self {
            view: SpaceViewState::default(),
            api,
            space_id,
            local_user,
            connection: None,
        }
    }

    /// Attach the live session used to emit accepted mutations.
    pub fn with_connection(mut self, connection: ConnectionHandle) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn view(&self) -> &SpaceViewState {
        &self.view
    }

    pub fn local_user(&self) -> Uuid {
        self.local_user
    }

    /// Replace view-state from the space-fetch API (reconciliation
    /// fallback and initial load).
    pub async fn refetch(&mut self) -> Result<(), ClientError> {
        let snapshot = self.api.fetch_space(self.space_id).await?;
        tracing::debug!(
            "[Reconcile] Refetched space {} ({} snippets)",
            self.space_id,
            snapshot.snippets.len()
        );
        self.view.load(snapshot);
        Ok(())
    }

    /// Create a snippet: optimistic insert, durable write, then broadcast.
    pub async fn create_snippet(&mut self, snippet: Snippet) -> Result<(), ClientError> {
        let id = snippet.id;
        self.view.upsert(snippet.clone());

        match self.api.create_snippet(&snippet).await {
            Ok(persisted) => {
                self.view.upsert(persisted.clone());
                self.emit(Mutation::Create(CreatePayload { snippet: persisted }));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[Reconcile] Create write failed, rolling back: {}", e);
                self.view.remove(id);
                Err(e)
            }
        }
    }

    /// Update a snippet: optimistic shallow merge, durable write, broadcast.
    pub async fn update_snippet(&mut self, id: Uuid, patch: SnippetPatch) -> Result<(), ClientError> {
        let snapshot = self.view.get(id).cloned();
        if let Some(snippet) = self.view.snippets.get_mut(&id) {
            patch.apply_to(snippet, Utc::now());
        }

        match self.api.update_snippet(id, &patch).await {
            Ok(persisted) => {
                self.view.upsert(persisted);
                self.emit(Mutation::Update(UpdatePayload {
                    snippet_id: id,
                    patch,
                }));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[Reconcile] Update write failed, rolling back: {}", e);
                self.rollback(snapshot).await;
                Err(e)
            }
        }
    }

    /// Move a snippet. Coordinates are rounded to integer canvas units
    /// before anything is stored or transmitted.
    pub async fn move_snippet(&mut self, id: Uuid, x: f64, y: f64) -> Result<(), ClientError> {
        let (x, y) = (x.round() as i32, y.round() as i32);
        let snapshot = self.view.get(id).cloned();
        if let Some(snippet) = self.view.snippets.get_mut(&id) {
            snippet.set_position(x, y, Utc::now());
        }

        match self.api.move_snippet(id, x, y).await {
            Ok(persisted) => {
                self.view.upsert(persisted);
                self.emit(Mutation::Move(MovePayload {
                    snippet_id: id,
                    x,
                    y,
                }));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[Reconcile] Move write failed, rolling back: {}", e);
                self.rollback(snapshot).await;
                Err(e)
            }
        }
    }

    /// Delete a snippet: optimistic removal, durable write, broadcast.
    pub async fn delete_snippet(&mut self, id: Uuid) -> Result<(), ClientError> {
        let removed = self.view.remove(id);

        match self.api.delete_snippet(id).await {
            Ok(()) => {
                self.emit(Mutation::Delete(DeletePayload { snippet_id: id }));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[Reconcile] Delete write failed, rolling back: {}", e);
                match removed {
                    Some((snippet, index)) => self.view.restore(snippet, index),
                    None => self.resync().await,
                }
                Err(e)
            }
        }
    }

    /// Merge one inbound broadcast. Events stamped with the local user's
    /// own id are echoes of an already-applied optimistic change and are
    /// discarded. Returns whether view-state changed.
    pub fn apply_remote(&mut self, event: &MutationEvent) -> bool {
        if event.user_id() == self.local_user {
            tracing::debug!("[Reconcile] Suppressing echo of our own mutation");
            return false;
        }
        self.view.apply_event(event)
    }

    /// Restore a snapshot after a failed write, or resync from the server
    /// when there is nothing to restore.
    async fn rollback(&mut self, snapshot: Option<Snippet>) {
        match snapshot {
            Some(previous) => self.view.upsert(previous),
            // Entity was unknown before the write; the only safe recovery
            // is an authoritative refetch.
            None => self.resync().await,
        }
    }

    async fn resync(&mut self) {
        if let Err(e) = self.refetch().await {
            tracing::error!("[Reconcile] Fallback refetch failed: {}", e);
        }
    }

    /// Emit an accepted mutation over the session, if one is joined. The
    /// broadcast is fire-and-forget; a missed emit only delays peers until
    /// their next refetch.
    fn emit(&self, mutation: Mutation) {
        if let Some(connection) = &self.connection {
            if connection.is_joined() {
                connection.send_mutation(mutation);
            } else {
                tracing::debug!("[Reconcile] Session not joined, skipping broadcast");
            }
        }
    }
}
