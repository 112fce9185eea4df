/**
 * Snippet REST Handlers
 *
 * The durable write path consumed by the client reconciler, plus the small
 * amount of space administration the system needs to be usable: space
 * creation and collaborator management. Every mutating handler re-runs the
 * authorization gate; nothing here trusts the session that joined earlier.
 *
 * # Routes
 *
 * - `POST   /api/spaces` - Create a space (caller becomes owner)
 * - `PUT    /api/spaces/{space_id}/collaborators/{user_id}` - Set role (ADMIN)
 * - `DELETE /api/spaces/{space_id}/collaborators/{user_id}` - Revoke role (ADMIN)
 * - `GET    /api/spaces/{space_id}/snippets` - Full snapshot (VIEWER)
 * - `POST   /api/spaces/{space_id}/snippets` - Create snippet (EDITOR)
 * - `PATCH  /api/snippets/{id}` - Partial update (EDITOR)
 * - `PUT    /api/snippets/{id}/position` - Move (EDITOR)
 * - `DELETE /api/snippets/{id}` - Delete (EDITOR)
 */

use crate::backend::authz::check_access;
use crate::backend::directory::SpaceRecord;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::backend::snippets::store::SnippetStore;
use crate::shared::{PositionUpdate, SpaceRole, SpaceSnapshot, Snippet, SnippetPatch};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for space creation
#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    pub title: String,
    #[serde(default)]
    pub public: bool,
}

/// Response body for space creation
#[derive(Debug, Serialize)]
pub struct SpaceResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub public: bool,
}

/// Request body for collaborator role assignment
#[derive(Debug, Deserialize)]
pub struct SetCollaboratorRequest {
    pub role: SpaceRole,
}

/// Create a space owned by the caller (POST /api/spaces)
pub async fn create_space(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateSpaceRequest>,
) -> Result<Json<SpaceResponse>, BackendError> {
    if request.title.trim().is_empty() {
        return Err(BackendError::handler(
            StatusCode::BAD_REQUEST,
            "space title cannot be empty",
        ));
    }

    let space = SpaceRecord {
        id: Uuid::new_v4(),
        owner_id: user.user_id,
        title: request.title,
        public: request.public,
    };
    state.directory.insert_space(space.clone()).await;
    tracing::info!("[Snippets] Space {} created by {}", space.id, user.user_id);

    Ok(Json(SpaceResponse {
        id: space.id,
        owner_id: space.owner_id,
        title: space.title,
        public: space.public,
    }))
}

/// Grant or change a collaborator role
/// (PUT /api/spaces/{space_id}/collaborators/{user_id})
///
/// Space-level settings require ADMIN.
pub async fn set_collaborator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((space_id, collaborator_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SetCollaboratorRequest>,
) -> Result<StatusCode, BackendError> {
    require_role(&state, space_id, user.user_id, SpaceRole::Admin).await?;

    state
        .directory
        .set_collaborator(space_id, collaborator_id, request.role)
        .await;
    tracing::info!(
        "[Snippets] {} set {} to {} in space {}",
        user.user_id,
        collaborator_id,
        request.role,
        space_id
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Revoke a collaborator's explicit role
/// (DELETE /api/spaces/{space_id}/collaborators/{user_id})
pub async fn remove_collaborator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((space_id, collaborator_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, BackendError> {
    require_role(&state, space_id, user.user_id, SpaceRole::Admin).await?;

    if state
        .directory
        .remove_collaborator(space_id, collaborator_id)
        .await
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(BackendError::not_found("no such collaborator"))
    }
}

/// Full snippet set and display order (GET /api/spaces/{space_id}/snippets)
pub async fn list_snippets(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(space_id): Path<Uuid>,
) -> Result<Json<SpaceSnapshot>, BackendError> {
    require_role(&state, space_id, user.user_id, SpaceRole::Viewer).await?;
    let snapshot = state.snippets.snapshot(space_id).await?;
    Ok(Json(snapshot))
}

/// Create a snippet (POST /api/spaces/{space_id}/snippets)
///
/// The id is client-generated (so the creator's optimistic card and the
/// broadcast agree); ownership and timestamps are stamped here and never
/// trusted from the body.
pub async fn create_snippet(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(space_id): Path<Uuid>,
    Json(mut snippet): Json<Snippet>,
) -> Result<Json<Snippet>, BackendError> {
    require_role(&state, space_id, user.user_id, SpaceRole::Editor).await?;

    let now = Utc::now();
    snippet.space_id = space_id;
    snippet.owner_id = user.user_id;
    snippet.created_at = now;
    snippet.updated_at = now;

    let persisted = state.snippets.insert(snippet).await?;
    tracing::debug!(
        "[Snippets] {} created snippet {} in space {}",
        user.user_id,
        persisted.id,
        space_id
    );
    Ok(Json(persisted))
}

/// Partial update (PATCH /api/snippets/{id})
pub async fn update_snippet(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<SnippetPatch>,
) -> Result<Json<Snippet>, BackendError> {
    let space_id = snippet_space(&state, id).await?;
    require_role(&state, space_id, user.user_id, SpaceRole::Editor).await?;

    match state.snippets.update(id, &patch).await? {
        Some(updated) => Ok(Json(updated)),
        None => Err(BackendError::not_found("no such snippet")),
    }
}

/// Move (PUT /api/snippets/{id}/position)
pub async fn move_snippet(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(position): Json<PositionUpdate>,
) -> Result<Json<Snippet>, BackendError> {
    let space_id = snippet_space(&state, id).await?;
    require_role(&state, space_id, user.user_id, SpaceRole::Editor).await?;

    match state
        .snippets
        .set_position(id, position.x, position.y)
        .await?
    {
        Some(moved) => Ok(Json(moved)),
        None => Err(BackendError::not_found("no such snippet")),
    }
}

/// Delete (DELETE /api/snippets/{id})
pub async fn delete_snippet(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, BackendError> {
    let space_id = snippet_space(&state, id).await?;
    require_role(&state, space_id, user.user_id, SpaceRole::Editor).await?;

    if state.snippets.delete(id).await? {
        tracing::debug!("[Snippets] {} deleted snippet {}", user.user_id, id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(BackendError::not_found("no such snippet"))
    }
}

/// Resolve the space a snippet belongs to, or 404.
async fn snippet_space(state: &AppState, id: Uuid) -> Result<Uuid, BackendError> {
    state
        .snippets
        .get(id)
        .await?
        .map(|s| s.space_id)
        .ok_or_else(|| BackendError::not_found("no such snippet"))
}

/// Gate one operation; forbidden unless the caller's effective role
/// satisfies the requirement.
async fn require_role(
    state: &AppState,
    space_id: Uuid,
    user_id: Uuid,
    required: SpaceRole,
) -> Result<(), BackendError> {
    check_access(&state.directory, space_id, user_id, required)
        .await?
        .map(|_| ())
        .ok_or_else(|| BackendError::forbidden(format!("{} role required", required)))
}
