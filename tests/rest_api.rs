//! REST write-path tests: the durable API the reconciler writes through,
//! the authorization gate behind every mutating route, and optimistic
//! rollback against a real server.

mod common;

use common::{draft_snippet, token_for, TestServer};
use pretty_assertions::assert_eq;
use snipspace::client::{ClientError, DurableWrites, RestClient, SpaceReconciler};
use snipspace::shared::{SnippetPatch, SpaceRole};
use uuid::Uuid;

#[tokio::test]
async fn test_snippet_crud_round_trip() {
    let server = TestServer::spawn().await;
    let owner = Uuid::new_v4();
    let space = server.seed_space(owner, false).await;
    let api = RestClient::new(server.config(), token_for(owner));

    let draft = draft_snippet(space, owner, "first card");
    let created = api.create_snippet(&draft).await.unwrap();
    assert_eq!(created.id, draft.id);
    assert_eq!(created.owner_id, owner);

    let moved = api.move_snippet(draft.id, 40, 60).await.unwrap();
    assert_eq!((moved.x, moved.y), (40, 60));

    let patch = SnippetPatch {
        title: Some("renamed".to_string()),
        ..Default::default()
    };
    let updated = api.update_snippet(draft.id, &patch).await.unwrap();
    assert_eq!(updated.title, "renamed");
    assert_eq!((updated.x, updated.y), (40, 60));

    let snapshot = api.fetch_space(space).await.unwrap();
    assert_eq!(snapshot.snippets.len(), 1);
    assert_eq!(snapshot.order, vec![draft.id]);

    api.delete_snippet(draft.id).await.unwrap();
    let snapshot = api.fetch_space(space).await.unwrap();
    assert!(snapshot.snippets.is_empty());
}

#[tokio::test]
async fn test_viewer_writes_are_forbidden() {
    let server = TestServer::spawn().await;
    let owner = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let space = server.seed_space(owner, false).await;
    server.grant(space, viewer, SpaceRole::Viewer).await;
    let snippet = server.seed_snippet(space, owner).await;

    let api = RestClient::new(server.config(), token_for(viewer));

    // Reads pass at VIEWER.
    assert_eq!(api.fetch_space(space).await.unwrap().snippets.len(), 1);

    // Writes require EDITOR.
    let result = api.move_snippet(snippet.id, 1, 2).await;
    assert!(matches!(result, Err(ClientError::Denied(_))));
    let result = api.create_snippet(&draft_snippet(space, viewer, "nope")).await;
    assert!(matches!(result, Err(ClientError::Denied(_))));
    let result = api.delete_snippet(snippet.id).await;
    assert!(matches!(result, Err(ClientError::Denied(_))));
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let server = TestServer::spawn().await;
    let owner = Uuid::new_v4();
    let space = server.seed_space(owner, false).await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/spaces/{}/snippets", server.base_url, space))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_space_and_collaborator_administration() {
    let server = TestServer::spawn().await;
    let owner = Uuid::new_v4();
    let editor = Uuid::new_v4();
    let client = reqwest::Client::new();

    // Create a space through the API; the caller becomes owner.
    let response = client
        .post(format!("{}/api/spaces", server.base_url))
        .header("Authorization", format!("Bearer {}", token_for(owner)))
        .json(&serde_json::json!({ "title": "api canvas", "public": false }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let space: serde_json::Value = response.json().await.unwrap();
    assert_eq!(space["owner_id"], owner.to_string());
    let space_id: Uuid = space["id"].as_str().unwrap().parse().unwrap();

    // Owner grants EDITOR (space-level settings require ADMIN; owner passes).
    let response = client
        .put(format!(
            "{}/api/spaces/{}/collaborators/{}",
            server.base_url, space_id, editor
        ))
        .header("Authorization", format!("Bearer {}", token_for(owner)))
        .json(&serde_json::json!({ "role": "editor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    // The grant is effective: the editor can now write.
    let api = RestClient::new(server.config(), token_for(editor));
    api.create_snippet(&draft_snippet(space_id, editor, "by editor"))
        .await
        .unwrap();

    // An editor is below ADMIN and cannot manage collaborators.
    let response = client
        .put(format!(
            "{}/api/spaces/{}/collaborators/{}",
            server.base_url, space_id, Uuid::new_v4()
        ))
        .header("Authorization", format!("Bearer {}", token_for(editor)))
        .json(&serde_json::json!({ "role": "viewer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_global_admin_passes_on_any_space() {
    let server = TestServer::spawn().await;
    let owner = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let space = server.seed_space(owner, false).await;
    server.state.directory.grant_global_admin(admin).await;

    let api = RestClient::new(server.config(), token_for(admin));
    api.create_snippet(&draft_snippet(space, admin, "admin card"))
        .await
        .unwrap();

    // A nonexistent space still denies, even for a global admin.
    let result = api.fetch_space(Uuid::new_v4()).await;
    assert!(matches!(result, Err(ClientError::Denied(_))));
}

#[tokio::test]
async fn test_denied_write_rolls_back_against_real_server() {
    let server = TestServer::spawn().await;
    let owner = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let space = server.seed_space(owner, false).await;
    server.grant(space, viewer, SpaceRole::Viewer).await;
    let snippet = server.seed_snippet(space, owner).await;

    let mut view = SpaceReconciler::new(
        RestClient::new(server.config(), token_for(viewer)),
        space,
        viewer,
    );
    view.refetch().await.unwrap();
    let before = view.view().get(snippet.id).unwrap().clone();

    let result = view
        .update_snippet(
            snippet.id,
            SnippetPatch {
                title: Some("hijacked".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(ClientError::Denied(_))));

    // The optimistic change was rolled back to the pre-edit values.
    assert_eq!(view.view().get(snippet.id).unwrap().title, before.title);
}
