/**
 * Authorization Gate
 *
 * Decides whether a user may act on a space at a required role. This check
 * is re-run for every mutating operation and never cached across
 * operations: collaborator roles can change between a session's join and a
 * later mutation attempt, and the gate must observe that.
 *
 * # Algorithm
 *
 * 1. Global admins pass for any *existing* space regardless of the
 *    required role (a deleted or unknown space still yields a denial)
 * 2. The space and the caller's collaborator record are fetched
 *    concurrently
 * 3. Owner -> OWNER; explicit collaborator -> that record's role; public
 *    space with VIEWER required and no record -> VIEWER; otherwise deny
 * 4. Grant iff the derived role satisfies the requirement (owner and
 *    global admin satisfy anything)
 */

use crate::backend::directory::{SpaceDirectory, SpaceRecord};
use crate::backend::error::BackendError;
use crate::shared::SpaceRole;
use uuid::Uuid;

/// A successful access decision: the effective role and the space it was
/// derived against. Valid for one operation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub role: SpaceRole,
    pub space: SpaceRecord,
}

/// Run the access check for one operation.
///
/// Returns `Ok(None)` for every denial: unknown space, no relation to the
/// space, or a role below the requirement.
pub async fn check_access<D: SpaceDirectory>(
    directory: &D,
    space_id: Uuid,
    user_id: Uuid,
    required: SpaceRole,
) -> Result<Option<AccessGrant>, BackendError> {
    // Global admin bypasses visibility and ownership, but not existence.
    if directory.is_global_admin(user_id).await? {
        return Ok(directory.space(space_id).await?.map(|space| {
            tracing::debug!("[Gate] {} granted global_admin on {}", user_id, space_id);
            AccessGrant {
                role: SpaceRole::GlobalAdmin,
                space,
            }
        }));
    }

    let (space, collaborator) = tokio::join!(
        directory.space(space_id),
        directory.collaborator(space_id, user_id)
    );
    let Some(space) = space? else {
        return Ok(None);
    };
    let collaborator = collaborator?;

    let role = if space.owner_id == user_id {
        SpaceRole::Owner
    } else if let Some(record) = collaborator {
        record.role
    } else if space.public && required == SpaceRole::Viewer {
        // Public visibility grants read access only.
        SpaceRole::Viewer
    } else {
        tracing::debug!("[Gate] {} has no relation to space {}", user_id, space_id);
        return Ok(None);
    };

    if role.satisfies(required) {
        Ok(Some(AccessGrant { role, space }))
    } else {
        tracing::debug!(
            "[Gate] {} holds {} on {} but {} is required",
            user_id,
            role,
            space_id,
            required
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::directory::InMemoryDirectory;

    struct Fixture {
        directory: InMemoryDirectory,
        space: SpaceRecord,
        owner: Uuid,
    }

    async fn fixture(public: bool) -> Fixture {
        let directory = InMemoryDirectory::new();
        let owner = Uuid::new_v4();
        let space = SpaceRecord {
            id: Uuid::new_v4(),
            owner_id: owner,
            title: "canvas".to_string(),
            public,
        };
        directory.insert_space(space.clone()).await;
        Fixture {
            directory,
            space,
            owner,
        }
    }

    #[tokio::test]
    async fn test_owner_satisfies_any_requirement() {
        let f = fixture(false).await;
        for required in [SpaceRole::Viewer, SpaceRole::Editor, SpaceRole::Admin, SpaceRole::Owner] {
            let grant = check_access(&f.directory, f.space.id, f.owner, required)
                .await
                .unwrap()
                .expect("owner must pass");
            assert_eq!(grant.role, SpaceRole::Owner);
        }
    }

    #[tokio::test]
    async fn test_public_space_grants_viewer_only() {
        let f = fixture(true).await;
        let stranger = Uuid::new_v4();

        let grant = check_access(&f.directory, f.space.id, stranger, SpaceRole::Viewer)
            .await
            .unwrap()
            .expect("public space grants viewer");
        assert_eq!(grant.role, SpaceRole::Viewer);

        // Public visibility never reaches EDITOR.
        let denied = check_access(&f.directory, f.space.id, stranger, SpaceRole::Editor)
            .await
            .unwrap();
        assert!(denied.is_none());
    }

    #[tokio::test]
    async fn test_private_space_denies_strangers() {
        let f = fixture(false).await;
        let stranger = Uuid::new_v4();
        let denied = check_access(&f.directory, f.space.id, stranger, SpaceRole::Viewer)
            .await
            .unwrap();
        assert!(denied.is_none());
    }

    #[tokio::test]
    async fn test_collaborator_role_is_used() {
        let f = fixture(false).await;
        let editor = Uuid::new_v4();
        f.directory
            .set_collaborator(f.space.id, editor, SpaceRole::Editor)
            .await;

        let grant = check_access(&f.directory, f.space.id, editor, SpaceRole::Editor)
            .await
            .unwrap()
            .expect("editor passes editor requirement");
        assert_eq!(grant.role, SpaceRole::Editor);

        let denied = check_access(&f.directory, f.space.id, editor, SpaceRole::Admin)
            .await
            .unwrap();
        assert!(denied.is_none());
    }

    #[tokio::test]
    async fn test_viewer_collaborator_cannot_mutate() {
        let f = fixture(true).await;
        let viewer = Uuid::new_v4();
        f.directory
            .set_collaborator(f.space.id, viewer, SpaceRole::Viewer)
            .await;

        let denied = check_access(&f.directory, f.space.id, viewer, SpaceRole::Editor)
            .await
            .unwrap();
        assert!(denied.is_none());
    }

    #[tokio::test]
    async fn test_global_admin_passes_everything_existing() {
        let f = fixture(false).await;
        let admin = Uuid::new_v4();
        f.directory.grant_global_admin(admin).await;

        for required in [SpaceRole::Viewer, SpaceRole::Editor, SpaceRole::Admin, SpaceRole::Owner] {
            let grant = check_access(&f.directory, f.space.id, admin, required)
                .await
                .unwrap()
                .expect("global admin must pass");
            assert_eq!(grant.role, SpaceRole::GlobalAdmin);
        }
    }

    #[tokio::test]
    async fn test_global_admin_denied_for_missing_space() {
        let f = fixture(false).await;
        let admin = Uuid::new_v4();
        f.directory.grant_global_admin(admin).await;

        let denied = check_access(&f.directory, Uuid::new_v4(), admin, SpaceRole::Viewer)
            .await
            .unwrap();
        assert!(denied.is_none());
    }

    #[tokio::test]
    async fn test_revoked_role_is_observed_on_next_check() {
        let f = fixture(false).await;
        let editor = Uuid::new_v4();
        f.directory
            .set_collaborator(f.space.id, editor, SpaceRole::Editor)
            .await;

        assert!(check_access(&f.directory, f.space.id, editor, SpaceRole::Editor)
            .await
            .unwrap()
            .is_some());

        // The gate is never cached: a concurrent revocation must show up
        // on the very next mutation attempt.
        f.directory.remove_collaborator(f.space.id, editor).await;
        assert!(check_access(&f.directory, f.space.id, editor, SpaceRole::Editor)
            .await
            .unwrap()
            .is_none());
    }
}
