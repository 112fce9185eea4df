//! Effective Roles
//!
//! A member's effective role in a space, as a single total-ordered enum.
//! All permission checks go through [`SpaceRole::satisfies`] so the
//! "owner and global admin always pass" rule lives in exactly one place.

use serde::{Deserialize, Serialize};

/// Effective role attached to a session after authorization.
///
/// The derived order is `Viewer < Editor < Admin < Owner < GlobalAdmin`.
/// Roles are derived fresh on every authorization decision and never cached
/// beyond one check, because a space's collaborator list can change
/// concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceRole {
    Viewer,
    Editor,
    Admin,
    Owner,
    GlobalAdmin,
}

impl SpaceRole {
    /// Whether this role meets a requirement.
    ///
    /// Owners and global admins satisfy any requirement, including ones
    /// nominally above them in the derived order.
    pub fn satisfies(self, required: SpaceRole) -> bool {
        matches!(self, SpaceRole::Owner | SpaceRole::GlobalAdmin) || self >= required
    }
}

impl std::fmt::Display for SpaceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SpaceRole::Viewer => "viewer",
            SpaceRole::Editor => "editor",
            SpaceRole::Admin => "admin",
            SpaceRole::Owner => "owner",
            SpaceRole::GlobalAdmin => "global_admin",
        };
        write!(f, "{}", name)
    }
}
