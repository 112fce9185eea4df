/**
 * Membership Registry & Mutation Broadcaster
 *
 * Tracks which authenticated connections currently belong to which space
 * and fans accepted mutation events out to every other member of the same
 * space.
 *
 * # Broadcasting
 *
 * Each space gets its own `tokio::sync::broadcast` channel so spaces never
 * cross-talk and operations on different spaces proceed independently.
 * Events carry their origin connection id; each member's session loop
 * filters out its own events, so a sender never sees an echo.
 *
 * # Membership
 *
 * A connection appears here only after its join passed the authorization
 * gate. Disconnects of any kind remove it again; no leave broadcast is
 * sent. When the last member of a space leaves, the space's channel is
 * dropped with it.
 */

use crate::shared::{SpaceRole, WireMessage};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Broadcast channel capacity per space. Slow receivers lag and skip
/// rather than blocking the sender.
const SPACE_CHANNEL_CAPACITY: usize = 100;

/// One authorized membership of one user in one space over one physical
/// connection.
#[derive(Debug, Clone)]
pub struct MemberSession {
    /// Server-assigned, fresh per physical connection.
    pub connection_id: Uuid,
    /// The stable identity across reconnects.
    pub user_id: Uuid,
    /// Effective role granted at join time. Mutations re-derive their own;
    /// this one is for observability only.
    pub role: SpaceRole,
    pub joined_at: DateTime<Utc>,
}

/// An event on a space's broadcast channel, tagged with the connection
/// that caused it.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub origin: Uuid,
    pub frame: WireMessage,
}

impl Outbound {
    /// Whether this event originated from the given connection and must
    /// not be delivered back to it.
    pub fn is_echo(&self, connection_id: Uuid) -> bool {
        self.origin == connection_id
    }
}

#[derive(Debug)]
struct SpaceEntry {
    channel: broadcast::Sender<Outbound>,
    members: HashMap<Uuid, MemberSession>,
}

/// Registry of live space memberships
///
/// Thread-safe via `Arc<RwLock<>>`; clones share the same underlying data.
/// The lock serializes join/leave/broadcast per registry, which keeps any
/// one space's member set consistent.
#[derive(Debug, Clone, Default)]
pub struct MembershipRegistry {
    spaces: Arc<RwLock<HashMap<Uuid, SpaceEntry>>>,
}

impl MembershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authorized connection and subscribe it to its space's
    /// event channel.
    pub async fn join(&self, space_id: Uuid, session: MemberSession) -> broadcast::Receiver<Outbound> {
        let mut spaces = self.spaces.write().await;
        let entry = spaces.entry(space_id).or_insert_with(|| SpaceEntry {
            channel: broadcast::channel(SPACE_CHANNEL_CAPACITY).0,
            members: HashMap::new(),
        });
        let receiver = entry.channel.subscribe();
        tracing::info!(
            "[Registry] Connection {} (user {}) joined space {} as {}",
            session.connection_id,
            session.user_id,
            space_id,
            session.role
        );
        entry.members.insert(session.connection_id, session);
        receiver
    }

    /// Remove a connection from its space, dropping the space entry when
    /// it empties.
    pub async fn leave(&self, space_id: Uuid, connection_id: Uuid) {
        let mut spaces = self.spaces.write().await;
        if let Some(entry) = spaces.get_mut(&space_id) {
            if entry.members.remove(&connection_id).is_some() {
                tracing::info!(
                    "[Registry] Connection {} left space {} ({} members remain)",
                    connection_id,
                    space_id,
                    entry.members.len()
                );
            }
            if entry.members.is_empty() {
                spaces.remove(&space_id);
                tracing::debug!("[Registry] Space {} has no members, channel dropped", space_id);
            }
        }
    }

    /// Look up a registered member.
    pub async fn member(&self, space_id: Uuid, connection_id: Uuid) -> Option<MemberSession> {
        let spaces = self.spaces.read().await;
        spaces
            .get(&space_id)
            .and_then(|entry| entry.members.get(&connection_id))
            .cloned()
    }

    /// Number of registered members of a space.
    pub async fn member_count(&self, space_id: Uuid) -> usize {
        let spaces = self.spaces.read().await;
        spaces.get(&space_id).map_or(0, |entry| entry.members.len())
    }

    /// Fan an event out to the space's members. Receivers drop their own
    /// echoes; the return value is the number of subscribed receivers the
    /// event reached (0 if the space has no channel).
    pub async fn broadcast(&self, space_id: Uuid, origin: Uuid, frame: WireMessage) -> usize {
        let spaces = self.spaces.read().await;
        let Some(entry) = spaces.get(&space_id) else {
            tracing::debug!("[Registry] Broadcast to unknown space {}", space_id);
            return 0;
        };
        match entry.channel.send(Outbound { origin, frame }) {
            Ok(receiver_count) => {
                tracing::debug!(
                    "[Registry] Event broadcast to {} receivers in space {}",
                    receiver_count,
                    space_id
                );
                receiver_count
            }
            Err(e) => {
                // No live receivers, that's okay
                tracing::debug!("[Registry] No receivers for event in space {}: {:?}", space_id, e);
                0
            }
        }
    }
}
