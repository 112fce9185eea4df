//! Wire Protocol
//!
//! This module defines the message vocabulary exchanged over a space-scoped
//! WebSocket connection. Every frame is a JSON object of the shape
//! `{"type": "...", "payload": {...}}`; the same enum is used on both sides
//! of the connection so the client and the server can never disagree about
//! the encoding.
//!
//! # Message Directions
//!
//! - Client-originated: `join`, `snippet-move`, `snippet-create`,
//!   `snippet-update`, `snippet-delete`, `pong`
//! - Server-originated: `connection-established`, `space-joined`,
//!   `join-rejected`, `error`, `ping`, `snippet-moved`, `snippet-created`,
//!   `snippet-updated`, `snippet-deleted`
//!
//! Unknown or malformed inbound frames must never tear down a session:
//! decoding failures are surfaced as errors to the dispatch layer, which
//! logs and drops them.

use crate::shared::error::SharedError;
use crate::shared::role::SpaceRole;
use crate::shared::snippet::{Snippet, SnippetPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single frame on the wire.
///
/// Serialized adjacently tagged: the variant name (kebab-case) becomes the
/// `type` field and the variant contents become the `payload` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum WireMessage {
    /// Present credentials for a space after the transport is open.
    Join(JoinRequest),
    /// Client intent to move a snippet (coordinates already rounded).
    SnippetMove(MovePayload),
    /// Client intent to create a snippet.
    SnippetCreate(CreatePayload),
    /// Client intent to update a subset of a snippet's fields.
    SnippetUpdate(UpdatePayload),
    /// Client intent to delete a snippet.
    SnippetDelete(DeletePayload),
    /// Keepalive probe; carries a millisecond timestamp to echo.
    Ping(Heartbeat),
    /// Keepalive reply echoing the probe's timestamp.
    Pong(Heartbeat),
    /// First frame after the transport handshake; carries the
    /// server-assigned connection id.
    ConnectionEstablished(ConnectionInfo),
    /// Join accepted; the session is now an authorized member.
    SpaceJoined(JoinedInfo),
    /// Join denied; the session stays connected but unregistered.
    JoinRejected(Rejection),
    /// A rejected mutation or other server-side failure.
    Error(ErrorInfo),
    /// Broadcast: another member moved a snippet.
    SnippetMoved(Stamped<MovePayload>),
    /// Broadcast: another member created a snippet.
    SnippetCreated(Stamped<CreatePayload>),
    /// Broadcast: another member updated a snippet.
    SnippetUpdated(Stamped<UpdatePayload>),
    /// Broadcast: another member deleted a snippet.
    SnippetDeleted(Stamped<DeletePayload>),
}

impl WireMessage {
    /// Encode this frame to its JSON text representation.
    pub fn encode(&self) -> Result<String, SharedError> {
        serde_json::to_string(self).map_err(SharedError::from)
    }

    /// Decode a frame from JSON text.
    pub fn decode(text: &str) -> Result<Self, SharedError> {
        serde_json::from_str(text).map_err(SharedError::from)
    }

    /// The wire tag of this frame, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::SnippetMove(_) => "snippet-move",
            Self::SnippetCreate(_) => "snippet-create",
            Self::SnippetUpdate(_) => "snippet-update",
            Self::SnippetDelete(_) => "snippet-delete",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
            Self::ConnectionEstablished(_) => "connection-established",
            Self::SpaceJoined(_) => "space-joined",
            Self::JoinRejected(_) => "join-rejected",
            Self::Error(_) => "error",
            Self::SnippetMoved(_) => "snippet-moved",
            Self::SnippetCreated(_) => "snippet-created",
            Self::SnippetUpdated(_) => "snippet-updated",
            Self::SnippetDeleted(_) => "snippet-deleted",
        }
    }
}

/// `join` payload: credentials presented after the transport is open, so a
/// refreshed token never requires reconnecting the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinRequest {
    pub space_id: Uuid,
    pub user_id: Uuid,
    pub token: String,
}

/// Position payload; canvas units are always integers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovePayload {
    pub snippet_id: Uuid,
    pub x: i32,
    pub y: i32,
}

/// Creation payload carrying the full snippet the sender rendered
/// optimistically (ids are client-generated so peers stay idempotent).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatePayload {
    pub snippet: Snippet,
}

/// Update payload: only the fields present in the patch are touched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdatePayload {
    pub snippet_id: Uuid,
    #[serde(flatten)]
    pub patch: SnippetPatch,
}

/// Deletion payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletePayload {
    pub snippet_id: Uuid,
}

/// Keepalive payload; `timestamp` is milliseconds since the Unix epoch and
/// is echoed verbatim in the reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heartbeat {
    pub timestamp: i64,
}

/// `connection-established` payload. The connection id is unique per
/// physical connection and reassigned on every reconnect; `user_id` is the
/// stable identity, not this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connection_id: Uuid,
}

/// `space-joined` payload: the effective role granted at join time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinedInfo {
    pub space_id: Uuid,
    pub role: SpaceRole,
}

/// `join-rejected` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rejection {
    pub reason: String,
}

/// `error` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
}

/// A broadcast payload stamped by the server with the originating user and
/// the time the mutation was accepted. The stamp is authoritative; clients
/// never trust a peer-supplied origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stamped<T> {
    #[serde(flatten)]
    pub body: T,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// A mutation as sent by the local client, before the server stamps it.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Move(MovePayload),
    Create(CreatePayload),
    Update(UpdatePayload),
    Delete(DeletePayload),
}

impl Mutation {
    /// The outgoing frame for this mutation.
    pub fn into_wire(self) -> WireMessage {
        match self {
            Self::Move(p) => WireMessage::SnippetMove(p),
            Self::Create(p) => WireMessage::SnippetCreate(p),
            Self::Update(p) => WireMessage::SnippetUpdate(p),
            Self::Delete(p) => WireMessage::SnippetDelete(p),
        }
    }

    /// The role a member must hold for this mutation to be accepted.
    pub fn required_role(&self) -> SpaceRole {
        SpaceRole::Editor
    }

    /// Stamp this mutation with its accepted origin, producing the frame
    /// that is fanned out to the other members.
    pub fn stamp(self, user_id: Uuid, timestamp: DateTime<Utc>) -> WireMessage {
        match self {
            Self::Move(body) => WireMessage::SnippetMoved(Stamped { body, user_id, timestamp }),
            Self::Create(body) => WireMessage::SnippetCreated(Stamped { body, user_id, timestamp }),
            Self::Update(body) => WireMessage::SnippetUpdated(Stamped { body, user_id, timestamp }),
            Self::Delete(body) => WireMessage::SnippetDeleted(Stamped { body, user_id, timestamp }),
        }
    }

    /// Extract a mutation from a client-originated frame, if it is one.
    pub fn from_wire(frame: WireMessage) -> Option<Self> {
        match frame {
            WireMessage::SnippetMove(p) => Some(Self::Move(p)),
            WireMessage::SnippetCreate(p) => Some(Self::Create(p)),
            WireMessage::SnippetUpdate(p) => Some(Self::Update(p)),
            WireMessage::SnippetDelete(p) => Some(Self::Delete(p)),
            _ => None,
        }
    }
}

/// A stamped mutation received from the broadcast channel, ready for the
/// reconciler to merge into view-state.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationEvent {
    Moved(Stamped<MovePayload>),
    Created(Stamped<CreatePayload>),
    Updated(Stamped<UpdatePayload>),
    Deleted(Stamped<DeletePayload>),
}

impl MutationEvent {
    /// The user the server stamped as the mutation's origin.
    pub fn user_id(&self) -> Uuid {
        match self {
            Self::Moved(s) => s.user_id,
            Self::Created(s) => s.user_id,
            Self::Updated(s) => s.user_id,
            Self::Deleted(s) => s.user_id,
        }
    }

    /// Extract a mutation event from a server-originated frame, if it is one.
    pub fn from_wire(frame: WireMessage) -> Option<Self> {
        match frame {
            WireMessage::SnippetMoved(s) => Some(Self::Moved(s)),
            WireMessage::SnippetCreated(s) => Some(Self::Created(s)),
            WireMessage::SnippetUpdated(s) => Some(Self::Updated(s)),
            WireMessage::SnippetDeleted(s) => Some(Self::Deleted(s)),
            _ => None,
        }
    }
}
