/**
 * WebSocket Session Endpoint
 *
 * This module implements the space-scoped WebSocket endpoint
 * (`GET /ws/space/{space_id}`) and the per-connection session loop:
 * handshake, join, authorized membership, and teardown.
 *
 * # Lifecycle
 *
 * 1. On upgrade the server assigns a fresh connection id and sends
 *    `connection-established` - the readiness signal clients wait for
 *    before transmitting `join`
 * 2. The session is *pending* until a `join` passes token verification and
 *    the authorization gate at VIEWER; only then is the connection
 *    registered for broadcast fan-out and answered with `space-joined`
 * 3. A rejected join answers `join-rejected` and leaves the session
 *    pending; the client may present a fresh credential on the same
 *    transport
 * 4. Mutations from a joined connection re-run the gate at the mutation's
 *    required role on every attempt; denials answer `error` and are not
 *    broadcast
 * 5. Any close deregisters the connection; no leave broadcast is sent
 *
 * # Keepalive
 *
 * The server pings on an interval with a millisecond timestamp; clients
 * echo it back in `pong`. A silent peer is not treated as dead here -
 * transport close is the sole disconnect signal.
 */

use crate::backend::authz::{check_access, AccessGrant};
use crate::backend::auth::sessions::verify_token;
use crate::backend::realtime::registry::{MemberSession, Outbound};
use crate::backend::server::state::AppState;
use crate::shared::protocol::{
    ConnectionInfo, ErrorInfo, Heartbeat, JoinRequest, JoinedInfo, Rejection,
};
use crate::shared::{Mutation, SpaceRole, WireMessage};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Handle the space-scoped WebSocket upgrade (GET /ws/space/{space_id})
///
/// Credentials are presented post-connect via the `join` message, so the
/// upgrade itself is unauthenticated.
pub async fn handle_space_socket(
    State(state): State<AppState>,
    Path(space_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_session(state, space_id, socket))
}

/// Drive one connection from handshake to teardown.
async fn run_session(state: AppState, space_id: Uuid, socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    tracing::info!(
        "[Session] Connection {} opened for space {}",
        connection_id,
        space_id
    );

    let (mut sink, mut stream) = socket.split();

    // Signal readiness; clients must not send `join` before this arrives.
    let hello = WireMessage::ConnectionEstablished(ConnectionInfo { connection_id });
    if send_frame(&mut sink, &hello).await.is_err() {
        return;
    }

    let mut ping = tokio::time::interval(state.settings.ping_interval);
    // The first tick completes immediately; skip it so pings are periodic.
    ping.tick().await;

    // Pending phase: connected, not yet a member.
    let Some((member, mut space_rx)) =
        pending_phase(&state, space_id, connection_id, &mut sink, &mut stream, &mut ping).await
    else {
        tracing::info!("[Session] Connection {} closed before joining", connection_id);
        return;
    };

    // Joined phase: relay mutations and fan-out until the transport ends.
    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                None => break,
                Some(Err(e)) => {
                    tracing::debug!("[Session] Transport error on {}: {}", connection_id, e);
                    break;
                }
                Some(Ok(Message::Close(_))) => break,
                Some(Ok(Message::Text(text))) => {
                    match WireMessage::decode(text.as_str()) {
                        Ok(frame) => {
                            if handle_member_frame(&state, &member, space_id, &mut sink, frame)
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => {
                            // Malformed frames are dropped, never fatal.
                            tracing::warn!("[Session] Dropping malformed frame: {}", e);
                        }
                    }
                }
                Some(Ok(_)) => {}
            },
            event = space_rx.recv() => match event {
                Ok(outbound) => {
                    // Broadcast, not echo: the sender never sees its own event.
                    if !outbound.is_echo(connection_id)
                        && send_frame(&mut sink, &outbound.frame).await.is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "[Session] Connection {} lagged, skipped {} events",
                        connection_id,
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ping.tick() => {
                let probe = WireMessage::Ping(Heartbeat {
                    timestamp: Utc::now().timestamp_millis(),
                });
                if send_frame(&mut sink, &probe).await.is_err() {
                    break;
                }
            }
        }
    }

    state.registry.leave(space_id, connection_id).await;
    tracing::info!("[Session] Connection {} closed", connection_id);
}

/// Wait for a valid join, answering rejections without tearing down the
/// transport. Returns `None` when the connection ends first.
async fn pending_phase(
    state: &AppState,
    space_id: Uuid,
    connection_id: Uuid,
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
    ping: &mut tokio::time::Interval,
) -> Option<(MemberSession, broadcast::Receiver<Outbound>)> {
    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                None => return None,
                Some(Err(e)) => {
                    tracing::debug!("[Session] Transport error on {}: {}", connection_id, e);
                    return None;
                }
                Some(Ok(Message::Close(_))) => return None,
                Some(Ok(Message::Text(text))) => match WireMessage::decode(text.as_str()) {
                    Ok(WireMessage::Join(join)) => {
                        match authorize_join(state, space_id, &join).await {
                            Ok(grant) => {
                                let member = MemberSession {
                                    connection_id,
                                    user_id: join.user_id,
                                    role: grant.role,
                                    joined_at: Utc::now(),
                                };
                                let receiver =
                                    state.registry.join(space_id, member.clone()).await;
                                let reply = WireMessage::SpaceJoined(JoinedInfo {
                                    space_id,
                                    role: grant.role,
                                });
                                if send_frame(sink, &reply).await.is_err() {
                                    state.registry.leave(space_id, connection_id).await;
                                    return None;
                                }
                                return Some((member, receiver));
                            }
                            Err(reason) => {
                                tracing::warn!(
                                    "[Session] Join rejected for {} on {}: {}",
                                    join.user_id,
                                    space_id,
                                    reason
                                );
                                let reply = WireMessage::JoinRejected(Rejection { reason });
                                if send_frame(sink, &reply).await.is_err() {
                                    return None;
                                }
                            }
                        }
                    }
                    Ok(WireMessage::Pong(heartbeat)) => log_pong(connection_id, heartbeat),
                    Ok(WireMessage::Ping(heartbeat)) => {
                        if send_frame(sink, &WireMessage::Pong(heartbeat)).await.is_err() {
                            return None;
                        }
                    }
                    Ok(other) => {
                        tracing::warn!(
                            "[Session] {} frame from pending connection {}",
                            other.tag(),
                            connection_id
                        );
                        let reply = WireMessage::Error(ErrorInfo {
                            message: "join required".to_string(),
                        });
                        if send_frame(sink, &reply).await.is_err() {
                            return None;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("[Session] Dropping malformed frame: {}", e);
                    }
                },
                Some(Ok(_)) => {}
            },
            _ = ping.tick() => {
                let probe = WireMessage::Ping(Heartbeat {
                    timestamp: Utc::now().timestamp_millis(),
                });
                if send_frame(sink, &probe).await.is_err() {
                    return None;
                }
            }
        }
    }
}

/// Handle one decoded frame from a joined member.
async fn handle_member_frame(
    state: &AppState,
    member: &MemberSession,
    space_id: Uuid,
    sink: &mut SplitSink<WebSocket, Message>,
    frame: WireMessage,
) -> Result<(), ()> {
    match frame {
        WireMessage::Pong(heartbeat) => {
            log_pong(member.connection_id, heartbeat);
            Ok(())
        }
        // Keepalive is bidirectional; echo a client probe's timestamp back.
        WireMessage::Ping(heartbeat) => send_frame(sink, &WireMessage::Pong(heartbeat)).await,
        WireMessage::Join(_) => {
            let reply = WireMessage::Error(ErrorInfo {
                message: "already joined".to_string(),
            });
            send_frame(sink, &reply).await
        }
        other => {
            let tag = other.tag();
            match Mutation::from_wire(other) {
                Some(mutation) => relay_mutation(state, member, space_id, sink, mutation).await,
                None => {
                    tracing::warn!(
                        "[Session] Dropping unexpected {} frame from {}",
                        tag,
                        member.connection_id
                    );
                    Ok(())
                }
            }
        }
    }
}

/// Re-check access for one mutation, stamp it, and fan it out. The check
/// runs on every attempt; a role revoked after join is observed here.
async fn relay_mutation(
    state: &AppState,
    member: &MemberSession,
    space_id: Uuid,
    sink: &mut SplitSink<WebSocket, Message>,
    mutation: Mutation,
) -> Result<(), ()> {
    let required = mutation.required_role();
    match check_access(&state.directory, space_id, member.user_id, required).await {
        Ok(Some(_grant)) => {
            let stamped = mutation.stamp(member.user_id, Utc::now());
            state
                .registry
                .broadcast(space_id, member.connection_id, stamped)
                .await;
            Ok(())
        }
        Ok(None) => {
            tracing::warn!(
                "[Session] Mutation from {} denied ({} required)",
                member.user_id,
                required
            );
            let reply = WireMessage::Error(ErrorInfo {
                message: format!("{} role required", required),
            });
            send_frame(sink, &reply).await
        }
        Err(e) => {
            tracing::error!("[Session] Access check failed: {}", e);
            let reply = WireMessage::Error(ErrorInfo {
                message: "authorization check failed".to_string(),
            });
            send_frame(sink, &reply).await
        }
    }
}

/// Validate a join request: the token must verify, its subject must match
/// the claimed user, and the gate must grant at least VIEWER.
async fn authorize_join(
    state: &AppState,
    space_id: Uuid,
    join: &JoinRequest,
) -> Result<AccessGrant, String> {
    let claims = verify_token(&join.token).map_err(|e| format!("invalid token: {}", e))?;
    if claims.sub != join.user_id.to_string() {
        return Err("token does not match user".to_string());
    }
    if join.space_id != space_id {
        return Err("join is for a different space".to_string());
    }

    match check_access(&state.directory, space_id, join.user_id, SpaceRole::Viewer).await {
        Ok(Some(grant)) => Ok(grant),
        Ok(None) => Err("not authorized for this space".to_string()),
        Err(e) => {
            tracing::error!("[Session] Access check failed during join: {}", e);
            Err("authorization check failed".to_string())
        }
    }
}

fn log_pong(connection_id: Uuid, heartbeat: Heartbeat) {
    let latency = Utc::now().timestamp_millis() - heartbeat.timestamp;
    tracing::debug!(
        "[Session] Pong from {} (round trip {}ms)",
        connection_id,
        latency
    );
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &WireMessage,
) -> Result<(), ()> {
    let text = match frame.encode() {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("[Session] Failed to encode {} frame: {}", frame.tag(), e);
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await.map_err(|e| {
        tracing::debug!("[Session] Send failed: {}", e);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::auth::sessions::create_token;
    use crate::backend::directory::SpaceRecord;

    async fn state_with_space(public: bool) -> (AppState, SpaceRecord) {
        let state = AppState::new();
        let space = SpaceRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "canvas".to_string(),
            public,
        };
        state.directory.insert_space(space.clone()).await;
        (state, space)
    }

    fn join_request(space_id: Uuid, user_id: Uuid) -> JoinRequest {
        JoinRequest {
            space_id,
            user_id,
            token: create_token(user_id).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_authorize_join_owner() {
        let (state, space) = state_with_space(false).await;
        let join = join_request(space.id, space.owner_id);
        let grant = authorize_join(&state, space.id, &join).await.unwrap();
        assert_eq!(grant.role, SpaceRole::Owner);
    }

    #[tokio::test]
    async fn test_authorize_join_public_viewer() {
        let (state, space) = state_with_space(true).await;
        let stranger = Uuid::new_v4();
        let join = join_request(space.id, stranger);
        let grant = authorize_join(&state, space.id, &join).await.unwrap();
        assert_eq!(grant.role, SpaceRole::Viewer);
    }

    #[tokio::test]
    async fn test_authorize_join_private_stranger_denied() {
        let (state, space) = state_with_space(false).await;
        let join = join_request(space.id, Uuid::new_v4());
        let err = authorize_join(&state, space.id, &join).await.unwrap_err();
        assert!(err.contains("not authorized"));
    }

    #[tokio::test]
    async fn test_authorize_join_token_user_mismatch() {
        let (state, space) = state_with_space(true).await;
        let mut join = join_request(space.id, Uuid::new_v4());
        // Token minted for someone else entirely.
        join.token = create_token(Uuid::new_v4()).unwrap();
        let err = authorize_join(&state, space.id, &join).await.unwrap_err();
        assert!(err.contains("does not match"));
    }

    #[tokio::test]
    async fn test_authorize_join_wrong_space_in_payload() {
        let (state, space) = state_with_space(true).await;
        let user = Uuid::new_v4();
        let join = join_request(Uuid::new_v4(), user);
        let err = authorize_join(&state, space.id, &join).await.unwrap_err();
        assert!(err.contains("different space"));
    }

    #[tokio::test]
    async fn test_authorize_join_garbage_token() {
        let (state, space) = state_with_space(true).await;
        let join = JoinRequest {
            space_id: space.id,
            user_id: Uuid::new_v4(),
            token: "not.a.jwt".to_string(),
        };
        let err = authorize_join(&state, space.id, &join).await.unwrap_err();
        assert!(err.contains("invalid token"));
    }
}
