//! # Connection State Machine
//!
//! Owns the lifecycle of one space subscription: connect, handshake, join,
//! authorized membership, teardown, reconnect. One [`SpaceConnection`] is
//! one session object; it owns its timers and its socket, and every
//! transition runs on a single driver task so a reconnect can never race a
//! manual disconnect.
//!
//! ## Lifecycle
//!
//! ```text
//! disconnected -> connecting -> connected -> joining -> joined
//!       ^                                      |
//!       |        reconnecting <- (abnormal close, eligible)
//!       +------- error (timeout / rejected / budget exhausted)
//! ```
//!
//! Commands are fire-and-continue: `connect`, `disconnect`, `reconnect`,
//! `join_space`, and `send` enqueue onto the driver task and the caller
//! observes the outcome through the state watch and the event stream.

use crate::client::backoff::{close_is_reconnectable, ReconnectBackoff};
use crate::client::error::ClientError;
use crate::client::socket::{SessionSocket, SocketEvent};
use crate::shared::protocol::{JoinRequest, MutationEvent};
use crate::shared::{Mutation, SpaceRole, SyncConfig, WireMessage};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Current lifecycle state of a session, observable through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Joining,
    Joined,
    Closing,
    Reconnecting,
    Error(SessionErrorKind),
}

impl ConnectionState {
    /// Whether the session is settled in a non-active state from which a
    /// `connect` (or an external connectivity trigger) may start over.
    pub fn is_down(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Error(_))
    }
}

/// What kind of error state the session settled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// The transport did not open within the configured timeout.
    ConnectTimeout,
    /// The transport failed or closed abnormally and reconnection was not
    /// (or no longer) eligible.
    Transport,
    /// The server refused the join; not retried without an explicit
    /// `join_space` call.
    JoinRejected,
    /// The reconnect attempt budget is exhausted. Terminal until a manual
    /// `reconnect` or a connectivity trigger resets it.
    MaxReconnectReached,
}

/// Inbound session happenings, delivered in order on the event channel.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The server completed the handshake and assigned a connection id.
    Established { connection_id: Uuid },
    /// The join was accepted with an effective role.
    Joined { space_id: Uuid, role: SpaceRole },
    /// The join was refused.
    JoinRejected { reason: String },
    /// The server rejected a mutation or reported another failure.
    ServerError { message: String },
    /// A stamped mutation broadcast by another member.
    Mutation(MutationEvent),
}

enum Command {
    Connect,
    Disconnect,
    Reconnect,
    NetworkOnline,
    JoinSpace(String),
    Send(WireMessage),
}

enum SessionEnd {
    /// Closed by the peer or the network, with the close code if one came.
    Closed(Option<u16>),
    /// The transport never opened.
    Failed(SessionErrorKind),
    /// The local side disconnected deliberately.
    Manual,
    /// Every handle is gone; stop the driver.
    Shutdown,
}

enum LoopOutcome {
    ReturnToIdle,
    Shutdown,
}

/// Cloneable control surface for a [`SpaceConnection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl ConnectionHandle {
    /// Open the transport (from `disconnected` or any error state).
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    /// Deliberately close the session. Sticky: no reconnect will be
    /// scheduled until `connect` or `reconnect` is called again.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Clear the manual-close flag and the backoff counter, then connect
    /// immediately.
    pub fn reconnect(&self) {
        let _ = self.cmd_tx.send(Command::Reconnect);
    }

    /// Present a credential for the space. Stored until the server signals
    /// readiness; the `join` frame is never transmitted before
    /// `connection-established` arrives.
    pub fn join_space(&self, token: impl Into<String>) {
        let _ = self.cmd_tx.send(Command::JoinSpace(token.into()));
    }

    /// Report regained connectivity (network-online, page-visibility). If
    /// the session is down and was not manually closed, the backoff resets
    /// and a reconnect starts.
    pub fn notify_online(&self) {
        let _ = self.cmd_tx.send(Command::NetworkOnline);
    }

    /// Queue a frame for the server. Dropped with a warning unless the
    /// session is joined.
    pub fn send(&self, frame: WireMessage) {
        let _ = self.cmd_tx.send(Command::Send(frame));
    }

    /// Queue a mutation frame for the server.
    pub fn send_mutation(&self, mutation: Mutation) {
        self.send(mutation.into_wire());
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_joined(&self) -> bool {
        self.state() == ConnectionState::Joined
    }

    /// A watch receiver for observing transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// The most recent error string, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Wait until the state satisfies a predicate, returning that state.
    /// Callers bound this with their own timeout.
    pub async fn wait_for(&self, pred: impl Fn(&ConnectionState) -> bool) -> ConnectionState {
        let mut rx = self.state_rx.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            if pred(&current) {
                return current;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }
}

/// One active space subscription.
///
/// Owns the driver task; dropping the connection aborts the driver, which
/// cancels any pending connect or backoff timer with it.
pub struct SpaceConnection {
    handle: ConnectionHandle,
    task: JoinHandle<()>,
}

impl SpaceConnection {
    /// Spawn the driver task for one (space, user) subscription. Returns
    /// the connection and the inbound session event stream.
    ///
    /// Nothing touches the network until [`ConnectionHandle::connect`] is
    /// called.
    pub fn spawn(
        config: SyncConfig,
        space_id: Uuid,
        user_id: Uuid,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let last_error = Arc::new(Mutex::new(None));

        let driver = Driver {
            backoff: ReconnectBackoff::from_config(&config),
            cfg: config,
            space_id,
            user_id,
            cmd_rx,
            state_tx,
            events_tx,
            token: None,
            manually_closed: false,
            last_error: last_error.clone(),
        };
        let task = tokio::spawn(driver.run());

        let handle = ConnectionHandle {
            cmd_tx,
            state_rx,
            last_error,
        };
        (Self { handle, task }, events_rx)
    }

    /// A cloneable control handle (for e.g. the reconciler).
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }
}

impl std::ops::Deref for SpaceConnection {
    type Target = ConnectionHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for SpaceConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Driver {
    cfg: SyncConfig,
    space_id: Uuid,
    user_id: Uuid,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    token: Option<String>,
    manually_closed: bool,
    backoff: ReconnectBackoff,
    last_error: Arc<Mutex<Option<String>>>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let Some(cmd) = self.cmd_rx.recv().await else {
                return;
            };
            match cmd {
                Command::Connect => {
                    if !self.state().is_down() {
                        continue;
                    }
                    self.manually_closed = false;
                    if let LoopOutcome::Shutdown = self.active().await {
                        return;
                    }
                }
                Command::Reconnect => {
                    self.manually_closed = false;
                    self.backoff.reset();
                    if let LoopOutcome::Shutdown = self.active().await {
                        return;
                    }
                }
                Command::NetworkOnline => {
                    if self.state().is_down() && !self.manually_closed {
                        tracing::info!("[Conn] Connectivity regained, reconnecting");
                        self.backoff.reset();
                        if let LoopOutcome::Shutdown = self.active().await {
                            return;
                        }
                    }
                }
                Command::JoinSpace(token) => {
                    self.token = Some(token);
                }
                Command::Disconnect => {
                    self.manually_closed = true;
                    self.set_state(ConnectionState::Disconnected);
                }
                Command::Send(frame) => {
                    tracing::warn!("[Conn] Dropping {} frame sent while disconnected", frame.tag());
                }
            }
        }
    }

    /// The connect / session / reconnect loop. Returns once the session
    /// settles back into `disconnected` or an error state.
    async fn active(&mut self) -> LoopOutcome {
        loop {
            self.set_state(ConnectionState::Connecting);
            let url = self.cfg.ws_url(self.space_id);
            let connect = tokio::time::timeout(self.cfg.connect_timeout, SessionSocket::connect(&url));
            tokio::pin!(connect);

            // Commands stay live while the transport opens so a disconnect
            // cancels the connection-timeout timer synchronously.
            let connected = loop {
                tokio::select! {
                    result = &mut connect => break result,
                    cmd = self.cmd_rx.recv() => match cmd {
                        None => return LoopOutcome::Shutdown,
                        Some(Command::Disconnect) => {
                            self.manually_closed = true;
                            self.set_state(ConnectionState::Disconnected);
                            return LoopOutcome::ReturnToIdle;
                        }
                        Some(Command::JoinSpace(token)) => self.token = Some(token),
                        Some(Command::Send(frame)) => {
                            tracing::warn!("[Conn] Dropping {} frame sent while connecting", frame.tag());
                        }
                        Some(_) => {}
                    },
                }
            };

            let end = match connected {
                Ok(Ok(socket)) => {
                    self.backoff.reset();
                    self.run_session(socket).await
                }
                Ok(Err(e)) => {
                    tracing::warn!("[Conn] Transport connect failed: {}", e);
                    self.record_error(e.to_string());
                    SessionEnd::Failed(SessionErrorKind::Transport)
                }
                Err(_elapsed) => {
                    tracing::warn!(
                        "[Conn] Connect timed out after {:?}",
                        self.cfg.connect_timeout
                    );
                    self.record_error(ClientError::ConnectTimeout.to_string());
                    SessionEnd::Failed(SessionErrorKind::ConnectTimeout)
                }
            };

            let close_code = match &end {
                SessionEnd::Shutdown => return LoopOutcome::Shutdown,
                SessionEnd::Manual => return LoopOutcome::ReturnToIdle,
                SessionEnd::Closed(code) => *code,
                SessionEnd::Failed(_) => None,
            };

            if close_is_reconnectable(close_code, self.manually_closed, self.cfg.reconnect_enabled) {
                match self.backoff.next() {
                    Some(delay) => {
                        self.set_state(ConnectionState::Reconnecting);
                        tracing::info!(
                            "[Conn] Reconnect attempt {} in {:?}",
                            self.backoff.attempts(),
                            delay
                        );
                        match self.backoff_sleep(delay).await {
                            LoopOutcome::Shutdown => return LoopOutcome::Shutdown,
                            LoopOutcome::ReturnToIdle if self.manually_closed => {
                                return LoopOutcome::ReturnToIdle
                            }
                            LoopOutcome::ReturnToIdle => continue,
                        }
                    }
                    None => {
                        tracing::error!("[Conn] Reconnect attempt budget exhausted");
                        self.record_error("maximum reconnect attempts reached");
                        self.set_state(ConnectionState::Error(SessionErrorKind::MaxReconnectReached));
                        return LoopOutcome::ReturnToIdle;
                    }
                }
            } else {
                match end {
                    SessionEnd::Failed(kind) => {
                        self.set_state(ConnectionState::Error(kind));
                    }
                    SessionEnd::Closed(code) => {
                        let deliberate =
                            matches!(code, Some(1000) | Some(1001) | Some(1008));
                        if deliberate || self.manually_closed {
                            self.set_state(ConnectionState::Disconnected);
                        } else {
                            self.set_state(ConnectionState::Error(SessionErrorKind::Transport));
                        }
                    }
                    _ => {}
                }
                return LoopOutcome::ReturnToIdle;
            }
        }
    }

    /// Sleep out a backoff delay while keeping commands live. Returns
    /// `ReturnToIdle`; the caller inspects `manually_closed` to decide
    /// whether to keep cycling.
    async fn backoff_sleep(&mut self, delay: std::time::Duration) -> LoopOutcome {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return LoopOutcome::ReturnToIdle,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return LoopOutcome::Shutdown,
                    Some(Command::Disconnect) => {
                        self.manually_closed = true;
                        self.set_state(ConnectionState::Disconnected);
                        return LoopOutcome::ReturnToIdle;
                    }
                    Some(Command::Reconnect) | Some(Command::NetworkOnline) => {
                        self.backoff.reset();
                        return LoopOutcome::ReturnToIdle;
                    }
                    Some(Command::Connect) => return LoopOutcome::ReturnToIdle,
                    Some(Command::JoinSpace(token)) => self.token = Some(token),
                    Some(Command::Send(frame)) => {
                        tracing::warn!("[Conn] Dropping {} frame sent while reconnecting", frame.tag());
                    }
                },
            }
        }
    }

    /// Drive one open transport until it ends.
    async fn run_session(&mut self, mut socket: SessionSocket) -> SessionEnd {
        self.set_state(ConnectionState::Connected);
        let mut established = false;

        loop {
            tokio::select! {
                event = socket.next_event() => match event {
                    None => return SessionEnd::Closed(None),
                    Some(SocketEvent::Closed { code, reason }) => {
                        if !reason.is_empty() {
                            self.record_error(reason);
                        }
                        tracing::info!("[Conn] Transport closed (code: {:?})", code);
                        return SessionEnd::Closed(code);
                    }
                    Some(SocketEvent::Malformed { detail }) => {
                        tracing::warn!("[Conn] Dropping malformed frame: {}", detail);
                    }
                    Some(SocketEvent::Frame(frame)) => {
                        self.handle_frame(&mut socket, frame, &mut established).await;
                    }
                },
                cmd = self.cmd_rx.recv() => match cmd {
                    None => {
                        socket.close(1000).await;
                        return SessionEnd::Shutdown;
                    }
                    Some(Command::Disconnect) => {
                        self.manually_closed = true;
                        self.set_state(ConnectionState::Closing);
                        socket.close(1000).await;
                        self.set_state(ConnectionState::Disconnected);
                        return SessionEnd::Manual;
                    }
                    Some(Command::JoinSpace(token)) => {
                        self.token = Some(token);
                        if established {
                            self.send_join(&mut socket).await;
                        }
                    }
                    Some(Command::Send(frame)) => {
                        if self.state() == ConnectionState::Joined {
                            if let Err(e) = socket.send(&frame).await {
                                tracing::warn!("[Conn] Send failed: {}", e);
                            }
                        } else {
                            tracing::warn!(
                                "[Conn] Dropping {} frame sent before join completed",
                                frame.tag()
                            );
                        }
                    }
                    Some(Command::Reconnect) => self.manually_closed = false,
                    Some(Command::Connect) | Some(Command::NetworkOnline) => {}
                },
            }
        }
    }

    async fn handle_frame(
        &mut self,
        socket: &mut SessionSocket,
        frame: WireMessage,
        established: &mut bool,
    ) {
        match frame {
            WireMessage::ConnectionEstablished(info) => {
                *established = true;
                tracing::debug!("[Conn] Established as connection {}", info.connection_id);
                let _ = self.events_tx.send(SessionEvent::Established {
                    connection_id: info.connection_id,
                });
                // The peer signaled readiness; join now if a credential is
                // already held.
                if self.token.is_some() {
                    self.send_join(socket).await;
                }
            }
            WireMessage::SpaceJoined(info) => {
                self.set_state(ConnectionState::Joined);
                tracing::info!("[Conn] Joined space {} as {}", info.space_id, info.role);
                let _ = self.events_tx.send(SessionEvent::Joined {
                    space_id: info.space_id,
                    role: info.role,
                });
            }
            WireMessage::JoinRejected(rejection) => {
                tracing::warn!("[Conn] Join rejected: {}", rejection.reason);
                self.record_error(rejection.reason.clone());
                self.set_state(ConnectionState::Error(SessionErrorKind::JoinRejected));
                let _ = self.events_tx.send(SessionEvent::JoinRejected {
                    reason: rejection.reason,
                });
            }
            WireMessage::Ping(heartbeat) => {
                if let Err(e) = socket.send(&WireMessage::Pong(heartbeat)).await {
                    tracing::warn!("[Conn] Pong send failed: {}", e);
                }
            }
            WireMessage::Error(info) => {
                tracing::warn!("[Conn] Server error: {}", info.message);
                self.record_error(info.message.clone());
                let _ = self.events_tx.send(SessionEvent::ServerError {
                    message: info.message,
                });
            }
            other => {
                let tag = other.tag();
                match MutationEvent::from_wire(other) {
                    Some(event) => {
                        let _ = self.events_tx.send(SessionEvent::Mutation(event));
                    }
                    None => tracing::warn!("[Conn] Dropping unexpected {} frame", tag),
                }
            }
        }
    }

    async fn send_join(&mut self, socket: &mut SessionSocket) {
        let Some(token) = self.token.clone() else {
            return;
        };
        self.set_state(ConnectionState::Joining);
        let frame = WireMessage::Join(JoinRequest {
            space_id: self.space_id,
            user_id: self.user_id,
            token,
        });
        if let Err(e) = socket.send(&frame).await {
            tracing::warn!("[Conn] Join send failed: {}", e);
        }
    }

    fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state_tx.borrow().clone();
        if prev != next {
            tracing::debug!("[Conn] State {:?} -> {:?}", prev, next);
            self.state_tx.send_replace(next);
        }
    }

    fn record_error(&self, message: impl Into<String>) {
        *self.last_error.lock().unwrap() = Some(message.into());
    }
}
