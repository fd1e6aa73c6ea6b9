//! SessionController: connection lifecycle, handshake and the readiness gate.
//!
//! The controller is a synchronous state machine.  It never blocks and never
//! spawns anything itself; transports run in the background and feed their
//! events back through the receiver returned by [`SessionController::new`].
//! Whoever owns the controller (see [`crate::application::runtime`]) must
//! drain that receiver and call [`SessionController::handle_event`] for every
//! item, serialized with all other calls on the controller.
//!
//! ```text
//!   Idle ──connect──▶ Connecting ──Connected──▶ HandshakePending ──PLAYER_INFO──▶ Ready
//!    ▲                   │  ▲                        │                             │
//!    └──── Error ────────┘  └── Disconnected / SERVER_DOWN (reconnecting transport)┘
//! ```
//!
//! Unsolicited loss goes back to `Connecting` when the transport re-establishes
//! the channel by itself and to `Idle` otherwise.  An explicit
//! [`disconnect`](SessionController::disconnect) always goes to `Idle` and is
//! the only transition that does not notify the listener.

use std::time::Duration;

use playlink_core::protocol::messages::{ClientInfo, PlayerCommand};
use playlink_core::{Message, MessageId, ProtocolError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::player_mirror::PlayerMirror;
use crate::application::transport::{
    EventSink, TransportEvent, TransportEventReceiver, TransportFactory, TransportId,
    TransportSession,
};

/// Listener text sent when a connection attempt starts.
pub const CONNECTING_TEXT: &str = "Try to connect..";

/// Listener text sent when the server announces that it is going away and
/// the transport will re-establish the channel.
pub const SERVER_SHUTDOWN_TEXT: &str = "The server has shut down. Trying to reconnect...";

/// Listener text sent when the server announces that it is going away and
/// the transport does not reconnect.
pub const SERVER_GONE_TEXT: &str = "The server has shut down.";

/// Listener text sent when no player info arrives in time.
pub const HANDSHAKE_TIMEOUT_TEXT: &str = "handshake timed out";

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No transport.
    #[default]
    Idle,
    /// A transport exists and is establishing its channel.
    Connecting,
    /// Client info was sent; waiting for player info.
    HandshakePending,
    /// Player info received.  Outbound messages are transmitted.
    Ready,
}

/// Coarse-grained lifecycle notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connection attempt is in progress; the text says why.
    Connecting(String),
    /// The handshake completed.
    Connected,
    /// The session failed and was torn down.
    Error(String),
}

/// Receives [`SessionEvent`]s synchronously from the controller.
///
/// Called on the dispatch path, so implementations must return quickly.
#[cfg_attr(test, mockall::automock)]
pub trait SessionListener: Send {
    fn on_event(&mut self, event: SessionEvent);
}

/// A fault raised while dispatching an inbound transport event.
///
/// These indicate a corrupt session and are not recoverable locally; the
/// runtime terminates the process when it sees one.
#[derive(Debug, Error)]
pub enum DispatchFault {
    #[error("malformed payload in message {id}: {source}")]
    MalformedPayload {
        id: MessageId,
        #[source]
        source: ProtocolError,
    },
    /// Dispatch panicked, in the controller or in a listener it called.
    #[error("panic during dispatch: {0}")]
    Panicked(String),
}

struct ActiveTransport {
    id: TransportId,
    session: Box<dyn TransportSession>,
}

/// The session controller.
pub struct SessionController {
    client_info: ClientInfo,
    factory: Box<dyn TransportFactory>,
    listener: Box<dyn SessionListener>,
    events_tx: mpsc::UnboundedSender<(TransportId, TransportEvent)>,
    transport: Option<ActiveTransport>,
    state: SessionState,
    next_transport_id: u64,
    /// Outbound scratch buffer, reused for every message the controller builds.
    outbound: Message,
    player: PlayerMirror,
    handshake_timeout: Option<Duration>,
    handshake_deadline: Option<Instant>,
}

impl SessionController {
    /// Creates an idle controller.
    ///
    /// Returns the controller together with the receiving end of its event
    /// stream.  Every transport the controller opens reports into this stream.
    pub fn new(
        client_info: ClientInfo,
        factory: Box<dyn TransportFactory>,
        listener: Box<dyn SessionListener>,
    ) -> (Self, TransportEventReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            client_info,
            factory,
            listener,
            events_tx,
            transport: None,
            state: SessionState::Idle,
            next_transport_id: 1,
            outbound: Message::default(),
            player: PlayerMirror::new(),
            handshake_timeout: None,
            handshake_deadline: None,
        };
        (controller, events_rx)
    }

    /// Limits how long the controller waits for player info after sending
    /// client info.  Without a limit it waits indefinitely.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` while outbound messages are transmitted.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn player(&self) -> &PlayerMirror {
        &self.player
    }

    /// Id of the current transport, if any.
    pub fn current_transport(&self) -> Option<TransportId> {
        self.transport.as_ref().map(|t| t.id)
    }

    /// Instant by which player info must arrive, while a handshake with a
    /// timeout is pending.
    pub fn handshake_deadline(&self) -> Option<Instant> {
        self.handshake_deadline
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Starts a new session with `target`, tearing down any existing one first.
    pub fn connect(&mut self, target: &str) {
        if self.transport.is_some() {
            self.disconnect();
        }

        self.listener
            .on_event(SessionEvent::Connecting(CONNECTING_TEXT.to_string()));

        let id = TransportId::new(self.next_transport_id);
        self.next_transport_id += 1;
        let sink = EventSink::new(id, self.events_tx.clone());

        match self.factory.open(target, sink) {
            Ok(session) => {
                info!(%id, target, "connecting");
                self.transport = Some(ActiveTransport { id, session });
                self.state = SessionState::Connecting;
            }
            Err(e) => {
                warn!(target, "could not open transport: {e}");
                self.state = SessionState::Idle;
                self.listener.on_event(SessionEvent::Error(e.to_string()));
            }
        }
    }

    /// Tears the session down without notifying the listener.  Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(mut active) = self.transport.take() {
            info!(id = %active.id, "disconnecting");
            active.session.close();
        }
        self.state = SessionState::Idle;
        self.handshake_deadline = None;
        self.player.reset();
    }

    /// Transmits `msg` if the session is ready; otherwise drops it.
    ///
    /// Transport failures are logged and not reported to the caller.
    pub fn send_message(&mut self, msg: &Message) {
        if !self.is_ready() {
            debug!(id = %msg.id, state = ?self.state, "dropping outbound message: session not ready");
            return;
        }
        if let Some(active) = self.transport.as_mut() {
            if let Err(e) = active.session.send(msg) {
                warn!(id = %msg.id, "send failed: {e}");
            }
        }
    }

    /// Asks the remote player to execute `command`.
    ///
    /// Subject to the same readiness gate as [`send_message`](Self::send_message).
    pub fn control(&mut self, command: PlayerCommand, param: i16) {
        let request = self.player.control_request(command, param);
        let mut msg = std::mem::take(&mut self.outbound);
        msg.set_record(MessageId::PLAYER_CONTROL, &request);
        self.send_message(&msg);
        self.outbound = msg;
    }

    /// Best-effort logoff.  The server does not acknowledge it.
    pub fn logoff(&mut self) {
        self.control(PlayerCommand::Logoff, 0);
    }

    /// Abandons a handshake whose deadline has passed.
    pub fn expire_handshake(&mut self) {
        if self.state != SessionState::HandshakePending {
            return;
        }
        warn!("no player info received before the handshake deadline");
        self.fail(HANDSHAKE_TIMEOUT_TEXT.to_string());
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Dispatches one event from a transport.
    ///
    /// Events from transports other than the current one are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchFault`] if a player message carries a payload that
    /// cannot be interpreted.  The session state is unusable afterwards.
    pub fn handle_event(
        &mut self,
        id: TransportId,
        event: TransportEvent,
    ) -> Result<(), DispatchFault> {
        if self.current_transport() != Some(id) {
            debug!(%id, ?event, "discarding event from stale transport");
            return Ok(());
        }

        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Error { reason } => {
                warn!(%id, "transport error: {reason}");
                self.fail(reason);
            }
            TransportEvent::Disconnected { reason } => {
                info!(%id, "connection lost: {reason}");
                self.connection_lost(reason);
            }
            TransportEvent::Message(msg) => return self.dispatch_message(&msg),
        }
        Ok(())
    }

    fn on_connected(&mut self) {
        if self.state != SessionState::Connecting {
            warn!(state = ?self.state, "unexpected connected event");
            return;
        }

        self.outbound
            .set_record(MessageId::CLIENT_INFO, &self.client_info);
        let sent = match self.transport.as_mut() {
            Some(active) => active.session.send(&self.outbound),
            None => return,
        };

        match sent {
            Ok(()) => {
                debug!(client = self.client_info.name(), "client info sent");
                self.state = SessionState::HandshakePending;
                self.handshake_deadline = self.handshake_timeout.map(|t| Instant::now() + t);
            }
            Err(e) => {
                warn!("could not send client info: {e}");
                self.fail(e.to_string());
            }
        }
    }

    fn dispatch_message(&mut self, msg: &Message) -> Result<(), DispatchFault> {
        let in_session = matches!(
            self.state,
            SessionState::HandshakePending | SessionState::Ready
        );
        if !in_session {
            debug!(
                id = %msg.id,
                handshake = msg.id.is_handshake(),
                state = ?self.state,
                "ignoring message outside a session"
            );
            return Ok(());
        }

        match msg.id {
            MessageId::PLAYER_INFO => {
                if let Err(e) = self.player.apply_player_info(&msg.payload) {
                    warn!("invalid player info: {e}");
                    self.fail(format!("invalid player info: {e}"));
                    return Ok(());
                }
                self.handshake_deadline = None;
                self.state = SessionState::Ready;
                info!("session ready");
                self.listener.on_event(SessionEvent::Connected);
            }
            MessageId::SERVER_DOWN => {
                info!("server is shutting down");
                let text = if self.transport_reconnects() {
                    SERVER_SHUTDOWN_TEXT
                } else {
                    SERVER_GONE_TEXT
                };
                self.connection_lost(text.to_string());
            }
            id => self
                .player
                .handle_message(msg)
                .map_err(|source| DispatchFault::MalformedPayload { id, source })?,
        }
        Ok(())
    }

    /// Unsolicited loss of an established or pending session.
    fn connection_lost(&mut self, reason: String) {
        self.player.reset();
        self.handshake_deadline = None;

        if self.transport_reconnects() {
            self.state = SessionState::Connecting;
        } else {
            if let Some(mut active) = self.transport.take() {
                active.session.close();
            }
            self.state = SessionState::Idle;
        }

        self.listener.on_event(SessionEvent::Connecting(reason));
    }

    fn transport_reconnects(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|active| active.session.reconnects())
    }

    /// Tears down to `Idle` and reports `reason` as an error.
    fn fail(&mut self, reason: String) {
        if let Some(mut active) = self.transport.take() {
            active.session.close();
        }
        self.state = SessionState::Idle;
        self.handshake_deadline = None;
        self.player.reset();
        self.listener.on_event(SessionEvent::Error(reason));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
