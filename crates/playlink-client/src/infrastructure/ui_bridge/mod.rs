//! UI bridge: session listeners and the status snapshot a UI polls.
//!
//! The controller reports lifecycle changes through a [`SessionListener`].
//! This module provides the listeners a front end plugs in:
//!
//! - [`ChannelListener`] forwards events to a tokio channel so an async UI
//!   task can react to them.
//! - [`LogListener`] writes them to the tracing log.
//! - [`StatusBoard`] folds them into a [`ConnectionStatus`] snapshot that can
//!   be read from any thread and serialized for display.
//! - [`FanoutListener`] delivers each event to several of the above.
//!
//! # DTOs
//!
//! [`StatusSnapshot`] is a plain serializable copy of the board.  A UI never
//! holds the board's lock; it asks for a snapshot and renders that.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::application::session::{SessionEvent, SessionListener};

// ── Listeners ─────────────────────────────────────────────────────────────────

/// Forwards every event to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelListener {
    /// Creates the listener and the receiver the UI reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionListener for ChannelListener {
    fn on_event(&mut self, event: SessionEvent) {
        // A closed receiver means the UI is gone; nothing left to tell.
        let _ = self.tx.send(event);
    }
}

/// Logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl SessionListener for LogListener {
    fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connecting(text) => info!("session: {text}"),
            SessionEvent::Connected => info!("session: connected"),
            SessionEvent::Error(text) => warn!("session error: {text}"),
        }
    }
}

/// Delivers each event to every inner listener, in order.
#[derive(Default)]
pub struct FanoutListener {
    listeners: Vec<Box<dyn SessionListener>>,
}

impl FanoutListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: impl SessionListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }
}

impl SessionListener for FanoutListener {
    fn on_event(&mut self, event: SessionEvent) {
        for listener in &mut self.listeners {
            listener.on_event(event.clone());
        }
    }
}

// ── Status board ──────────────────────────────────────────────────────────────

/// Connection status of the session as shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Nothing has happened yet.
    #[default]
    Disconnected,
    /// An attempt or a reconnect is in progress.
    Connecting,
    /// The handshake completed.
    Connected,
    /// The last attempt failed.
    Error,
}

/// Serializable copy of the status board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: ConnectionStatus,
    /// Text of the last event that carried one.
    pub message: Option<String>,
    /// Number of events seen so far.
    pub events: u64,
}

/// Shared connection status, updated from session events.
///
/// Clones share the same state: give one clone to the controller as its
/// listener and keep another for the UI.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Marks the session as deliberately disconnected.
    ///
    /// An explicit disconnect produces no session event, so the UI layer that
    /// issued it records it here itself.
    pub fn mark_disconnected(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.status = ConnectionStatus::Disconnected;
        guard.message = None;
    }
}

impl SessionListener for StatusBoard {
    fn on_event(&mut self, event: SessionEvent) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.events += 1;
        match event {
            SessionEvent::Connecting(text) => {
                guard.status = ConnectionStatus::Connecting;
                guard.message = Some(text);
            }
            SessionEvent::Connected => {
                guard.status = ConnectionStatus::Connected;
                guard.message = None;
            }
            SessionEvent::Error(text) => {
                guard.status = ConnectionStatus::Error;
                guard.message = Some(text);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
