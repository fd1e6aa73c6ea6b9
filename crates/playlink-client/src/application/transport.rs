//! Transport session contract.
//!
//! A transport session owns one physical duplex channel to the server.  It
//! connects in the background and reports what happens through an
//! [`EventSink`] as [`TransportEvent`]s, so the controller handles transport
//! lifecycle and server messages on the same dispatch path.
//!
//! Guarantees every implementation must uphold:
//!
//! - Each open attempt produces exactly one of `Connected` or `Error`.
//! - After `Connected`, zero or more `Message`s follow, then at most one
//!   `Disconnected` when the channel breaks unsolicited.  A transport that
//!   [`reconnects`](TransportSession::reconnects) may later produce
//!   `Connected` again.
//! - After [`close`](TransportSession::close) no further events are produced,
//!   and closing never produces an `Error`.

use std::fmt;

use playlink_core::{Message, ProtocolError};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors surfaced by transport sessions.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `send` was called while the channel is not open.
    #[error("transport is not open")]
    NotOpen,
    /// The session has been closed or its background task is gone.
    #[error("transport is closed")]
    Closed,
    /// The target string cannot be used by this transport.
    #[error("invalid target {0:?}: expected host:port")]
    InvalidTarget(String),
    /// A transport needing an async runtime was opened outside one.
    #[error("no async runtime available to drive the transport")]
    NoRuntime,
    /// Establishing the channel failed.
    #[error("failed to connect to {target}: {source}")]
    ConnectFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },
    /// Establishing the channel took longer than allowed.
    #[error("connecting to {target} timed out after {timeout_ms} ms")]
    ConnectTimeout { target: String, timeout_ms: u64 },
    /// An outbound message could not be framed.
    #[error("encoding failed: {0}")]
    Encode(#[from] ProtocolError),
}

/// Identifies one transport session for the lifetime of a controller.
///
/// Every `connect` gets a fresh id, which lets the controller recognise and
/// discard events still in flight from a transport it already replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(u64);

impl TransportId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport-{}", self.0)
    }
}

/// Events a transport session feeds into the controller.
///
/// `Connected`, `Disconnected` and `Error` are produced locally and never
/// travel over the wire; `Message` carries a frame received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel is open.
    Connected,
    /// An open channel broke without being asked to.
    Disconnected { reason: String },
    /// The open attempt failed.
    Error { reason: String },
    /// A message arrived from the server.
    Message(Message),
}

/// Receiving half of the controller's single event stream.
pub type TransportEventReceiver = mpsc::UnboundedReceiver<(TransportId, TransportEvent)>;

/// Sending half handed to one transport session; tags events with its id.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: TransportId,
    tx: mpsc::UnboundedSender<(TransportId, TransportEvent)>,
}

impl EventSink {
    pub fn new(id: TransportId, tx: mpsc::UnboundedSender<(TransportId, TransportEvent)>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> TransportId {
        self.id
    }

    /// Pushes an event into the controller's stream.
    ///
    /// Returns `false` once the controller is gone; the transport should stop.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.id, event)).is_ok()
    }
}

/// One physical channel to the server.
pub trait TransportSession: Send {
    /// Transmits a message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotOpen`] if the channel is not currently open.
    fn send(&mut self, msg: &Message) -> Result<(), TransportError>;

    /// Releases the channel.  Idempotent; emits no events.
    fn close(&mut self);

    /// Whether the session re-establishes the channel by itself after an
    /// unsolicited disconnect.
    fn reconnects(&self) -> bool;
}

/// Creates transport sessions for a target identifier.
pub trait TransportFactory: Send {
    /// Starts an asynchronous open attempt and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session cannot even be constructed (for
    /// example an unusable target).  Failures of the attempt itself are
    /// reported later as [`TransportEvent::Error`].
    fn open(&mut self, target: &str, sink: EventSink) -> Result<Box<dyn TransportSession>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use playlink_core::MessageId;

    #[test]
    fn test_transport_id_display() {
        assert_eq!(TransportId::new(3).to_string(), "transport-3");
    }

    #[test]
    fn test_event_sink_tags_events_with_its_id() {
        // Arrange
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(TransportId::new(7), tx);

        // Act
        assert!(sink.emit(TransportEvent::Connected));
        assert!(sink.emit(TransportEvent::Message(Message::new(MessageId::SERVER_DOWN, Vec::new()))));

        // Assert
        assert_eq!(rx.try_recv().unwrap(), (TransportId::new(7), TransportEvent::Connected));
        let (id, event) = rx.try_recv().unwrap();
        assert_eq!(id, TransportId::new(7));
        assert!(matches!(event, TransportEvent::Message(m) if m.id == MessageId::SERVER_DOWN));
    }

    #[test]
    fn test_event_sink_reports_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(TransportId::new(1), tx);
        drop(rx);
        assert!(!sink.emit(TransportEvent::Connected));
    }

    #[test]
    fn test_transport_error_messages_are_human_readable() {
        let err = TransportError::ConnectTimeout {
            target: "10.0.0.2:7700".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(err.to_string(), "connecting to 10.0.0.2:7700 timed out after 500 ms");
    }
}
