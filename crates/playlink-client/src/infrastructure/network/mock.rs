//! In-memory transport that records everything instead of touching a network.
//!
//! `RecordingTransportFactory` hands out [`RecordingTransport`]s that share a
//! single [`TransportLog`].  Tests inspect the log to see which targets were
//! opened, which messages reached a transport and which transports were
//! closed, and they drive the controller by emitting events through the
//! [`EventSink`]s captured at open time.
//!
//! ```ignore
//! let factory = RecordingTransportFactory::new();
//! let (mut controller, mut rx) =
//!     SessionController::new(info, Box::new(factory.clone()), Box::new(listener));
//!
//! controller.connect("dev1");
//! factory.log().last_sink().unwrap().emit(TransportEvent::Connected);
//! let (id, event) = rx.try_recv().unwrap();
//! controller.handle_event(id, event)?;
//!
//! assert_eq!(factory.log().sent().len(), 1); // client info
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use playlink_core::Message;

use crate::application::transport::{
    EventSink, TransportError, TransportFactory, TransportId, TransportSession,
};

/// Shared record of everything the recording transports saw.
#[derive(Debug, Default)]
pub struct TransportLog {
    opened: Mutex<Vec<(String, EventSink)>>,
    sent: Mutex<Vec<(TransportId, Message)>>,
    closed: Mutex<Vec<TransportId>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TransportLog {
    /// Targets passed to `open`, in order.  Includes failed opens.
    pub fn opened_targets(&self) -> Vec<String> {
        lock(&self.opened).iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn last_sink(&self) -> Option<EventSink> {
        lock(&self.opened).last().map(|(_, s)| s.clone())
    }

    /// Every message that reached a transport, tagged with the transport id.
    pub fn sent(&self) -> Vec<(TransportId, Message)> {
        lock(&self.sent).clone()
    }

    /// Ids of transports that were closed, once each.
    pub fn closed(&self) -> Vec<TransportId> {
        lock(&self.closed).clone()
    }
}

/// Factory producing [`RecordingTransport`]s.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransportFactory {
    log: Arc<TransportLog>,
    fail_open: bool,
    reconnects: bool,
}

impl RecordingTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `open` fail with [`TransportError::InvalidTarget`].
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Makes the produced transports report that they reconnect by themselves.
    pub fn reconnecting(mut self) -> Self {
        self.reconnects = true;
        self
    }

    pub fn log(&self) -> Arc<TransportLog> {
        Arc::clone(&self.log)
    }
}

impl TransportFactory for RecordingTransportFactory {
    fn open(
        &mut self,
        target: &str,
        sink: EventSink,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        if self.fail_open {
            lock(&self.log.opened).push((target.to_string(), sink));
            return Err(TransportError::InvalidTarget(target.to_string()));
        }
        let id = sink.id();
        lock(&self.log.opened).push((target.to_string(), sink));
        Ok(Box::new(RecordingTransport {
            id,
            log: Arc::clone(&self.log),
            open: true,
            reconnects: self.reconnects,
        }))
    }
}

/// A transport session that records sends and closes.
///
/// Sends always succeed until the transport is closed.
#[derive(Debug)]
pub struct RecordingTransport {
    id: TransportId,
    log: Arc<TransportLog>,
    open: bool,
    reconnects: bool,
}

impl TransportSession for RecordingTransport {
    fn send(&mut self, msg: &Message) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        lock(&self.log.sent).push((self.id, msg.clone()));
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            lock(&self.log.closed).push(self.id);
        }
    }

    fn reconnects(&self) -> bool {
        self.reconnects
    }
}
