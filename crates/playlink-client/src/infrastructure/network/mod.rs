//! Network infrastructure: TCP transport sessions.
//!
//! Architecture:
//! - `TcpTransportFactory::open` validates the target and spawns one
//!   background task per session on the current tokio runtime.
//! - The task connects, then runs a read loop (header first, then payload)
//!   and a write loop side by side on the split stream.
//! - Inbound frames and lifecycle changes go to the controller through the
//!   session's [`EventSink`]; outbound frames come from `TcpTransport::send`
//!   over an unbounded channel.
//! - With `reconnect` enabled the task retries silently after an unsolicited
//!   disconnect and reports `Connected` again when it gets the channel back.

pub mod mock;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use playlink_core::protocol::messages::HEADER_SIZE;
use playlink_core::{decode_header, encode_frame, Message};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    runtime::Handle,
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::{debug, info, trace, warn};

use crate::application::transport::{
    EventSink, TransportError, TransportEvent, TransportFactory, TransportSession,
};

/// Settings shared by every TCP session a factory opens.
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Re-establish the channel after an unsolicited disconnect.
    pub reconnect: bool,
    /// Pause between reconnect attempts.
    pub reconnect_interval: Duration,
    /// Upper bound for a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Opens [`TcpTransport`]s for `host:port` targets.
#[derive(Debug, Clone, Default)]
pub struct TcpTransportFactory {
    config: TcpTransportConfig,
}

impl TcpTransportFactory {
    pub fn new(config: TcpTransportConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for TcpTransportFactory {
    fn open(
        &mut self,
        target: &str,
        sink: EventSink,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        validate_target(target)?;
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        debug!(id = %sink.id(), target, "spawning tcp session");
        let task = runtime.spawn(run_connection(
            target.to_string(),
            self.config.clone(),
            sink,
            writer_rx,
            Arc::clone(&open),
        ));

        Ok(Box::new(TcpTransport {
            writer: writer_tx,
            open,
            task: Some(task),
            reconnect: self.config.reconnect,
        }))
    }
}

/// One TCP session.  Dropping it closes the session.
pub struct TcpTransport {
    writer: mpsc::UnboundedSender<Vec<u8>>,
    open: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    reconnect: bool,
}

impl TransportSession for TcpTransport {
    fn send(&mut self, msg: &Message) -> Result<(), TransportError> {
        if self.task.is_none() {
            return Err(TransportError::Closed);
        }
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::NotOpen);
        }
        let frame = encode_frame(msg)?;
        self.writer.send(frame).map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.open.store(false, Ordering::SeqCst);
            debug!("tcp session closed");
        }
    }

    fn reconnects(&self) -> bool {
        self.reconnect
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate_target(target: &str) -> Result<(), TransportError> {
    match target.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(TransportError::InvalidTarget(target.to_string())),
    }
}

async fn connect(target: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    match time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                debug!("could not disable nagle on {target}: {e}");
            }
            Ok(stream)
        }
        Ok(Err(source)) => Err(TransportError::ConnectFailed {
            target: target.to_string(),
            source,
        }),
        Err(_) => Err(TransportError::ConnectTimeout {
            target: target.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Background task of one session.  Ends when the controller goes away, the
/// first attempt fails, or the channel drops and reconnect is disabled.
async fn run_connection(
    target: String,
    config: TcpTransportConfig,
    sink: EventSink,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    open: Arc<AtomicBool>,
) {
    let mut first_attempt = true;

    loop {
        match connect(&target, config.connect_timeout).await {
            Ok(stream) => {
                // Frames queued for a previous connection are meaningless now.
                while outbound.try_recv().is_ok() {}
                open.store(true, Ordering::SeqCst);
                first_attempt = false;
                info!(id = %sink.id(), %target, "connected");
                if !sink.emit(TransportEvent::Connected) {
                    return;
                }

                let reason = drive(stream, &sink, &mut outbound).await;
                open.store(false, Ordering::SeqCst);
                info!(id = %sink.id(), %target, "disconnected: {reason}");
                if !sink.emit(TransportEvent::Disconnected { reason }) || !config.reconnect {
                    return;
                }
            }
            Err(e) if first_attempt => {
                warn!(id = %sink.id(), "{e}");
                sink.emit(TransportEvent::Error {
                    reason: e.to_string(),
                });
                return;
            }
            Err(e) => debug!(id = %sink.id(), "reconnect attempt failed: {e}"),
        }

        time::sleep(config.reconnect_interval).await;
    }
}

/// Runs both directions until one of them stops; returns why.
async fn drive(
    stream: TcpStream,
    sink: &EventSink,
    outbound: &mut mpsc::UnboundedReceiver<Vec<u8>>,
) -> String {
    let (reader, writer) = stream.into_split();
    tokio::select! {
        reason = read_loop(reader, sink) => reason,
        reason = write_loop(writer, outbound) => reason,
    }
}

async fn read_loop(mut reader: OwnedReadHalf, sink: &EventSink) -> String {
    let mut header_buf = [0u8; HEADER_SIZE];
    loop {
        if let Err(e) = reader.read_exact(&mut header_buf).await {
            return if e.kind() == std::io::ErrorKind::UnexpectedEof {
                "connection closed by server".to_string()
            } else {
                format!("read error: {e}")
            };
        }

        // A bad header leaves the stream out of sync; there is no recovering.
        let header = match decode_header(&header_buf) {
            Ok(h) => h,
            Err(e) => return format!("invalid frame: {e}"),
        };

        let mut payload = vec![0u8; header.payload_len];
        if let Err(e) = reader.read_exact(&mut payload).await {
            return format!("read error: {e}");
        }

        trace!(id = %header.id, len = header.payload_len, "received frame");
        if !sink.emit(TransportEvent::Message(Message::new(header.id, payload))) {
            return "controller gone".to_string();
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    outbound: &mut mpsc::UnboundedReceiver<Vec<u8>>,
) -> String {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            return format!("write error: {e}");
        }
    }
    "session closed".to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::transport::{TransportEventReceiver, TransportId};
    use playlink_core::{decode_frame, MessageId};
    use tokio::net::TcpListener;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config(reconnect: bool) -> TcpTransportConfig {
        TcpTransportConfig {
            reconnect,
            reconnect_interval: Duration::from_millis(20),
            connect_timeout: Duration::from_secs(2),
        }
    }

    fn sink() -> (EventSink, TransportEventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink::new(TransportId::new(1), tx), rx)
    }

    async fn next_event(rx: &mut TransportEventReceiver) -> Option<TransportEvent> {
        time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .map(|(_, event)| event)
    }

    #[test]
    fn test_default_config_reconnects_every_five_seconds() {
        let cfg = TcpTransportConfig::default();
        assert!(cfg.reconnect);
        assert_eq!(cfg.reconnect_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_target_accepts_host_and_port() {
        assert!(validate_target("192.168.1.20:7700").is_ok());
        assert!(validate_target("media-box.local:1").is_ok());
    }

    #[test]
    fn test_validate_target_rejects_malformed_targets() {
        for target in ["", "no-port", ":7700", "host:", "host:99999", "host:abc"] {
            assert!(
                matches!(validate_target(target), Err(TransportError::InvalidTarget(_))),
                "{target:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_open_outside_runtime_fails() {
        // Arrange
        let mut factory = TcpTransportFactory::default();

        // Act
        let result = factory.open("127.0.0.1:7700", sink().0);

        // Assert
        assert!(matches!(result, Err(TransportError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_connects_and_forwards_inbound_frames() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (s, mut rx) = sink();
        let mut factory = TcpTransportFactory::new(fast_config(false));
        let _transport = factory.open(&addr, s).unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        // Act
        let frame = encode_frame(&Message::new(MessageId::PLAYER_INFO, vec![0, 1, b'x', 0, 0, 0, 0, 5]))
            .unwrap();
        server.write_all(&frame).await.unwrap();

        // Assert
        assert_eq!(next_event(&mut rx).await, Some(TransportEvent::Connected));
        match next_event(&mut rx).await {
            Some(TransportEvent::Message(msg)) => {
                assert_eq!(msg.id, MessageId::PLAYER_INFO);
                assert_eq!(msg.payload.len(), 8);
            }
            other => panic!("expected a message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_writes_a_frame_once_connected() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (s, mut rx) = sink();
        let mut factory = TcpTransportFactory::new(fast_config(false));
        let mut transport = factory.open(&addr, s).unwrap();
        let (mut server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, Some(TransportEvent::Connected));

        // Act
        let msg = Message::new(MessageId::PLAYER_CONTROL, vec![0x01, 0x00, 0x00]);
        transport.send(&msg).unwrap();

        // Assert
        let mut buf = vec![0u8; HEADER_SIZE + 3];
        time::timeout(WAIT, server.read_exact(&mut buf)).await.unwrap().unwrap();
        let (decoded, _) = decode_frame(&buf).unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_refused_connection_emits_exactly_one_error() {
        // Arrange – grab a free port, then stop listening on it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let (s, mut rx) = sink();
        let mut factory = TcpTransportFactory::new(fast_config(true));

        // Act
        let _transport = factory.open(&addr, s).unwrap();

        // Assert
        assert!(matches!(next_event(&mut rx).await, Some(TransportEvent::Error { .. })));
        assert_eq!(next_event(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_send_before_connected_is_not_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let mut factory = TcpTransportFactory::new(fast_config(false));
        let mut transport = factory.open(&addr, sink().0).unwrap();

        let result = transport.send(&Message::new(MessageId::PLAYER_CONTROL, vec![1, 0, 0]));

        assert!(matches!(result, Err(TransportError::NotOpen)));
    }

    #[tokio::test]
    async fn test_server_hangup_emits_disconnected_with_reason() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (s, mut rx) = sink();
        let mut factory = TcpTransportFactory::new(fast_config(false));
        let _transport = factory.open(&addr, s).unwrap();
        let (server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, Some(TransportEvent::Connected));

        // Act
        drop(server);

        // Assert
        assert_eq!(
            next_event(&mut rx).await,
            Some(TransportEvent::Disconnected {
                reason: "connection closed by server".to_string()
            })
        );
        assert_eq!(next_event(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_reconnecting_session_reports_connected_again() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (s, mut rx) = sink();
        let mut factory = TcpTransportFactory::new(fast_config(true));
        let transport = factory.open(&addr, s).unwrap();
        assert!(transport.reconnects());

        // Act
        let (first, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, Some(TransportEvent::Connected));
        drop(first);
        let (_second, _) = listener.accept().await.unwrap();

        // Assert
        assert!(matches!(
            next_event(&mut rx).await,
            Some(TransportEvent::Disconnected { .. })
        ));
        assert_eq!(next_event(&mut rx).await, Some(TransportEvent::Connected));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_silences_the_session() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (s, mut rx) = sink();
        let mut factory = TcpTransportFactory::new(fast_config(true));
        let mut transport = factory.open(&addr, s).unwrap();
        let (_server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, Some(TransportEvent::Connected));

        // Act
        transport.close();
        transport.close();

        // Assert – the aborted task drops its sink without emitting anything
        assert_eq!(next_event(&mut rx).await, None);
        assert!(matches!(
            transport.send(&Message::new(MessageId::PLAYER_CONTROL, vec![1, 0, 0])),
            Err(TransportError::Closed)
        ));
    }
}
