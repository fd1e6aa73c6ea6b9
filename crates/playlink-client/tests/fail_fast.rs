//! A fault while dispatching an inbound message must terminate the process.
//!
//! Each test re-runs its own test binary with `PLAYLINK_FAIL_FAST_CHILD` set.
//! The child builds a real runtime with the production fatal handler, drives
//! it into the fault and waits; the parent checks that the child died with
//! exit status 1 instead of carrying on.

use std::process::Command;
use std::time::Duration;

use playlink_client::application::runtime::SessionRuntime;
use playlink_client::application::session::{SessionController, SessionEvent, SessionListener};
use playlink_client::application::transport::{EventSink, TransportEvent};
use playlink_client::infrastructure::network::mock::RecordingTransportFactory;
use playlink_client::infrastructure::ui_bridge::LogListener;
use playlink_core::protocol::messages::{capabilities, ClientInfo, PlayerInfo};
use playlink_core::{Message, MessageId};
use uuid::Uuid;

const CHILD_ENV: &str = "PLAYLINK_FAIL_FAST_CHILD";

/// Exit status the child uses if the fault did not end the process.
const SURVIVED: i32 = 2;

struct PanickingListener;

impl SessionListener for PanickingListener {
    fn on_event(&mut self, event: SessionEvent) {
        if event == SessionEvent::Connected {
            panic!("listener failed on connected");
        }
    }
}

fn player_info() -> Message {
    Message::with_record(
        MessageId::PLAYER_INFO,
        &PlayerInfo {
            name: "Audacious".to_string(),
            flags: 0,
            max_rating: 0,
        },
    )
}

/// Starts a runtime with the production fatal handler, connects, hands the
/// transport's sink to `drive` and then waits long enough for any fault to
/// have ended the process.
fn run_child(listener: Box<dyn SessionListener>, drive: impl FnOnce(EventSink)) -> ! {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    rt.block_on(async {
        let factory = RecordingTransportFactory::new();
        let info = ClientInfo::new(Uuid::nil(), "fail-fast", 64, capabilities::ALL);
        let (controller, events) = SessionController::new(info, Box::new(factory.clone()), listener);
        let (runtime, handle) = SessionRuntime::new(controller, events);
        tokio::spawn(runtime.run());

        handle.connect("dev1").expect("runtime running");
        let log = factory.log();
        while log.last_sink().is_none() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        drive(log.last_sink().expect("sink"));

        tokio::time::sleep(Duration::from_secs(10)).await;
    });
    std::process::exit(SURVIVED)
}

fn assert_child_exits_with_failure(test_name: &str) {
    // Arrange
    let exe = std::env::current_exe().expect("current test binary");

    // Act
    let output = Command::new(exe)
        .args(["--exact", test_name, "--test-threads=1", "--nocapture"])
        .env(CHILD_ENV, "1")
        .output()
        .expect("spawn child test process");

    // Assert
    assert_eq!(
        output.status.code(),
        Some(1),
        "child should exit with status 1; stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_dispatch_fault_exits_process() {
    if std::env::var_os(CHILD_ENV).is_some() {
        run_child(Box::new(LogListener), |sink| {
            sink.emit(TransportEvent::Connected);
            sink.emit(TransportEvent::Message(player_info()));
            // Unknown playback state 0x7E.
            sink.emit(TransportEvent::Message(Message::new(
                MessageId::PLAYER_STATUS,
                vec![0x7E, 0x10, 0x00, 0x00],
            )));
        });
    }

    assert_child_exits_with_failure("test_dispatch_fault_exits_process");
}

#[test]
fn test_listener_panic_during_dispatch_exits_process() {
    if std::env::var_os(CHILD_ENV).is_some() {
        run_child(Box::new(PanickingListener), |sink| {
            sink.emit(TransportEvent::Connected);
            sink.emit(TransportEvent::Message(player_info()));
        });
    }

    assert_child_exits_with_failure("test_listener_panic_during_dispatch_exits_process");
}
