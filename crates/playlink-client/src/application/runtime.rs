//! SessionRuntime: the single consumer that serializes all controller access.
//!
//! The runtime owns the [`SessionController`] and waits on three sources:
//! commands from [`SessionHandle`]s, events from transports, and the
//! handshake deadline.  Exactly one of them is handled at a time, so no two
//! inbound messages (or an inbound message and an API call) ever touch the
//! controller concurrently.
//!
//! It is also the supervisor for protocol-dispatch faults.  A
//! [`DispatchFault`] returned by the controller, or a panic raised while it
//! dispatches a transport event, is logged and handed to the
//! [`FatalHandler`], which in production ends the process with status 1.
//! No other failure is fatal.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use playlink_core::protocol::messages::PlayerCommand;
use playlink_core::Message;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{error, info};

use crate::application::player_mirror::PlayerSnapshot;
use crate::application::session::{DispatchFault, SessionController};
use crate::application::transport::TransportEventReceiver;

/// Called with a dispatch fault; never returns.
pub type FatalHandler = fn(&DispatchFault) -> !;

/// Production [`FatalHandler`]: exits the process with status 1.
pub fn exit_process(fault: &DispatchFault) -> ! {
    error!("terminating: {fault}");
    std::process::exit(1)
}

/// Requests accepted by the runtime.
#[derive(Debug)]
pub enum SessionCommand {
    Connect(String),
    Disconnect,
    Send(Message),
    Control { command: PlayerCommand, param: i16 },
    Snapshot(oneshot::Sender<PlayerSnapshot>),
    /// Logoff, wait `grace`, disconnect, then stop the runtime.
    Shutdown {
        grace: Duration,
        done: oneshot::Sender<()>,
    },
}

/// The runtime is no longer accepting commands.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("session runtime has stopped")]
pub struct RuntimeStopped;

/// Event loop around one [`SessionController`].
pub struct SessionRuntime {
    controller: SessionController,
    events: TransportEventReceiver,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    ready: Arc<AtomicBool>,
    on_fatal: FatalHandler,
}

impl SessionRuntime {
    /// Wraps `controller` and the event receiver returned alongside it.
    pub fn new(controller: SessionController, events: TransportEventReceiver) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let ready = Arc::new(AtomicBool::new(controller.is_ready()));
        let handle = SessionHandle {
            commands: commands_tx,
            ready: Arc::clone(&ready),
        };
        let runtime = Self {
            controller,
            events,
            commands,
            ready,
            on_fatal: exit_process,
        };
        (runtime, handle)
    }

    /// Replaces the handler invoked on a dispatch fault.
    pub fn with_fatal_handler(mut self, handler: FatalHandler) -> Self {
        self.on_fatal = handler;
        self
    }

    /// Runs until a shutdown command arrives or every handle is dropped.
    pub async fn run(mut self) {
        info!("session runtime started");
        loop {
            let deadline = self.controller.handshake_deadline();
            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else {
                        info!("all session handles dropped");
                        self.controller.disconnect();
                        break;
                    };
                    if !self.apply(cmd).await {
                        break;
                    }
                }
                Some((id, event)) = self.events.recv() => {
                    let dispatched =
                        panic::catch_unwind(AssertUnwindSafe(|| self.controller.handle_event(id, event)))
                            .unwrap_or_else(|payload| {
                                Err(DispatchFault::Panicked(panic_message(&*payload)))
                            });
                    if let Err(fault) = dispatched {
                        error!(%id, "protocol dispatch fault: {fault}");
                        (self.on_fatal)(&fault);
                    }
                }
                () = wait_until(deadline) => self.controller.expire_handshake(),
            }
            self.ready.store(self.controller.is_ready(), Ordering::SeqCst);
        }
        self.ready.store(false, Ordering::SeqCst);
        info!("session runtime stopped");
    }

    /// Applies one command.  Returns `false` when the runtime should stop.
    async fn apply(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Connect(target) => self.controller.connect(&target),
            SessionCommand::Disconnect => self.controller.disconnect(),
            SessionCommand::Send(msg) => self.controller.send_message(&msg),
            SessionCommand::Control { command, param } => self.controller.control(command, param),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.controller.player().snapshot());
            }
            SessionCommand::Shutdown { grace, done } => {
                if self.controller.is_ready() {
                    self.controller.logoff();
                    time::sleep(grace).await;
                }
                self.controller.disconnect();
                let _ = done.send(());
                return false;
            }
        }
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cheap, clone-able front end to a running [`SessionRuntime`].
///
/// Every method returns immediately; results are observed through the
/// session listener or [`is_ready`](Self::is_ready).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    ready: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn connect(&self, target: impl Into<String>) -> Result<(), RuntimeStopped> {
        self.submit(SessionCommand::Connect(target.into()))
    }

    pub fn disconnect(&self) -> Result<(), RuntimeStopped> {
        self.submit(SessionCommand::Disconnect)
    }

    /// Queues `msg`; it is dropped by the controller unless the session is ready.
    pub fn send_message(&self, msg: Message) -> Result<(), RuntimeStopped> {
        self.submit(SessionCommand::Send(msg))
    }

    pub fn control(&self, command: PlayerCommand, param: i16) -> Result<(), RuntimeStopped> {
        self.submit(SessionCommand::Control { command, param })
    }

    /// Readiness as of the last event the runtime processed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub async fn player_snapshot(&self) -> Result<PlayerSnapshot, RuntimeStopped> {
        let (tx, rx) = oneshot::channel();
        self.submit(SessionCommand::Snapshot(tx))?;
        rx.await.map_err(|_| RuntimeStopped)
    }

    /// Logs off (if ready), waits `grace` for the logoff to leave, disconnects
    /// and stops the runtime.  Resolves once all of that is done.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeStopped> {
        let (done, rx) = oneshot::channel();
        self.submit(SessionCommand::Shutdown { grace, done })?;
        rx.await.map_err(|_| RuntimeStopped)
    }

    fn submit(&self, cmd: SessionCommand) -> Result<(), RuntimeStopped> {
        self.commands.send(cmd).map_err(|_| RuntimeStopped)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
