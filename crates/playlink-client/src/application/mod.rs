//! Application layer of the client.
//!
//! - **`transport`** – The contract a transport session must satisfy, and the
//!   tagged event type it feeds into the controller.  Concrete transports
//!   live in the infrastructure layer.
//!
//! - **`player_mirror`** – Client-side cache of the remote player's state.
//!
//! - **`session`** – The session controller: handshake state machine,
//!   readiness gate for outbound traffic, listener notifications.
//!
//! - **`runtime`** – The single-consumer event loop that serializes API
//!   calls and transport events through the controller, and terminates the
//!   process on protocol-dispatch faults.

pub mod player_mirror;
pub mod runtime;
pub mod session;
pub mod transport;
