//! Infrastructure layer for the client application.
//!
//! Contains the adapters around the application layer: network transports,
//! configuration storage and the listeners a UI plugs into.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `playlink_core`, but MUST NOT be imported by the `application` layer
//! outside of tests.
//!
//! # Sub-modules
//!
//! - **`network`** – TCP transport sessions (connect, framed read loop,
//!   silent reconnect) and a recording in-memory transport for tests.
//!
//! - **`storage`** – `ClientConfig` TOML persistence in the platform config
//!   directory.
//!
//! - **`ui_bridge`** – session listeners (channel, log, fan-out) and the
//!   shared status board.

pub mod network;
pub mod storage;
pub mod ui_bridge;
