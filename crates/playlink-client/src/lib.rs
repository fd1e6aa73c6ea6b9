//! playlink-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does playlink-client do?
//!
//! The client is a remote control for a media player running on another
//! machine.  It keeps a session with the player's server over a duplex
//! byte channel that may drop at any time:
//!
//! 1. Opens a transport to the server and waits for it to come up.
//! 2. Sends its `ClientInfo` and waits for the server's `PlayerInfo`; only
//!    then is the session *ready*.
//! 3. Mirrors the remote player's status and current track as messages
//!    arrive, and sends control requests (play, next, volume, ...) while
//!    ready.
//! 4. Reports coarse lifecycle events (connecting, connected, error) to a
//!    listener, and wipes the mirrored player state whenever the session is
//!    lost.

/// Application layer: session controller, player mirror, runtime loop.
pub mod application;

/// Infrastructure layer: TCP transport, configuration storage, UI listeners.
pub mod infrastructure;
