//! # playlink-core
//!
//! Shared wire protocol for the Playlink remote control: the message
//! envelope exchanged with a media-player server, the frame codec that puts
//! it on a byte stream, and the typed payload records carried inside.
//!
//! This crate has no dependencies on sockets, async runtimes or UI code.
//!
//! # Architecture overview
//!
//! A Playlink client keeps a session with a media-player server over a
//! duplex byte channel.  Every unit of traffic is a [`Message`]: a numeric
//! [`MessageId`] plus an opaque payload.  The payload is only interpreted by
//! whoever owns that id:
//!
//! - **`protocol::messages`** – the envelope, the id space, and the payload
//!   records (client identity, player info, status, current track, control
//!   requests).
//!
//! - **`protocol::codec`** – how envelopes travel over the wire: an 8-byte
//!   header followed by the payload bytes.

pub mod protocol;

pub use protocol::codec::{decode_frame, decode_header, encode_frame, FrameHeader, ProtocolError};
pub use protocol::messages::{Message, MessageId};
