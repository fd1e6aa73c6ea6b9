//! Protocol module containing the message envelope, payload records and the frame codec.

pub mod codec;
pub mod messages;
mod payload;

pub use codec::{decode_frame, decode_header, encode_frame, FrameHeader, ProtocolError};
pub use messages::*;
