//! The message envelope and all payload records of the Playlink protocol.
//!
//! A [`Message`] is a numeric [`MessageId`] plus an opaque payload.  The
//! envelope never looks inside the payload; the component that owns an id
//! decodes it with the matching [`PayloadRecord`].
//!
//! # Id space
//!
//! | Range            | Purpose                                        |
//! |------------------|------------------------------------------------|
//! | `0x0001–0x000F`  | Handshake (client info, player info, server down) |
//! | `0x0010–0xFFFF`  | Player state and control, forwarded verbatim   |
//!
//! Transport lifecycle notifications (connected, disconnected, error) are not
//! part of this id space.  They are produced locally by the client and never
//! travel over the wire.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::codec::ProtocolError;
use crate::protocol::payload::{
    read_bool, read_i16, read_length_prefixed_string, read_u16, read_u32, read_u8, read_uuid,
    require_len, write_bool, write_length_prefixed_string,
};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a frame may carry.
pub const MAX_PAYLOAD_LEN: usize = 1 << 20;

// ── Message ids ───────────────────────────────────────────────────────────────

/// Identifies the payload type of a [`Message`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u16);

impl MessageId {
    /// Client identity, sent once per handshake.
    pub const CLIENT_INFO: MessageId = MessageId(0x0001);
    /// Player description; completes the handshake.
    pub const PLAYER_INFO: MessageId = MessageId(0x0002);
    /// The server is shutting down.  Empty payload.
    pub const SERVER_DOWN: MessageId = MessageId(0x0003);
    /// Playback state, volume and flags.
    pub const PLAYER_STATUS: MessageId = MessageId(0x0010);
    /// The currently playing track.
    pub const PLAYER_TRACK: MessageId = MessageId(0x0011);
    /// Outbound control request (play, next, logoff, ...).
    pub const PLAYER_CONTROL: MessageId = MessageId(0x0020);

    /// Returns `true` for ids reserved for the handshake.
    pub fn is_handshake(self) -> bool {
        (0x0001..0x0010).contains(&self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// A protocol message: an id and an opaque serialized payload.
///
/// Messages double as reusable scratch buffers: [`Message::reset`] and
/// [`Message::set_record`] keep the payload allocation so a sender can build
/// one outbound message after another without reallocating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates a message from an id and raw payload bytes.
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    /// Creates a message whose payload is the encoding of `record`.
    pub fn with_record<R: PayloadRecord>(id: MessageId, record: &R) -> Self {
        let mut msg = Self::default();
        msg.set_record(id, record);
        msg
    }

    /// Clears the payload (keeping its capacity) and assigns a new id.
    pub fn reset(&mut self, id: MessageId) {
        self.id = id;
        self.payload.clear();
    }

    /// Replaces id and payload with the encoding of `record`.
    pub fn set_record<R: PayloadRecord>(&mut self, id: MessageId, record: &R) {
        self.reset(id);
        record.encode_into(&mut self.payload);
    }

    /// Decodes the payload as `R`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] if the payload is not a
    /// valid encoding of `R`.
    pub fn decode_record<R: PayloadRecord>(&self) -> Result<R, ProtocolError> {
        R::decode(&self.payload)
    }
}

/// A typed value that can be carried as a [`Message`] payload.
pub trait PayloadRecord: Sized {
    /// Appends the encoded record to `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>);

    /// Decodes a record from a complete payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the payload is truncated or a field value
    /// is out of range.
    fn decode(payload: &[u8]) -> Result<Self, ProtocolError>;
}

// ── Client info ───────────────────────────────────────────────────────────────

/// Capability bitmask flags used in [`ClientInfo::capabilities`].
pub mod capabilities {
    pub const PLAYBACK_CONTROL: u32 = 1 << 0;
    pub const VOLUME: u32 = 1 << 1;
    pub const RATING: u32 = 1 << 2;
    pub const ARTWORK: u32 = 1 << 3;
    pub const SEEK: u32 = 1 << 4;

    /// Everything this client implementation understands.
    pub const ALL: u32 = PLAYBACK_CONTROL | VOLUME | RATING | ARTWORK | SEEK;
}

/// Static identity and capabilities of this client.
///
/// Built once from configuration and sent to the server at the start of
/// every handshake.  Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    client_id: Uuid,
    protocol_version: u8,
    name: String,
    image_size: u16,
    capabilities: u32,
}

impl ClientInfo {
    /// Creates a client info record for the current protocol version.
    pub fn new(client_id: Uuid, name: impl Into<String>, image_size: u16, capabilities: u32) -> Self {
        Self {
            client_id,
            protocol_version: PROTOCOL_VERSION,
            name: name.into(),
            image_size,
            capabilities,
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Edge length in pixels of the largest artwork the client can show.
    pub fn image_size(&self) -> u16 {
        self.image_size
    }

    pub fn capabilities(&self) -> u32 {
        self.capabilities
    }
}

impl PayloadRecord for ClientInfo {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.client_id.as_bytes());
        buf.push(self.protocol_version);
        write_length_prefixed_string(buf, &self.name);
        buf.extend_from_slice(&self.image_size.to_be_bytes());
        buf.extend_from_slice(&self.capabilities.to_be_bytes());
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        // 16 (uuid) + 1 (version) + 2 (name_len) + name + 2 (image) + 4 (caps)
        require_len(p, 25, "ClientInfo")?;
        let (client_id, off) = read_uuid(p, 0, "ClientInfo.client_id")?;
        let (protocol_version, off) = read_u8(p, off, "ClientInfo.protocol_version")?;
        let (name, off) = read_length_prefixed_string(p, off, "ClientInfo.name")?;
        let (image_size, off) = read_u16(p, off, "ClientInfo.image_size")?;
        let (capabilities, _) = read_u32(p, off, "ClientInfo.capabilities")?;
        Ok(Self {
            client_id,
            protocol_version,
            name,
            image_size,
            capabilities,
        })
    }
}

// ── Player info ───────────────────────────────────────────────────────────────

/// Feature flags advertised in [`PlayerInfo::flags`].
pub mod player_flags {
    pub const CAN_SEEK: u32 = 1 << 0;
    pub const CAN_RATE: u32 = 1 << 1;
    pub const HAS_PLAYLIST: u32 = 1 << 2;
    pub const HAS_ARTWORK: u32 = 1 << 3;
}

/// Description of the remote player, sent by the server to complete the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Display name of the player application.
    pub name: String,
    /// Bitmask of [`player_flags`].
    pub flags: u32,
    /// Highest rating value the player accepts; 0 if rating is unsupported.
    pub max_rating: u8,
}

impl PlayerInfo {
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

impl PayloadRecord for PlayerInfo {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_length_prefixed_string(buf, &self.name);
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.push(self.max_rating);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        // 2 (name_len) + name + 4 (flags) + 1 (max_rating)
        require_len(p, 7, "PlayerInfo")?;
        let (name, off) = read_length_prefixed_string(p, 0, "PlayerInfo.name")?;
        let (flags, off) = read_u32(p, off, "PlayerInfo.flags")?;
        let (max_rating, _) = read_u8(p, off, "PlayerInfo.max_rating")?;
        Ok(Self {
            name,
            flags,
            max_rating,
        })
    }
}

// ── Player status ─────────────────────────────────────────────────────────────

/// Playback state of the remote player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlaybackState {
    #[default]
    Unknown = 0x00,
    Stop = 0x01,
    Play = 0x02,
    Pause = 0x03,
    /// The player application is not running.
    Off = 0x04,
    /// The player reported an error.
    Error = 0x05,
    /// The server side of the remote control is not running.
    ServerOff = 0x06,
}

impl TryFrom<u8> for PlaybackState {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x00 => Ok(PlaybackState::Unknown),
            0x01 => Ok(PlaybackState::Stop),
            0x02 => Ok(PlaybackState::Play),
            0x03 => Ok(PlaybackState::Pause),
            0x04 => Ok(PlaybackState::Off),
            0x05 => Ok(PlaybackState::Error),
            0x06 => Ok(PlaybackState::ServerOff),
            _ => Err(()),
        }
    }
}

/// PLAYER_STATUS (0x0010): playback state, volume and play-order flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    /// Volume in percent, 0–100.
    pub volume: u8,
    pub repeat: bool,
    pub shuffle: bool,
}

impl PayloadRecord for PlayerStatus {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.state as u8);
        buf.push(self.volume);
        write_bool(buf, self.repeat);
        write_bool(buf, self.shuffle);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, 4, "PlayerStatus")?;
        let state = PlaybackState::try_from(p[0])
            .map_err(|_| ProtocolError::MalformedPayload(format!("unknown playback state: {}", p[0])))?;
        let volume = p[1];
        if volume > 100 {
            return Err(ProtocolError::MalformedPayload(format!(
                "volume out of range: {volume}"
            )));
        }
        let (repeat, off) = read_bool(p, 2, "PlayerStatus.repeat")?;
        let (shuffle, _) = read_bool(p, off, "PlayerStatus.shuffle")?;
        Ok(Self {
            state,
            volume,
            repeat,
            shuffle,
        })
    }
}

// ── Current track ─────────────────────────────────────────────────────────────

/// PLAYER_TRACK (0x0011): metadata of the currently playing track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Player-specific track identifier.
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Track length in seconds; 0 if unknown.
    pub length_secs: u32,
    pub rating: u8,
}

impl PayloadRecord for TrackInfo {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_length_prefixed_string(buf, &self.id);
        write_length_prefixed_string(buf, &self.title);
        write_length_prefixed_string(buf, &self.artist);
        write_length_prefixed_string(buf, &self.album);
        buf.extend_from_slice(&self.length_secs.to_be_bytes());
        buf.push(self.rating);
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        // 4 × 2 (string lengths) + 4 (length) + 1 (rating)
        require_len(p, 13, "TrackInfo")?;
        let (id, off) = read_length_prefixed_string(p, 0, "TrackInfo.id")?;
        let (title, off) = read_length_prefixed_string(p, off, "TrackInfo.title")?;
        let (artist, off) = read_length_prefixed_string(p, off, "TrackInfo.artist")?;
        let (album, off) = read_length_prefixed_string(p, off, "TrackInfo.album")?;
        let (length_secs, off) = read_u32(p, off, "TrackInfo.length_secs")?;
        let (rating, _) = read_u8(p, off, "TrackInfo.rating")?;
        Ok(Self {
            id,
            title,
            artist,
            album,
            length_secs,
            rating,
        })
    }
}

// ── Control requests ──────────────────────────────────────────────────────────

/// Commands a client can ask the remote player to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlayerCommand {
    PlayPause = 0x01,
    Stop = 0x02,
    Next = 0x03,
    Previous = 0x04,
    /// Jump to the playlist position given as parameter.
    Jump = 0x05,
    /// Seek by the number of seconds given as parameter (may be negative).
    Seek = 0x06,
    /// Set the volume to the percentage given as parameter.
    Volume = 0x07,
    Rate = 0x08,
    Repeat = 0x09,
    Shuffle = 0x0A,
    /// The client is going away; the server may release per-client resources.
    Logoff = 0x7F,
}

impl TryFrom<u8> for PlayerCommand {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(PlayerCommand::PlayPause),
            0x02 => Ok(PlayerCommand::Stop),
            0x03 => Ok(PlayerCommand::Next),
            0x04 => Ok(PlayerCommand::Previous),
            0x05 => Ok(PlayerCommand::Jump),
            0x06 => Ok(PlayerCommand::Seek),
            0x07 => Ok(PlayerCommand::Volume),
            0x08 => Ok(PlayerCommand::Rate),
            0x09 => Ok(PlayerCommand::Repeat),
            0x0A => Ok(PlayerCommand::Shuffle),
            0x7F => Ok(PlayerCommand::Logoff),
            _ => Err(()),
        }
    }
}

/// PLAYER_CONTROL (0x0020): a command plus its numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub command: PlayerCommand,
    pub param: i16,
}

impl PayloadRecord for ControlRequest {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.command as u8);
        buf.extend_from_slice(&self.param.to_be_bytes());
    }

    fn decode(p: &[u8]) -> Result<Self, ProtocolError> {
        require_len(p, 3, "ControlRequest")?;
        let command = PlayerCommand::try_from(p[0])
            .map_err(|_| ProtocolError::MalformedPayload(format!("unknown player command: {}", p[0])))?;
        let (param, _) = read_i16(p, 1, "ControlRequest.param")?;
        Ok(Self { command, param })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
