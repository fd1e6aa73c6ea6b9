//! PlayerMirror: client-side cache of the remote player's state.
//!
//! The mirror is authoritative only between handshake completion and the
//! next reset.  The session controller resets it whenever the session is
//! lost so a UI never shows stale state as if it were live.
//!
//! The mirror never talks to the transport.  Control requests are built here
//! (so they can be validated against what the player advertised) and handed
//! back to the controller, which sends them through its readiness gate.

use playlink_core::protocol::messages::{
    ControlRequest, PayloadRecord, PlaybackState, PlayerCommand, PlayerInfo, PlayerStatus,
    TrackInfo,
};
use playlink_core::{Message, MessageId, ProtocolError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Last known state of the remote player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerMirror {
    info: Option<PlayerInfo>,
    status: PlayerStatus,
    track: Option<TrackInfo>,
}

/// Serializable snapshot of the mirror for a UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Player name, `None` while no session is established.
    pub player: Option<String>,
    pub state: PlaybackState,
    pub volume: u8,
    pub repeat: bool,
    pub shuffle: bool,
    pub track: Option<TrackInfo>,
}

impl PlayerMirror {
    /// Creates a mirror in the unknown state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self) -> Option<&PlayerInfo> {
        self.info.as_ref()
    }

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn track(&self) -> Option<&TrackInfo> {
        self.track.as_ref()
    }

    /// Returns `true` once player info has been received since the last reset.
    pub fn is_known(&self) -> bool {
        self.info.is_some()
    }

    /// Clears everything back to the unknown state.  Idempotent.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Replaces the player description with the handshake payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the payload is not a valid `PlayerInfo`;
    /// the mirror is left unchanged in that case.
    pub fn apply_player_info(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let info = PlayerInfo::decode(payload)?;
        debug!(player = %info.name, flags = info.flags, "player info updated");
        self.info = Some(info);
        Ok(())
    }

    /// Interprets a forwarded player message.  Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if a known id carries a malformed payload.
    pub fn handle_message(&mut self, msg: &Message) -> Result<(), ProtocolError> {
        match msg.id {
            MessageId::PLAYER_STATUS => {
                self.status = msg.decode_record()?;
                debug!(state = ?self.status.state, volume = self.status.volume, "status updated");
            }
            MessageId::PLAYER_TRACK => {
                let track: TrackInfo = msg.decode_record()?;
                debug!(title = %track.title, "track updated");
                self.track = Some(track);
            }
            other => debug!("ignoring message {other} not handled by the player"),
        }
        Ok(())
    }

    /// Builds a control request, clamping parameters to what the player accepts.
    ///
    /// Volume is clamped to 0–100 and rating to the advertised maximum.
    pub fn control_request(&self, command: PlayerCommand, param: i16) -> ControlRequest {
        let param = match command {
            PlayerCommand::Volume => param.clamp(0, 100),
            PlayerCommand::Rate => {
                let max = self.info.as_ref().map_or(0, |i| i16::from(i.max_rating));
                param.clamp(0, max)
            }
            _ => param,
        };
        ControlRequest { command, param }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            player: self.info.as_ref().map(|i| i.name.clone()),
            state: self.status.state,
            volume: self.status.volume,
            repeat: self.status.repeat,
            shuffle: self.status.shuffle,
            track: self.track.clone(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn player_info_payload(name: &str, max_rating: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        PlayerInfo {
            name: name.to_string(),
            flags: 0,
            max_rating,
        }
        .encode_into(&mut buf);
        buf
    }

    fn status_message(state: PlaybackState, volume: u8) -> Message {
        Message::with_record(
            MessageId::PLAYER_STATUS,
            &PlayerStatus {
                state,
                volume,
                repeat: true,
                shuffle: false,
            },
        )
    }

    #[test]
    fn test_new_mirror_is_unknown() {
        let mirror = PlayerMirror::new();
        assert!(!mirror.is_known());
        assert_eq!(mirror.status().state, PlaybackState::Unknown);
        assert!(mirror.track().is_none());
    }

    #[test]
    fn test_apply_player_info_makes_mirror_known() {
        // Arrange
        let mut mirror = PlayerMirror::new();

        // Act
        mirror.apply_player_info(&player_info_payload("Rhythmbox", 5)).unwrap();

        // Assert
        assert!(mirror.is_known());
        assert_eq!(mirror.info().unwrap().name, "Rhythmbox");
    }

    #[test]
    fn test_malformed_player_info_leaves_mirror_unchanged() {
        // Arrange
        let mut mirror = PlayerMirror::new();
        mirror.apply_player_info(&player_info_payload("XMMS", 0)).unwrap();
        let before = mirror.clone();

        // Act
        let result = mirror.apply_player_info(&[0x00]);

        // Assert
        assert!(result.is_err());
        assert_eq!(mirror, before);
    }

    #[test]
    fn test_handle_status_message_updates_status() {
        // Arrange
        let mut mirror = PlayerMirror::new();

        // Act
        mirror.handle_message(&status_message(PlaybackState::Play, 40)).unwrap();

        // Assert
        assert_eq!(mirror.status().state, PlaybackState::Play);
        assert_eq!(mirror.status().volume, 40);
        assert!(mirror.status().repeat);
    }

    #[test]
    fn test_handle_track_message_updates_track() {
        let mut mirror = PlayerMirror::new();
        let track = TrackInfo {
            title: "Windowlicker".to_string(),
            ..TrackInfo::default()
        };

        mirror
            .handle_message(&Message::with_record(MessageId::PLAYER_TRACK, &track))
            .unwrap();

        assert_eq!(mirror.track(), Some(&track));
    }

    #[test]
    fn test_unknown_message_id_is_ignored() {
        // Arrange
        let mut mirror = PlayerMirror::new();

        // Act
        let result = mirror.handle_message(&Message::new(MessageId(0x0999), vec![1, 2, 3]));

        // Assert
        assert!(result.is_ok());
        assert_eq!(mirror, PlayerMirror::new());
    }

    #[test]
    fn test_malformed_status_payload_is_an_error() {
        let mut mirror = PlayerMirror::new();
        let result = mirror.handle_message(&Message::new(MessageId::PLAYER_STATUS, vec![0x02]));
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_reset_returns_to_constructed_state_and_is_idempotent() {
        // Arrange
        let mut mirror = PlayerMirror::new();
        mirror.apply_player_info(&player_info_payload("mpd", 0)).unwrap();
        mirror.handle_message(&status_message(PlaybackState::Pause, 10)).unwrap();

        // Act
        mirror.reset();
        mirror.reset();

        // Assert
        assert_eq!(mirror, PlayerMirror::new());
    }

    #[test]
    fn test_control_request_clamps_volume() {
        let mirror = PlayerMirror::new();
        assert_eq!(mirror.control_request(PlayerCommand::Volume, 150).param, 100);
        assert_eq!(mirror.control_request(PlayerCommand::Volume, -5).param, 0);
    }

    #[test]
    fn test_control_request_clamps_rating_to_player_maximum() {
        // Arrange
        let mut mirror = PlayerMirror::new();
        mirror.apply_player_info(&player_info_payload("Banshee", 5)).unwrap();

        // Act
        let request = mirror.control_request(PlayerCommand::Rate, 9);

        // Assert
        assert_eq!(request.param, 5);
    }

    #[test]
    fn test_control_request_passes_seek_through() {
        let request = PlayerMirror::new().control_request(PlayerCommand::Seek, -15);
        assert_eq!(request.command, PlayerCommand::Seek);
        assert_eq!(request.param, -15);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        // Arrange
        let mut mirror = PlayerMirror::new();
        mirror.apply_player_info(&player_info_payload("Totem", 0)).unwrap();
        mirror.handle_message(&status_message(PlaybackState::Stop, 55)).unwrap();

        // Act
        let snap = mirror.snapshot();

        // Assert
        assert_eq!(snap.player.as_deref(), Some("Totem"));
        assert_eq!(snap.state, PlaybackState::Stop);
        assert_eq!(snap.volume, 55);
        assert!(snap.track.is_none());
    }
}
