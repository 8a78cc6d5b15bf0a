// Voice session domain models.

use crate::core::errors::{Classified, ErrorKind};
use async_trait::async_trait;
use std::collections::VecDeque;
use thiserror::Error;

/// Lifecycle of a guild's voice connection.
///
/// `Disconnected -> Connecting -> Playing -> Disconnected`, plus
/// `Playing -> Playing` when a queued track follows the one that ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Playing,
}

/// A guild's single voice connection and its playback state.
///
/// Only connected sessions are stored, so an absent session is the
/// `Disconnected` state and a stored one always has a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSession {
    pub guild_id: u64,
    pub channel_id: u64,
    pub state: SessionState,
    /// Track currently requested from the player.
    pub current_track: Option<String>,
    /// Tracks waiting behind the current one.
    pub queue: VecDeque<String>,
}

impl VoiceSession {
    pub fn connecting(guild_id: u64, channel_id: u64) -> Self {
        Self {
            guild_id,
            channel_id,
            state: SessionState::Connecting,
            current_track: None,
            queue: VecDeque::new(),
        }
    }
}

/// What `play` did with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The bot joined the channel and playback started right away.
    Started { url: String },
    /// Another track is playing; this one waits at `position` (1-based).
    Queued { url: String, position: usize },
}

/// What happened after the player reported the end of a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEndOutcome {
    /// The guild had no session. Nothing to do.
    NoSession,
    /// The next queued track is now playing.
    NextTrack { url: String },
    /// The queue was empty, so the bot left the channel.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyOutcome {
    Ignored,
    Disconnected,
}

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Already connected to <#{current}> in this server, cannot join <#{requested}>")]
    ChannelConflict { current: u64, requested: u64 },

    #[error("Not connected to a voice channel in this server")]
    NotConnected,

    #[error("Voice call failed: {0}")]
    ExternalCallFailed(String),
}

impl Classified for VoiceError {
    fn kind(&self) -> ErrorKind {
        match self {
            VoiceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            VoiceError::ChannelConflict { .. } => ErrorKind::ChannelConflict,
            VoiceError::NotConnected => ErrorKind::NotFound,
            VoiceError::ExternalCallFailed(_) => ErrorKind::ExternalCallFailed,
        }
    }
}

/// Outbound voice platform calls.
///
/// Track completion is not reported through this trait: the implementation
/// delivers it to `VoiceSessionManager::on_track_end` out of band.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(&self, guild_id: u64, channel_id: u64) -> Result<(), VoiceError>;

    async fn start_track(&self, guild_id: u64, url: &str) -> Result<(), VoiceError>;

    /// End the current track early. The player still reports the track end.
    async fn stop_track(&self, guild_id: u64) -> Result<(), VoiceError>;

    async fn disconnect(&self, guild_id: u64) -> Result<(), VoiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_connecting() {
        let session = VoiceSession::connecting(1, 2);
        assert_eq!(session.state, SessionState::Connecting);
        assert!(session.current_track.is_none());
    }

    #[test]
    fn errors_classify() {
        let conflict = VoiceError::ChannelConflict {
            current: 1,
            requested: 2,
        };
        assert_eq!(conflict.kind(), ErrorKind::ChannelConflict);
        assert!(conflict.to_string().contains("<#1>"));
        assert_eq!(VoiceError::NotConnected.kind(), ErrorKind::NotFound);
    }
}
