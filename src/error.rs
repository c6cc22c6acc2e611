use serenity::model::id::ChannelId;
use thiserror::Error;

use crate::audio::session::PlayerState;

pub type MusicResult<T> = std::result::Result<T, MusicError>;

/// Errors raised by the queue, the playback sessions and the command layer.
///
/// None of these are fatal to the process: every variant ends up as exactly one
/// reply to the user through [`MusicError::user_message`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MusicError {
    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("queue is empty")]
    EmptyQueue,

    #[error("already connected to channel {channel}")]
    ChannelMismatch { channel: ChannelId },

    #[error("could not resolve `{query}`: {reason}")]
    Resolution { query: String, reason: String },

    #[error("voice connection failed: {0}")]
    Connection(String),

    /// The transport refused a playback control (start, pause, resume, stop).
    #[error("playback control failed: {0}")]
    Playback(String),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: PlayerState,
    },

    #[error("command used outside of a server")]
    NotInGuild,

    #[error("requester is not in a voice channel")]
    NotInVoiceChannel,

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
}

impl MusicError {
    pub fn resolution(query: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            query: query.into(),
            reason: reason.to_string(),
        }
    }

    /// Text sent back to the channel the command came from.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConnected => "❌ Bot is not connected to a voice channel.".to_string(),
            Self::EmptyQueue => "📭 Queue is empty.".to_string(),
            Self::ChannelMismatch { channel } => format!(
                "❌ Bot is in a different channel: <#{}>. Please join the same channel.",
                channel
            ),
            Self::Resolution { query, .. } => format!("❌ Failed to play `{}`.", query),
            Self::Connection(_) => "❌ Failed to connect to the voice channel.".to_string(),
            Self::Playback(_) => "❌ The voice connection refused the playback command.".to_string(),
            Self::InvalidState { operation, .. } => match *operation {
                "resume" => "Playback is not paused.".to_string(),
                "volume" => "❌ Nothing is currently playing.".to_string(),
                _ => "Nothing is currently playing.".to_string(),
            },
            Self::NotInGuild => "❌ This command can only be used in a server.".to_string(),
            Self::NotInVoiceChannel => {
                "❌ You must be connected to a voice channel to use this command.".to_string()
            }
            Self::MissingArgument("song") => {
                "❌ Please provide a valid song name or URL.".to_string()
            }
            Self::MissingArgument("volume") => {
                "❌ Please provide a volume percentage, e.g. `volume 50`.".to_string()
            }
            Self::MissingArgument(name) => format!("❌ Missing argument: {}", name),
        }
    }
}
