use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    audio::{
        session::{PlaybackSession, TrackEnd},
        voice::VoiceProvider,
    },
    error::{MusicError, MusicResult},
    sources::MediaResolver,
};

/// Guild id to playback session. The only state shared across guilds.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<PlaybackSession>>,
    voice: Arc<dyn VoiceProvider>,
    resolver: Arc<dyn MediaResolver>,
    default_volume: f32,
}

impl SessionRegistry {
    pub fn new(
        voice: Arc<dyn VoiceProvider>,
        resolver: Arc<dyn MediaResolver>,
        default_volume: f32,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            voice,
            resolver,
            default_volume,
        }
    }

    /// Returns the guild's session, creating an idle one on first use.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<PlaybackSession> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                let (session, events) = PlaybackSession::new(
                    guild_id,
                    self.voice.voice_for(guild_id),
                    self.resolver.clone(),
                    self.default_volume,
                );
                let session = Arc::new(session);
                spawn_track_end_worker(&session, events);
                info!("🆕 Created playback session for guild {}", guild_id);
                session
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Drops the guild's session. Removing a missing session is a no-op.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        let removed = self.sessions.remove(&guild_id).map(|(_, session)| session);
        if removed.is_some() {
            debug!("Removed playback session for guild {}", guild_id);
        }
        removed
    }

    /// `stop`: disconnects the guild's session and forgets it.
    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<()> {
        let session = self.get(guild_id).ok_or(MusicError::NotConnected)?;
        let result = session.stop().await;
        if result.is_ok() {
            self.remove(guild_id);
        }
        result
    }

    /// The transport went away without a `stop` (kicked, channel deleted).
    ///
    /// A late leave event for a call that was already replaced by a fresh
    /// `play` finds the transport connected again and is ignored.
    pub async fn handle_disconnect(&self, guild_id: GuildId) {
        let Some(session) = self.get(guild_id) else {
            return;
        };
        if session.is_connected().await {
            debug!("Ignoring stale disconnect for guild {}", guild_id);
            return;
        }

        if self
            .sessions
            .remove_if(&guild_id, |_, current| Arc::ptr_eq(current, &session))
            .is_some()
        {
            session.shutdown().await;
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Drains a session's track-end events one at a time.
///
/// Holds only a weak reference so a removed session is freed even while the
/// transport still owns a signal.
fn spawn_track_end_worker(
    session: &Arc<PlaybackSession>,
    mut events: mpsc::UnboundedReceiver<TrackEnd>,
) {
    let session = Arc::downgrade(session);
    tokio::spawn(async move {
        while let Some(end) = events.recv().await {
            let Some(session) = session.upgrade() else {
                break;
            };
            session.handle_track_end(end).await;
        }
    });
}
