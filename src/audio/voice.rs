use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    driver::Bitrate,
    input::{HttpRequest, Input, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    audio::session::TrackEndSignal,
    error::{MusicError, MusicResult},
    sources::{AudioHandle, PlayableTrack},
};

/// Voice transport for one guild.
#[async_trait]
pub trait VoiceSession: Send + Sync {
    async fn connect(&self, channel: ChannelId) -> MusicResult<()>;
    async fn disconnect(&self);
    async fn is_connected(&self) -> bool;
    async fn current_channel(&self) -> Option<ChannelId>;
    /// Starts `track`, replacing whatever was playing. `on_end` must be fired
    /// once when the track finishes, is stopped, or errors.
    async fn play(&self, track: PlayableTrack, on_end: TrackEndSignal) -> MusicResult<()>;
    async fn pause(&self) -> MusicResult<()>;
    async fn resume(&self) -> MusicResult<()>;
    /// Stops the current track, if any. Stopping with nothing loaded succeeds.
    async fn stop(&self) -> MusicResult<()>;
    async fn is_playing(&self) -> bool;
    async fn is_paused(&self) -> bool;
    async fn set_volume(&self, volume: f32);
}

/// Builds the transport for a guild when its session is created.
pub trait VoiceProvider: Send + Sync {
    fn voice_for(&self, guild_id: GuildId) -> Arc<dyn VoiceSession>;
}

/// Songbird-backed provider shared by all guilds.
pub struct SongbirdProvider {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    bitrate: i32,
}

impl SongbirdProvider {
    pub fn new(manager: Arc<Songbird>, bitrate: u32) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            bitrate: i32::try_from(bitrate).unwrap_or(i32::MAX),
        }
    }
}

impl VoiceProvider for SongbirdProvider {
    fn voice_for(&self, guild_id: GuildId) -> Arc<dyn VoiceSession> {
        Arc::new(SongbirdVoice {
            manager: self.manager.clone(),
            guild_id,
            http: self.http.clone(),
            bitrate: self.bitrate,
            track: Mutex::new(None),
        })
    }
}

/// Voice transport over a songbird `Call`.
///
/// The call is looked up through the manager on every operation so a
/// disconnect made elsewhere (kick, channel delete) is seen right away.
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http: reqwest::Client,
    bitrate: i32,
    track: Mutex<Option<TrackHandle>>,
}

impl SongbirdVoice {
    fn call(&self) -> Option<Arc<Mutex<Call>>> {
        self.manager.get(self.guild_id)
    }

    fn input_for(&self, audio: AudioHandle) -> Input {
        match audio {
            AudioHandle::YtDlp(url) => YoutubeDl::new(self.http.clone(), url).into(),
            AudioHandle::Http(url) => HttpRequest::new(self.http.clone(), url).into(),
        }
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.track.lock().await;
        let info = track.as_ref()?.get_info().await.ok()?;
        Some(info.playing)
    }
}

#[async_trait]
impl VoiceSession for SongbirdVoice {
    async fn connect(&self, channel: ChannelId) -> MusicResult<()> {
        debug!("🔌 Joining channel {} in guild {}", channel, self.guild_id);
        let call = self.manager.join(self.guild_id, channel).await.map_err(|e| {
            error!("Error joining voice channel: {:?}", e);
            MusicError::Connection(e.to_string())
        })?;

        call.lock()
            .await
            .set_bitrate(Bitrate::BitsPerSecond(self.bitrate));

        info!("🔊 Connected to channel {} in guild {}", channel, self.guild_id);
        Ok(())
    }

    async fn disconnect(&self) {
        self.track.lock().await.take();
        if let Err(e) = self.manager.remove(self.guild_id).await {
            debug!("Disconnect for guild {} was a no-op: {:?}", self.guild_id, e);
        }
    }

    async fn is_connected(&self) -> bool {
        match self.call() {
            Some(call) => call.lock().await.current_connection().is_some(),
            None => false,
        }
    }

    async fn current_channel(&self) -> Option<ChannelId> {
        let call = self.call()?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::from(channel.0))
    }

    async fn play(&self, track: PlayableTrack, on_end: TrackEndSignal) -> MusicResult<()> {
        let call = self.call().ok_or(MusicError::NotConnected)?;
        let title = track.title.clone();
        let input = self.input_for(track.audio);

        let handle = call.lock().await.play_only_input(input);

        let relay = TrackEndRelay::new(on_end, self.guild_id);
        for event in [TrackEvent::End, TrackEvent::Error] {
            if let Err(e) = handle.add_event(Event::Track(event), relay.clone()) {
                error!("Could not watch {} in guild {}: {:?}", title, self.guild_id, e);
                // Without the relay nobody would ever see this track end.
                if let Err(stop_err) = handle.stop() {
                    debug!("Stopping unwatched track failed: {:?}", stop_err);
                }
                return Err(MusicError::Playback(format!("{:?}", e)));
            }
        }

        *self.track.lock().await = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> MusicResult<()> {
        let track = self.track.lock().await;
        let track = track.as_ref().ok_or_else(|| MusicError::Playback("no track loaded".to_string()))?;
        track.pause().map_err(|e| MusicError::Playback(format!("{:?}", e)))
    }

    async fn resume(&self) -> MusicResult<()> {
        let track = self.track.lock().await;
        let track = track.as_ref().ok_or_else(|| MusicError::Playback("no track loaded".to_string()))?;
        track.play().map_err(|e| MusicError::Playback(format!("{:?}", e)))
    }

    async fn stop(&self) -> MusicResult<()> {
        match self.track.lock().await.as_ref() {
            Some(track) => track.stop().map_err(|e| MusicError::Playback(format!("{:?}", e))),
            None => Ok(()),
        }
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }

    async fn set_volume(&self, volume: f32) {
        if let Some(track) = self.track.lock().await.as_ref() {
            if let Err(e) = track.set_volume(volume) {
                warn!("Could not set volume in guild {}: {:?}", self.guild_id, e);
            }
        }
    }
}

/// Forwards songbird's end/error events for one track to its session.
///
/// Registered for both `End` and `Error`; whichever arrives first fires the
/// signal, the other finds it already taken.
#[derive(Clone)]
struct TrackEndRelay {
    signal: Arc<SyncMutex<Option<TrackEndSignal>>>,
    guild_id: GuildId,
}

impl TrackEndRelay {
    fn new(signal: TrackEndSignal, guild_id: GuildId) -> Self {
        Self {
            signal: Arc::new(SyncMutex::new(Some(signal))),
            guild_id,
        }
    }
}

#[async_trait]
impl VoiceEventHandler for TrackEndRelay {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{:?}", e)),
                _ => None,
            }),
            _ => None,
        };

        let signal = self.signal.lock().take();
        if let Some(signal) = signal {
            debug!("🎵 Track ended in guild {} (error: {:?})", self.guild_id, error);
            signal.fire(error);
        }

        None
    }
}
