//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::sync::Notify;

use crate::{
    audio::{
        session::{PlaybackSession, PlayerState, TrackEndSignal},
        voice::{VoiceProvider, VoiceSession},
    },
    bot::context::{Announcer, CommandContext, Reply},
    error::{MusicError, MusicResult},
    sources::{MediaResolver, PlayableTrack},
};

pub fn guild() -> GuildId {
    GuildId::new(1)
}

pub fn channel() -> ChannelId {
    ChannelId::new(10)
}

pub fn other_channel() -> ChannelId {
    ChannelId::new(11)
}

pub fn user() -> UserId {
    UserId::new(100)
}

pub fn track(title: &str) -> PlayableTrack {
    PlayableTrack::new(title, format!("https://youtu.be/{}", title.to_lowercase()))
}

/// Polls until the session reaches `expected`, failing after two seconds.
pub async fn wait_for_state(session: &PlaybackSession, expected: PlayerState) {
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        while session.state().await != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "session never reached {}", expected);
}

/// Polls until the track on air has `title`.
pub async fn wait_for_title(session: &PlaybackSession, title: &str) {
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        while session.current_track().await.map(|t| t.title).as_deref() != Some(title) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "{} never started", title);
}

#[derive(Default)]
struct FakeVoiceState {
    connected: Option<ChannelId>,
    fail_connect: bool,
    fail_controls: bool,
    refuse_plays: usize,
    playing: Option<String>,
    paused: bool,
    volume: f32,
    played: Vec<String>,
    pending_end: Option<TrackEndSignal>,
    connects: usize,
}

/// Voice transport that only records what it was asked to do.
///
/// Stopping a track or replacing it fires its end signal, like songbird does.
#[derive(Default)]
pub struct FakeVoice {
    state: Mutex<FakeVoiceState>,
}

impl FakeVoice {
    pub fn connected_to(channel: ChannelId) -> Arc<Self> {
        let voice = Self::default();
        voice.state.lock().connected = Some(channel);
        Arc::new(voice)
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    /// Makes pause, resume and stop report an error and change nothing.
    pub fn fail_controls(&self, fail: bool) {
        self.state.lock().fail_controls = fail;
    }

    /// Makes `play` refuse the next `count` tracks.
    pub fn refuse_plays(&self, count: usize) {
        self.state.lock().refuse_plays = count;
    }

    /// Ends the current track as the transport would.
    pub fn finish_track(&self, error: Option<&str>) {
        let signal = {
            let mut state = self.state.lock();
            state.playing = None;
            state.paused = false;
            state.pending_end.take()
        };
        if let Some(signal) = signal {
            signal.fire(error.map(str::to_string));
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.state.lock().played.clone()
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.state.lock().connected
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }
}

#[async_trait]
impl VoiceSession for FakeVoice {
    async fn connect(&self, channel: ChannelId) -> MusicResult<()> {
        let mut state = self.state.lock();
        state.connects += 1;
        if state.fail_connect {
            return Err(MusicError::Connection("gateway refused".to_string()));
        }
        state.connected = Some(channel);
        Ok(())
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock();
        state.connected = None;
        state.playing = None;
        state.pending_end = None;
    }

    async fn is_connected(&self) -> bool {
        self.state.lock().connected.is_some()
    }

    async fn current_channel(&self) -> Option<ChannelId> {
        self.state.lock().connected
    }

    async fn play(&self, track: PlayableTrack, on_end: TrackEndSignal) -> MusicResult<()> {
        let replaced = {
            let mut state = self.state.lock();
            if state.refuse_plays > 0 {
                state.refuse_plays -= 1;
                return Err(MusicError::Playback("track handle gone".to_string()));
            }
            state.playing = Some(track.title.clone());
            state.paused = false;
            state.played.push(track.title);
            state.pending_end.replace(on_end)
        };
        if let Some(signal) = replaced {
            signal.fire(None);
        }
        Ok(())
    }

    async fn pause(&self) -> MusicResult<()> {
        let mut state = self.state.lock();
        if state.fail_controls {
            return Err(MusicError::Playback("pause refused".to_string()));
        }
        state.paused = true;
        Ok(())
    }

    async fn resume(&self) -> MusicResult<()> {
        let mut state = self.state.lock();
        if state.fail_controls {
            return Err(MusicError::Playback("resume refused".to_string()));
        }
        state.paused = false;
        Ok(())
    }

    async fn stop(&self) -> MusicResult<()> {
        if self.state.lock().fail_controls {
            return Err(MusicError::Playback("stop refused".to_string()));
        }
        self.finish_track(None);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        let state = self.state.lock();
        state.playing.is_some() && !state.paused
    }

    async fn is_paused(&self) -> bool {
        let state = self.state.lock();
        state.playing.is_some() && state.paused
    }

    async fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume;
    }
}

/// Hands out one [`FakeVoice`] per guild, kept across sessions like the
/// songbird manager keeps calls.
#[derive(Default)]
pub struct FakeProvider {
    voices: DashMap<GuildId, Arc<FakeVoice>>,
}

impl FakeProvider {
    pub fn voice(&self, guild_id: GuildId) -> Arc<FakeVoice> {
        self.voices.entry(guild_id).or_default().clone()
    }
}

impl VoiceProvider for FakeProvider {
    fn voice_for(&self, guild_id: GuildId) -> Arc<dyn VoiceSession> {
        self.voice(guild_id)
    }
}

/// Resolver that blocks on the queries listed in `held` until released, and
/// resolves everything else right away. Titles are the query upper-cased.
#[derive(Default)]
pub struct GatedResolver {
    held: Mutex<HashSet<String>>,
    release: Notify,
}

impl GatedResolver {
    pub fn holding(queries: &[&str]) -> Self {
        let resolver = Self::default();
        resolver
            .held
            .lock()
            .extend(queries.iter().map(|q| q.to_string()));
        resolver
    }

    pub fn release_all(&self) {
        self.held.lock().clear();
        self.release.notify_waiters();
    }

    async fn resolve(&self, query: &str) -> MusicResult<PlayableTrack> {
        loop {
            let notified = self.release.notified();
            if !self.held.lock().contains(query) {
                break;
            }
            notified.await;
        }
        Ok(track(&query.to_uppercase()))
    }
}

#[async_trait]
impl MediaResolver for GatedResolver {
    async fn resolve_url(&self, url: &str) -> MusicResult<PlayableTrack> {
        self.resolve(url).await
    }

    async fn resolve_search(&self, terms: &str) -> MusicResult<PlayableTrack> {
        self.resolve(terms).await
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    messages: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Command context that records replies instead of sending them.
pub struct RecordingContext {
    guild: Option<GuildId>,
    voice_channel: Option<ChannelId>,
    replies: Mutex<Vec<Reply>>,
    announcer: Arc<RecordingAnnouncer>,
}

impl RecordingContext {
    pub fn in_voice(guild: GuildId, channel: ChannelId) -> Self {
        Self::new(Some(guild), Some(channel))
    }

    pub fn in_guild(guild: GuildId) -> Self {
        Self::new(Some(guild), None)
    }

    pub fn direct_message() -> Self {
        Self::new(None, None)
    }

    fn new(guild: Option<GuildId>, voice_channel: Option<ChannelId>) -> Self {
        Self {
            guild,
            voice_channel,
            replies: Mutex::new(Vec::new()),
            announcer: Arc::new(RecordingAnnouncer::default()),
        }
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().clone()
    }

    /// Returns the replies recorded so far and forgets them.
    pub fn take_replies(&self) -> Vec<Reply> {
        std::mem::take(&mut *self.replies.lock())
    }

    pub fn announcements(&self) -> Vec<String> {
        self.announcer.messages()
    }
}

#[async_trait]
impl CommandContext for RecordingContext {
    fn requester(&self) -> UserId {
        user()
    }

    fn session_key(&self) -> Option<GuildId> {
        self.guild
    }

    fn requester_channel(&self) -> Option<ChannelId> {
        self.voice_channel
    }

    async fn reply(&self, reply: Reply) {
        self.replies.lock().push(reply);
    }

    async fn start_typing(&self) {}

    fn announcer(&self) -> Arc<dyn Announcer> {
        self.announcer.clone()
    }
}
