use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, sync::Arc};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::{PlaybackRequest, RequestKind, RequestQueue},
        voice::VoiceSession,
    },
    bot::context::Announcer,
    error::{MusicError, MusicResult},
    sources::{MediaResolver, PlayableTrack},
};

/// Lifecycle of a guild's player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    /// Joining the voice channel or resolving the next item.
    Connecting,
    Playing,
    Paused,
    /// Terminal. The session has been torn down.
    Disconnected,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlayerState::Idle => "idle",
            PlayerState::Connecting => "connecting",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Disconnected => "disconnected",
        })
    }
}

/// The item currently on air. Present iff the state is `Playing` or `Paused`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentTrack {
    pub title: String,
    /// 1.0 is unity gain.
    pub volume: f32,
    pub request: PlaybackRequest,
}

/// "Track ended" event sent by the transport back to its session.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEnd {
    pub generation: u64,
    /// `None` when the track finished or was stopped, the error text otherwise.
    pub error: Option<String>,
}

/// One-shot completion handle handed to the transport with each track.
#[derive(Debug)]
pub struct TrackEndSignal {
    generation: u64,
    events: mpsc::UnboundedSender<TrackEnd>,
}

impl TrackEndSignal {
    pub fn fire(self, error: Option<String>) {
        let end = TrackEnd {
            generation: self.generation,
            error,
        };
        if self.events.send(end).is_err() {
            debug!("Session dropped before track end was delivered");
        }
    }
}

/// Result of adding a request through `play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Nothing was playing and nothing was waiting: the caller should advance.
    PlayNow,
    Queued { position: usize },
}

struct SessionInner {
    state: PlayerState,
    queue: RequestQueue,
    current: Option<CurrentTrack>,
    channel: Option<ChannelId>,
    /// Set while an item is being resolved; cancelling it abandons that item.
    resolving: Option<CancellationToken>,
    /// Bumped for every item taken off the queue and on teardown. Track ends
    /// carrying an older value are ignored.
    generation: u64,
    announcer: Option<Arc<dyn Announcer>>,
}

impl SessionInner {
    fn queued(&self) -> Vec<&str> {
        self.queue.snapshot().map(|r| r.query()).collect()
    }
}

/// One guild's queue and player.
///
/// Every mutation of the queue or the state goes through `inner`, so command
/// handlers and the track-end worker never interleave. Resolution is awaited
/// with the lock released; `skip` and `stop` cancel it through the token.
pub struct PlaybackSession {
    guild_id: GuildId,
    voice: Arc<dyn VoiceSession>,
    resolver: Arc<dyn MediaResolver>,
    default_volume: f32,
    events: mpsc::UnboundedSender<TrackEnd>,
    inner: Mutex<SessionInner>,
}

impl PlaybackSession {
    /// Creates an idle session. The receiver carries track-end events and must
    /// be drained into [`PlaybackSession::handle_track_end`].
    pub fn new(
        guild_id: GuildId,
        voice: Arc<dyn VoiceSession>,
        resolver: Arc<dyn MediaResolver>,
        default_volume: f32,
    ) -> (Self, mpsc::UnboundedReceiver<TrackEnd>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            guild_id,
            voice,
            resolver,
            default_volume,
            events,
            inner: Mutex::new(SessionInner {
                state: PlayerState::Idle,
                queue: RequestQueue::new(),
                current: None,
                channel: None,
                resolving: None,
                generation: 0,
                announcer: None,
            }),
        };
        (session, receiver)
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Whether the voice transport currently holds a connection.
    pub async fn is_connected(&self) -> bool {
        self.voice.is_connected().await
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn current_track(&self) -> Option<CurrentTrack> {
        self.inner.lock().await.current.clone()
    }

    /// Copy of the pending requests, front first.
    pub async fn queued(&self) -> Vec<PlaybackRequest> {
        self.inner.lock().await.queue.snapshot().cloned().collect()
    }

    /// Makes sure the transport sits in `channel`, joining it if needed.
    pub async fn ensure_connected(&self, channel: ChannelId) -> MusicResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Disconnected {
            return Err(MusicError::NotConnected);
        }

        if self.voice.is_connected().await {
            let current = self.voice.current_channel().await.or(inner.channel);
            if let Some(current) = current.filter(|current| *current != channel) {
                return Err(MusicError::ChannelMismatch { channel: current });
            }
            inner.channel = Some(channel);
            debug!("Already connected to the right channel in guild {}", self.guild_id);
            return Ok(());
        }

        // The transport dropped without telling us; whatever was on air is gone.
        if inner.current.take().is_some() {
            inner.generation += 1;
        }
        inner.state = PlayerState::Connecting;

        match self.voice.connect(channel).await {
            Ok(()) => {
                inner.channel = Some(channel);
                inner.state = if inner.resolving.is_some() {
                    PlayerState::Connecting
                } else {
                    PlayerState::Idle
                };
                info!("🔊 Session for guild {} joined channel {}", self.guild_id, channel);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to connect in guild {}: {}", self.guild_id, e);
                inner.channel = None;
                inner.state = PlayerState::Idle;
                Err(e)
            }
        }
    }

    /// `play` path: queues the request and reports whether it should start now.
    ///
    /// Starts immediately only when nothing is on air and nothing was waiting.
    pub async fn enqueue_play(
        &self,
        request: PlaybackRequest,
        announcer: Arc<dyn Announcer>,
    ) -> MusicResult<Enqueued> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Disconnected {
            return Err(MusicError::NotConnected);
        }
        inner.announcer = Some(announcer);

        let play_now = inner.state == PlayerState::Idle && inner.queue.is_empty();
        inner.queue.enqueue(request);
        debug!("Queue state after adding: {:?}", inner.queued());

        Ok(if play_now {
            Enqueued::PlayNow
        } else {
            Enqueued::Queued {
                position: inner.queue.len(),
            }
        })
    }

    /// `queue add` path: appends without starting playback.
    pub async fn enqueue(&self, request: PlaybackRequest) -> MusicResult<usize> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Disconnected {
            return Err(MusicError::NotConnected);
        }
        info!(
            "➕ Added to queue in guild {}: {} (by {} at {})",
            self.guild_id,
            request,
            request.requested_by(),
            request.requested_at().format("%H:%M:%S")
        );
        inner.queue.enqueue(request);
        Ok(inner.queue.len())
    }

    /// Empties the queue. The track on air keeps playing.
    pub async fn clear_queue(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let removed = inner.queue.len();
        inner.queue.clear();
        info!("🗑️ Queue cleared in guild {} ({} items)", self.guild_id, removed);
        removed
    }

    /// Plays the next queued item.
    ///
    /// Items that fail to resolve are reported and dropped, and the next one is
    /// tried straight away. Returns once something is playing, the queue is
    /// empty, or the session is gone.
    pub async fn advance(&self) {
        loop {
            let (request, token, generation) = {
                let mut inner = self.inner.lock().await;
                if inner.state == PlayerState::Disconnected {
                    return;
                }
                if inner.resolving.is_some() || inner.current.is_some() {
                    debug!("Guild {} already has an item in flight", self.guild_id);
                    return;
                }
                if !self.voice.is_connected().await {
                    warn!("Guild {} tried to play next but is not connected", self.guild_id);
                    inner.state = PlayerState::Idle;
                    return;
                }

                debug!("Queue state before playing next: {:?}", inner.queued());
                let request = match inner.queue.dequeue_front() {
                    Ok(request) => request,
                    Err(_) => {
                        info!("📭 Queue is empty in guild {}", self.guild_id);
                        inner.state = PlayerState::Idle;
                        return;
                    }
                };

                inner.generation += 1;
                let token = CancellationToken::new();
                inner.resolving = Some(token.clone());
                inner.state = PlayerState::Connecting;
                (request, token, inner.generation)
            };

            let resolved = tokio::select! {
                _ = token.cancelled() => None,
                result = self.resolve(&request) => Some(result),
            };

            let mut inner = self.inner.lock().await;
            if inner.state == PlayerState::Disconnected || inner.generation != generation {
                debug!("Dropping resolution of {} after teardown", request);
                return;
            }
            inner.resolving = None;
            inner.state = PlayerState::Idle;

            let track = match resolved {
                None => {
                    info!("⏭️ Skipped {} while it was resolving", request);
                    continue;
                }
                Some(Err(e)) => {
                    error!("Queue playback error in guild {}: {}", self.guild_id, e);
                    let announcer = inner.announcer.clone();
                    drop(inner);
                    announce(announcer, &e.user_message()).await;
                    continue;
                }
                Some(Ok(track)) => track,
            };

            let signal = TrackEndSignal {
                generation,
                events: self.events.clone(),
            };
            if let Err(e) = self.voice.play(track.clone(), signal).await {
                error!("Transport refused {} in guild {}: {}", track.title, self.guild_id, e);
                let announcer = inner.announcer.clone();
                drop(inner);
                announce(announcer, &e.user_message()).await;
                continue;
            }
            self.voice.set_volume(self.default_volume).await;

            inner.current = Some(CurrentTrack {
                title: track.title.clone(),
                volume: self.default_volume,
                request,
            });
            inner.state = PlayerState::Playing;
            info!("🎶 Now playing in guild {}: {}", self.guild_id, track.display_title());

            let announcer = inner.announcer.clone();
            drop(inner);
            announce(announcer, &format!("🎶 Now playing: {}", track.title)).await;
            return;
        }
    }

    async fn resolve(&self, request: &PlaybackRequest) -> MusicResult<PlayableTrack> {
        debug!("Next query to play: {} ({:?})", request, request.kind());
        match request.kind() {
            RequestKind::Url => self.resolver.resolve_url(request.query()).await,
            RequestKind::Search => self.resolver.resolve_search(request.query()).await,
        }
    }

    /// Single handler for the end of a track, natural or not.
    pub async fn handle_track_end(&self, end: TrackEnd) {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == PlayerState::Disconnected
                || inner.generation != end.generation
                || inner.current.is_none()
            {
                debug!("Ignoring stale track end in guild {}", self.guild_id);
                return;
            }

            match &end.error {
                Some(e) => error!("Player error in guild {}: {}", self.guild_id, e),
                None => debug!("Track finished in guild {}", self.guild_id),
            }
            inner.current = None;
            inner.state = PlayerState::Idle;
        }

        self.advance().await;
    }

    async fn connected(&self) -> MusicResult<MutexGuard<'_, SessionInner>> {
        let inner = self.inner.lock().await;
        if inner.state == PlayerState::Disconnected || !self.voice.is_connected().await {
            return Err(MusicError::NotConnected);
        }
        Ok(inner)
    }

    pub async fn pause(&self) -> MusicResult<()> {
        let mut inner = self.connected().await?;
        if inner.state != PlayerState::Playing || !self.voice.is_playing().await {
            return Err(MusicError::InvalidState {
                operation: "pause",
                state: inner.state,
            });
        }
        self.voice.pause().await?;
        inner.state = PlayerState::Paused;
        info!("⏸️ Playback paused in guild {}", self.guild_id);
        Ok(())
    }

    pub async fn resume(&self) -> MusicResult<()> {
        let mut inner = self.connected().await?;
        if inner.state != PlayerState::Paused || !self.voice.is_paused().await {
            return Err(MusicError::InvalidState {
                operation: "resume",
                state: inner.state,
            });
        }
        self.voice.resume().await?;
        inner.state = PlayerState::Playing;
        info!("▶️ Playback resumed in guild {}", self.guild_id);
        Ok(())
    }

    /// Ends the current item. The queue itself is not touched: the track end
    /// (or the cancelled resolution) moves on to the next request.
    pub async fn skip(&self) -> MusicResult<()> {
        let inner = self.connected().await?;
        match (inner.state, inner.resolving.as_ref()) {
            (PlayerState::Playing | PlayerState::Paused, _) => self.voice.stop().await?,
            (PlayerState::Connecting, Some(token)) => token.cancel(),
            (state, _) => {
                return Err(MusicError::InvalidState {
                    operation: "skip",
                    state,
                })
            }
        }
        info!("⏭️ Track skipped in guild {}", self.guild_id);
        Ok(())
    }

    /// Sets the volume of the track on air. `percent` is not clamped.
    pub async fn set_volume(&self, percent: i64) -> MusicResult<f32> {
        let mut inner = self.connected().await?;
        let state = inner.state;
        let current = inner.current.as_mut().ok_or(MusicError::InvalidState {
            operation: "volume",
            state,
        })?;

        let volume = percent as f32 / 100.0;
        current.volume = volume;
        self.voice.set_volume(volume).await;
        info!("🔊 Volume changed to {}% in guild {}", percent, self.guild_id);
        Ok(volume)
    }

    /// Disconnects and tears the session down. Fails when not connected.
    pub async fn stop(&self) -> MusicResult<()> {
        let mut inner = self.connected().await?;
        self.teardown(&mut inner).await;
        info!("👋 Disconnected from the voice channel in guild {}", self.guild_id);
        Ok(())
    }

    /// Teardown after the transport was lost elsewhere. Never fails.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != PlayerState::Disconnected {
            self.teardown(&mut inner).await;
            info!("🔌 Session for guild {} shut down", self.guild_id);
        }
    }

    async fn teardown(&self, inner: &mut SessionInner) {
        if let Some(token) = inner.resolving.take() {
            token.cancel();
        }
        inner.state = PlayerState::Disconnected;
        inner.generation += 1;
        inner.current = None;
        inner.channel = None;
        inner.queue.clear();
        if let Err(e) = self.voice.stop().await {
            debug!("Stop during teardown failed in guild {}: {}", self.guild_id, e);
        }
        self.voice.disconnect().await;
    }
}

async fn announce(announcer: Option<Arc<dyn Announcer>>, message: &str) {
    match announcer {
        Some(announcer) => announcer.announce(message).await,
        None => debug!("No channel to announce to: {}", message),
    }
}
