use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    audio::{
        queue::PlaybackRequest,
        registry::SessionRegistry,
        session::{Enqueued, PlaybackSession},
    },
    bot::{
        commands::Command,
        context::{CommandContext, Reply},
    },
    error::{MusicError, MusicResult},
    ui::embeds,
};

/// Runs user commands against the guild sessions and sends exactly one reply
/// per rejected command.
pub struct CommandDispatcher {
    registry: Arc<SessionRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, ctx: &dyn CommandContext, command: Command) {
        info!(
            "📝 Command {:?} from {} in guild {:?}",
            command,
            ctx.requester(),
            ctx.session_key()
        );

        let reply = match self.execute(ctx, command).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Command rejected: {}", e);
                Some(Reply::text(e.user_message()))
            }
        };

        if let Some(reply) = reply {
            ctx.reply(reply).await;
        }
    }

    /// `Ok(None)` means the session already answered through its announcer.
    async fn execute(&self, ctx: &dyn CommandContext, command: Command) -> MusicResult<Option<Reply>> {
        let reply = match command {
            Command::Play(query) => return self.handle_play(ctx, &query).await,
            Command::QueueHelp => Reply::text("Subcommands: list, add <song>, clear"),
            Command::QueueList => match self.registry.get(Self::guild(ctx)?) {
                Some(session) => {
                    let current = session.current_track().await;
                    let items = session.queued().await;
                    embeds::create_queue_reply(current.as_ref(), &items)
                }
                None => embeds::create_queue_reply(None, &[]),
            },
            Command::QueueAdd(song) => {
                if song.trim().is_empty() {
                    return Err(MusicError::MissingArgument("song"));
                }
                let session = self.registry.get_or_create(Self::guild(ctx)?);
                session
                    .enqueue(PlaybackRequest::new(song.as_str(), ctx.requester()))
                    .await?;
                Reply::text(format!("✅ Added to queue: `{}`", song))
            }
            Command::QueueClear => {
                if let Some(session) = self.registry.get(Self::guild(ctx)?) {
                    session.clear_queue().await;
                }
                Reply::text("Queue cleared.")
            }
            Command::Skip => {
                self.existing_session(ctx)?.skip().await?;
                Reply::text("⏭️ Skipped current track.")
            }
            Command::Pause => {
                self.existing_session(ctx)?.pause().await?;
                Reply::text("⏸️ Paused playback.")
            }
            Command::Resume => {
                self.existing_session(ctx)?.resume().await?;
                Reply::text("▶️ Resumed playback.")
            }
            Command::Stop => {
                self.registry.stop(Self::guild(ctx)?).await?;
                Reply::text("Disconnected from the voice channel.")
            }
            Command::Volume(percent) => {
                let percent = percent.ok_or(MusicError::MissingArgument("volume"))?;
                self.existing_session(ctx)?.set_volume(percent).await?;
                Reply::text(format!("Changed volume to {}%", percent))
            }
        };

        Ok(Some(reply))
    }

    async fn handle_play(&self, ctx: &dyn CommandContext, query: &str) -> MusicResult<Option<Reply>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::MissingArgument("song"));
        }
        let guild_id = Self::guild(ctx)?;
        let channel = ctx
            .requester_channel()
            .ok_or(MusicError::NotInVoiceChannel)?;
        let session = self.registry.get_or_create(guild_id);

        session.ensure_connected(channel).await?;
        ctx.start_typing().await;

        let request = PlaybackRequest::new(query, ctx.requester());
        info!("Queued: {} ({:?})", query, request.kind());

        let enqueued = session.enqueue_play(request, ctx.announcer()).await?;
        // Also starts requests left waiting by `queue add` while nothing played.
        session.advance().await;

        match enqueued {
            Enqueued::PlayNow => Ok(None),
            Enqueued::Queued { position } => {
                info!("Waiting at position {} in guild {}", position, session.guild_id());
                Ok(Some(Reply::text(format!("✅ Added to queue: `{}`", query))))
            }
        }
    }

    fn guild(ctx: &dyn CommandContext) -> MusicResult<GuildId> {
        ctx.session_key().ok_or(MusicError::NotInGuild)
    }

    /// Control commands never create a session: without one there is no connection.
    fn existing_session(&self, ctx: &dyn CommandContext) -> MusicResult<Arc<PlaybackSession>> {
        self.registry
            .get(Self::guild(ctx)?)
            .ok_or(MusicError::NotConnected)
    }
}
