use async_trait::async_trait;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::{
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ui::embeds;

/// A reply to a user command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Embed {
        title: String,
        description: String,
        colour: u32,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }
}

/// Where a session posts messages nobody directly asked for ("now playing",
/// failed items).
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, message: &str);
}

/// Everything the dispatcher needs to know about an inbound command.
#[async_trait]
pub trait CommandContext: Send + Sync {
    fn requester(&self) -> UserId;
    /// Guild the command came from, `None` for direct messages.
    fn session_key(&self) -> Option<GuildId>;
    /// Voice channel the requester is sitting in.
    fn requester_channel(&self) -> Option<ChannelId>;
    async fn reply(&self, reply: Reply);
    async fn start_typing(&self);
    fn announcer(&self) -> Arc<dyn Announcer>;
}

/// Command context for a prefix command typed in a text channel.
pub struct MessageContext {
    http: Arc<Http>,
    channel_id: ChannelId,
    author: UserId,
    guild_id: Option<GuildId>,
    voice_channel: Option<ChannelId>,
}

impl MessageContext {
    pub fn new(ctx: &Context, msg: &Message) -> Self {
        // Read the voice state now; the cache guard must not live across awaits.
        let voice_channel = msg.guild_id.and_then(|guild_id| {
            let guild = guild_id.to_guild_cached(&ctx.cache)?;
            guild
                .voice_states
                .get(&msg.author.id)
                .and_then(|voice_state| voice_state.channel_id)
        });

        Self {
            http: ctx.http.clone(),
            channel_id: msg.channel_id,
            author: msg.author.id,
            guild_id: msg.guild_id,
            voice_channel,
        }
    }
}

#[async_trait]
impl CommandContext for MessageContext {
    fn requester(&self) -> UserId {
        self.author
    }

    fn session_key(&self) -> Option<GuildId> {
        self.guild_id
    }

    fn requester_channel(&self) -> Option<ChannelId> {
        self.voice_channel
    }

    async fn reply(&self, reply: Reply) {
        let message = match reply {
            Reply::Text(text) => CreateMessage::new().content(text),
            Reply::Embed {
                title,
                description,
                colour,
            } => CreateMessage::new().embed(embeds::create_embed(title, description, colour)),
        };

        if let Err(e) = self.channel_id.send_message(&self.http, message).await {
            warn!("Failed to reply in channel {}: {:?}", self.channel_id, e);
        }
    }

    async fn start_typing(&self) {
        if let Err(e) = self.channel_id.broadcast_typing(&self.http).await {
            debug!("Typing indicator failed in channel {}: {:?}", self.channel_id, e);
        }
    }

    fn announcer(&self) -> Arc<dyn Announcer> {
        Arc::new(ChannelAnnouncer {
            http: self.http.clone(),
            channel_id: self.channel_id,
        })
    }
}

/// Posts session announcements to a fixed text channel.
pub struct ChannelAnnouncer {
    http: Arc<Http>,
    channel_id: ChannelId,
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn announce(&self, message: &str) {
        if let Err(e) = self.channel_id.say(&self.http, message).await {
            warn!("Failed to announce in channel {}: {:?}", self.channel_id, e);
        }
    }
}
