//! # Bot Module
//!
//! Discord glue: turns gateway events into [`Command`]s for the
//! [`CommandDispatcher`] and reports lost voice connections to the session
//! registry.

use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use tracing::{debug, info};

pub mod commands;
pub mod context;
pub mod handlers;

use commands::Command;
use context::MessageContext;
use handlers::CommandDispatcher;

/// Serenity event handler for the music bot.
pub struct MusicBot {
    prefix: String,
    dispatcher: CommandDispatcher,
}

impl MusicBot {
    pub fn new(prefix: String, dispatcher: CommandDispatcher) -> Self {
        Self { prefix, dispatcher }
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            "✅ {} connected to {} guilds, listening for `{}` commands",
            ready.user.name,
            ready.guilds.len(),
            self.prefix
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(command) = Command::parse(&self.prefix, &msg.content) else {
            return;
        };

        let command_ctx = MessageContext::new(&ctx, &msg);
        self.dispatcher.dispatch(&command_ctx, command).await;
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }

        // Kicked, moved out by a moderator, or the channel was deleted.
        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot disconnected in guild {}", guild_id);
                self.dispatcher.registry().handle_disconnect(guild_id).await;
            }
        } else {
            debug!("Own voice state changed: {:?}", new.channel_id);
        }
    }
}
