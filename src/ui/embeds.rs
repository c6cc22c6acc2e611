use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{queue::PlaybackRequest, session::CurrentTrack},
    bot::context::Reply,
};

/// Colours used by embeds.
pub mod colors {
    pub const QUEUE_GREEN: u32 = 0x1DB954;
}

const STANDARD_FOOTER: &str = "🎵 Zion Music";

pub fn create_embed(title: String, description: String, colour: u32) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .description(description)
        .colour(colour)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Numbered listing of the pending requests, or the empty notice.
pub fn create_queue_reply(current: Option<&CurrentTrack>, items: &[PlaybackRequest]) -> Reply {
    if items.is_empty() {
        return Reply::text("📭 Queue is empty.");
    }

    let mut description = String::new();
    if let Some(current) = current {
        description.push_str(&format!("**Now playing:** {}\n\n", current.title));
    }
    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, request)| format!("`{}.` {}", i + 1, request))
        .collect();
    description.push_str(&lines.join("\n"));

    Reply::Embed {
        title: "🎶 Current Queue".to_string(),
        description,
        colour: colors::QUEUE_GREEN,
    }
}
