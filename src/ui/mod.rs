//! Message and embed formatting for replies.

pub mod embeds;
