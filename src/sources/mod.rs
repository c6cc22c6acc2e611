//! # Sources
//!
//! Turns a queued request (URL or free-form search terms) into something the
//! voice transport can stream.
//!
//! The session layer only sees the [`MediaResolver`] trait; the production
//! implementation is [`youtube::YtDlpResolver`], which shells out to `yt-dlp`
//! for metadata and leaves the actual audio fetch to songbird at play time.

pub mod youtube;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::MusicResult;

pub use youtube::YtDlpResolver;

/// Resolves requests into playable tracks.
///
/// URL requests and search requests take different routes through the
/// resolver but end up as the same [`PlayableTrack`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolves a direct video URL.
    async fn resolve_url(&self, url: &str) -> MusicResult<PlayableTrack>;

    /// Resolves free-form search terms to the best match.
    async fn resolve_search(&self, terms: &str) -> MusicResult<PlayableTrack>;
}

/// A resolved, ready-to-stream track.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableTrack {
    pub title: String,
    pub page_url: String,
    pub duration: Option<Duration>,
    pub audio: AudioHandle,
}

impl PlayableTrack {
    pub fn new(title: impl Into<String>, page_url: impl Into<String>) -> Self {
        let page_url = page_url.into();
        Self {
            title: title.into(),
            audio: AudioHandle::YtDlp(page_url.clone()),
            page_url,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Title plus a human readable duration when known.
    pub fn display_title(&self) -> String {
        match self.duration {
            Some(duration) => format!(
                "{} ({})",
                self.title,
                humantime::format_duration(Duration::from_secs(duration.as_secs()))
            ),
            None => self.title.clone(),
        }
    }
}

/// Lazy handle to the audio stream of a track.
///
/// Nothing is fetched until the transport turns the handle into a songbird
/// input, so resolving a track never downloads audio.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioHandle {
    /// Page URL handed to songbird's yt-dlp input.
    YtDlp(String),
    /// Direct media URL streamed over HTTP.
    Http(String),
}
