use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{sync::LazyLock, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{AudioHandle, MediaResolver, PlayableTrack};
use crate::error::{MusicError, MusicResult};

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+").expect("static regex")
});

/// Whether `query` looks like a YouTube video link rather than search terms.
pub fn is_youtube_url(query: &str) -> bool {
    YOUTUBE_URL.is_match(query)
}

/// Resolver backed by the `yt-dlp` binary.
pub struct YtDlpResolver {
    rate_limiter: Semaphore,
    timeout: Duration,
}

/// Subset of the `--dump-json` output we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    webpage_url: String,
    duration: Option<f64>,
    /// Direct stream URL of the selected format.
    url: Option<String>,
    is_live: Option<bool>,
}

impl YtDlpResolver {
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            rate_limiter: Semaphore::new(max_concurrent),
            timeout,
        }
    }

    async fn dump_json(&self, query: &str, target: &str) -> MusicResult<PlayableTrack> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| MusicError::resolution(query, e))?;

        debug!("📊 yt-dlp lookup: {}", target);

        let run = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--no-warnings",
                "-f",
                "bestaudio[acodec=opus]/bestaudio/best",
                target,
            ])
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| MusicError::resolution(query, "yt-dlp timed out"))?
            .map_err(|e| MusicError::resolution(query, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp failed for {}: {}", query, stderr.trim());
            return Err(MusicError::resolution(query, stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_track(query, &stdout)
    }
}

/// Parses the first JSON line printed by `yt-dlp --dump-json`.
fn parse_track(query: &str, stdout: &str) -> MusicResult<PlayableTrack> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| MusicError::resolution(query, "no results"))?;

    let info: YtDlpInfo =
        serde_json::from_str(line).map_err(|e| MusicError::resolution(query, e))?;

    let mut track = PlayableTrack::new(info.title, info.webpage_url);
    if let Some(duration) = info.duration.and_then(|s| Duration::try_from_secs_f64(s).ok()) {
        track = track.with_duration(duration);
    }
    // Live streams keep going through yt-dlp so songbird can follow the manifest.
    if let (Some(stream_url), false) = (info.url, info.is_live.unwrap_or(false)) {
        track.audio = AudioHandle::Http(stream_url);
    }

    Ok(track)
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve_url(&self, url: &str) -> MusicResult<PlayableTrack> {
        info!("🔗 Resolving URL: {}", url);
        self.dump_json(url, url).await
    }

    async fn resolve_search(&self, terms: &str) -> MusicResult<PlayableTrack> {
        info!("🔍 Searching YouTube: {}", terms);
        let target = format!("ytsearch1:{}", terms);
        self.dump_json(terms, &target).await
    }
}
