use anyhow::{Context as _, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Audio
    /// Gain applied to every new track, 1.0 is unity.
    pub default_volume: f32,
    pub opus_bitrate: u32,

    // Resolution
    pub resolve_timeout: Duration,
    pub max_concurrent_resolves: usize,
}

impl Config {
    /// Reads the configuration from the environment, after loading `.env` if
    /// one is present.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            command_prefix: var("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),

            default_volume: match var("DEFAULT_VOLUME") {
                Some(value) => value.trim().parse().context("Invalid DEFAULT_VOLUME")?,
                None => defaults.default_volume,
            },
            opus_bitrate: match var("OPUS_BITRATE") {
                Some(value) => value.trim().parse().context("Invalid OPUS_BITRATE")?,
                None => defaults.opus_bitrate,
            },

            resolve_timeout: match var("RESOLVE_TIMEOUT_SECS") {
                Some(value) => Duration::from_secs(
                    value.trim().parse().context("Invalid RESOLVE_TIMEOUT_SECS")?,
                ),
                None => defaults.resolve_timeout,
            },
            max_concurrent_resolves: match var("MAX_CONCURRENT_RESOLVES") {
                Some(value) => value
                    .trim()
                    .parse()
                    .context("Invalid MAX_CONCURRENT_RESOLVES")?,
                None => defaults.max_concurrent_resolves,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks on the loaded values.
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - Opus bitrate must be between 8kbps and 510kbps (Discord limits)
    /// - Timeout and concurrency must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.command_prefix.is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        if !(0.0..=2.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.opus_bitrate > 510_000 {
            anyhow::bail!("Opus bitrate cannot exceed 510kbps, got: {}", self.opus_bitrate);
        }

        if self.opus_bitrate < 8_000 {
            anyhow::bail!("Opus bitrate too low, minimum 8kbps, got: {}", self.opus_bitrate);
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.max_concurrent_resolves == 0 {
            anyhow::bail!("Max concurrent resolves must be greater than 0");
        }

        Ok(())
    }

    /// Summary for logging. Never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix `{}`\n  \
            Audio: {}% vol, {}kbps\n  \
            Resolution: {} timeout, {} concurrent",
            self.command_prefix,
            (self.default_volume * 100.0).round() as u32,
            self.opus_bitrate / 1000,
            humantime::format_duration(self.resolve_timeout),
            self.max_concurrent_resolves
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (the token has no default)
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            default_volume: 0.5,
            opus_bitrate: 192_000,

            resolve_timeout: Duration::from_secs(30),
            max_concurrent_resolves: 3,
        }
    }
}
