//! # Audio Module
//!
//! Per-guild playback: the request queue, the player state machine that
//! drains it, the registry that owns one session per guild, and the voice
//! transport seam.
//!
//! ## Architecture
//!
//! ### [`queue`]
//! - FIFO of pending requests, classified as URL or search at creation
//!
//! ### [`session`]
//! - `Idle → Connecting → Playing ⇄ Paused`, with `Disconnected` as terminal state
//! - Single track-end path that advances the queue
//! - Cancellation of in-flight resolution on skip and stop
//!
//! ### [`registry`]
//! - Guild id to session map, lazily populated
//! - Track-end worker per session
//!
//! ### [`voice`]
//! - [`voice::VoiceSession`] trait over a guild's voice connection
//! - songbird implementation used in production

pub mod queue;
pub mod registry;
pub mod session;
pub mod voice;
