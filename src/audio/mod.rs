//! # Audio Module
//!
//! Per-guild playback core of the jukebox.
//!
//! ## Architecture
//!
//! ### [`registry`] - Player Registry
//! - One [`player::Player`] per guild, created on first join
//! - Creation is serialized per guild; the map lock never spans a voice join
//!
//! ### [`player`] - Player Actor
//! - A single task owns the queue, cursor, modes and current pipeline
//! - Commands, accessors and the one-second completion tick share one mailbox
//!
//! ### [`queue`] - Playback Queue
//! - Bounded FIFO with a clamp-on-use cursor
//! - `persist` keeps played tracks, `shuffle` re-randomizes the cursor
//!
//! ### [`pipeline`] - Download → Encode → Stream
//! - Download task feeding an in-memory pipe, cancelled by closing its sink
//! - Encoder and streamer are external, reached through [`voice`]
//!
//! ### [`discord`] - songbird Transport
//! - Production [`voice::VoiceTransport`] implementation

pub mod discord;
pub mod pipeline;
pub mod player;
pub mod queue;
pub mod registry;
pub mod voice;

#[cfg(test)]
pub mod testing;
