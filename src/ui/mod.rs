//! Discord presentation: embeds for status, help and command feedback.

pub mod embeds;
