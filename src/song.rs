//! Reference to a playable item.

use crate::tag::Tag;

/// Owned by the player; the decoder only ever borrows a `Song` for the
/// duration of one session. `start_ms`/`end_ms` describe a sub-range
/// within the underlying media (`0` means "unset").
#[derive(Clone, Debug)]
pub struct Song {
    url: String,
    tag: Tag,
    start_ms: u64,
    end_ms: u64,
}

impl Song {
    pub fn new(url: impl Into<String>, tag: Tag) -> Self {
        Self { url: url.into(), tag, start_ms: 0, end_ms: 0 }
    }

    pub fn with_range(mut self, start_ms: u64, end_ms: u64) -> Self {
        self.start_ms = start_ms;
        self.end_ms = end_ms;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }
}
