//! Fixed-capacity PCM buffer handed between the decoder and player threads.

use crate::format::AudioFormat;
use crate::tag::Tag;

/// Chunk capacity. 4 KiB is small enough that even a couple of seconds of
/// 44.1kHz/16-bit/stereo audio still splits into dozens of chunks, which
/// keeps latency and buffer-pool pressure low.
pub const CHUNK_SIZE: usize = 4096;

/// A fixed-capacity PCM buffer, with an optional tag, a timestamp and a
/// bitrate hint.
///
/// Invariant: all samples in a chunk share one [`AudioFormat`] and one
/// replay-gain epoch (`replay_gain_serial`).
#[derive(Debug, Clone)]
pub struct MusicChunk {
    data: [u8; CHUNK_SIZE],
    length: usize,
    format: AudioFormat,
    timestamp: f64,
    bitrate_kbps: u16,
    tag: Option<Tag>,
    replay_gain_serial: u32,
}

impl Default for MusicChunk {
    fn default() -> Self {
        Self {
            data: [0u8; CHUNK_SIZE],
            length: 0,
            format: AudioFormat::default(),
            timestamp: 0.0,
            bitrate_kbps: 0,
            tag: None,
            replay_gain_serial: 0,
        }
    }
}

impl MusicChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn bitrate_kbps(&self) -> u16 {
        self.bitrate_kbps
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn set_tag(&mut self, tag: Tag) {
        self.tag = Some(tag);
    }

    pub fn replay_gain_serial(&self) -> u32 {
        self.replay_gain_serial
    }

    pub fn set_replay_gain_serial(&mut self, serial: u32) {
        self.replay_gain_serial = serial;
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Reset the chunk back to empty, dropping any tag, ready to be
    /// returned to a [`crate::buffer::MusicBuffer`].
    pub fn clear(&mut self) {
        self.length = 0;
        self.format = AudioFormat::default();
        self.timestamp = 0.0;
        self.bitrate_kbps = 0;
        self.tag = None;
        self.replay_gain_serial = 0;
    }

    /// On an empty chunk this stamps `format`/`timestamp`/`bitrate_kbps`
    /// and returns the remaining capacity rounded down to a whole number of
    /// `format` frames, so a caller can never leave a partial frame
    /// straddling the chunk boundary. Returns `None` ("full") if there is
    /// no room left for even one more frame — a caller that still has
    /// bytes to write must flush and acquire a fresh chunk.
    pub fn write(
        &mut self,
        format: AudioFormat,
        timestamp: f64,
        bitrate_kbps: u16,
    ) -> Option<&mut [u8]> {
        if self.length == 0 {
            self.format = format;
            self.timestamp = timestamp;
            self.bitrate_kbps = bitrate_kbps;
        }
        let frame_size = format.frame_size() as usize;
        let num_frames = (CHUNK_SIZE - self.length) / frame_size;
        if num_frames == 0 {
            return None;
        }
        let end = self.length + num_frames * frame_size;
        Some(&mut self.data[self.length..end])
    }

    /// `expand(chunk, fmt, n_bytes) -> full?`. Advances `length` by
    /// `n_bytes` (already copied into the slice returned by `write`) and
    /// reports whether the chunk is now at capacity.
    pub fn expand(&mut self, n_bytes: usize) -> bool {
        debug_assert!(self.length + n_bytes <= CHUNK_SIZE);
        self.length = (self.length + n_bytes).min(CHUNK_SIZE);
        self.length >= CHUNK_SIZE
    }

    pub fn remaining(&self) -> usize {
        CHUNK_SIZE - self.length
    }
}
