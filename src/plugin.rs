//! Plugin capability sets consumed by the decoder thread.
//!
//! Kept as small object-safe traits rather than a class hierarchy, so a
//! pluggable codec boundary can sit behind one common trait instead of
//! deep inheritance.

use crate::decoder::Decoder;
use crate::stream::InputStream;

/// A single format plugin's entry point. The plugin MUST call
/// [`Decoder::initialized`] exactly once on success before any
/// `data`/`tag` call, and SHOULD poll [`Decoder::get_command`] between
/// logical decode units so STOP/SEEK/QUIT are observed promptly.
pub trait FormatPlugin: Send + Sync {
    /// Human-readable plugin name, used in log lines.
    fn name(&self) -> &str;

    /// Best-effort sniff: can this plugin likely handle `stream`? The
    /// decoder thread uses this to pick a plugin before running `decode`.
    fn probe(&self, stream: &mut dyn InputStream) -> bool;

    fn decode(&self, dec: &mut Decoder, stream: &mut dyn InputStream);
}

/// Opens input streams given a URL. The per-stream `read`/`seek`/`eof`/
/// `tag` contract itself is [`InputStream`].
pub trait InputStreamPlugin: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<Box<dyn InputStream>>;
}

/// Archive reader contract; concrete archive formats live outside this
/// crate and only need to satisfy this interface.
///
/// Entries returned by `scan_next` are paths relative to the archive
/// root, without a leading path separator.
pub trait ArchivePlugin: Send {
    fn scan_reset(&mut self);

    fn scan_next(&mut self) -> Option<String>;

    fn open_stream(&mut self, path: &str) -> std::io::Result<Box<dyn InputStream>>;
}
