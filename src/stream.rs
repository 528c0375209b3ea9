//! Abstract byte source consumed by format plugins.

use crate::tag::Tag;

/// Capability set a format plugin is handed to pull bytes from.
///
/// This is deliberately a trait, not a concrete struct: archive readers
/// and networked stream implementations live outside this crate and only
/// need to satisfy this contract.
pub trait InputStream: Send {
    /// Fill `buf`, returning the number of bytes read (0 on EOF or error).
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Seek to an absolute byte offset. `None` if this stream cannot seek.
    fn seek(&mut self, offset: i64) -> Option<std::io::Result<()>>;

    fn eof(&self) -> bool;

    /// Declared up-front; governs whether `seek` should ever be called.
    fn seekable(&self) -> bool;

    /// Current byte offset.
    fn offset(&self) -> i64;

    /// Total size, if known.
    fn size(&self) -> Option<i64>;

    fn mime(&self) -> Option<&str> {
        None
    }

    /// A tag snapshot attached to the stream itself (e.g. an ICY header),
    /// if one has newly arrived since the last call.
    fn tag(&mut self) -> Option<Tag> {
        None
    }
}
