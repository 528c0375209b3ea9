use std::time::Duration;

use thiserror::Error;

/// Returned by [`crate::control::DecoderControl::seek`] and
/// [`crate::decoder::Decoder::seek_where`] callers who want a typed reason
/// instead of a bare `bool`.
#[derive(Debug, Error, PartialEq)]
pub enum SeekError {
    #[error("seek target {to:?} is past the song's duration {max:?}")]
    OutOfRange { to: Duration, max: Duration },
    #[error("the current song does not declare itself seekable")]
    NotSeekable,
    #[error("there is no song currently loaded")]
    NoCurrentSong,
}

/// Returned by [`crate::control::DecoderControl::start`] when a session
/// cannot be started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("the decoder thread is already running a session")]
    AlreadyRunning,
}

/// Errors surfaced by [`crate::decoder::Decoder`] operations that indicate a
/// format-plugin contract violation.
///
/// In debug builds these should be treated as bugs in the calling plugin
/// (`debug_assert!`); in release builds the decoder thread instead folds
/// them into [`crate::control::DecodeState::Error`] so a single buggy
/// plugin cannot bring down the whole process.
#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("data() called before initialized()")]
    NotInitialized,
    #[error("data length {length} is not a multiple of the frame size {frame_size}")]
    UnalignedLength { length: usize, frame_size: usize },
    #[error("PCM conversion failed")]
    ConversionFailed,
}

/// Index or value outside the bounds a caller declared, used by
/// [`crate::queue::Queue::jump`] and anywhere else a `usize`/`f64` must
/// fall within a known range.
#[derive(Debug, Error, PartialEq)]
pub enum OutOfBoundsError<T: std::fmt::Debug + std::fmt::Display + PartialEq> {
    #[error("{value} is above the maximum of {max}")]
    High { value: T, max: T },
    #[error("{value} is below the minimum of {min}")]
    Low { value: T, min: T },
    #[error("{value} is outside the range {min}..={max}")]
    Range { value: T, min: T, max: T },
}

impl<T: std::fmt::Debug + std::fmt::Display + PartialEq> OutOfBoundsError<T> {
    pub fn range(value: T, min: T, max: T) -> Self {
        Self::Range { value, min, max }
    }
}

/// Enumerated error surface for stored-playlist operations.
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error(transparent)]
    Errno(#[from] std::io::Error),
    #[error("no such playlist")]
    NoSuchList,
    #[error("a playlist with that name already exists")]
    ListExists,
    #[error("playlist name is invalid")]
    BadName,
    #[error("index out of range")]
    BadRange,
    #[error("playlist exceeds the configured maximum length")]
    TooLarge,
    #[error("no such song in the playlist")]
    NoSuchSong,
}
