//! A decoder control plane: the mutex/condvar rendezvous a player thread
//! and a decoder thread use to hand off one song at a time, plus the
//! supporting data types (audio format, tags, chunks, a pooled buffer and
//! a lock-free pipe) and the collaborator contracts (format plugins,
//! input streams, stored playlists) a host daemon plugs into it.

pub mod buffer;
pub mod chunk;
pub mod config;
pub mod control;
pub mod decoder;
pub mod error;
pub mod format;
pub mod pipe;
pub mod plugin;
pub mod playlist;
pub mod queue;
pub mod replaygain;
pub mod song;
pub mod stream;
pub mod tag;
pub mod tag_table;

pub use buffer::MusicBuffer;
pub use chunk::MusicChunk;
pub use control::{spawn_decoder_thread, DecodeCommand, DecodeState, DecoderControl};
pub use decoder::Decoder;
pub use format::AudioFormat;
pub use pipe::MusicPipe;
pub use queue::{Queue, RepeatMode};
pub use song::Song;
pub use tag::{Tag, TagType};
