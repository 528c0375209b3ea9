//! Per-session decoder-side API handed to a [`crate::plugin::FormatPlugin`]
//! while it decodes one song.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::chunk::MusicChunk;
use crate::control::{DecodeCommand, DecodeState, DecoderControl};
use crate::error::DecoderError;
use crate::format::AudioFormat;
use crate::replaygain::{ReplayGainInfo, ReplayGainMode};
use crate::stream::InputStream;
use crate::tag::Tag;

/// How long to sleep between retries when waiting for buffer space or
/// fresh stream bytes. Plugins are expected to block internally on I/O
/// and poll the command between units; this crate owns that poll loop on
/// the plugin's behalf inside `read`/`data`.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One decode session's private state, living entirely on the decoder
/// thread.
pub struct Decoder {
    dc: Arc<DecoderControl>,
    chunk: Option<Box<MusicChunk>>,
    stream_tag: Option<Tag>,
    decoder_tag: Option<Tag>,
    song_tag: Option<Tag>,
    timestamp: f64,
    seeking: bool,
    replay_gain_info: Option<ReplayGainInfo>,
    replay_gain_serial: u32,
}

impl Decoder {
    pub(crate) fn new(dc: Arc<DecoderControl>, song_tag: Tag) -> Self {
        Self {
            dc,
            chunk: None,
            stream_tag: None,
            decoder_tag: None,
            song_tag: if song_tag.is_empty() { None } else { Some(song_tag) },
            timestamp: 0.0,
            seeking: false,
            replay_gain_info: None,
            replay_gain_serial: 0,
        }
    }

    /// Called exactly once, after the plugin has determined the stream's
    /// format. Publishes `in_audio_format`,
    /// `out_audio_format` (via the control block's negotiation policy),
    /// `seekable` and `total_time`, and transitions START → DECODE.
    pub fn initialized(&self, in_audio_format: AudioFormat, seekable: bool, total_time: f64) {
        assert!(in_audio_format.defined() && in_audio_format.valid());
        assert!(self.stream_tag.is_none() && self.decoder_tag.is_none());
        assert!(!self.seeking);

        let out_audio_format = self.dc.negotiate_format(in_audio_format);
        self.dc.publish_initialized(in_audio_format, out_audio_format, seekable, total_time);
        debug!("audio_format={in_audio_format:?} out_audio_format={out_audio_format:?} seekable={seekable}");
    }

    /// Lock-free read of the pending command.
    pub fn get_command(&self) -> DecodeCommand {
        self.dc.command_atomic()
    }

    /// Acknowledge the current command, discarding any partially written
    /// chunk and clearing the pipe if it was a SEEK.
    pub fn command_finished(&mut self) {
        let was_seeking = self.seeking;
        if was_seeking {
            self.seeking = false;
            if let Some(chunk) = self.chunk.take() {
                self.dc.give_back_chunk(chunk);
            }
            self.dc.clear_pipe();
            self.timestamp = self.dc.seek_where();
        }
        self.dc.acknowledge_command(was_seeking);
    }

    /// The target position of the in-flight SEEK, in seconds. May only be
    /// called while `get_command() == Seek`.
    pub fn seek_where(&mut self) -> f64 {
        let (command, seek_where) = self.dc.seek_snapshot();
        assert_eq!(command, DecodeCommand::Seek);
        self.seeking = true;
        seek_where
    }

    /// The plugin could not honor the SEEK.
    pub fn seek_error(&mut self) {
        self.dc.mark_seek_error();
        self.seeking = false;
        self.command_finished();
    }

    /// Fills `buf` from `stream`, returning 0 on EOF, on a fatal command
    /// (STOP, or a SEEK that isn't this decoder's own in-progress seek) or
    /// on I/O error.
    pub fn read(&self, stream: &mut dyn InputStream, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        loop {
            let (state, command) = self.dc.state_and_command();
            let ignore_seek = command == DecodeCommand::Seek && (state == DecodeState::Start || self.seeking);
            if command != DecodeCommand::None && !ignore_seek {
                return 0;
            }
            match stream.read(buf) {
                Ok(0) => {
                    if stream.eof() {
                        return 0;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Ok(n) => return n,
                Err(e) => {
                    warn!("input stream read error: {e}");
                    return 0;
                }
            }
        }
    }

    pub fn timestamp(&mut self, seconds: f64) {
        assert!(seconds >= 0.0);
        self.timestamp = seconds;
    }

    /// Refreshes `stream_tag` from the input stream, falling back to the
    /// song's own tag the first time (consuming it). Returns whether a
    /// tag changed.
    fn update_stream_tag(&mut self, stream: &mut dyn InputStream) -> bool {
        match stream.tag().or_else(|| self.song_tag.take()) {
            Some(tag) => {
                self.stream_tag = Some(tag);
                true
            }
            None => false,
        }
    }

    /// Attaches `tag` to a fresh chunk, flushing whatever the decoder was
    /// already accumulating first so the tag boundary is exact.
    fn send_tag(&mut self, tag: Tag) -> DecodeCommand {
        if self.chunk.is_some() {
            self.flush_chunk();
        }
        if !self.acquire_chunk() {
            return self.dc.command_atomic();
        }
        self.chunk.as_mut().unwrap().set_tag(tag);
        DecodeCommand::None
    }

    /// The plugin has decoded an in-band tag (distinct from whatever the
    /// input stream itself reports).
    pub fn tag(&mut self, stream: &mut dyn InputStream, tag: Tag) -> DecodeCommand {
        debug_assert_eq!(self.dc.state(), DecodeState::Decode);
        self.decoder_tag = Some(tag);
        self.update_stream_tag(stream);
        let merged = match &self.stream_tag {
            Some(stream_tag) => Tag::merge(stream_tag, self.decoder_tag.as_ref().unwrap()),
            None => self.decoder_tag.clone().unwrap(),
        };
        self.send_tag(merged)
    }

    /// The plugin hands over one block of decoded PCM, already in
    /// `in_audio_format`. Converts to `out_audio_format` if
    /// they differ, slices it across as many chunks as needed, and stops
    /// early once the song's `end_ms` is reached.
    pub fn data(&mut self, stream: &mut dyn InputStream, data: &[u8], kbit_rate: u16) -> DecodeCommand {
        let snapshot = self.dc.data_snapshot();
        if snapshot.state != DecodeState::Decode {
            debug_assert!(false, "{}", DecoderError::NotInitialized);
            warn!("{}", DecoderError::NotInitialized);
            self.dc.mark_decode_failed();
            return DecodeCommand::Stop;
        }
        let frame_size = snapshot.in_format.frame_size() as usize;
        if data.len() % frame_size != 0 {
            let err = DecoderError::UnalignedLength { length: data.len(), frame_size };
            debug_assert!(false, "{err}");
            warn!("{err}");
            self.dc.mark_decode_failed();
            return DecodeCommand::Stop;
        }

        if snapshot.command == DecodeCommand::Stop || snapshot.command == DecodeCommand::Seek || data.is_empty() {
            return snapshot.command;
        }

        if self.update_stream_tag(stream) {
            let merged = match &self.decoder_tag {
                Some(decoder_tag) => Tag::merge(decoder_tag, self.stream_tag.as_ref().unwrap()),
                None => self.stream_tag.clone().unwrap(),
            };
            let cmd = self.send_tag(merged);
            if cmd != DecodeCommand::None {
                return cmd;
            }
        }

        let converted;
        let bytes: &[u8] = if snapshot.in_format == snapshot.out_format {
            data
        } else {
            match self.dc.convert_pcm(snapshot.in_format, data, snapshot.out_format) {
                Some(v) => {
                    converted = v;
                    &converted
                }
                None => {
                    warn!("{}", DecoderError::ConversionFailed);
                    self.dc.mark_decode_failed();
                    return DecodeCommand::Stop;
                }
            }
        };

        let mut remaining = bytes;
        while !remaining.is_empty() {
            if !self.acquire_chunk() {
                return self.dc.command_atomic();
            }

            let ts = self.timestamp - snapshot.start_ms as f64 / 1000.0;
            let outcome = {
                let chunk = self.chunk.as_mut().unwrap();
                match chunk.write(snapshot.out_format, ts, kbit_rate) {
                    None => None,
                    Some(dest) => {
                        let n = dest.len().min(remaining.len());
                        dest[..n].copy_from_slice(&remaining[..n]);
                        let full = chunk.expand(n);
                        Some((full, n))
                    }
                }
            };

            match outcome {
                None => {
                    self.flush_chunk();
                    continue;
                }
                Some((full, n)) => {
                    remaining = &remaining[n..];
                    self.timestamp += n as f64 / snapshot.out_format.bytes_per_second() as f64;
                    if full {
                        self.flush_chunk();
                    }
                }
            }

            if snapshot.end_ms > 0 && self.timestamp >= snapshot.end_ms as f64 / 1000.0 {
                return DecodeCommand::Stop;
            }
        }

        DecodeCommand::None
    }

    /// Publish fresh replay-gain info (or clear it) and return the dB
    /// value the caller should report upstream. Mints a
    /// fresh epoch serial and flushes any chunk in flight so it never
    /// straddles two replay-gain epochs.
    pub fn replay_gain(&mut self, info: Option<ReplayGainInfo>, mode: ReplayGainMode, preamp: f32, missing_preamp: f32, limit: f32) -> f32 {
        match info {
            Some(info) => {
                let serial = crate::replaygain::next_serial();
                let return_db = match info.selected(mode) {
                    Some(tuple) => 20.0 * tuple.scale(preamp, missing_preamp, limit).log10(),
                    None => 0.0,
                };
                self.replay_gain_info = Some(info);
                self.replay_gain_serial = serial;
                if self.chunk.is_some() {
                    self.flush_chunk();
                }
                return_db
            }
            None => {
                self.replay_gain_info = None;
                self.replay_gain_serial = 0;
                0.0
            }
        }
    }

    /// Publishes mix-ramp points and the associated gain to the control
    /// block for the player to pick up.
    pub fn mixramp(&self, gain_db: f32, start: Option<String>, end: Option<String>) {
        self.dc.set_replay_gain_db(gain_db);
        self.dc.set_mixramp_start(start);
        self.dc.set_mixramp_end(end);
    }

    /// Acquire a chunk from the pool if the decoder doesn't already hold
    /// one, retrying until one is free or a command arrives that should
    /// take priority. Stamps the chunk with the current replay-gain epoch
    /// on acquisition.
    fn acquire_chunk(&mut self) -> bool {
        if self.chunk.is_some() {
            return true;
        }
        loop {
            let buffer = match self.dc.session_buffer() {
                Some(b) => b,
                None => return false,
            };
            if let Some(mut chunk) = buffer.acquire() {
                chunk.set_replay_gain_serial(self.replay_gain_serial);
                self.chunk = Some(chunk);
                return true;
            }
            if self.dc.command_atomic() != DecodeCommand::None {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Push the in-progress chunk (if any) onto the pipe, retrying while
    /// the pipe is momentarily full.
    fn flush_chunk(&mut self) {
        let Some(mut chunk) = self.chunk.take() else {
            return;
        };
        loop {
            let Some(pipe) = self.dc.session_pipe() else {
                return;
            };
            match pipe.push(chunk) {
                Ok(()) => {
                    self.dc.wake_player();
                    return;
                }
                Err(returned) => {
                    chunk = returned;
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

impl Drop for Decoder {
    /// A plugin that panics or returns mid-chunk must not leak it back
    /// into the pool silently discarded; hand it to the pipe like a
    /// normal flush so the player still sees whatever was decoded.
    fn drop(&mut self) {
        if self.chunk.is_some() {
            self.flush_chunk();
        }
    }
}
