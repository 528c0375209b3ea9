//! The decoder control block (DC): shared state, mutex, condvar and the
//! command protocol driving one decode session.
//!
//! A channel deliberately doesn't stand in for `command` here: the player
//! needs synchronous, blocking acknowledgement of each command, which a
//! queue can't give without extra bookkeeping. `std::sync::{Mutex,
//! Condvar}` cover both the shared state and that rendezvous directly.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use log::debug;

use crate::buffer::MusicBuffer;
use crate::chunk::MusicChunk;
use crate::decoder::Decoder;
use crate::error::{SeekError, StartError};
use crate::format::AudioFormat;
use crate::pipe::MusicPipe;
use crate::plugin::{FormatPlugin, InputStreamPlugin};
use crate::song::Song;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecodeState {
    Stop,
    Start,
    Decode,
    Error,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecodeCommand {
    None,
    Start,
    Seek,
    Stop,
}

impl DecodeCommand {
    const fn as_u8(self) -> u8 {
        match self {
            DecodeCommand::None => 0,
            DecodeCommand::Start => 1,
            DecodeCommand::Seek => 2,
            DecodeCommand::Stop => 3,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => DecodeCommand::Start,
            2 => DecodeCommand::Seek,
            3 => DecodeCommand::Stop,
            _ => DecodeCommand::None,
        }
    }
}

struct Shared {
    state: DecodeState,
    command: DecodeCommand,
    quit: bool,

    in_audio_format: AudioFormat,
    out_audio_format: AudioFormat,
    seekable: bool,
    total_time: f64,

    seek_where: f64,
    seek_error: bool,

    /// Set by [`crate::decoder::Decoder::data`] when a PCM conversion
    /// fails, so the thread loop can distinguish a genuine decode error
    /// from a clean STOP when the plugin returns.
    decode_failed: bool,

    song: Option<Song>,
    buffer: Option<Arc<MusicBuffer>>,
    pipe: Option<Arc<MusicPipe>>,

    replay_gain_db: f32,
    replay_gain_prev_db: f32,
    mixramp_start: Option<String>,
    mixramp_end: Option<String>,
    mixramp_prev_end: Option<String>,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            state: DecodeState::Stop,
            command: DecodeCommand::None,
            quit: false,
            in_audio_format: AudioFormat::default(),
            out_audio_format: AudioFormat::default(),
            seekable: false,
            total_time: 0.0,
            seek_where: 0.0,
            seek_error: false,
            decode_failed: false,
            song: None,
            buffer: None,
            pipe: None,
            replay_gain_db: 0.0,
            replay_gain_prev_db: 0.0,
            mixramp_start: None,
            mixramp_end: None,
            mixramp_prev_end: None,
        }
    }
}

type NegotiateFormat = dyn Fn(AudioFormat) -> AudioFormat + Send + Sync;
type ConvertPcm = dyn Fn(AudioFormat, &[u8], AudioFormat) -> Option<Vec<u8>> + Send + Sync;

/// The player/decoder rendezvous record. One instance per decoder thread,
/// created at daemon start and paired 1:1 with its thread via
/// [`DecoderControl::quit`] + `JoinHandle::join` at shutdown.
pub struct DecoderControl {
    shared: Mutex<Shared>,
    cond: Condvar,
    /// Mirrors `shared.command`, updated under the same lock, so
    /// [`Decoder::get_command`] can be a genuinely lock-free read: the
    /// player only ever transitions NONE→X, and the decoder only observes.
    command_atomic: AtomicU8,
    /// `out_audio_format = negotiate(in_audio_format)`: the sample-rate
    /// converter's format-selection policy is an external, pure-function
    /// collaborator; this crate only needs *a* function with that
    /// signature, defaulting to the identity.
    negotiate_format: Box<NegotiateFormat>,
    /// The actual PCM resampling is likewise out of scope here; by
    /// default this always reports failure so that a caller who sets
    /// `in_audio_format != out_audio_format` without supplying a real
    /// converter gets the decode-error path rather than silently corrupt
    /// audio.
    convert_pcm: Box<ConvertPcm>,
}

impl DecoderControl {
    pub fn new() -> Arc<Self> {
        Self::with_policies(|fmt| fmt, |_, _, _| None)
    }

    pub fn with_policies(
        negotiate_format: impl Fn(AudioFormat) -> AudioFormat + Send + Sync + 'static,
        convert_pcm: impl Fn(AudioFormat, &[u8], AudioFormat) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            shared: Mutex::new(Shared::default()),
            cond: Condvar::new(),
            command_atomic: AtomicU8::new(0),
            negotiate_format: Box::new(negotiate_format),
            convert_pcm: Box::new(convert_pcm),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap()
    }

    fn set_command_locked(&self, guard: &mut Shared, cmd: DecodeCommand) {
        guard.command = cmd;
        self.command_atomic.store(cmd.as_u8(), Ordering::Release);
        self.cond.notify_all();
    }

    fn wait_for_command_none<'a>(&self, mut guard: MutexGuard<'a, Shared>) -> MutexGuard<'a, Shared> {
        while guard.command != DecodeCommand::None {
            guard = self.cond.wait(guard).unwrap();
        }
        guard
    }

    /// Set `cmd`, wake the decoder, block until it acks.
    fn command_locked<'a>(&self, mut guard: MutexGuard<'a, Shared>, cmd: DecodeCommand) -> MutexGuard<'a, Shared> {
        self.set_command_locked(&mut guard, cmd);
        self.wait_for_command_none(guard)
    }

    // ---- player-facing API ----

    /// Installs session inputs and blocks until the decoder acknowledges.
    /// Afterwards `state()` is one of DECODE/ERROR/STOP.
    pub fn start(&self, song: Song, buffer: Arc<MusicBuffer>, pipe: Arc<MusicPipe>) -> Result<(), StartError> {
        let mut guard = self.lock();
        if guard.state != DecodeState::Stop && guard.state != DecodeState::Error {
            return Err(StartError::AlreadyRunning);
        }
        guard.song = Some(song);
        guard.buffer = Some(buffer);
        guard.pipe = Some(pipe);
        self.command_locked(guard, DecodeCommand::Start);
        Ok(())
    }

    /// Idempotent once `state` is STOP or ERROR.
    pub fn stop(&self) {
        let mut guard = self.lock();
        if guard.command != DecodeCommand::None {
            // Attempt to cancel the in-flight command. If the decoder
            // thread already started executing it, the STOP below fires
            // again once it returns to idle.
            guard = self.command_locked(guard, DecodeCommand::Stop);
        }
        if guard.state != DecodeState::Stop && guard.state != DecodeState::Error {
            self.command_locked(guard, DecodeCommand::Stop);
        }
    }

    /// Returns an error without blocking if seeking is impossible right
    /// now. A session still in START hasn't declared `seekable` yet; the
    /// command is submitted anyway and held in `command` until the plugin
    /// reaches `initialized` and observes it, rather than being rejected
    /// up front.
    pub fn seek(&self, where_seconds: f64) -> Result<(), SeekError> {
        assert!(where_seconds >= 0.0);
        let mut guard = self.lock();
        if guard.state == DecodeState::Stop || guard.state == DecodeState::Error {
            return Err(SeekError::NoCurrentSong);
        }
        if guard.state == DecodeState::Decode && !guard.seekable {
            return Err(SeekError::NotSeekable);
        }
        let total_time = guard.total_time;
        guard.seek_where = where_seconds;
        guard.seek_error = false;
        let guard = self.command_locked(guard, DecodeCommand::Seek);
        if guard.seek_error {
            Err(SeekError::OutOfRange {
                to: Duration::from_secs_f64(where_seconds),
                max: Duration::from_secs_f64(total_time),
            })
        } else {
            Ok(())
        }
    }

    /// Asynchronous: sets `quit` and wakes the decoder thread,
    /// but does not wait for acknowledgement. The caller is expected to
    /// hold the `JoinHandle` returned by [`spawn_decoder_thread`] and
    /// join it after calling this.
    pub fn quit(&self) {
        let mut guard = self.lock();
        guard.quit = true;
        self.set_command_locked(&mut guard, DecodeCommand::Stop);
    }

    pub fn state(&self) -> DecodeState {
        self.lock().state
    }

    pub fn out_audio_format(&self) -> AudioFormat {
        self.lock().out_audio_format
    }

    pub fn in_audio_format(&self) -> AudioFormat {
        self.lock().in_audio_format
    }

    pub fn seekable(&self) -> bool {
        self.lock().seekable
    }

    pub fn total_time(&self) -> f64 {
        self.lock().total_time
    }

    pub fn replay_gain_db(&self) -> f32 {
        self.lock().replay_gain_db
    }

    pub fn replay_gain_prev_db(&self) -> f32 {
        self.lock().replay_gain_prev_db
    }

    pub fn set_replay_gain_db(&self, db: f32) {
        let mut guard = self.lock();
        guard.replay_gain_prev_db = guard.replay_gain_db;
        guard.replay_gain_db = db;
    }

    /// Takes ownership, freeing the previous value.
    pub fn set_mixramp_start(&self, value: Option<String>) {
        debug!("mixramp_start = {:?}", value);
        self.lock().mixramp_start = value;
    }

    pub fn set_mixramp_end(&self, value: Option<String>) {
        debug!("mixramp_end = {:?}", value);
        let mut guard = self.lock();
        guard.mixramp_prev_end = guard.mixramp_end.take();
        guard.mixramp_end = value;
    }

    pub fn mixramp_start(&self) -> Option<String> {
        self.lock().mixramp_start.clone()
    }

    pub fn mixramp_end(&self) -> Option<String> {
        self.lock().mixramp_end.clone()
    }

    pub fn mixramp_prev_end(&self) -> Option<String> {
        self.lock().mixramp_prev_end.clone()
    }

    // ---- decoder-side helpers (used by `decoder` module) ----

    /// START is invisible to the decoder side: it's the command that's
    /// already being carried out by virtue of the plugin running at all,
    /// so it reads as NONE until something else (a SEEK or STOP issued
    /// before `initialized`) overwrites it.
    pub(crate) fn command_atomic(&self) -> DecodeCommand {
        match DecodeCommand::from_u8(self.command_atomic.load(Ordering::Acquire)) {
            DecodeCommand::Start => DecodeCommand::None,
            other => other,
        }
    }

    pub(crate) fn negotiate_format(&self, fmt: AudioFormat) -> AudioFormat {
        (self.negotiate_format)(fmt)
    }

    pub(crate) fn convert_pcm(&self, in_fmt: AudioFormat, data: &[u8], out_fmt: AudioFormat) -> Option<Vec<u8>> {
        (self.convert_pcm)(in_fmt, data, out_fmt)
    }

    /// START → DECODE, and the point at which START itself is finally
    /// acknowledged (so `start()` returns with `state` ∈ {DECODE, ERROR,
    /// STOP} rather than racing ahead of the plugin). If a SEEK or STOP
    /// arrived first and overwrote `command` while the plugin was still
    /// probing, that command is left alone here — the decode loop will
    /// observe and ack it on its own.
    pub(crate) fn publish_initialized(&self, in_format: AudioFormat, out_format: AudioFormat, seekable: bool, total_time: f64) {
        let mut guard = self.lock();
        assert_eq!(guard.state, DecodeState::Start);
        guard.in_audio_format = in_format;
        guard.out_audio_format = out_format;
        guard.seekable = seekable;
        guard.total_time = total_time;
        guard.state = DecodeState::Decode;
        if guard.command == DecodeCommand::Start {
            self.set_command_locked(&mut guard, DecodeCommand::None);
        } else {
            self.cond.notify_all();
        }
    }

    /// The command as the decoder side should see it: START reads as NONE
    /// for the same reason as [`Self::command_atomic`].
    pub(crate) fn state_and_command(&self) -> (DecodeState, DecodeCommand) {
        let guard = self.lock();
        let command = match guard.command {
            DecodeCommand::Start => DecodeCommand::None,
            other => other,
        };
        (guard.state, command)
    }

    pub(crate) fn seek_snapshot(&self) -> (DecodeCommand, f64) {
        let guard = self.lock();
        (guard.command, guard.seek_where)
    }

    pub(crate) fn seek_where(&self) -> f64 {
        self.lock().seek_where
    }

    pub(crate) fn mark_seek_error(&self) {
        let mut guard = self.lock();
        assert_eq!(guard.command, DecodeCommand::Seek);
        guard.seek_error = true;
    }

    /// Asserts the command protocol invariant and resets `command` to
    /// NONE.
    pub(crate) fn acknowledge_command(&self, was_seeking: bool) {
        let mut guard = self.lock();
        assert_ne!(guard.command, DecodeCommand::None);
        assert!(guard.command != DecodeCommand::Seek || guard.seek_error || was_seeking);
        self.set_command_locked(&mut guard, DecodeCommand::None);
    }

    pub(crate) fn give_back_chunk(&self, chunk: Box<MusicChunk>) {
        if let Some(buffer) = self.lock().buffer.clone() {
            buffer.give_back(chunk);
        }
    }

    pub(crate) fn clear_pipe(&self) {
        let guard = self.lock();
        if let (Some(pipe), Some(buffer)) = (&guard.pipe, &guard.buffer) {
            pipe.clear(buffer);
        }
    }

    pub(crate) fn session_buffer(&self) -> Option<Arc<MusicBuffer>> {
        self.lock().buffer.clone()
    }

    pub(crate) fn session_pipe(&self) -> Option<Arc<MusicPipe>> {
        self.lock().pipe.clone()
    }

    /// Stand-in for the player-side wakeup that would normally follow
    /// pushing a chunk; the real player loop lives outside this crate, so
    /// this notifies `cond` instead, which is harmless since nothing here
    /// blocks on chunk arrival.
    pub(crate) fn wake_player(&self) {
        self.cond.notify_all();
    }

    pub(crate) fn mark_decode_failed(&self) {
        self.lock().decode_failed = true;
    }

    pub(crate) fn data_snapshot(&self) -> DataSnapshot {
        let guard = self.lock();
        DataSnapshot {
            state: guard.state,
            command: guard.command,
            in_format: guard.in_audio_format,
            out_format: guard.out_audio_format,
            start_ms: guard.song.as_ref().map(|s| s.start_ms()).unwrap_or(0),
            end_ms: guard.song.as_ref().map(|s| s.end_ms()).unwrap_or(0),
        }
    }
}

pub(crate) struct DataSnapshot {
    pub state: DecodeState,
    pub command: DecodeCommand,
    pub in_format: AudioFormat,
    pub out_format: AudioFormat,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Spawn the decoder thread paired with `dc`. The returned handle should
/// be joined after calling [`DecoderControl::quit`].
pub fn spawn_decoder_thread(
    dc: Arc<DecoderControl>,
    stream_opener: Arc<dyn InputStreamPlugin>,
    plugins: Vec<Arc<dyn FormatPlugin>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || decoder_thread_main(&dc, stream_opener.as_ref(), &plugins))
}

/// The decoder thread's cooperative main loop.
fn decoder_thread_main(dc: &Arc<DecoderControl>, stream_opener: &dyn InputStreamPlugin, plugins: &[Arc<dyn FormatPlugin>]) {
    loop {
        let song = {
            let mut guard = dc.lock();
            loop {
                if guard.quit {
                    return;
                }
                if guard.command != DecodeCommand::None {
                    break;
                }
                guard = dc.cond.wait(guard).unwrap();
            }
            if guard.quit {
                return;
            }
            if guard.command != DecodeCommand::Start {
                // Only START should ever reach an idle decoder thread;
                // a stray STOP/SEEK (there shouldn't be one, the player
                // side never sends one while idle) is acked harmlessly.
                dc.set_command_locked(&mut guard, DecodeCommand::None);
                continue;
            }
            guard.state = DecodeState::Start;
            // START itself stays pending in `command` until the plugin
            // reaches `initialized` (or the session ends without ever
            // getting there) — see `publish_initialized`. A SEEK or STOP
            // issued in the meantime overwrites it rather than being
            // rejected up front.
            guard.song.clone().expect("state Start requires a song")
        };

        let mut stream = match stream_opener.open(song.url()) {
            Ok(stream) => Some(stream),
            Err(e) => {
                log::warn!("failed to open input stream for {}: {e}", song.url());
                None
            }
        };

        if let Some(stream) = stream.as_deref_mut() {
            let plugin = plugins.iter().find(|p| p.probe(&mut *stream));
            if let Some(plugin) = plugin {
                let mut decoder = Decoder::new(dc.clone(), song.tag().clone());
                plugin.decode(&mut decoder, stream);
            } else {
                log::warn!("no format plugin claimed {}", song.url());
            }
        }

        // Step 4: the plugin (or stream-open failure) has returned.
        // `command` here is normally NONE already; it's non-NONE only if
        // a STOP/SEEK arrived and the plugin returned without ever
        // observing/handling it (including a SEEK held since before
        // `initialized` was ever reached, if it's reached at all).
        let mut guard = dc.lock();
        if guard.command == DecodeCommand::Seek {
            guard.seek_error = true;
        }
        if guard.state == DecodeState::Start || guard.decode_failed {
            guard.state = DecodeState::Error;
        } else {
            guard.state = DecodeState::Stop;
        }
        guard.decode_failed = false;
        guard.song = None;
        guard.buffer = None;
        guard.pipe = None;
        dc.set_command_locked(&mut guard, DecodeCommand::None);
    }
}
