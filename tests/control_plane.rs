//! End-to-end scenarios against the public [`DecoderControl`] API (S1-S6):
//! start/decode/stop chunk accounting, seek rejection and acceptance, a
//! seek deferred until after initialization, the end-of-range stop
//! boundary, and tag-merge precedence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use decoder_control::chunk::CHUNK_SIZE;
use decoder_control::format::SampleFormat;
use decoder_control::plugin::{FormatPlugin, InputStreamPlugin};
use decoder_control::stream::InputStream;
use decoder_control::{
    spawn_decoder_thread, AudioFormat, DecodeCommand, DecodeState, Decoder, DecoderControl,
    MusicBuffer, MusicPipe, Song, Tag, TagType,
};

const TIMEOUT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(5);

fn wait_for(mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < TIMEOUT, "timed out waiting for condition");
        std::thread::sleep(POLL);
    }
}

/// A stream that hands out zero bytes on request, optionally seekable, and
/// optionally emits one tag the first time `tag()` is polled.
struct TestStream {
    remaining: usize,
    seekable: bool,
    pos: i64,
    tag_once: Option<Tag>,
}

impl Default for TestStream {
    fn default() -> Self {
        Self { remaining: usize::MAX / 2, seekable: true, pos: 0, tag_once: None }
    }
}

impl InputStream for TestStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.remaining);
        for b in buf[..n].iter_mut() {
            *b = 0;
        }
        self.remaining -= n;
        self.pos += n as i64;
        Ok(n)
    }

    fn seek(&mut self, offset: i64) -> Option<std::io::Result<()>> {
        if self.seekable {
            self.pos = offset;
            Some(Ok(()))
        } else {
            None
        }
    }

    fn eof(&self) -> bool {
        self.remaining == 0
    }

    fn seekable(&self) -> bool {
        self.seekable
    }

    fn offset(&self) -> i64 {
        self.pos
    }

    fn size(&self) -> Option<i64> {
        None
    }

    fn tag(&mut self) -> Option<Tag> {
        self.tag_once.take()
    }
}

struct OpenerFn<F>(F);

impl<F: Fn() -> Box<dyn InputStream> + Send + Sync> InputStreamPlugin for OpenerFn<F> {
    fn open(&self, _url: &str) -> std::io::Result<Box<dyn InputStream>> {
        Ok((self.0)())
    }
}

struct FnPlugin<F>(F);

impl<F: Fn(&mut Decoder, &mut dyn InputStream) + Send + Sync> FormatPlugin for FnPlugin<F> {
    fn name(&self) -> &str {
        "test-plugin"
    }

    fn probe(&self, _stream: &mut dyn InputStream) -> bool {
        true
    }

    fn decode(&self, dec: &mut Decoder, stream: &mut dyn InputStream) {
        (self.0)(dec, stream)
    }
}

fn spawn_session(
    stream_factory: impl Fn() -> Box<dyn InputStream> + Send + Sync + 'static,
    decode_fn: impl Fn(&mut Decoder, &mut dyn InputStream) + Send + Sync + 'static,
) -> (Arc<DecoderControl>, std::thread::JoinHandle<()>) {
    let dc = DecoderControl::new();
    let opener: Arc<dyn InputStreamPlugin> = Arc::new(OpenerFn(stream_factory));
    let plugin: Arc<dyn FormatPlugin> = Arc::new(FnPlugin(decode_fn));
    let handle = spawn_decoder_thread(dc.clone(), opener, vec![plugin]);
    (dc, handle)
}

/// S1 Start→decode→stop: 48000 Hz / 2ch / s16 silence, 2 s, should land in
/// exactly ⌈384000/4096⌉ = 94 chunks, then stop cleanly.
#[test]
fn s1_start_decode_stop_chunk_count() {
    let (dc, handle) = spawn_session(
        || Box::new(TestStream::default()),
        |dec, stream| {
            let fmt = AudioFormat::new(48_000, 2, SampleFormat::S16);
            dec.initialized(fmt, true, 2.0);
            let total_bytes = 96_000 * fmt.frame_size() as usize;
            let slice = vec![0u8; 4096];
            let mut written = 0;
            while written < total_bytes {
                let n = slice.len().min(total_bytes - written);
                let cmd = dec.data(stream, &slice[..n], 1411);
                written += n;
                if cmd == DecodeCommand::Stop {
                    return;
                }
            }
        },
    );

    let buffer = Arc::new(MusicBuffer::new(200));
    let pipe = Arc::new(MusicPipe::new(200));
    dc.start(Song::new("test://silence", Tag::new()), buffer.clone(), pipe.clone()).unwrap();

    // `start` blocks until state is DECODE/ERROR/STOP, but with chunks
    // this cheap to produce and a buffer/pipe large enough to never back
    // pressure, the whole session may finish before it returns, so don't
    // assert on catching it mid-DECODE — just wait for the eventual STOP.
    wait_for(|| dc.state() == DecodeState::Stop || dc.state() == DecodeState::Error);
    assert_eq!(dc.state(), DecodeState::Stop);

    let total_bytes = 96_000usize * 4;
    let expected_chunks = total_bytes.div_ceil(CHUNK_SIZE);
    assert_eq!(expected_chunks, 94);

    let mut chunk_count = 0;
    let mut byte_count = 0;
    while let Some(chunk) = pipe.shift() {
        chunk_count += 1;
        byte_count += chunk.len();
        buffer.give_back(chunk);
    }
    assert_eq!(chunk_count, expected_chunks);
    assert_eq!(byte_count, total_bytes);
    assert!(pipe.is_empty());

    dc.stop();
    assert_eq!(dc.state(), DecodeState::Stop);

    dc.quit();
    handle.join().unwrap();
}

/// S2 Seek rejected: `initialized` declares `seekable=false`, so `seek`
/// must return an error without disturbing the session.
#[test]
fn s2_seek_rejected_when_not_seekable() {
    let (dc, handle) = spawn_session(
        || Box::new(TestStream::default()),
        |dec, _stream| {
            let fmt = AudioFormat::new(44_100, 2, SampleFormat::S16);
            dec.initialized(fmt, false, 10.0);
            while dec.get_command() != DecodeCommand::Stop {
                std::thread::sleep(POLL);
            }
        },
    );

    let buffer = Arc::new(MusicBuffer::new(16));
    let pipe = Arc::new(MusicPipe::new(16));
    dc.start(Song::new("test://unseekable", Tag::new()), buffer, pipe).unwrap();
    wait_for(|| dc.state() == DecodeState::Decode);

    assert!(dc.seek(30.0).is_err());
    assert_eq!(dc.state(), DecodeState::Decode);

    dc.stop();
    assert_eq!(dc.state(), DecodeState::Stop);
    dc.quit();
    handle.join().unwrap();
}

/// S3 Seek honored: a seekable session accepts `seek(45.0)`; the pipe is
/// cleared of whatever it held before the seek, and the next emitted chunk
/// is timestamped from the seek target.
#[test]
fn s3_seek_honored_clears_pipe_and_rebases_timestamp() {
    let (dc, handle) = spawn_session(
        || Box::new(TestStream::default()),
        |dec, stream| {
            let fmt = AudioFormat::new(44_100, 2, SampleFormat::S16);
            dec.initialized(fmt, true, 120.0);
            dec.data(stream, &[0u8; 4096 * 3], 1411);

            loop {
                if dec.get_command() == DecodeCommand::Seek {
                    let target = dec.seek_where();
                    assert_eq!(target, 45.0);
                    dec.command_finished();
                    break;
                }
                std::thread::sleep(POLL);
            }

            // A full chunk so it auto-flushes; a partial one would sit in
            // the decoder's hand until the next write or session end, and
            // the test below needs to observe it land in the pipe.
            dec.data(stream, &[0u8; CHUNK_SIZE], 1411);

            while dec.get_command() != DecodeCommand::Stop {
                std::thread::sleep(POLL);
            }
        },
    );

    let buffer = Arc::new(MusicBuffer::new(32));
    let pipe = Arc::new(MusicPipe::new(32));
    dc.start(Song::new("test://seekable", Tag::new()), buffer, pipe.clone()).unwrap();
    wait_for(|| dc.state() == DecodeState::Decode);
    wait_for(|| !pipe.is_empty());

    assert!(dc.seek(45.0).is_ok());
    // `command_finished`'s seek branch runs under the same lock `seek`
    // blocks on, so by the time `seek` returns the pipe has already been
    // cleared.
    assert!(pipe.is_empty());

    wait_for(|| !pipe.is_empty());
    let post_seek = pipe.shift().unwrap();
    assert_eq!(post_seek.timestamp(), 45.0);

    dc.stop();
    dc.quit();
    handle.join().unwrap();
}

/// S4 Seek during init deferred: a SEEK issued while the decoder is still
/// doing its header reads must not cut those reads short, and is only
/// handled once the plugin calls `initialized`.
#[test]
fn s4_seek_before_initialized_is_deferred() {
    let header_bytes_read = Arc::new(AtomicUsize::new(0));
    let header_bytes_read2 = header_bytes_read.clone();

    let (dc, handle) = spawn_session(
        || Box::new(TestStream::default()),
        move |dec, stream| {
            let mut header = [0u8; 8];
            for _ in 0..5 {
                let n = dec.read(stream, &mut header);
                header_bytes_read2.fetch_add(n, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
            }

            let fmt = AudioFormat::new(44_100, 2, SampleFormat::S16);
            dec.initialized(fmt, true, 30.0);

            assert_eq!(dec.get_command(), DecodeCommand::Seek);
            let target = dec.seek_where();
            assert_eq!(target, 10.0);
            dec.command_finished();

            while dec.get_command() != DecodeCommand::Stop {
                std::thread::sleep(POLL);
            }
        },
    );

    let buffer = Arc::new(MusicBuffer::new(16));
    let pipe = Arc::new(MusicPipe::new(16));

    // `start` blocks until the session leaves START, so it has to run on
    // its own thread here to let the test observe the session still doing
    // its (slow, sleep-padded) header reads.
    let dc_for_start = dc.clone();
    let start_handle = std::thread::spawn(move || {
        dc_for_start.start(Song::new("test://deferred-seek", Tag::new()), buffer, pipe).unwrap();
    });

    // `state` is still START at this point, so `seek` must not be
    // rejected — it gets held in `command` until `initialized` runs.
    wait_for(|| dc.state() == DecodeState::Start);
    assert!(dc.seek(10.0).is_ok());

    start_handle.join().unwrap();

    assert_eq!(header_bytes_read.load(Ordering::SeqCst), 40);

    dc.stop();
    dc.quit();
    handle.join().unwrap();
}

/// S5 End-of-range stop: `song.end_ms=1000` bounds the session to one
/// second of audio even though the stream could supply two.
#[test]
fn s5_end_of_range_stop() {
    let (dc, handle) = spawn_session(
        || Box::new(TestStream::default()),
        |dec, stream| {
            let fmt = AudioFormat::new(44_100, 2, SampleFormat::S16);
            dec.initialized(fmt, true, 2.0);
            let two_seconds = (2.0 * fmt.bytes_per_second() as f64) as usize;
            let slice = vec![0u8; 4096];
            let mut written = 0;
            while written < two_seconds {
                let n = slice.len().min(two_seconds - written);
                let cmd = dec.data(stream, &slice[..n], 1411);
                written += n;
                if cmd == DecodeCommand::Stop {
                    return;
                }
            }
        },
    );

    let buffer = Arc::new(MusicBuffer::new(64));
    let pipe = Arc::new(MusicPipe::new(64));
    let song = Song::new("test://ranged", Tag::new()).with_range(0, 1000);
    dc.start(song, buffer.clone(), pipe.clone()).unwrap();

    wait_for(|| dc.state() == DecodeState::Stop);

    let bytes_per_second = AudioFormat::new(44_100, 2, SampleFormat::S16).bytes_per_second() as usize;
    let mut total_bytes = 0;
    while let Some(chunk) = pipe.shift() {
        total_bytes += chunk.len();
        buffer.give_back(chunk);
    }
    assert!(total_bytes > 0);
    // The end-of-range check runs after the boundary-crossing chunk is
    // flushed, so the session can overshoot end_ms by up to one chunk.
    assert!(
        total_bytes <= bytes_per_second + CHUNK_SIZE,
        "{total_bytes} bytes exceeds one second of audio plus one chunk of overshoot"
    );

    dc.quit();
    handle.join().unwrap();
}

/// S6 Tag merge: a decoder tag wins over a conflicting stream tag, while
/// keeping whatever only the stream tag declared — here nothing, since
/// every stream item type is also present in the decoder tag.
#[test]
fn s6_decoder_tag_wins_over_stream_tag_on_conflict() {
    let (dc, handle) = spawn_session(
        || {
            Box::new(TestStream {
                tag_once: Some(Tag::new().push(TagType::Artist, "A")),
                ..TestStream::default()
            })
        },
        |dec, stream| {
            let fmt = AudioFormat::new(44_100, 2, SampleFormat::S16);
            dec.initialized(fmt, true, 10.0);
            dec.tag(stream, Tag::new().push(TagType::Title, "T").push(TagType::Artist, "B"));
        },
    );

    let buffer = Arc::new(MusicBuffer::new(8));
    let pipe = Arc::new(MusicPipe::new(8));
    dc.start(Song::new("test://tagged", Tag::new()), buffer, pipe.clone()).unwrap();

    wait_for(|| dc.state() == DecodeState::Stop);

    let chunk = pipe.shift().expect("the tagged chunk should have been flushed on session end");
    let tag = chunk.tag().expect("chunk should carry a tag");
    assert_eq!(tag.get(TagType::Title), Some("T"));
    assert_eq!(tag.get(TagType::Artist), Some("B"));

    dc.quit();
    handle.join().unwrap();
}

/// A SEEK issued while a decoder control block is idle (never started, or
/// already stopped) never reaches the command register at all — `seek`'s
/// own precondition check rejects it before taking the session lock
/// further than a single read.
#[test]
fn seek_on_idle_control_is_rejected() {
    let dc = DecoderControl::new();
    assert!(dc.seek(5.0).is_err());
    assert_eq!(dc.state(), DecodeState::Stop);
}
