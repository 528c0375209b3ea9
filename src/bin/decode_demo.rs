//! Runs one decode session end-to-end against a synthetic sine-wave
//! "format plugin" and input stream, printing how many chunks came out
//! the other end. Exercises the same start/poll/stop path a real host
//! daemon would drive.

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::info;

use decoder_control::buffer::MusicBuffer;
use decoder_control::control::{spawn_decoder_thread, DecodeCommand, DecodeState, DecoderControl};
use decoder_control::decoder::Decoder;
use decoder_control::format::{AudioFormat, SampleFormat};
use decoder_control::pipe::MusicPipe;
use decoder_control::plugin::{FormatPlugin, InputStreamPlugin};
use decoder_control::song::Song;
use decoder_control::stream::InputStream;
use decoder_control::tag::{Tag, TagType};

#[derive(Parser)]
#[command(about = "Decode a synthetic sine wave through the control plane")]
struct Args {
    #[arg(long, default_value_t = 2.0)]
    duration_secs: f64,

    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    #[arg(long, default_value_t = 2)]
    channels: u8,

    #[arg(long, default_value_t = 1.0)]
    seek_to_secs: f64,
}

/// A stream with no real bytes; the format plugin synthesizes PCM
/// directly, so this only tracks sample position for seek/eof bookkeeping.
struct SineWaveStream {
    total_samples: u64,
    position: u64,
}

impl InputStream for SineWaveStream {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(0)
    }

    fn seek(&mut self, offset: i64) -> Option<std::io::Result<()>> {
        self.position = offset.max(0) as u64;
        Some(Ok(()))
    }

    fn eof(&self) -> bool {
        self.position >= self.total_samples
    }

    fn seekable(&self) -> bool {
        true
    }

    fn offset(&self) -> i64 {
        self.position as i64
    }

    fn size(&self) -> Option<i64> {
        Some(self.total_samples as i64)
    }
}

struct SineWaveOpener {
    total_samples: u64,
}

impl InputStreamPlugin for SineWaveOpener {
    fn open(&self, _url: &str) -> std::io::Result<Box<dyn InputStream>> {
        Ok(Box::new(SineWaveStream {
            total_samples: self.total_samples,
            position: 0,
        }))
    }
}

struct SineWavePlugin {
    sample_rate: u32,
    channels: u8,
    duration_secs: f64,
}

const SLICE_FRAMES: usize = 512;

impl FormatPlugin for SineWavePlugin {
    fn name(&self) -> &str {
        "sine-demo"
    }

    fn probe(&self, _stream: &mut dyn InputStream) -> bool {
        true
    }

    fn decode(&self, dec: &mut Decoder, stream: &mut dyn InputStream) {
        let sample_rate = self.sample_rate;
        let fmt = AudioFormat::new(sample_rate, self.channels, SampleFormat::S16);
        dec.initialized(fmt, true, self.duration_secs);

        let frame_size = fmt.frame_size() as usize;
        let mut buf = vec![0u8; SLICE_FRAMES * frame_size];
        let mut frame_index: u64 = 0;
        let total_frames = (self.duration_secs * sample_rate as f64) as u64;

        dec.tag(stream, Tag::new().push(TagType::Title, "Sine Demo").with_duration(self.duration_secs));

        while frame_index < total_frames {
            if dec.get_command() == DecodeCommand::Seek {
                let target_secs = dec.seek_where();
                frame_index = (target_secs * sample_rate as f64) as u64;
                dec.timestamp(target_secs);
                dec.command_finished();
            }

            let frames_this_slice = SLICE_FRAMES.min((total_frames - frame_index) as usize);
            buf.truncate(frames_this_slice * frame_size);
            for frame in 0..frames_this_slice {
                let t = (frame_index + frame as u64) as f64 / sample_rate as f64;
                let sample = (2.0 * PI * 440.0 * t).sin();
                let value = (sample * i16::MAX as f64) as i16;
                for ch in 0..self.channels as usize {
                    let offset = (frame * self.channels as usize + ch) * 2;
                    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
                }
            }

            let cmd = dec.data(stream, &buf, 1411);
            frame_index += frames_this_slice as u64;
            match cmd {
                DecodeCommand::None => {}
                DecodeCommand::Stop => return,
                DecodeCommand::Seek => continue,
                DecodeCommand::Start => unreachable!("START is never re-issued mid-session"),
            }
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let dc = DecoderControl::new();
    let buffer = Arc::new(MusicBuffer::new(64));
    let pipe = Arc::new(MusicPipe::new(64));

    let opener = Arc::new(SineWaveOpener {
        total_samples: (args.duration_secs * args.sample_rate as f64) as u64,
    });
    let plugin: Arc<dyn FormatPlugin> = Arc::new(SineWavePlugin {
        sample_rate: args.sample_rate,
        channels: args.channels,
        duration_secs: args.duration_secs,
    });

    let handle = spawn_decoder_thread(dc.clone(), opener, vec![plugin]);

    let song = Song::new("sine://demo", Tag::new()).with_range(0, (args.duration_secs * 1000.0) as u64);
    if let Err(e) = dc.start(song, buffer.clone(), pipe.clone()) {
        log::error!("could not start session: {e}");
        dc.quit();
        handle.join().unwrap();
        return;
    }

    if dc.state() == DecodeState::Error {
        log::error!("decode session failed to start");
    } else {
        info!("decoding at {:?}", dc.out_audio_format());

        if args.seek_to_secs > 0.0 && args.seek_to_secs < args.duration_secs {
            std::thread::sleep(Duration::from_millis(50));
            match dc.seek(args.seek_to_secs) {
                Ok(()) => info!("seek to {}s: accepted", args.seek_to_secs),
                Err(e) => info!("seek to {}s: rejected ({e})", args.seek_to_secs),
            }
        }

        let mut chunk_count = 0usize;
        let mut byte_count = 0usize;
        loop {
            match pipe.shift() {
                Some(chunk) => {
                    chunk_count += 1;
                    byte_count += chunk.len();
                    buffer.give_back(chunk);
                }
                None => {
                    if dc.state() != DecodeState::Decode {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        }

        info!("session ended in state {:?}: {chunk_count} chunks, {byte_count} bytes", dc.state());
    }

    dc.quit();
    handle.join().unwrap();
}
