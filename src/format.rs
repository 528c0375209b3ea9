//! Audio format descriptor.

/// On-the-wire sample representation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    S8,
    S16,
    S24,
    S32,
    F32,
    Dsd,
}

impl SampleFormat {
    /// Size of one sample of this format, in bytes.
    pub const fn bytes(self) -> u32 {
        match self {
            SampleFormat::S8 | SampleFormat::Dsd => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 | SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }
}

/// Immutable value describing sample rate, channel count and sample width.
///
/// `AudioFormat::default()` produces the "not defined" state used before a
/// format plugin has called [`crate::decoder::Decoder::initialized`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct AudioFormat {
    sample_rate: Option<u32>,
    channels: Option<u8>,
    sample_format: Option<SampleFormat>,
}

/// Lower/upper bounds on `sample_rate` for [`AudioFormat::valid`].
pub const MIN_SAMPLE_RATE: u32 = 4_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;
pub const MAX_CHANNELS: u8 = 8;

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u8, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            channels: Some(channels),
            sample_format: Some(sample_format),
        }
    }

    /// All three fields are set.
    pub fn defined(&self) -> bool {
        self.sample_rate.is_some() && self.channels.is_some() && self.sample_format.is_some()
    }

    /// `defined` and within sane bounds.
    pub fn valid(&self) -> bool {
        self.defined()
            && (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate.unwrap())
            && self.channels.unwrap() >= 1
            && self.channels.unwrap() <= MAX_CHANNELS
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn channels(&self) -> Option<u8> {
        self.channels
    }

    pub fn sample_format(&self) -> Option<SampleFormat> {
        self.sample_format
    }

    /// Bytes occupied by one frame (one sample per channel). Panics if not
    /// `defined` — callers are expected to check `valid()` first.
    pub fn frame_size(&self) -> u32 {
        self.channels.expect("frame_size on undefined AudioFormat") as u32
            * self.sample_format.expect("frame_size on undefined AudioFormat").bytes()
    }

    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate.expect("bytes_per_second on undefined AudioFormat") * self.frame_size()
    }
}
