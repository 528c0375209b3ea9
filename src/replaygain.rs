//! Replay-gain scale computation and the process-wide epoch serial.
//!
//! A new, non-zero serial is minted every time a plugin reports fresh
//! replay-gain info, chunks written after that point carry the new
//! serial, and a change in serial forces a chunk flush so no single chunk
//! straddles two epochs.

use std::sync::atomic::{AtomicU32, Ordering};

/// One (gain dB, peak) measurement. A session tracks several of these per
/// track (track vs. album); which one is "real" depends on
/// `ReplayGainMode`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ReplayGainTuple {
    pub gain_db: f32,
    pub peak: f32,
}

impl ReplayGainTuple {
    /// `scale = 10^(gain/20)`, clamped to `limit` and falling back to
    /// `missing_preamp` when this tuple has no gain recorded (`gain_db ==
    /// 0.0 && peak == 0.0` is the "no data" sentinel).
    pub fn scale(&self, preamp: f32, missing_preamp: f32, limit: f32) -> f32 {
        let has_data = self.gain_db != 0.0 || self.peak != 0.0;
        let effective_preamp = if has_data { preamp } else { missing_preamp };
        let scale = 10f32.powf((self.gain_db + effective_preamp) / 20.0);
        scale.min(limit)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ReplayGainInfo {
    pub track: ReplayGainTuple,
    pub album: ReplayGainTuple,
}

/// Which tuple a decode session should use, and whether replay gain is
/// applied at all. Loaded by a host daemon from its own configuration;
/// this crate only defines the shape.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayGainMode {
    #[default]
    Off,
    Track,
    Album,
}

impl ReplayGainInfo {
    pub fn selected(&self, mode: ReplayGainMode) -> Option<ReplayGainTuple> {
        match mode {
            ReplayGainMode::Off => None,
            ReplayGainMode::Track => Some(self.track),
            ReplayGainMode::Album => Some(self.album),
        }
    }
}

/// Process-wide monotonically non-zero counter. Wrapping past `u32::MAX`
/// skips back to `1`, never `0` — `0` is reserved to mean "no replay gain
/// applied".
static SERIAL: AtomicU32 = AtomicU32::new(0);

/// Mint the next serial. Never returns 0.
pub fn next_serial() -> u32 {
    loop {
        let prev = SERIAL.fetch_add(1, Ordering::Relaxed);
        let next = prev.wrapping_add(1);
        if next != 0 {
            return next;
        }
        // landed exactly on the wrap to 0; loop to mint the next one.
    }
}
