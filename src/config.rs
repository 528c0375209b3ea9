//! In-memory shape of the replay-gain policy a host daemon loads from its
//! own configuration file. This crate never touches disk for
//! configuration itself; it only defines the `Deserialize`/`Serialize`
//! value types.

use serde::{Deserialize, Serialize};

use crate::replaygain::ReplayGainMode;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReplayGainConfig {
    pub mode: ReplayGainMode,
    /// dB added on top of the track/album gain before scaling.
    pub preamp: f32,
    /// dB used instead of `preamp` for tracks with no replay-gain tags.
    pub missing_preamp: f32,
    /// Hard ceiling on the linear scale factor, preventing clipping when a
    /// track's tags claim an implausibly large gain.
    pub limit: f32,
}

impl Default for ReplayGainConfig {
    fn default() -> Self {
        Self {
            mode: ReplayGainMode::Off,
            preamp: 0.0,
            missing_preamp: -6.0,
            limit: 15.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let cfg = ReplayGainConfig {
            mode: ReplayGainMode::Album,
            preamp: 2.0,
            missing_preamp: -8.0,
            limit: 12.0,
        };
        let s = toml::to_string(&cfg).unwrap();
        let back: ReplayGainConfig = toml::from_str(&s).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn default_mode_is_off() {
        assert_eq!(ReplayGainConfig::default().mode, ReplayGainMode::Off);
    }
}
