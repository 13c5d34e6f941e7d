//! # Configuration Module
//!
//! Tunable parameters for detection, scoring and capture. Every field has a
//! default, so a configuration file only needs to name the values it changes.
//!
//! ```json
//! { "scoring": { "hit_window_secs": 0.15 } }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{PracticeError, PracticeResult};

/// Audio buffer size for one analysis frame (~46ms at 44.1kHz).
pub const BUFFER_SIZE: usize = 2048;

/// Sample rate requested from capture devices.
pub const SAMPLE_RATE: u32 = 44100;

/// Parameters of the YIN pitch estimator and the caller-side range filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Absolute threshold on the cumulative mean normalized difference.
    pub threshold: f32,
    /// Lowest frequency (Hz) trusted as a musical pitch.
    pub min_frequency: f32,
    /// Highest frequency (Hz) trusted as a musical pitch.
    pub max_frequency: f32,
    /// Frames with an RMS below this are treated as silence.
    pub silence_rms: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            min_frequency: 50.0,
            max_frequency: 2000.0,
            silence_rms: 1e-4,
        }
    }
}

impl DetectorConfig {
    /// Returns true if `freq` lies within the musically plausible range.
    pub fn accepts(&self, freq: f32) -> bool {
        freq.is_finite() && freq >= self.min_frequency && freq <= self.max_frequency
    }
}

/// Parameters of the note-match scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Half-width of the hit window in seconds. A note due at `t` can be hit
    /// anywhere in `[t - hit_window_secs, t + hit_window_secs]`.
    pub hit_window_secs: f64,
    /// Largest MIDI distance still counted as a match.
    pub semitone_tolerance: u32,
    /// Points awarded for each hit.
    pub points_per_hit: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hit_window_secs: 0.1,
            semitone_tolerance: 1,
            points_per_hit: 100,
        }
    }
}

/// Parameters of the capture side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Samples per analysis frame.
    pub buffer_size: usize,
    /// Requested device sample rate in Hz.
    pub sample_rate: u32,
    /// Nominal host frame interval. Only used by hosts that drive the
    /// scheduler from a clock; scoring never relies on it.
    pub frame_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
            sample_rate: SAMPLE_RATE,
            frame_interval_ms: 16,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    pub detector: DetectorConfig,
    pub scoring: ScoringConfig,
    pub capture: CaptureConfig,
}

impl PracticeConfig {
    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> PracticeResult<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| PracticeError::Config(e.to_string()))
    }

    /// Saves the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> PracticeResult<()> {
        let json_string =
            serde_json::to_string_pretty(self).map_err(|e| PracticeError::Config(e.to_string()))?;
        fs::write(path, json_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PracticeConfig =
            serde_json::from_str(r#"{ "scoring": { "hit_window_secs": 0.25 } }"#).unwrap();
        assert_eq!(config.scoring.hit_window_secs, 0.25);
        assert_eq!(config.scoring.semitone_tolerance, 1);
        assert_eq!(config.detector, DetectorConfig::default());
        assert_eq!(config.capture.buffer_size, BUFFER_SIZE);
    }

    #[test]
    fn range_filter() {
        let detector = DetectorConfig::default();
        assert!(detector.accepts(440.0));
        assert!(detector.accepts(50.0));
        assert!(!detector.accepts(49.9));
        assert!(!detector.accepts(2500.0));
        assert!(!detector.accepts(f32::NAN));
    }

    #[test]
    fn save_and_load() {
        let path = std::env::temp_dir().join(format!("pitchmatch-config-{}.json", std::process::id()));
        let mut config = PracticeConfig::default();
        config.detector.threshold = 0.2;
        config.save(&path).unwrap();
        let loaded = PracticeConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let path = std::env::temp_dir().join(format!("pitchmatch-bad-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let result = PracticeConfig::load(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(PracticeError::Config(_))));
    }
}
