// pitchmatch-core/src/lib.rs

//! The core logic for pitch-matching practice.
//! This crate is responsible for pitch detection, note mapping, the live
//! capture loop and scoring sung or played notes against a reference
//! melody. It is completely headless and contains no UI code.
//!
//! ```
//! use pitchmatch_core::{estimate_pitch, freq_to_midi, midi_to_note_name};
//!
//! let samples: Vec<f32> = (0..2048)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
//!     .collect();
//! let freq = estimate_pitch(&samples, 44100).unwrap();
//! assert_eq!(midi_to_note_name(freq_to_midi(freq)), "A4");
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod logging;
pub mod melody;
pub mod pitch;
pub mod scheduler;
pub mod scorer;
pub mod session;
pub mod tuning;

mod error;

pub use audio::{AudioFrame, CaptureDevice, ReplayDevice};
#[cfg(feature = "microphone")]
pub use audio::MicrophoneDevice;
pub use capture::{CaptureLoop, CaptureStatus, Detection};
pub use config::{CaptureConfig, DetectorConfig, PracticeConfig, ScoringConfig};
pub use error::{PracticeError, PracticeResult};
pub use logging::{LogBuffer, LogEntry, RingLogger};
pub use melody::{ExpectedNote, ReferenceMelody};
pub use pitch::{Analyzer, estimate_pitch, estimate_pitch_with};
pub use scheduler::{FrameScheduler, TaskHandle};
pub use scorer::{MatchOutcome, MatchSample, NoteMatchScorer, SessionReport};
pub use session::PracticeSession;
pub use tuning::{NoteEvent, cents_deviation, freq_to_midi, midi_to_freq, midi_to_note_name, note_name_to_midi};
