//! Error types for the practice core

use thiserror::Error;

/// Errors surfaced by the practice core.
///
/// Estimation and note mapping never produce these: a bad frame is
/// reported as "no pitch" instead. Only resource acquisition, session
/// misuse and malformed inputs fail.
#[derive(Debug, Error)]
pub enum PracticeError {
    /// The capture device could not be acquired (permission denied, no
    /// device, or a device error). The capture loop stays idle.
    #[error("Capture device unavailable: {0}")]
    CaptureUnavailable(String),

    /// `record` was called on a scorer whose session already finished.
    #[error("Session already finished; reset the scorer before recording")]
    SessionFinished,

    /// A reference melody could not be parsed.
    #[error("Invalid melody: {0}")]
    InvalidMelody(String),

    /// A configuration or report file could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for practice operations
pub type PracticeResult<T> = Result<T, PracticeError>;
