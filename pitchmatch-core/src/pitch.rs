//! # Pitch Detection Module
//!
//! Monophonic fundamental frequency estimation using the YIN
//! cumulative-mean-normalized difference function.
//!
//! ## Features
//! - YIN pitch detection with an absolute threshold and local-minimum descent
//! - Silence gating so a near-zero buffer never reaches the normalization
//! - Parabolic interpolation for sub-sample lag accuracy
//! - An [`Analyzer`] that filters implausible estimates and maps to notes

use crate::audio::AudioFrame;
use crate::config::DetectorConfig;
use crate::tuning::NoteEvent;

/// Estimates the fundamental frequency of `signal` with default settings.
///
/// Returns `None` when no pitch can be detected.
pub fn estimate_pitch(signal: &[f32], sample_rate: u32) -> Option<f32> {
    estimate_pitch_with(signal, sample_rate, &DetectorConfig::default())
}

/// Estimates the fundamental frequency of `signal` using the YIN algorithm.
///
/// The search covers lags `1..signal.len() / 2`, so the lowest detectable
/// frequency is about `2 * sample_rate / signal.len()`.
///
/// # Returns
/// * `Some(frequency)` - Estimated fundamental in Hz, finite and positive
/// * `None` - Silence, noise, a malformed buffer, or no lag under threshold
///
/// The result is not range-filtered; see [`DetectorConfig::accepts`].
pub fn estimate_pitch_with(
    signal: &[f32],
    sample_rate: u32,
    config: &DetectorConfig,
) -> Option<f32> {
    let frame_size = signal.len();
    if frame_size < 4 || sample_rate == 0 {
        return None;
    }
    if signal.iter().any(|s| !s.is_finite()) {
        return None;
    }

    // --- Noise Gate: a silent buffer would leave the running sum at zero ---
    let rms = (signal.iter().map(|&s| s * s).sum::<f32>() / frame_size as f32).sqrt();
    if rms < config.silence_rms {
        return None;
    }

    let half = frame_size / 2;
    let yin_buffer = normalized_difference(signal, half);

    let period = find_period(&yin_buffer, config.threshold)?;
    let lag = refine_lag(&yin_buffer, period);

    let frequency = sample_rate as f32 / lag;
    if frequency.is_finite() && frequency > 0.0 {
        Some(frequency)
    } else {
        None
    }
}

/// Computes the cumulative mean normalized difference d'(tau) for
/// `tau` in `[0, half)`.
fn normalized_difference(signal: &[f32], half: usize) -> Vec<f32> {
    let mut yin_buffer = vec![0.0_f32; half];

    // --- Squared difference function ---
    for (tau, slot) in yin_buffer.iter_mut().enumerate().skip(1) {
        let mut diff = 0.0;
        for i in 0..half {
            let delta = signal[i] - signal[i + tau];
            diff += delta * delta;
        }
        *slot = diff;
    }

    // --- Cumulative mean normalization ---
    yin_buffer[0] = 1.0;
    let mut running_sum = 0.0;
    for (tau, slot) in yin_buffer.iter_mut().enumerate().skip(1) {
        running_sum += *slot;
        if running_sum > 0.0 {
            *slot *= tau as f32 / running_sum;
        } else {
            *slot = 1.0;
        }
    }

    yin_buffer
}

/// Finds the first lag under `threshold`, then descends to the bottom of
/// that dip.
fn find_period(yin_buffer: &[f32], threshold: f32) -> Option<usize> {
    let len = yin_buffer.len();
    let mut tau = (1..len).find(|&t| yin_buffer[t] < threshold)?;
    while tau + 1 < len && yin_buffer[tau + 1] < yin_buffer[tau] {
        tau += 1;
    }
    Some(tau)
}

/// Parabolic interpolation around the chosen lag.
fn refine_lag(yin_buffer: &[f32], period: usize) -> f32 {
    if period == 0 || period + 1 >= yin_buffer.len() {
        return period as f32;
    }

    let y1 = yin_buffer[period - 1];
    let y2 = yin_buffer[period];
    let y3 = yin_buffer[period + 1];

    let denominator = y1 - 2.0 * y2 + y3;
    if denominator.abs() < f32::EPSILON {
        return period as f32;
    }
    let shift = (y1 - y3) / (2.0 * denominator);
    // The descent stops at a local minimum, so the vertex lies within half a
    // sample of it.
    period as f32 + shift.clamp(-0.5, 0.5)
}

/// Turns audio frames into detected notes.
///
/// Runs the estimator, rejects estimates outside the configured musical
/// range, and maps the survivors to the nearest note.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: DetectorConfig,
}

impl Analyzer {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Returns the in-range frequency of a frame, if any.
    pub fn frequency(&self, frame: &AudioFrame) -> Option<f32> {
        let freq = estimate_pitch_with(&frame.samples, frame.sample_rate, &self.config)?;
        if self.config.accepts(freq) {
            Some(freq)
        } else {
            log::trace!("[PITCH] Rejected out-of-range estimate {:.1} Hz", freq);
            None
        }
    }

    /// Returns the detected note of a frame, if any.
    pub fn analyze(&self, frame: &AudioFrame) -> Option<NoteEvent> {
        self.frequency(frame).map(NoteEvent::from_frequency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;
    const SIZE: usize = 2048;

    fn sine(freq: f32, amplitude: f32) -> Vec<f32> {
        (0..SIZE)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect()
    }

    fn assert_within_two_percent(freq: f32) {
        let detected = estimate_pitch(&sine(freq, 0.8), SAMPLE_RATE)
            .unwrap_or_else(|| panic!("no pitch detected for {} Hz", freq));
        let error = (detected - freq).abs() / freq;
        assert!(
            error <= 0.02,
            "expected {} Hz, detected {} Hz ({:.2}% off)",
            freq,
            detected,
            error * 100.0
        );
    }

    #[test]
    fn sine_sweep_is_within_two_percent() {
        let mut freq = 50.0_f32;
        while freq <= 2000.0 {
            assert_within_two_percent(freq);
            freq *= 1.07;
        }
    }

    #[test]
    fn range_edges() {
        for freq in [50.0, 55.0, 1960.0, 1990.0, 2000.0] {
            assert_within_two_percent(freq);
        }
    }

    #[test]
    fn amplitude_does_not_change_estimate() {
        let loud = estimate_pitch(&sine(330.0, 1.0), SAMPLE_RATE).unwrap();
        let quiet = estimate_pitch(&sine(330.0, 0.01), SAMPLE_RATE).unwrap();
        assert!((loud - quiet).abs() < 0.5);
    }

    #[test]
    fn silence_is_no_pitch() {
        assert_eq!(estimate_pitch(&vec![0.0; SIZE], SAMPLE_RATE), None);
        assert_eq!(estimate_pitch(&vec![1e-7; SIZE], SAMPLE_RATE), None);
    }

    #[test]
    fn malformed_buffers_are_no_pitch() {
        assert_eq!(estimate_pitch(&[], SAMPLE_RATE), None);
        assert_eq!(estimate_pitch(&[0.5, -0.5], SAMPLE_RATE), None);
        assert_eq!(estimate_pitch(&sine(440.0, 0.5), 0), None);

        let mut broken = sine(440.0, 0.5);
        broken[100] = f32::NAN;
        assert_eq!(estimate_pitch(&broken, SAMPLE_RATE), None);
    }

    #[test]
    fn constant_offset_is_no_pitch() {
        // A DC signal has no periodicity: every lag has zero difference.
        assert_eq!(estimate_pitch(&vec![0.5; SIZE], SAMPLE_RATE), None);
    }

    #[test]
    fn analyzer_filters_out_of_range() {
        let analyzer = Analyzer::default();
        let low = AudioFrame::new(sine(45.0, 0.8), SAMPLE_RATE);
        assert!(estimate_pitch(&low.samples, SAMPLE_RATE).is_some());
        assert_eq!(analyzer.analyze(&low), None);

        let a4 = AudioFrame::new(sine(440.0, 0.8), SAMPLE_RATE);
        let note = analyzer.analyze(&a4).unwrap();
        assert_eq!(note.midi, 69);
        assert_eq!(note.name, "A4");
    }
}
