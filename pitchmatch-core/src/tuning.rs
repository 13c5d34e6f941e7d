//! # Musical Tuning Module
//!
//! Conversions between frequencies, MIDI note numbers and note names in
//! twelve-tone equal temperament with A4 = 440 Hz.
//!
//! ## Features
//! - Frequency to nearest MIDI note (lossy by design)
//! - MIDI note to name (`60` -> `"C4"`), including negative note numbers
//! - Note name to MIDI lookup with sharp and flat spellings
//! - Cent deviation for showing how far off a sung note is

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI note number of A4.
pub const A4_MIDI: i32 = 69;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const FLAT_NAMES: [Option<&str>; 12] = [
    None,
    Some("Db"),
    None,
    Some("Eb"),
    None,
    None,
    Some("Gb"),
    None,
    Some("Ab"),
    None,
    Some("Bb"),
    None,
];

/// Name to MIDI lookup for the standard MIDI range (0-127).
///
/// Holds both the canonical sharp spelling and the flat alias of every
/// black key, so "C#4" and "Db4" both resolve to 61.
static NOTE_MAP: Lazy<BTreeMap<String, i32>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    for midi in 0..=127 {
        map.insert(midi_to_note_name(midi), midi);
        if let Some(flat) = FLAT_NAMES[midi.rem_euclid(12) as usize] {
            map.insert(format!("{}{}", flat, octave_of(midi)), midi);
        }
    }
    map
});

/// Converts a frequency to the nearest equal-tempered MIDI note number.
///
/// Rounds half-up: a frequency exactly between two notes maps to the upper
/// one. No range validation is done; callers filter implausible frequencies
/// before mapping.
pub fn freq_to_midi(freq: f32) -> i32 {
    let semitones = 12.0 * (freq / A4_FREQUENCY).log2();
    // `as` saturates for huge or infinite input.
    ((semitones + 0.5).floor() as i32).saturating_add(A4_MIDI)
}

/// Converts a MIDI note number to its equal-tempered frequency in Hz.
pub fn midi_to_freq(midi: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Converts a MIDI note number to a note name such as "A4" or "C#-1".
pub fn midi_to_note_name(midi: i32) -> String {
    format!("{}{}", NOTE_NAMES[midi.rem_euclid(12) as usize], octave_of(midi))
}

/// Looks up the MIDI number of a note name ("C4", "F#3", "Bb2").
///
/// Only the standard MIDI range is covered; returns `None` for anything
/// else.
pub fn note_name_to_midi(name: &str) -> Option<i32> {
    NOTE_MAP.get(name.trim()).copied()
}

/// Calculates the deviation from a target frequency in cents.
///
/// 100 cents = 1 semitone. Positive values are sharp, negative are flat.
pub fn cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

fn octave_of(midi: i32) -> i32 {
    midi.div_euclid(12) - 1
}

/// A detected note: the nearest MIDI note to an observed frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI note number (60 = middle C).
    pub midi: i32,
    /// Note name, e.g. "A4".
    pub name: String,
    /// The observed frequency in Hz.
    pub frequency: f32,
    /// Deviation of the observed frequency from the note's exact pitch.
    pub cents: f32,
}

impl NoteEvent {
    /// Maps an observed frequency to its nearest note.
    pub fn from_frequency(frequency: f32) -> Self {
        let midi = freq_to_midi(frequency);
        Self {
            midi,
            name: midi_to_note_name(midi),
            frequency,
            cents: cents_deviation(frequency, midi_to_freq(midi)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn reference_frequencies() {
        assert_eq!(freq_to_midi(440.0), 69);
        assert_eq!(freq_to_midi(261.63), 60);
        assert_eq!(freq_to_midi(523.25), 72);
        assert_eq!(freq_to_midi(130.81), 48);
        assert!(freq_to_midi(880.0) > freq_to_midi(440.0));
    }

    #[test]
    fn note_names() {
        assert_eq!(midi_to_note_name(60), "C4");
        assert_eq!(midi_to_note_name(61), "C#4");
        assert_eq!(midi_to_note_name(69), "A4");
        assert_eq!(midi_to_note_name(71), "B4");
        assert_eq!(midi_to_note_name(48), "C3");
        assert_eq!(midi_to_note_name(0), "C-1");
        assert_eq!(midi_to_note_name(127), "G9");
    }

    #[test]
    fn negative_midi_uses_euclidean_modulus() {
        assert_eq!(midi_to_note_name(-1), "B-2");
        assert_eq!(midi_to_note_name(-12), "C-2");
        assert_eq!(midi_to_note_name(-13), "B-3");
    }

    #[test]
    fn name_components_follow_formula() {
        for m in -40..200 {
            let name = midi_to_note_name(m);
            let letter = NOTE_NAMES[(((m % 12) + 12) % 12) as usize];
            let octave = (m as f64 / 12.0).floor() as i32 - 1;
            assert_eq!(name, format!("{}{}", letter, octave), "midi {}", m);
        }
    }

    #[test]
    fn round_trip_is_nearest_note() {
        assert_eq!(midi_to_note_name(freq_to_midi(440.0)), "A4");
        assert_eq!(midi_to_note_name(freq_to_midi(261.63)), "C4");
        // 450 Hz is closer to A4 than to A#4
        assert_eq!(midi_to_note_name(freq_to_midi(450.0)), "A4");
    }

    #[test]
    fn infinite_frequency_saturates() {
        assert_eq!(freq_to_midi(f32::INFINITY), i32::MAX);
    }

    #[test]
    fn name_lookup() {
        assert_eq!(note_name_to_midi("C4"), Some(60));
        assert_eq!(note_name_to_midi("C#4"), Some(61));
        assert_eq!(note_name_to_midi("Db4"), Some(61));
        assert_eq!(note_name_to_midi(" A4 "), Some(69));
        assert_eq!(note_name_to_midi("H4"), None);
        assert_eq!(note_name_to_midi("C10"), None);
    }

    #[test]
    fn frequencies_and_cents() {
        assert_abs_diff_eq!(midi_to_freq(69), 440.0, epsilon = 1e-3);
        assert_abs_diff_eq!(midi_to_freq(81), 880.0, epsilon = 1e-2);
        assert_abs_diff_eq!(cents_deviation(880.0, 440.0), 1200.0, epsilon = 1e-3);
        assert_abs_diff_eq!(cents_deviation(440.0, 440.0), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn note_event_from_frequency() {
        let note = NoteEvent::from_frequency(446.0);
        assert_eq!(note.midi, 69);
        assert_eq!(note.name, "A4");
        assert!(note.cents > 0.0 && note.cents < 50.0);
    }
}
