//! Reference melodies: the notes a player is expected to hit, and when.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{PracticeError, PracticeResult};
use crate::tuning::{midi_to_note_name, note_name_to_midi};

/// A note the player should produce at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedNote {
    /// MIDI note number.
    pub midi: i32,
    /// Due time in seconds from session start.
    pub due_secs: f64,
}

impl ExpectedNote {
    pub fn new(midi: i32, due_secs: f64) -> Self {
        Self { midi, due_secs }
    }

    /// Identity used to resolve each note at most once.
    pub(crate) fn key(&self) -> (i32, u64) {
        (self.midi, self.due_secs.to_bits())
    }
}

/// An ordered sequence of expected notes.
///
/// Serialized as a plain JSON array: `[{"midi": 60, "due_secs": 0.0}]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ExpectedNote>", into = "Vec<ExpectedNote>")]
pub struct ReferenceMelody {
    notes: Vec<ExpectedNote>,
}

impl ReferenceMelody {
    /// Builds a melody, sorting notes by due time.
    ///
    /// Fails if any due time is negative or not finite, or if the same note
    /// is due twice at the same time.
    pub fn new(mut notes: Vec<ExpectedNote>) -> PracticeResult<Self> {
        if let Some(bad) = notes
            .iter()
            .find(|n| !n.due_secs.is_finite() || n.due_secs < 0.0)
        {
            return Err(PracticeError::InvalidMelody(format!(
                "due time {} of note {} is not a non-negative number",
                bad.due_secs, bad.midi
            )));
        }
        notes.sort_by(|a, b| a.due_secs.total_cmp(&b.due_secs).then(a.midi.cmp(&b.midi)));
        if let Some(pair) = notes.windows(2).find(|pair| pair[0].key() == pair[1].key()) {
            return Err(PracticeError::InvalidMelody(format!(
                "note {} is due twice at {}s",
                midi_to_note_name(pair[0].midi),
                pair[0].due_secs
            )));
        }
        Ok(Self { notes })
    }

    /// Parses the compact text form, e.g. `"C4@0.0 E4@0.5 G4@1.0"`.
    ///
    /// Tokens are separated by whitespace or commas. The note part is a note
    /// name or a MIDI number; the part after `@` is the due time in seconds.
    pub fn parse_compact(text: &str) -> PracticeResult<Self> {
        let notes = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(parse_token)
            .collect::<PracticeResult<Vec<_>>>()?;
        Self::new(notes)
    }

    /// Parses a JSON array of notes.
    pub fn from_json(json: &str) -> PracticeResult<Self> {
        serde_json::from_str(json).map_err(|e| PracticeError::InvalidMelody(e.to_string()))
    }

    /// Loads a melody from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> PracticeResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn notes(&self) -> &[ExpectedNote] {
        &self.notes
    }

    pub fn get(&self, index: usize) -> Option<&ExpectedNote> {
        self.notes.get(index)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Renders the melody in the compact text form.
    pub fn to_compact(&self) -> String {
        self.notes
            .iter()
            .map(|n| format!("{}@{}", midi_to_note_name(n.midi), n.due_secs))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TryFrom<Vec<ExpectedNote>> for ReferenceMelody {
    type Error = PracticeError;

    fn try_from(notes: Vec<ExpectedNote>) -> PracticeResult<Self> {
        Self::new(notes)
    }
}

impl From<ReferenceMelody> for Vec<ExpectedNote> {
    fn from(melody: ReferenceMelody) -> Self {
        melody.notes
    }
}

fn parse_token(token: &str) -> PracticeResult<ExpectedNote> {
    let (note, due) = token
        .split_once('@')
        .ok_or_else(|| PracticeError::InvalidMelody(format!("expected NOTE@SECONDS, got '{}'", token)))?;

    let midi = note
        .parse::<i32>()
        .ok()
        .or_else(|| note_name_to_midi(note))
        .ok_or_else(|| PracticeError::InvalidMelody(format!("unknown note '{}'", note)))?;
    let due_secs = due
        .parse::<f64>()
        .map_err(|_| PracticeError::InvalidMelody(format!("bad due time '{}'", due)))?;

    Ok(ExpectedNote::new(midi, due_secs))
}
