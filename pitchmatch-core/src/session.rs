//! A practice session: a reference melody scored against live observations.

use crate::config::ScoringConfig;
use crate::error::PracticeResult;
use crate::melody::{ExpectedNote, ReferenceMelody};
use crate::scorer::{MatchOutcome, NoteMatchScorer, SessionReport};
use crate::tuning::NoteEvent;

/// Walks a [`ReferenceMelody`] as time advances and feeds a
/// [`NoteMatchScorer`].
///
/// The session keeps a cursor on the earliest unresolved note. Notes whose
/// window closed are recorded as misses (one sample each) before the
/// current observation is matched against the note under the cursor.
#[derive(Debug, Clone)]
pub struct PracticeSession {
    melody: ReferenceMelody,
    scorer: NoteMatchScorer,
    cursor: usize,
}

impl PracticeSession {
    pub fn new(melody: ReferenceMelody, config: ScoringConfig) -> Self {
        log::info!("[SESSION] Starting session with {} expected notes", melody.len());
        Self {
            melody,
            scorer: NoteMatchScorer::new(config),
            cursor: 0,
        }
    }

    /// Records the note observed at `timestamp_secs` (seconds since the
    /// session started) and returns the outcome for the note under the
    /// cursor.
    pub fn observe(
        &mut self,
        observed: Option<&NoteEvent>,
        timestamp_secs: f64,
    ) -> PracticeResult<MatchOutcome> {
        let window = self.scorer.config().hit_window_secs;

        while let Some(note) = self.melody.get(self.cursor).copied() {
            if self.scorer.is_resolved(&note) {
                self.cursor += 1;
                continue;
            }
            if timestamp_secs > note.due_secs + window {
                self.scorer.record(Some(note), observed, timestamp_secs)?;
                log::debug!("[SESSION] Missed note {} due at {:.3}s", note.midi, note.due_secs);
                self.cursor += 1;
                continue;
            }
            break;
        }

        let expected = self.current_note().filter(|note| timestamp_secs >= note.due_secs - window);
        let outcome = self.scorer.record(expected, observed, timestamp_secs)?;
        if outcome == MatchOutcome::Hit {
            if let Some(note) = expected {
                log::debug!("[SESSION] Hit note {} at {:.3}s", note.midi, timestamp_secs);
            }
            self.cursor += 1;
        }
        Ok(outcome)
    }

    /// The earliest note not yet hit or missed.
    pub fn current_note(&self) -> Option<ExpectedNote> {
        self.melody.get(self.cursor).copied()
    }

    /// True once every note in the melody has been resolved.
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.melody.len()
    }

    pub fn melody(&self) -> &ReferenceMelody {
        &self.melody
    }

    pub fn scorer(&self) -> &NoteMatchScorer {
        &self.scorer
    }

    /// Ends the session. Notes still pending are left unscored.
    pub fn finish(&mut self) -> SessionReport {
        self.scorer.finish()
    }

    /// Rewinds to the start of the melody with an empty score.
    pub fn reset(&mut self) {
        self.scorer.reset();
        self.cursor = 0;
    }
}
