//! # Note-Match Scorer
//!
//! Reduces a stream of (expected note, observed note, timestamp) samples
//! into a [`SessionReport`].
//!
//! ## Matching rules
//! - A sample with no expected note is ignored.
//! - An expected note is *active* from `due - window` to `due + window`,
//!   where `window` is [`ScoringConfig::hit_window_secs`].
//! - The first active sample whose observed note is within
//!   [`ScoringConfig::semitone_tolerance`] semitones is the note's hit.
//! - The first sample after the window closes, if the note was never hit,
//!   is the note's miss.
//! - Every expected note resolves at most once, so the tick rate never
//!   inflates hits or misses. Only resolving samples are scored.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::ScoringConfig;
use crate::error::{PracticeError, PracticeResult};
use crate::melody::ExpectedNote;
use crate::tuning::NoteEvent;

/// How a single sample was scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// The sample resolved its expected note as a hit.
    Hit,
    /// The sample resolved its expected note as a miss.
    Miss,
    /// The expected note is active but has not been matched yet.
    Pending,
    /// Not scored: no expected note, the note is not due yet, or it was
    /// already resolved.
    Ignored,
}

impl MatchOutcome {
    pub fn is_scored(self) -> bool {
        matches!(self, MatchOutcome::Hit | MatchOutcome::Miss)
    }
}

/// One recorded observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSample {
    pub expected: Option<ExpectedNote>,
    pub observed_midi: Option<i32>,
    pub timestamp_secs: f64,
    pub outcome: MatchOutcome,
}

/// Aggregate result of one practice session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Scored samples, equal to `hits + misses`.
    pub total: usize,
    pub hits: usize,
    pub misses: usize,
    /// `round(hits / total * 100)`, 0 for an empty session.
    pub accuracy: u32,
    /// Longest run of hits without a miss.
    pub max_combo: usize,
    /// Run of hits at the end of the session.
    pub combo: usize,
    /// Points earned, `hits * points_per_hit`.
    pub score: u64,
    /// Every sample recorded, scored or not.
    pub samples_recorded: usize,
    /// Time between the first and the last recorded sample.
    pub duration_secs: f64,
}

impl SessionReport {
    /// Saves the report as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> PracticeResult<()> {
        let json_string =
            serde_json::to_string_pretty(self).map_err(|e| PracticeError::Config(e.to_string()))?;
        fs::write(path, json_string)?;
        Ok(())
    }

    /// Loads a report saved with [`SessionReport::save`].
    pub fn load(path: impl AsRef<Path>) -> PracticeResult<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| PracticeError::Config(e.to_string()))
    }
}

/// Accumulates match samples for one session.
#[derive(Debug, Clone, Default)]
pub struct NoteMatchScorer {
    config: ScoringConfig,
    samples: Vec<MatchSample>,
    resolved: HashSet<(i32, u64)>,
    hits: usize,
    misses: usize,
    combo: usize,
    max_combo: usize,
    report: Option<SessionReport>,
}

impl NoteMatchScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Records one sample and returns how it was scored.
    ///
    /// Timestamps are expected to be non-decreasing; an earlier timestamp is
    /// clamped to the latest one seen.
    ///
    /// # Errors
    /// [`PracticeError::SessionFinished`] once [`finish`](Self::finish) has
    /// been called, until [`reset`](Self::reset).
    pub fn record(
        &mut self,
        expected: Option<ExpectedNote>,
        observed: Option<&NoteEvent>,
        timestamp_secs: f64,
    ) -> PracticeResult<MatchOutcome> {
        if self.report.is_some() {
            return Err(PracticeError::SessionFinished);
        }

        let timestamp_secs = match self.samples.last() {
            Some(last) if !(timestamp_secs >= last.timestamp_secs) => {
                log::debug!(
                    "[SESSION] Out-of-order timestamp {} clamped to {}",
                    timestamp_secs,
                    last.timestamp_secs
                );
                last.timestamp_secs
            }
            None if !timestamp_secs.is_finite() => 0.0,
            _ => timestamp_secs,
        };

        let observed_midi = observed.map(|note| note.midi);
        let outcome = match expected {
            Some(note) => self.judge(note, observed_midi, timestamp_secs),
            None => MatchOutcome::Ignored,
        };

        match outcome {
            MatchOutcome::Hit => {
                self.hits += 1;
                self.combo += 1;
                self.max_combo = self.max_combo.max(self.combo);
            }
            MatchOutcome::Miss => {
                self.misses += 1;
                self.combo = 0;
            }
            MatchOutcome::Pending | MatchOutcome::Ignored => {}
        }

        self.samples.push(MatchSample {
            expected,
            observed_midi,
            timestamp_secs,
            outcome,
        });
        Ok(outcome)
    }

    fn judge(&mut self, note: ExpectedNote, observed_midi: Option<i32>, at: f64) -> MatchOutcome {
        if self.resolved.contains(&note.key()) {
            return MatchOutcome::Ignored;
        }

        let window = self.config.hit_window_secs;
        if at < note.due_secs - window {
            return MatchOutcome::Ignored;
        }

        if at > note.due_secs + window {
            self.resolved.insert(note.key());
            return MatchOutcome::Miss;
        }

        let tolerance = self.config.semitone_tolerance as i64;
        match observed_midi {
            Some(midi) if (midi as i64 - note.midi as i64).abs() <= tolerance => {
                self.resolved.insert(note.key());
                MatchOutcome::Hit
            }
            _ => MatchOutcome::Pending,
        }
    }

    /// Returns true once `note` has been scored as a hit or a miss.
    pub fn is_resolved(&self, note: &ExpectedNote) -> bool {
        self.resolved.contains(&note.key())
    }

    pub fn samples(&self) -> &[MatchSample] {
        &self.samples
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Current run of consecutive hits.
    pub fn combo(&self) -> usize {
        self.combo
    }

    /// Points earned so far.
    pub fn score(&self) -> u64 {
        self.hits as u64 * self.config.points_per_hit as u64
    }

    pub fn is_finished(&self) -> bool {
        self.report.is_some()
    }

    /// Ends the session and returns its report.
    ///
    /// Further calls return the same report until [`reset`](Self::reset).
    pub fn finish(&mut self) -> SessionReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        let total = self.hits + self.misses;
        let accuracy = if total > 0 {
            (self.hits as f64 / total as f64 * 100.0).round() as u32
        } else {
            0
        };
        let duration_secs = match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp_secs - first.timestamp_secs,
            _ => 0.0,
        };

        let report = SessionReport {
            total,
            hits: self.hits,
            misses: self.misses,
            accuracy,
            max_combo: self.max_combo,
            combo: self.combo,
            score: self.score(),
            samples_recorded: self.samples.len(),
            duration_secs,
        };
        log::info!(
            "[SESSION] Finished: {}/{} hits ({}%), max combo {}",
            report.hits,
            report.total,
            report.accuracy,
            report.max_combo
        );
        self.report = Some(report.clone());
        report
    }

    /// Clears all samples and re-arms the scorer for a new session.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
