//! Text rendering for detections and session reports.

use pitchmatch_core::{Detection, NoteEvent, SessionReport};

/// Width of the cent meter in characters, excluding the brackets.
const METER_WIDTH: usize = 21;

/// One line per detection: time, frequency, note and a cent meter.
pub fn detection_line(detection: &Detection) -> String {
    match (&detection.note, detection.frequency) {
        (Some(note), Some(freq)) => format!(
            "{:>8.3}s  {:>8.2} Hz  {:<4} {:+6.1}c  {}",
            detection.timestamp_secs,
            freq,
            note.name,
            note.cents,
            cent_meter(note)
        ),
        _ => format!("{:>8.3}s  {:>8} Hz  --", detection.timestamp_secs, "--"),
    }
}

/// A small bar showing how far the note is from its exact pitch, e.g.
/// `[---------|--*-------]` for a slightly sharp note.
pub fn cent_meter(note: &NoteEvent) -> String {
    let half = (METER_WIDTH / 2) as f32;
    // +-50 cents spans the meter.
    let offset = (note.cents.clamp(-50.0, 50.0) / 50.0 * half).round() as isize;
    let marker = (half as isize + offset) as usize;

    let mut meter = String::with_capacity(METER_WIDTH + 2);
    meter.push('[');
    for i in 0..METER_WIDTH {
        meter.push(if i == marker {
            '*'
        } else if i == METER_WIDTH / 2 {
            '|'
        } else {
            '-'
        });
    }
    meter.push(']');
    meter
}

/// Multi-line summary of a finished session.
pub fn report_text(report: &SessionReport) -> String {
    format!(
        "Accuracy:   {}%\n\
         Hits:       {} / {}\n\
         Misses:     {}\n\
         Max combo:  {}\n\
         Score:      {}\n\
         Duration:   {:.1}s",
        report.accuracy,
        report.hits,
        report.total,
        report.misses,
        report.max_combo,
        report.score,
        report.duration_secs
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_with_cents(cents: f32) -> NoteEvent {
        NoteEvent {
            midi: 69,
            name: "A4".into(),
            frequency: 440.0,
            cents,
        }
    }

    #[test]
    fn meter_marks_center_when_in_tune() {
        assert_eq!(cent_meter(&note_with_cents(0.0)), "[----------*----------]");
    }

    #[test]
    fn meter_clamps_to_edges() {
        assert_eq!(cent_meter(&note_with_cents(-80.0)), "[*---------|----------]");
        assert_eq!(cent_meter(&note_with_cents(50.0)), "[----------|---------*]");
    }

    #[test]
    fn silent_detection_line() {
        let detection = Detection {
            timestamp_secs: 1.5,
            frequency: None,
            note: None,
        };
        assert!(detection_line(&detection).ends_with("--"));
    }

    #[test]
    fn report_lists_accuracy() {
        let report = SessionReport {
            total: 4,
            hits: 3,
            misses: 1,
            accuracy: 75,
            max_combo: 2,
            combo: 1,
            score: 300,
            samples_recorded: 40,
            duration_secs: 3.0,
        };
        let text = report_text(&report);
        assert!(text.starts_with("Accuracy:   75%"));
        assert!(text.contains("Hits:       3 / 4"));
    }
}
