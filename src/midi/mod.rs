//! Melodic event data structures and the MIDI container boundary.
//!
//! This module provides the event types every component exchanges
//! ([`MelodicEvent`], [`EventSequence`]) along with the Standard MIDI File
//! codec used for file export and import.

mod midi_export;
mod midi_import;
mod note;
mod sequence;

pub use midi_export::{encode_events, encode_tracks, export_to_midi, ExportOptions};
pub use midi_import::{decode_container, import_from_midi};
pub use note::{MelodicEvent, WireNote, DEFAULT_VELOCITY};
pub use sequence::EventSequence;

use crate::error::{MelodyError, Result};

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Highest valid MIDI note number.
pub const MAX_PITCH: u8 = 127;

/// Ticks per beat (quarter note) written into exported containers.
pub const TICKS_PER_BEAT: u32 = 480;

/// Resolution of gesture event streams: one tick per millisecond.
pub const TICKS_PER_SECOND: u32 = 1000;

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO: u32 = 120;

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Examples
///
/// ```
/// use gesture_edit::midi::note_to_name;
///
/// assert_eq!(note_to_name(60), "C4");
/// assert_eq!(note_to_name(70), "A#4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Converts a note name like "C4", "F#5" or "Bb3" to a MIDI note number.
///
/// Returns None for unknown names or octaves outside the MIDI range.
pub fn name_to_note(name: &str) -> Option<u8> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    // Find where the octave number starts
    let octave_start = name
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_digit() || *c == '-')
        .map(|(i, _)| i)?;

    let pitch_class = crate::theory::parse_pitch_class(&name[..octave_start])?;
    let octave: i16 = name[octave_start..].parse().ok()?;

    // MIDI note = (octave + 1) * 12 + pitch class
    let midi_note = (octave + 1) * 12 + pitch_class as i16;
    if (0..=MAX_PITCH as i16).contains(&midi_note) {
        Some(midi_note as u8)
    } else {
        None
    }
}

/// Checks that a computed pitch still fits the MIDI range.
///
/// `index` identifies the offending note in the error.
pub fn checked_pitch(pitch: i32, index: usize) -> Result<u8> {
    if (0..=MAX_PITCH as i32).contains(&pitch) {
        Ok(pitch as u8)
    } else {
        Err(MelodyError::RangeOverflow { index, pitch })
    }
}

/// Converts beat ticks to seconds based on tempo.
pub fn ticks_to_seconds(ticks: u32, tempo: u32) -> f64 {
    let beats = ticks as f64 / TICKS_PER_BEAT as f64;
    beats * 60.0 / tempo as f64
}

/// Converts seconds to beat ticks based on tempo, rounding to the nearest tick.
pub fn seconds_to_ticks(seconds: f64, tempo: u32) -> u32 {
    let beats = seconds_to_quarter_length(seconds, tempo);
    (beats * TICKS_PER_BEAT as f64).round().max(0.0) as u32
}

/// Converts seconds to quarter-note lengths. At 120 BPM one second is two quarters.
pub fn seconds_to_quarter_length(seconds: f64, tempo: u32) -> f64 {
    seconds * tempo as f64 / 60.0
}

/// Converts seconds to gesture ticks at [`TICKS_PER_SECOND`].
pub fn seconds_to_gesture_ticks(seconds: f64) -> u64 {
    (seconds * TICKS_PER_SECOND as f64).round().max(0.0) as u64
}

/// Converts gesture ticks back to seconds.
pub fn gesture_ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_name() {
        assert_eq!(note_to_name(60), "C4");
        assert_eq!(note_to_name(69), "A4");
        assert_eq!(note_to_name(0), "C-1");
        assert_eq!(note_to_name(127), "G9");
    }

    #[test]
    fn test_name_to_note() {
        assert_eq!(name_to_note("C4"), Some(60));
        assert_eq!(name_to_note("A4"), Some(69));
        assert_eq!(name_to_note("C-1"), Some(0));
        assert_eq!(name_to_note("Bb3"), Some(58));
        assert_eq!(name_to_note("G#9"), None);
        assert_eq!(name_to_note("H4"), None);
    }

    #[test]
    fn test_checked_pitch() {
        assert_eq!(checked_pitch(127, 0).unwrap(), 127);
        assert!(matches!(
            checked_pitch(-1, 4),
            Err(MelodyError::RangeOverflow { index: 4, pitch: -1 })
        ));
    }

    #[test]
    fn test_tick_conversions() {
        // At 120 BPM, one beat = 0.5 seconds
        let seconds = ticks_to_seconds(TICKS_PER_BEAT, 120);
        assert!((seconds - 0.5).abs() < 0.001);
        assert_eq!(seconds_to_ticks(0.5, 120), TICKS_PER_BEAT);
        assert!((seconds_to_quarter_length(1.0, 120) - 2.0).abs() < 1e-12);

        assert_eq!(seconds_to_gesture_ticks(0.2476), 248);
        assert!((gesture_ticks_to_seconds(1500) - 1.5).abs() < 1e-12);
    }
}
