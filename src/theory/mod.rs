//! Music theory helpers: keys, modes and pitch snapping.

mod scale;

pub use scale::{
    nearest_pitch_class, pitch_classes, Mode, PitchClassSet, ScaleModel, ScaleResolution,
};

use crate::error::{MelodyError, Result};
use crate::midi::{EventSequence, MelodicEvent};

/// Parses a note name without octave ("C", "f#", "Bb", "Cs") into a pitch class.
pub fn parse_pitch_class(name: &str) -> Option<u8> {
    let name = name.trim();
    let mut chars = name.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let natural: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let accidental: i32 = match chars.as_str() {
        "" => 0,
        "#" | "s" | "S" | "♯" => 1,
        "b" | "♭" => -1,
        _ => return None,
    };
    Some((natural + accidental).rem_euclid(12) as u8)
}

/// Generates an ascending scale run: `count` notes of `note_length` seconds
/// each, starting from `start` snapped into the key.
///
/// The default melody is C major from middle C, eight notes of a quarter
/// second each.
///
/// # Errors
///
/// Returns a validation error for a non-positive note length, or a range
/// error if the run climbs past 127.
pub fn scale_run(
    scale: &ScaleModel,
    start: u8,
    count: usize,
    note_length: f64,
    velocity: f32,
) -> Result<EventSequence> {
    if !(note_length.is_finite() && note_length > 0.0) {
        return Err(MelodyError::validation(
            "noteLength",
            format!("must be a positive number of seconds, got {}", note_length),
        ));
    }
    let first = scale.snap(start);
    let events = (0..count)
        .map(|i| {
            let pitch = scale.step(first, i as i32, i)?;
            MelodicEvent::new(pitch, i as f64 * note_length, note_length, velocity)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(EventSequence::from_events(events))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pitch_class() {
        assert_eq!(parse_pitch_class("C"), Some(0));
        assert_eq!(parse_pitch_class("c#"), Some(1));
        assert_eq!(parse_pitch_class("Bb"), Some(10));
        assert_eq!(parse_pitch_class("Cb"), Some(11));
        assert_eq!(parse_pitch_class("Fs"), Some(6));
        assert_eq!(parse_pitch_class("H"), None);
        assert_eq!(parse_pitch_class("C##"), None);
        assert_eq!(parse_pitch_class(""), None);
    }

    #[test]
    fn test_default_scale_run() {
        let run = scale_run(&ScaleModel::default(), 60, 8, 0.25, 0.8).unwrap();
        let pitches: Vec<_> = run.iter().map(|e| e.pitch()).collect();
        assert_eq!(pitches, vec![60, 62, 64, 65, 67, 69, 71, 72]);
        assert!((run.end() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_scale_run_errors() {
        assert!(scale_run(&ScaleModel::default(), 60, 4, 0.0, 0.8).is_err());
        assert!(scale_run(&ScaleModel::default(), 120, 8, 0.25, 0.8).is_err());
    }
}
