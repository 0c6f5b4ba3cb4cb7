//! Pitch-domain operators: chromatic and diatonic transposition, inversion
//! and parallel harmony.
//!
//! Any note that would leave 0-127 rejects the whole sequence with
//! [`MelodyError::RangeOverflow`]; nothing is clamped.

use crate::error::{MelodyError, Result};
use crate::midi::{checked_pitch, EventSequence, MelodicEvent};
use crate::theory::ScaleModel;
use std::fmt;
use std::str::FromStr;

/// Reference pitch for [`invert`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvertAxis {
    /// Mean pitch of the sequence, computed once before inverting.
    Center,
    /// Pitch of the earliest note.
    FirstNote,
    /// Pitch of the latest note.
    LastNote,
    /// A fixed MIDI pitch.
    Pitch(u8),
}

impl FromStr for InvertAxis {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "center" | "centre" => Ok(Self::Center),
            "first-note" | "first" => Ok(Self::FirstNote),
            "last-note" | "last" => Ok(Self::LastNote),
            other => match other.parse::<u8>() {
                Ok(p) if p <= 127 => Ok(Self::Pitch(p)),
                _ => Err(MelodyError::validation(
                    "axis",
                    format!(
                        "expected center, first-note, last-note or a pitch 0-127, got '{}'",
                        s
                    ),
                )),
            },
        }
    }
}

impl fmt::Display for InvertAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Center => f.write_str("center"),
            Self::FirstNote => f.write_str("first-note"),
            Self::LastNote => f.write_str("last-note"),
            Self::Pitch(p) => write!(f, "{}", p),
        }
    }
}

/// Rebuilds a sequence with each pitch mapped by `f`, which receives the
/// note index so range errors can point at the culprit.
fn map_pitches<F>(sequence: &EventSequence, mut f: F) -> Result<EventSequence>
where
    F: FnMut(usize, &MelodicEvent) -> Result<u8>,
{
    let events = sequence
        .iter()
        .enumerate()
        .map(|(i, e)| Ok(e.repitched(f(i, e)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(EventSequence::from_events(events))
}

/// Shifts every pitch by a fixed number of semitones.
///
/// # Examples
///
/// ```
/// use gesture_edit::midi::{EventSequence, MelodicEvent};
/// use gesture_edit::transform::transpose;
///
/// let seq = EventSequence::from_events(vec![MelodicEvent::new(60, 0.0, 1.0, 0.8).unwrap()]);
/// let up = transpose(&seq, 3).unwrap();
/// assert_eq!(up.events()[0].pitch(), 63);
/// ```
pub fn transpose(sequence: &EventSequence, semitones: i32) -> Result<EventSequence> {
    map_pitches(sequence, |i, e| checked_pitch(e.pitch() as i32 + semitones, i))
}

/// Shifts every pitch by scale degrees rather than semitones.
///
/// Out-of-key pitches are snapped into the key before stepping.
pub fn transpose_diatonic(
    sequence: &EventSequence,
    scale: &ScaleModel,
    steps: i32,
) -> Result<EventSequence> {
    map_pitches(sequence, |i, e| scale.step(e.pitch(), steps, i))
}

/// Reflects each pitch around `axis`. Reflections around a fractional
/// centre round to the nearest semitone, halves away from zero.
pub fn invert(sequence: &EventSequence, axis: InvertAxis) -> Result<EventSequence> {
    let axis_pitch = match axis {
        InvertAxis::Center => sequence.mean_pitch(),
        InvertAxis::FirstNote => sequence.events().first().map(|e| e.pitch() as f64),
        InvertAxis::LastNote => sequence.events().last().map(|e| e.pitch() as f64),
        InvertAxis::Pitch(p) => Some(p as f64),
    };
    let Some(axis_pitch) = axis_pitch else {
        return Ok(EventSequence::new());
    };
    map_pitches(sequence, |i, e| {
        let reflected = (2.0 * axis_pitch - e.pitch() as f64).round() as i32;
        checked_pitch(reflected, i)
    })
}

/// Converts a musical interval number (3 = third, -6 = sixth below) into
/// scale steps. Unison is 1 (or -1); 0 is not an interval.
pub fn interval_to_steps(interval: i32) -> Result<i32> {
    match interval {
        0 => Err(MelodyError::validation(
            "interval",
            "0 is not a musical interval; use 1 for unison",
        )),
        n if n > 0 => Ok(n - 1),
        n => Ok(n + 1),
    }
}

/// Adds a parallel voice at the given scale interval under every note.
///
/// The output holds the originals and their harmony notes at identical
/// timing; at equal onsets each original precedes its harmony.
pub fn harmonize(
    sequence: &EventSequence,
    scale: &ScaleModel,
    interval: i32,
) -> Result<EventSequence> {
    let steps = interval_to_steps(interval)?;
    let mut events = Vec::with_capacity(sequence.len() * 2);
    for (i, event) in sequence.iter().enumerate() {
        events.push(*event);
        events.push(event.repitched(scale.step(event.pitch(), steps, i)?));
    }
    Ok(EventSequence::from_events(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::Mode;

    fn melody(pitches: &[u8]) -> EventSequence {
        EventSequence::from_events(
            pitches
                .iter()
                .enumerate()
                .map(|(i, &p)| MelodicEvent::new(p, i as f64 * 0.5, 0.5, 0.8).unwrap())
                .collect(),
        )
    }

    fn pitches(seq: &EventSequence) -> Vec<u8> {
        seq.iter().map(|e| e.pitch()).collect()
    }

    #[test]
    fn test_transpose_example() {
        let seq = EventSequence::from_events(vec![MelodicEvent::new(60, 0.0, 1.0, 0.8).unwrap()]);
        let out = transpose(&seq, 3).unwrap();
        let note = out.events()[0];
        assert_eq!(note.pitch(), 63);
        assert_eq!(note.onset(), 0.0);
        assert_eq!(note.duration(), 1.0);
        assert_eq!(note.velocity(), 0.8);
    }

    #[test]
    fn test_transpose_rejects_overflow() {
        let seq = melody(&[60, 120, 64]);
        match transpose(&seq, 10) {
            Err(MelodyError::RangeOverflow { index, pitch }) => {
                assert_eq!(index, 1);
                assert_eq!(pitch, 130);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
        assert!(transpose(&melody(&[2]), -3).is_err());
    }

    #[test]
    fn test_transpose_diatonic() {
        let c_major = ScaleModel::new(0, Mode::Major);
        let out = transpose_diatonic(&melody(&[60, 64, 67, 71]), &c_major, 1).unwrap();
        assert_eq!(pitches(&out), vec![62, 65, 69, 72]);

        let out = transpose_diatonic(&melody(&[60, 62]), &c_major, -7).unwrap();
        assert_eq!(pitches(&out), vec![48, 50]);

        // C# snaps to C before stepping
        let out = transpose_diatonic(&melody(&[61]), &c_major, 2).unwrap();
        assert_eq!(pitches(&out), vec![64]);
    }

    #[test]
    fn test_invert_axes() {
        let seq = melody(&[60, 64, 62]);
        // Mean is 62
        assert_eq!(pitches(&invert(&seq, InvertAxis::Center).unwrap()), vec![64, 60, 62]);
        assert_eq!(pitches(&invert(&seq, InvertAxis::FirstNote).unwrap()), vec![60, 56, 58]);
        assert_eq!(pitches(&invert(&seq, InvertAxis::LastNote).unwrap()), vec![64, 60, 62]);
        assert_eq!(pitches(&invert(&seq, InvertAxis::Pitch(66)).unwrap()), vec![72, 68, 70]);
        assert!(invert(&EventSequence::new(), InvertAxis::Center).unwrap().is_empty());
        assert!(invert(&melody(&[10]), InvertAxis::Pitch(120)).is_err());
    }

    #[test]
    fn test_axis_parse() {
        assert_eq!("center".parse::<InvertAxis>().unwrap(), InvertAxis::Center);
        assert_eq!("first-note".parse::<InvertAxis>().unwrap(), InvertAxis::FirstNote);
        assert_eq!("72".parse::<InvertAxis>().unwrap(), InvertAxis::Pitch(72));
        assert!("200".parse::<InvertAxis>().is_err());
        assert!("middle".parse::<InvertAxis>().is_err());
    }

    #[test]
    fn test_harmonize_third() {
        let c_major = ScaleModel::new(0, Mode::Major);
        let out = harmonize(&melody(&[60, 62, 64]), &c_major, 3).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(pitches(&out), vec![60, 64, 62, 65, 64, 67]);
        // Harmony shares the original's timing
        assert_eq!(out.events()[0].onset(), out.events()[1].onset());
    }

    #[test]
    fn test_interval_steps() {
        assert_eq!(interval_to_steps(3).unwrap(), 2);
        assert_eq!(interval_to_steps(8).unwrap(), 7);
        assert_eq!(interval_to_steps(-3).unwrap(), -2);
        assert_eq!(interval_to_steps(1).unwrap(), 0);
        assert!(interval_to_steps(0).is_err());
    }
}
