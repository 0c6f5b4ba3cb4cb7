//! Ornamentation strategies.
//!
//! Each style decorates notes by splitting their duration between the main
//! pitch and neighbour pitches, so the overall rhythm of the melody is kept.
//! Notes shorter than [`MIN_ORNAMENT_DURATION`] are left plain, as are notes
//! whose neighbour would fall outside 0-127.

use crate::error::{MelodyError, Result};
use crate::midi::{EventSequence, MelodicEvent};
use crate::theory::ScaleModel;
use std::fmt;
use std::str::FromStr;

/// Shortest note, in seconds, that receives an ornament.
pub const MIN_ORNAMENT_DURATION: f64 = 0.1;

/// Number of alternating sub-notes in a trill.
const TRILL_NOTES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrnamentStyle {
    /// Lower mordent on every note: main, lower neighbour, main.
    #[default]
    Classical,
    /// Trill starting on the upper neighbour.
    Baroque,
    /// Chromatic approach note into every change of pitch.
    Jazz,
    /// Diatonic passing tones inside leaps.
    Minimal,
}

impl FromStr for OrnamentStyle {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "classical" => Ok(Self::Classical),
            "baroque" => Ok(Self::Baroque),
            "jazz" => Ok(Self::Jazz),
            "minimal" => Ok(Self::Minimal),
            _ => Err(MelodyError::validation(
                "style",
                format!("expected classical, baroque, jazz or minimal, got '{}'", s),
            )),
        }
    }
}

impl fmt::Display for OrnamentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Classical => "classical",
            Self::Baroque => "baroque",
            Self::Jazz => "jazz",
            Self::Minimal => "minimal",
        })
    }
}

/// Decorates a melody in the given style. The result is sorted by onset.
///
/// # Errors
///
/// Returns a validation error when a sub-note's timing overflows.
pub fn ornament(
    sequence: &EventSequence,
    scale: &ScaleModel,
    style: OrnamentStyle,
) -> Result<EventSequence> {
    let mut events = Vec::with_capacity(sequence.len() * 2);
    let notes = sequence.events();

    for (i, note) in notes.iter().enumerate() {
        if note.duration() < MIN_ORNAMENT_DURATION {
            events.push(*note);
            continue;
        }
        match style {
            OrnamentStyle::Classical => mordent(note, scale, i, &mut events)?,
            OrnamentStyle::Baroque => trill(note, scale, i, &mut events)?,
            OrnamentStyle::Jazz => {
                let previous = i.checked_sub(1).map(|p| notes[p].pitch());
                chromatic_approach(note, previous, &mut events)?
            }
            OrnamentStyle::Minimal => {
                let next = notes.get(i + 1).map(|n| n.pitch());
                passing_tone(note, next, scale, i, &mut events)?
            }
        }
    }

    Ok(EventSequence::from_events(events))
}

/// Main for an eighth of the note, lower neighbour for an eighth, then main.
fn mordent(
    note: &MelodicEvent,
    scale: &ScaleModel,
    index: usize,
    out: &mut Vec<MelodicEvent>,
) -> Result<()> {
    let Ok(lower) = scale.step(note.pitch(), -1, index) else {
        out.push(*note);
        return Ok(());
    };
    let grace = note.duration() / 8.0;
    let onset = note.onset();
    out.push(note.retimed(onset, grace)?);
    out.push(note.repitched(lower).retimed(onset + grace, grace)?);
    out.push(note.retimed(onset + 2.0 * grace, note.duration() - 2.0 * grace)?);
    Ok(())
}

fn trill(
    note: &MelodicEvent,
    scale: &ScaleModel,
    index: usize,
    out: &mut Vec<MelodicEvent>,
) -> Result<()> {
    let Ok(upper) = scale.step(note.pitch(), 1, index) else {
        out.push(*note);
        return Ok(());
    };
    let part = note.duration() / TRILL_NOTES as f64;
    for k in 0..TRILL_NOTES {
        let pitch = if k % 2 == 0 { upper } else { note.pitch() };
        out.push(note.repitched(pitch).retimed(note.onset() + k as f64 * part, part)?);
    }
    Ok(())
}

/// Approaches each new pitch from a semitone on the side it is coming from.
fn chromatic_approach(
    note: &MelodicEvent,
    previous: Option<u8>,
    out: &mut Vec<MelodicEvent>,
) -> Result<()> {
    let approach = match previous {
        Some(prev) if note.pitch() > prev => note.pitch().checked_sub(1),
        Some(prev) if note.pitch() < prev => note.pitch().checked_add(1).filter(|&p| p <= 127),
        _ => None,
    };
    let Some(approach) = approach else {
        out.push(*note);
        return Ok(());
    };
    let grace = note.duration() / 4.0;
    out.push(note.repitched(approach).retimed(note.onset(), grace)?);
    out.push(note.retimed(note.onset() + grace, note.duration() - grace)?);
    Ok(())
}

/// Fills a leap to the next note with the adjacent scale tone, taking the
/// second half of the current note.
fn passing_tone(
    note: &MelodicEvent,
    next: Option<u8>,
    scale: &ScaleModel,
    index: usize,
    out: &mut Vec<MelodicEvent>,
) -> Result<()> {
    let passing = next.and_then(|next| {
        let interval = next as i32 - note.pitch() as i32;
        if interval.abs() < 3 {
            return None;
        }
        let candidate = scale.step(note.pitch(), interval.signum(), index).ok()?;
        let (low, high) = if interval > 0 {
            (note.pitch(), next)
        } else {
            (next, note.pitch())
        };
        (candidate > low && candidate < high).then_some(candidate)
    });
    let Some(passing) = passing else {
        out.push(*note);
        return Ok(());
    };
    let half = note.duration() / 2.0;
    out.push(note.retimed(note.onset(), half)?);
    out.push(note.repitched(passing).retimed(note.onset() + half, half)?);
    Ok(())
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
                .map(|(i, &p)| MelodicEvent::new(p, i as f64, 1.0, 0.8).unwrap())
                .collect(),
        )
    }

    fn pitches(seq: &EventSequence) -> Vec<u8> {
        seq.iter().map(|e| e.pitch()).collect()
    }

    #[test]
    fn test_classical_mordent() {
        let c_major = ScaleModel::new(0, Mode::Major);
        let out = ornament(&melody(&[60]), &c_major, OrnamentStyle::Classical).unwrap();
        assert_eq!(pitches(&out), vec![60, 59, 60]);
        let onsets: Vec<_> = out.iter().map(|e| e.onset()).collect();
        assert_eq!(onsets, vec![0.0, 0.125, 0.25]);
        assert!((out.end() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_baroque_trill() {
        let c_major = ScaleModel::new(0, Mode::Major);
        let out = ornament(&melody(&[64]), &c_major, OrnamentStyle::Baroque).unwrap();
        assert_eq!(pitches(&out), vec![65, 64, 65, 64]);
        assert!(out.iter().all(|e| e.duration() == 0.25));
    }

    #[test]
    fn test_jazz_approach_from_each_side() {
        let out =
            ornament(&melody(&[60, 64, 62, 62]), &ScaleModel::default(), OrnamentStyle::Jazz).unwrap();
        // First note and repeated notes stay plain
        assert_eq!(pitches(&out), vec![60, 63, 64, 63, 62, 62]);
    }

    #[test]
    fn test_minimal_passing_tones() {
        let c_major = ScaleModel::new(0, Mode::Major);
        let out = ornament(&melody(&[60, 64, 65, 62]), &c_major, OrnamentStyle::Minimal).unwrap();
        // 60->64 gets D, 64->65 is a step, 65->62 gets E
        assert_eq!(pitches(&out), vec![60, 62, 64, 65, 64, 62]);
    }

    #[test]
    fn test_short_notes_and_edges_stay_plain() {
        let short = EventSequence::from_events(vec![MelodicEvent::new(60, 0.0, 0.05, 0.8).unwrap()]);
        let scale = ScaleModel::default();
        assert_eq!(ornament(&short, &scale, OrnamentStyle::Baroque).unwrap(), short);

        let top = melody(&[127]);
        assert_eq!(ornament(&top, &scale, OrnamentStyle::Baroque).unwrap(), top);
        assert!(ornament(&EventSequence::new(), &scale, OrnamentStyle::Jazz).unwrap().is_empty());
    }

    #[test]
    fn test_overflowing_sub_note_is_rejected() {
        // The final mordent note would start a quarter of f64::MAX past f64::MAX
        let huge = EventSequence::from_events(vec![
            MelodicEvent::new(60, f64::MAX, f64::MAX, 0.8).unwrap(),
        ]);
        assert!(matches!(
            ornament(&huge, &ScaleModel::default(), OrnamentStyle::Classical),
            Err(MelodyError::Validation { ref field, .. }) if field == "onset"
        ));
    }

    #[test]
    fn test_style_parse() {
        assert_eq!("Baroque".parse::<OrnamentStyle>().unwrap(), OrnamentStyle::Baroque);
        assert!("rococo".parse::<OrnamentStyle>().is_err());
        assert_eq!(OrnamentStyle::Minimal.to_string(), "minimal");
    }
}
