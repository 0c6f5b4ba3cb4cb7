//! Two-voice counterpoint generation.
//!
//! For every melody note the generator emits a re-timed copy of the note
//! followed by one counterpoint note in the gap it opens up:
//!
//! 1. Original note `i` moves to onset `i * (duration_i * 2)`.
//! 2. Its counterpoint starts `duration_i` later, lasts `duration_i`, and
//!    plays at 70% of the original velocity.
//! 3. The counterpoint tries a major third, major sixth, perfect fifth and
//!    octave, in that order, in the direction chosen by the motion style.
//!    The first candidate inside C3-C6 (48-84) wins and is snapped into the
//!    key; if none fits, a major third above the original is used.

use crate::error::{MelodyError, Result};
use crate::midi::{EventSequence, MelodicEvent, MAX_PITCH};
use crate::theory::ScaleModel;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Candidate intervals in semitones, in priority order.
pub const CANDIDATE_INTERVALS: [i32; 4] = [4, 9, 7, 12];

/// Pitch window the counterpoint voice must stay inside (C3-C6).
pub const COUNTERPOINT_RANGE: RangeInclusive<i32> = 48..=84;

/// Counterpoint velocity relative to the original note.
pub const VELOCITY_RATIO: f32 = 0.7;

/// Motion policy for the counterpoint voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterStyle {
    #[default]
    Contrary,
    Parallel,
    Oblique,
    Mixed,
}

impl FromStr for CounterStyle {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "contrary" => Ok(Self::Contrary),
            "parallel" => Ok(Self::Parallel),
            "oblique" => Ok(Self::Oblique),
            "mixed" => Ok(Self::Mixed),
            _ => Err(MelodyError::validation(
                "style",
                format!(
                    "expected contrary, parallel, oblique or mixed, got '{}'",
                    s
                ),
            )),
        }
    }
}

impl fmt::Display for CounterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Contrary => "contrary",
            Self::Parallel => "parallel",
            Self::Oblique => "oblique",
            Self::Mixed => "mixed",
        })
    }
}

/// Which side of the melody the next counterpoint note should try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Above,
    Below,
}

impl Direction {
    fn sign(self) -> i32 {
        match self {
            Direction::Above => 1,
            Direction::Below => -1,
        }
    }
}

/// Contrary motion: the first note goes below; afterwards move against the
/// melody (up -> below, down or flat -> above).
fn contrary(previous: Option<u8>, current: u8) -> Direction {
    match previous {
        None => Direction::Below,
        Some(prev) if current > prev => Direction::Below,
        Some(_) => Direction::Above,
    }
}

/// Parallel motion: follow the melody's direction, starting above.
fn parallel(previous: Option<u8>, current: u8) -> Direction {
    match previous {
        Some(prev) if current < prev => Direction::Below,
        _ => Direction::Above,
    }
}

/// Picks the counterpoint pitch for `original` in the given direction.
fn choose_pitch(original: u8, direction: Direction, scale: &ScaleModel) -> u8 {
    let accepted = CANDIDATE_INTERVALS
        .iter()
        .map(|interval| original as i32 + direction.sign() * interval)
        .find(|candidate| COUNTERPOINT_RANGE.contains(candidate));

    match accepted {
        Some(candidate) => snap_inside_window(candidate as u8, scale),
        None => {
            // Unconditional fallback: a major third above
            let fallback = (original as i32 + 4).min(MAX_PITCH as i32) as u8;
            scale.snap(fallback)
        }
    }
}

/// Snaps a candidate that already lies in the window, stepping one degree
/// back inside if snapping pushed it across an edge.
fn snap_inside_window(candidate: u8, scale: &ScaleModel) -> u8 {
    let snapped = scale.snap(candidate);
    let (low, high) = (*COUNTERPOINT_RANGE.start(), *COUNTERPOINT_RANGE.end());
    let steps = if (snapped as i32) > high {
        -1
    } else if (snapped as i32) < low {
        1
    } else {
        return snapped;
    };
    // The window is far from the MIDI edges, so stepping cannot overflow
    scale.step(snapped, steps, 0).unwrap_or(snapped)
}

/// Generates contrary-motion counterpoint, the default policy.
///
/// Output order is original-then-counterpoint per melody note, in melody
/// order. The result is not re-sorted by onset; use
/// [`EventSequence::sorted`] when a strict timeline is needed.
///
/// # Errors
///
/// Returns a validation error when the re-timed onsets overflow to infinity.
///
/// # Examples
///
/// ```
/// use gesture_edit::midi::{EventSequence, MelodicEvent};
/// use gesture_edit::theory::ScaleModel;
/// use gesture_edit::transform::generate_counterpoint;
///
/// let melody = EventSequence::from_events(vec![MelodicEvent::new(60, 0.0, 1.0, 1.0).unwrap()]);
/// let out = generate_counterpoint(&melody, &ScaleModel::default()).unwrap();
/// assert_eq!(out.len(), 2);
/// assert_eq!(out.events()[1].onset(), 1.0);
/// ```
pub fn generate_counterpoint(melody: &EventSequence, scale: &ScaleModel) -> Result<EventSequence> {
    generate_counterpoint_with(melody, scale, CounterStyle::Contrary)
}

/// Generates counterpoint with an explicit motion style.
///
/// - `Contrary` and `Parallel` pick the direction per note as described above.
/// - `Oblique` holds the previous counterpoint pitch while it stays clear
///   of the melody note and inside the window, otherwise falls back to
///   contrary motion.
/// - `Mixed` alternates contrary (even notes) and parallel (odd notes).
pub fn generate_counterpoint_with(
    melody: &EventSequence,
    scale: &ScaleModel,
    style: CounterStyle,
) -> Result<EventSequence> {
    let mut events = Vec::with_capacity(melody.len() * 2);
    let mut previous: Option<u8> = None;
    let mut held: Option<u8> = None;

    for (i, note) in melody.iter().enumerate() {
        let onset = i as f64 * (note.duration() * 2.0);
        let pitch = note.pitch();

        let counter_pitch = match style {
            CounterStyle::Contrary => choose_pitch(pitch, contrary(previous, pitch), scale),
            CounterStyle::Parallel => choose_pitch(pitch, parallel(previous, pitch), scale),
            CounterStyle::Mixed if i % 2 == 1 => {
                choose_pitch(pitch, parallel(previous, pitch), scale)
            }
            CounterStyle::Mixed => choose_pitch(pitch, contrary(previous, pitch), scale),
            CounterStyle::Oblique => match held {
                Some(h) if COUNTERPOINT_RANGE.contains(&(h as i32)) && h.abs_diff(pitch) >= 3 => h,
                _ => choose_pitch(pitch, contrary(previous, pitch), scale),
            },
        };

        let original = note.retimed(onset, note.duration())?;
        let counter = note
            .repitched(counter_pitch)
            .retimed(onset + note.duration(), note.duration())?
            .revoiced(note.velocity() * VELOCITY_RATIO);
        events.push(original);
        events.push(counter);

        previous = Some(pitch);
        held = Some(counter_pitch);
    }

    Ok(EventSequence::from_ordered(events))
}

/// Returns only the counterpoint voice from a generated two-voice timeline.
pub fn counter_voice(timeline: &EventSequence) -> Vec<MelodicEvent> {
    timeline.iter().skip(1).step_by(2).copied().collect()
}
