//! Motivic development.

use crate::error::{MelodyError, Result};
use crate::midi::{EventSequence, MelodicEvent};
use crate::theory::ScaleModel;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevelopMethod {
    /// Repeat the motif one scale degree higher, straight after it.
    #[default]
    Sequence,
    /// Play the opening half of the motif, then again one degree lower.
    Fragment,
    /// Continue from the last note by scale steps to the nearest tonic.
    Extend,
    /// Play the motif backwards in time.
    Retrograde,
}

impl FromStr for DevelopMethod {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sequence" => Ok(Self::Sequence),
            "fragment" => Ok(Self::Fragment),
            "extend" => Ok(Self::Extend),
            "retrograde" => Ok(Self::Retrograde),
            _ => Err(MelodyError::validation(
                "method",
                format!(
                    "expected sequence, fragment, extend or retrograde, got '{}'",
                    s
                ),
            )),
        }
    }
}

impl fmt::Display for DevelopMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sequence => "sequence",
            Self::Fragment => "fragment",
            Self::Extend => "extend",
            Self::Retrograde => "retrograde",
        })
    }
}

/// Applies a development method. Empty input returns an empty sequence.
///
/// # Errors
///
/// Returns [`MelodyError::RangeOverflow`] when a transposed copy would
/// leave 0-127.
pub fn develop(
    sequence: &EventSequence,
    scale: &ScaleModel,
    method: DevelopMethod,
) -> Result<EventSequence> {
    let Some(start) = sequence.start() else {
        return Ok(EventSequence::new());
    };
    match method {
        DevelopMethod::Sequence => {
            let copy = shifted_copy(sequence.events(), scale, 1, sequence.end() - start)?;
            Ok(sequence.merged(&copy))
        }
        DevelopMethod::Fragment => {
            let half = sequence.len().div_ceil(2);
            let fragment = EventSequence::from_events(sequence.events()[..half].to_vec());
            let copy = shifted_copy(fragment.events(), scale, -1, fragment.end() - start)?;
            Ok(fragment.merged(&copy))
        }
        DevelopMethod::Extend => extend_to_tonic(sequence, scale),
        DevelopMethod::Retrograde => {
            let end = sequence.end();
            let events = sequence
                .iter()
                .map(|e| e.retimed(start + end - e.end(), e.duration()))
                .collect::<Result<Vec<_>>>()?;
            Ok(EventSequence::from_events(events))
        }
    }
}

/// Copies `events` moved by `steps` scale degrees and `offset` seconds.
fn shifted_copy(
    events: &[MelodicEvent],
    scale: &ScaleModel,
    steps: i32,
    offset: f64,
) -> Result<EventSequence> {
    let copy = events
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let pitch = scale.step(e.pitch(), steps, i)?;
            e.repitched(pitch).retimed(e.onset() + offset, e.duration())
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(EventSequence::from_events(copy))
}

/// Number of scale steps from `pitch` to the nearest tonic, negative when
/// the tonic below is closer. Ties resolve downward.
fn steps_to_tonic(pitch: u8, scale: &ScaleModel) -> i32 {
    let count = scale.degree_count() as i32;
    for k in 0..=count {
        for steps in [-k, k] {
            if let Ok(p) = scale.step(pitch, steps, 0) {
                if p % 12 == scale.root() {
                    return steps;
                }
            }
        }
    }
    0
}

fn extend_to_tonic(sequence: &EventSequence, scale: &ScaleModel) -> Result<EventSequence> {
    let Some(last) = sequence.iter().max_by(|a, b| a.onset().total_cmp(&b.onset())) else {
        return Ok(EventSequence::new());
    };
    let steps = steps_to_tonic(last.pitch(), scale);
    let mut events = sequence.events().to_vec();
    let mut onset = sequence.end();

    if steps == 0 {
        // Already on the tonic: restate it held twice as long
        events.push(last.retimed(onset, last.duration() * 2.0)?);
    } else {
        let base = sequence.len();
        for j in 1..=steps.abs() {
            let pitch = scale.step(last.pitch(), j * steps.signum(), base + j as usize - 1)?;
            events.push(last.repitched(pitch).retimed(onset, last.duration())?);
            onset += last.duration();
        }
    }
    Ok(EventSequence::from_events(events))
}
