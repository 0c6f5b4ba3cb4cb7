//! Decoupled timing: onsets as fractions of the total duration.
//!
//! A decoupled sequence stores `n` notes and `n + 1` timing fractions that
//! sum to 1. The first fraction is the lead-in before the first note, the
//! middle ones are inter-onset gaps, and the last is the pad after the final
//! onset. Playback engines rescale the fractions to any total length.

use crate::error::{MelodyError, Result};
use crate::midi::{EventSequence, MelodicEvent, NOTE_NAMES};
use crate::theory::ScaleModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How note durations are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationType {
    /// Seconds, as in the source sequence.
    #[default]
    Absolute,
    /// Fraction (0-1] of the time available before the next onset.
    Fractional,
}

impl FromStr for DurationType {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "absolute" => Ok(Self::Absolute),
            "fractional" => Ok(Self::Fractional),
            _ => Err(MelodyError::validation(
                "durationType",
                format!("expected absolute or fractional, got '{}'", s),
            )),
        }
    }
}

impl fmt::Display for DurationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absolute => "absolute",
            Self::Fractional => "fractional",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoupledMetadata {
    pub duration_type: DurationType,
    pub total_duration: f64,
    pub key: String,
    pub scale: String,
}

/// A note without its onset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecoupledNote {
    pub midi: u8,
    pub velocity: f32,
    /// Seconds or a fraction, per [`DecoupledMetadata::duration_type`].
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoupled {
    pub metadata: DecoupledMetadata,
    pub notes: Vec<DecoupledNote>,
    pub timing: Vec<f64>,
}

/// Time each note has before the next onset, or the trailing pad for the
/// last note, in the sequence's own units.
fn available_times(onsets: &[f64], total: f64) -> Vec<f64> {
    onsets
        .iter()
        .enumerate()
        .map(|(i, &onset)| onsets.get(i + 1).copied().unwrap_or(total) - onset)
        .collect()
}

/// Converts a sequence to decoupled form. The sequence is sorted first.
///
/// An empty sequence yields no notes, timing `[1.0]` and a total of 0.
///
/// # Examples
///
/// ```
/// use gesture_edit::midi::{EventSequence, MelodicEvent};
/// use gesture_edit::theory::ScaleModel;
/// use gesture_edit::timing::{to_decoupled, DurationType};
///
/// let seq = EventSequence::from_events(vec![
///     MelodicEvent::new(60, 0.0, 1.0, 0.8).unwrap(),
///     MelodicEvent::new(62, 1.0, 1.0, 0.8).unwrap(),
/// ]);
/// let d = to_decoupled(&seq, DurationType::Absolute, &ScaleModel::default());
/// assert_eq!(d.timing, vec![0.0, 0.5, 0.5]);
/// assert_eq!(d.metadata.total_duration, 2.0);
/// ```
pub fn to_decoupled(
    sequence: &EventSequence,
    duration_type: DurationType,
    scale: &ScaleModel,
) -> Decoupled {
    let sorted = sequence.sorted();
    let total = sorted.end();
    let metadata = DecoupledMetadata {
        duration_type,
        total_duration: total,
        key: NOTE_NAMES[scale.root() as usize].to_string(),
        scale: scale.mode().name().to_string(),
    };
    if sorted.is_empty() || total <= 0.0 {
        return Decoupled {
            metadata,
            notes: Vec::new(),
            timing: vec![1.0],
        };
    }

    let onsets: Vec<f64> = sorted.iter().map(|e| e.onset()).collect();
    let mut timing = Vec::with_capacity(onsets.len() + 1);
    let mut previous = 0.0;
    for &onset in &onsets {
        timing.push((onset - previous) / total);
        previous = onset;
    }
    timing.push((total - previous) / total);

    let available = available_times(&onsets, total);
    let notes = sorted
        .iter()
        .zip(available)
        .map(|(e, available)| DecoupledNote {
            midi: e.pitch(),
            velocity: e.velocity(),
            duration: match duration_type {
                DurationType::Absolute => e.duration(),
                DurationType::Fractional if available <= 0.0 => 1.0,
                DurationType::Fractional => (e.duration() / available).min(1.0),
            },
        })
        .collect();

    Decoupled {
        metadata,
        notes,
        timing,
    }
}

/// Rebuilds an absolute-time sequence from decoupled form.
///
/// Fractional durations are scaled by the time before the next onset. Notes
/// sharing an onset use the time before the next later onset instead.
///
/// # Errors
///
/// Returns a validation error if the timing vector does not have one more
/// entry than there are notes, if any timing entry or the total is negative,
/// or if a rebuilt note is invalid.
pub fn from_decoupled(decoupled: &Decoupled) -> Result<EventSequence> {
    let Decoupled {
        metadata,
        notes,
        timing,
    } = decoupled;
    if timing.len() != notes.len() + 1 {
        return Err(MelodyError::validation(
            "timing",
            format!(
                "expected {} entries for {} notes, got {}",
                notes.len() + 1,
                notes.len(),
                timing.len()
            ),
        ));
    }
    if timing.iter().any(|t| !t.is_finite() || *t < 0.0) {
        return Err(MelodyError::validation(
            "timing",
            "entries must be non-negative numbers",
        ));
    }
    let total = metadata.total_duration;
    if !total.is_finite() || total < 0.0 {
        return Err(MelodyError::validation(
            "totalDuration",
            format!("must be a non-negative number, got {}", total),
        ));
    }

    let mut onsets = Vec::with_capacity(notes.len());
    let mut cumulative = 0.0;
    for t in &timing[..notes.len()] {
        cumulative += t;
        onsets.push(total * cumulative);
    }

    let events = notes
        .iter()
        .enumerate()
        .map(|(i, note)| {
            let duration = match metadata.duration_type {
                DurationType::Absolute => note.duration,
                DurationType::Fractional => {
                    // Skip past chord-mates to the next distinct onset
                    let available = onsets[i + 1..]
                        .iter()
                        .find(|&&next| next > onsets[i])
                        .copied()
                        .unwrap_or(total)
                        - onsets[i];
                    note.duration * available
                }
            };
            MelodicEvent::new(note.midi, onsets[i], duration, note.velocity).map_err(|e| match e {
                MelodyError::Validation { field, message } => MelodyError::Validation {
                    field: format!("notes[{}].{}", i, field),
                    message,
                },
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(EventSequence::from_events(events))
}
