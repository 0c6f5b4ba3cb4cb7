//! Time-domain operators.
//!
//! [`scale_time`] is the single primitive behind augmentation and
//! diminution. The rest are viewport edits that reposition onsets within a
//! visible window of the editor. Onsets are never moved below zero.

use crate::error::{MelodyError, Result};
use crate::midi::{EventSequence, MelodicEvent};
use crate::theory::ScaleModel;

fn require_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MelodyError::validation(
            field,
            format!("must be a positive number, got {}", value),
        ))
    }
}

fn require_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MelodyError::validation(field, "must be a finite number"))
    }
}

/// Rebuilds `event` with new timing, validating the result.
fn retime(index: usize, event: &MelodicEvent, onset: f64, duration: f64) -> Result<MelodicEvent> {
    event.retimed(onset, duration).map_err(|e| match e {
        MelodyError::Validation { field, message } => MelodyError::Validation {
            field: format!("notes[{}].{}", index, field),
            message,
        },
        other => other,
    })
}

fn with_onsets<F>(sequence: &EventSequence, mut onset_for: F) -> Result<EventSequence>
where
    F: FnMut(usize, &MelodicEvent) -> f64,
{
    let events = sequence
        .iter()
        .enumerate()
        .map(|(i, e)| retime(i, e, onset_for(i, e).max(0.0), e.duration()))
        .collect::<Result<Vec<_>>>()?;
    Ok(EventSequence::from_events(events))
}

/// Multiplies every onset and duration by `factor`.
///
/// Factors above 1 augment, factors between 0 and 1 diminish.
///
/// # Errors
///
/// Returns a validation error for a non-positive factor, or naming the first
/// note whose scaled timing is no longer a finite, positive length.
pub fn scale_time(sequence: &EventSequence, factor: f64) -> Result<EventSequence> {
    require_positive("factor", factor)?;
    let events = sequence
        .iter()
        .enumerate()
        .map(|(i, e)| retime(i, e, e.onset() * factor, e.duration() * factor))
        .collect::<Result<Vec<_>>>()?;
    Ok(EventSequence::from_events(events))
}

/// Spreads notes evenly across a viewport, first at `start` and last at
/// `start + duration`. Sequences of zero or one note are returned as is.
pub fn evenly_space(sequence: &EventSequence, start: f64, duration: f64) -> Result<EventSequence> {
    require_finite("start", start)?;
    require_finite("duration", duration)?;
    if sequence.len() <= 1 {
        return Ok(sequence.clone());
    }
    let spacing = duration / (sequence.len() - 1) as f64;
    with_onsets(sequence, |i, _| start + i as f64 * spacing)
}

/// Rounds every onset to the nearest multiple of `grid` seconds.
pub fn quantize(sequence: &EventSequence, grid: f64) -> Result<EventSequence> {
    require_positive("grid", grid)?;
    with_onsets(sequence, |_, e| (e.onset() / grid).round() * grid)
}

/// Compresses or expands onsets around the viewport centre.
pub fn scale_positions(
    sequence: &EventSequence,
    factor: f64,
    start: f64,
    duration: f64,
) -> Result<EventSequence> {
    require_positive("factor", factor)?;
    require_finite("start", start)?;
    require_finite("duration", duration)?;
    let center = start + duration / 2.0;
    with_onsets(sequence, |_, e| center + (e.onset() - center) * factor)
}

/// Moves every onset by `amount` seconds.
pub fn shift(sequence: &EventSequence, amount: f64) -> Result<EventSequence> {
    require_finite("amount", amount)?;
    with_onsets(sequence, |_, e| e.onset() + amount)
}

/// Mirrors onsets within the viewport so the first becomes the last.
pub fn reverse(sequence: &EventSequence, start: f64, duration: f64) -> Result<EventSequence> {
    require_finite("start", start)?;
    require_finite("duration", duration)?;
    let end = start + duration;
    with_onsets(sequence, |_, e| end - (e.onset() - start))
}

/// Moves the whole pattern so its earliest note starts at `start`.
pub fn align_to_start(sequence: &EventSequence, start: f64) -> Result<EventSequence> {
    require_finite("start", start)?;
    let Some(first) = sequence.start() else {
        return Ok(EventSequence::new());
    };
    let offset = start - first;
    with_onsets(sequence, |_, e| e.onset() + offset)
}

/// Snaps every pitch into the key.
pub fn compress_to_scale(sequence: &EventSequence, scale: &ScaleModel) -> EventSequence {
    EventSequence::from_events(sequence.iter().map(|e| e.repitched(scale.snap(e.pitch()))).collect())
}

/// Appends a copy of the pattern `offset` seconds later.
pub fn duplicate_pattern(sequence: &EventSequence, offset: f64) -> Result<EventSequence> {
    require_finite("offset", offset)?;
    let copy = with_onsets(sequence, |_, e| e.onset() + offset)?;
    Ok(sequence.merged(&copy))
}

/// Appends a time-mirrored copy of the pattern directly after it.
pub fn mirror_pattern(sequence: &EventSequence) -> Result<EventSequence> {
    let Some(pattern_start) = sequence.start() else {
        return Ok(EventSequence::new());
    };
    let pattern_end = sequence.end();
    let pattern_duration = pattern_end - pattern_start;

    let mirrored = sequence
        .iter()
        .rev()
        .enumerate()
        .map(|(i, e)| {
            let relative = e.onset() - pattern_start;
            let mirrored_relative = pattern_duration - relative - e.duration();
            retime(i, e, (pattern_end + mirrored_relative).max(0.0), e.duration())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(sequence.merged(&EventSequence::from_events(mirrored)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::Mode;

    fn seq(notes: &[(u8, f64, f64)]) -> EventSequence {
        EventSequence::from_events(
            notes
                .iter()
                .map(|&(p, t, d)| MelodicEvent::new(p, t, d, 0.8).unwrap())
                .collect(),
        )
    }

    fn onsets(seq: &EventSequence) -> Vec<f64> {
        seq.iter().map(|e| e.onset()).collect()
    }

    #[test]
    fn test_scale_time() {
        let s = seq(&[(60, 0.0, 0.5), (62, 0.5, 0.5)]);
        let out = scale_time(&s, 2.0).unwrap();
        assert_eq!(onsets(&out), vec![0.0, 1.0]);
        assert_eq!(out.events()[1].duration(), 1.0);

        let out = scale_time(&s, 0.5).unwrap();
        assert_eq!(onsets(&out), vec![0.0, 0.25]);

        assert!(scale_time(&s, 0.0).is_err());
        assert!(scale_time(&s, -2.0).is_err());
    }

    #[test]
    fn test_overflowing_timing_is_rejected() {
        let s = seq(&[(60, 0.0, 1.0), (62, 1e300, 1e300)]);
        match scale_time(&s, 1e10) {
            Err(MelodyError::Validation { field, .. }) => assert!(field.starts_with("notes[1].")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(shift(&s, f64::MAX).is_err());
        assert!(duplicate_pattern(&s, f64::MAX).is_err());
        let wide = seq(&[(60, 0.0, 1.0), (62, f64::MAX / 2.0, f64::MAX / 2.0)]);
        assert!(mirror_pattern(&wide).is_err());
    }

    #[test]
    fn test_evenly_space() {
        let s = seq(&[(60, 0.0, 0.1), (62, 0.3, 0.1), (64, 3.0, 0.1)]);
        let out = evenly_space(&s, 1.0, 2.0).unwrap();
        assert_eq!(onsets(&out), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_quantize() {
        let s = seq(&[(60, 0.1, 0.1), (62, 0.38, 0.1)]);
        let out = quantize(&s, 0.25).unwrap();
        assert_eq!(onsets(&out), vec![0.0, 0.5]);
        assert!(quantize(&s, 0.0).is_err());
    }

    #[test]
    fn test_shift_clamps_at_zero() {
        let s = seq(&[(60, 0.5, 0.1), (62, 2.0, 0.1)]);
        let out = shift(&s, -1.0).unwrap();
        assert_eq!(onsets(&out), vec![0.0, 1.0]);
    }

    #[test]
    fn test_reverse_and_align() {
        let s = seq(&[(60, 1.0, 0.1), (62, 2.0, 0.1)]);
        let out = reverse(&s, 0.0, 4.0).unwrap();
        assert_eq!(onsets(&out), vec![2.0, 3.0]);
        assert_eq!(out.events()[0].pitch(), 62);

        let out = align_to_start(&s, 0.0).unwrap();
        assert_eq!(onsets(&out), vec![0.0, 1.0]);
    }

    #[test]
    fn test_scale_positions() {
        let s = seq(&[(60, 1.0, 0.1), (62, 3.0, 0.1)]);
        let out = scale_positions(&s, 0.5, 0.0, 4.0).unwrap();
        assert_eq!(onsets(&out), vec![1.5, 2.5]);
    }

    #[test]
    fn test_compress_to_scale() {
        let s = seq(&[(61, 0.0, 0.1), (66, 0.5, 0.1)]);
        let out = compress_to_scale(&s, &ScaleModel::new(0, Mode::Major));
        assert_eq!(out.iter().map(|e| e.pitch()).collect::<Vec<_>>(), vec![60, 65]);
    }

    #[test]
    fn test_duplicate_and_mirror() {
        let s = seq(&[(60, 0.0, 0.5), (64, 0.5, 1.0)]);
        let out = duplicate_pattern(&s, 2.0).unwrap();
        assert_eq!(onsets(&out), vec![0.0, 0.5, 2.0, 2.5]);

        // Pattern spans 0.0-1.5; the mirror plays it backwards from 1.5
        let out = mirror_pattern(&s).unwrap();
        assert_eq!(onsets(&out), vec![0.0, 0.5, 1.5, 2.5]);
        let pitches: Vec<_> = out.iter().map(|e| e.pitch()).collect();
        assert_eq!(pitches, vec![60, 64, 64, 60]);
    }
}
