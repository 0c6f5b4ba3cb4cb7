//! Timing vectors for live transmission.
//!
//! Gaps are measured in seconds first and rescaled afterwards, so the
//! vector still sums to 1 when every note starts at time zero.

use crate::midi::EventSequence;

/// Normalized onset gaps for a sequence: the lead-in, one gap per following
/// note, and a trailing pad of zero, rescaled to sum to 1.
///
/// When all raw gaps are zero the result is uniform, `1 / (n + 1)` per
/// entry. An empty sequence yields `[1.0]`.
///
/// # Examples
///
/// ```
/// use gesture_edit::midi::{EventSequence, MelodicEvent};
/// use gesture_edit::timing::realtime_timing;
///
/// let chord = EventSequence::from_events(vec![
///     MelodicEvent::new(60, 0.0, 1.0, 0.8).unwrap(),
///     MelodicEvent::new(64, 0.0, 1.0, 0.8).unwrap(),
/// ]);
/// let timing = realtime_timing(&chord);
/// assert_eq!(timing.len(), 3);
/// assert!((timing[0] - 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn realtime_timing(sequence: &EventSequence) -> Vec<f64> {
    let sorted = sequence.sorted();
    if sorted.is_empty() {
        return vec![1.0];
    }

    let mut gaps = Vec::with_capacity(sorted.len() + 1);
    let mut previous = 0.0;
    for event in sorted.iter() {
        gaps.push(event.onset() - previous);
        previous = event.onset();
    }
    gaps.push(0.0);

    let sum: f64 = gaps.iter().sum();
    if sum <= 0.0 {
        let uniform = 1.0 / gaps.len() as f64;
        return vec![uniform; gaps.len()];
    }
    gaps.iter().map(|g| g / sum).collect()
}
