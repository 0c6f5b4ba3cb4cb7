//! Structural metrics for a melody.
//!
//! Analysis never fails: an empty sequence yields [`MelodyAnalysis::default`].
//! All maps are ordered so serialized output is stable.

use crate::midi::EventSequence;
use crate::theory::ScaleModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest absolute interval, in semitones, still counted as a step.
pub const STEP_LIMIT: u32 = 2;

/// Direction of one melodic interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contour {
    Up,
    Down,
    Same,
}

/// A three-note shape (two consecutive intervals) that occurs more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motif {
    pub intervals: [i32; 2],
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodyAnalysis {
    pub note_count: usize,
    pub lowest: Option<u8>,
    pub highest: Option<u8>,
    /// Highest minus lowest pitch, in semitones.
    pub range: u8,
    /// Seconds from the first onset to the last release.
    pub span: f64,
    pub mean_pitch: Option<f64>,
    pub intervals: Vec<i32>,
    pub interval_histogram: BTreeMap<i32, usize>,
    pub contour: Vec<Contour>,
    pub steps: usize,
    pub leaps: usize,
    pub repeats: usize,
    pub out_of_scale: usize,
    pub motifs: Vec<Motif>,
}

/// Computes metrics over the melody in onset order.
pub fn analyze(sequence: &EventSequence, scale: &ScaleModel) -> MelodyAnalysis {
    let sorted = sequence.sorted();
    let Some(start) = sorted.start() else {
        return MelodyAnalysis::default();
    };

    let pitches: Vec<u8> = sorted.iter().map(|e| e.pitch()).collect();
    let intervals: Vec<i32> = pitches
        .windows(2)
        .map(|w| w[1] as i32 - w[0] as i32)
        .collect();

    let mut interval_histogram = BTreeMap::new();
    for &interval in &intervals {
        *interval_histogram.entry(interval).or_insert(0) += 1;
    }

    let contour = intervals
        .iter()
        .map(|i| match i.signum() {
            1 => Contour::Up,
            -1 => Contour::Down,
            _ => Contour::Same,
        })
        .collect();

    let repeats = intervals.iter().filter(|&&i| i == 0).count();
    let steps = intervals
        .iter()
        .filter(|&&i| i != 0 && i.unsigned_abs() <= STEP_LIMIT)
        .count();
    let leaps = intervals.len() - repeats - steps;

    let mut shapes: BTreeMap<[i32; 2], usize> = BTreeMap::new();
    for w in intervals.windows(2) {
        *shapes.entry([w[0], w[1]]).or_insert(0) += 1;
    }
    let motifs = shapes
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(intervals, count)| Motif { intervals, count })
        .collect();

    let (lowest, highest) = sorted.pitch_range().unzip();

    MelodyAnalysis {
        note_count: pitches.len(),
        lowest,
        highest,
        range: highest.zip(lowest).map(|(h, l)| h - l).unwrap_or(0),
        span: sorted.end() - start,
        mean_pitch: sorted.mean_pitch(),
        intervals,
        interval_histogram,
        contour,
        steps,
        leaps,
        repeats,
        out_of_scale: pitches.iter().filter(|&&p| !scale.contains(p)).count(),
        motifs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MelodicEvent;
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

    #[test]
    fn test_basic_metrics() {
        let a = analyze(&melody(&[60, 62, 67, 67, 61]), &ScaleModel::new(0, Mode::Major));
        assert_eq!(a.note_count, 5);
        assert_eq!(a.lowest, Some(60));
        assert_eq!(a.highest, Some(67));
        assert_eq!(a.range, 7);
        assert!((a.span - 2.5).abs() < 1e-12);
        assert_eq!(a.intervals, vec![2, 5, 0, -6]);
        assert_eq!(a.contour, vec![Contour::Up, Contour::Up, Contour::Same, Contour::Down]);
        assert_eq!((a.steps, a.leaps, a.repeats), (1, 2, 1));
        assert_eq!(a.out_of_scale, 1);
        assert_eq!(a.interval_histogram.get(&5), Some(&1));
    }

    #[test]
    fn test_repeated_motifs() {
        // Up a step, up a step, repeated twice
        let a = analyze(&melody(&[60, 62, 64, 60, 62, 64]), &ScaleModel::default());
        assert_eq!(
            a.motifs,
            vec![Motif {
                intervals: [2, 2],
                count: 2
            }]
        );
    }

    #[test]
    fn test_empty_is_default() {
        let a = analyze(&EventSequence::new(), &ScaleModel::default());
        assert_eq!(a, MelodyAnalysis::default());
        assert_eq!(a.note_count, 0);
    }

    #[test]
    fn test_serializes_with_camel_case() {
        let a = analyze(&melody(&[60, 64]), &ScaleModel::default());
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["noteCount"], 2);
        assert_eq!(json["contour"][0], "up");
        assert_eq!(json["intervalHistogram"]["4"], 1);
    }
}
