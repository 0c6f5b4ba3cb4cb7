//! One gesture layer: a pitch repeated at symmetric positions.

use super::symmetric_positions;
use crate::error::{MelodyError, Result};
use crate::midi::{
    gesture_ticks_to_seconds, seconds_to_gesture_ticks, EventSequence, MelodicEvent,
    DEFAULT_VELOCITY, MAX_PITCH,
};
use serde::{Deserialize, Serialize};

/// Fraction of each segment a note may fill at 100%. The 1% gap keeps one
/// note's release from landing on the next note's start.
pub const GUARD_RATIO: f64 = 0.99;

/// Parameters of one gesture layer as supplied by the caller.
///
/// Fields accept any number; ranges are checked by [`GestureLayerSpec::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureLayerSpec {
    #[serde(alias = "midiNote")]
    pub pitch: i64,
    pub duration_percent: f64,
    pub total_duration: f64,
    #[serde(alias = "numNotes")]
    pub note_count: i64,
}

impl Default for GestureLayerSpec {
    fn default() -> Self {
        Self {
            pitch: 60,
            duration_percent: 50.0,
            total_duration: 4.0,
            note_count: 1,
        }
    }
}

/// A layer spec that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidLayer {
    pub pitch: u8,
    pub duration_percent: f64,
    pub total_duration: f64,
    pub note_count: usize,
}

impl GestureLayerSpec {
    /// Checks every field, naming `layer` and the field on failure.
    ///
    /// # Errors
    ///
    /// [`MelodyError::LayerValidation`] for the first field out of range:
    /// pitch 0-127, durationPercent 1-100, totalDuration 1-10 s,
    /// noteCount 1-100.
    pub fn validate(&self, layer: &str) -> Result<ValidLayer> {
        let fail = |field: &str, message: String| MelodyError::LayerValidation {
            layer: layer.to_string(),
            field: field.to_string(),
            message,
        };
        if !(0..=MAX_PITCH as i64).contains(&self.pitch) {
            return Err(fail(
                "pitch",
                format!("must be between 0 and 127, got {}", self.pitch),
            ));
        }
        if !(1.0..=100.0).contains(&self.duration_percent) {
            return Err(fail(
                "durationPercent",
                format!("must be between 1 and 100, got {}", self.duration_percent),
            ));
        }
        if !(1.0..=10.0).contains(&self.total_duration) {
            return Err(fail(
                "totalDuration",
                format!("must be between 1 and 10 seconds, got {}", self.total_duration),
            ));
        }
        if !(1..=100).contains(&self.note_count) {
            return Err(fail(
                "noteCount",
                format!("must be between 1 and 100, got {}", self.note_count),
            ));
        }
        Ok(ValidLayer {
            pitch: self.pitch as u8,
            duration_percent: self.duration_percent,
            total_duration: self.total_duration,
            note_count: self.note_count as usize,
        })
    }
}

impl ValidLayer {
    /// Length of every note in seconds.
    pub fn note_duration(&self) -> f64 {
        note_duration(self.duration_percent, self.total_duration, self.note_count)
    }

    pub fn centers(&self) -> Vec<f64> {
        symmetric_positions(self.note_count as i64, self.total_duration)
    }

    pub fn encode(&self) -> TimedEventStream {
        encode_layer(
            self.pitch,
            &self.centers(),
            self.duration_percent,
            self.total_duration,
            self.note_count,
        )
    }

    /// The layer as melodic events at the default velocity.
    pub fn to_sequence(&self) -> EventSequence {
        let duration = self.note_duration();
        EventSequence::from_events(
            self.centers()
                .into_iter()
                .filter_map(|center| {
                    MelodicEvent::new(self.pitch, center - duration / 2.0, duration, DEFAULT_VELOCITY)
                        .ok()
                })
                .collect(),
        )
    }
}

fn note_duration(duration_percent: f64, total_duration: f64, note_count: usize) -> f64 {
    if note_count == 0 {
        return 0.0;
    }
    let max_duration = GUARD_RATIO * (total_duration / note_count as f64);
    max_duration * duration_percent / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    NoteOn,
    NoteOff,
}

/// One note boundary at millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedEvent {
    pub event_type: EventType,
    pub absolute_time_ticks: u64,
    pub pitch: u8,
}

impl TimedEvent {
    /// Position of this event in seconds.
    pub fn seconds(&self) -> f64 {
        gesture_ticks_to_seconds(self.absolute_time_ticks)
    }
}

/// Note boundaries sorted by tick; ties keep generation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimedEventStream {
    events: Vec<TimedEvent>,
}

impl TimedEventStream {
    /// Builds a stream, stably sorting by tick.
    pub fn from_events(mut events: Vec<TimedEvent>) -> Self {
        events.sort_by_key(|e| e.absolute_time_ticks);
        Self { events }
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Interleaves several streams into one, stable across inputs in order.
    pub fn merge<'a>(streams: impl IntoIterator<Item = &'a TimedEventStream>) -> Self {
        Self::from_events(
            streams
                .into_iter()
                .flat_map(|s| s.events.iter().copied())
                .collect(),
        )
    }
}

/// Encodes a note at every center into NoteOn/NoteOff ticks.
///
/// Each note lasts `durationPercent` of 99% of its segment and is centred
/// on its position. Ticks are rounded to the nearest millisecond; a note's
/// NoteOn is always emitted before its NoteOff, even when both round to the
/// same tick.
///
/// # Examples
///
/// ```
/// use gesture_edit::gesture::{encode_layer, symmetric_positions, EventType};
///
/// let centers = symmetric_positions(2, 2.0);
/// let stream = encode_layer(60, &centers, 40.0, 2.0, 2);
/// assert_eq!(stream.len(), 4);
/// assert_eq!(stream.events()[0].event_type, EventType::NoteOn);
/// assert_eq!(stream.events()[0].absolute_time_ticks, 302);
/// ```
pub fn encode_layer(
    pitch: u8,
    centers: &[f64],
    duration_percent: f64,
    total_duration: f64,
    note_count: usize,
) -> TimedEventStream {
    let half = note_duration(duration_percent, total_duration, note_count) / 2.0;
    let mut events = Vec::with_capacity(centers.len() * 2);
    for &center in centers {
        events.push(TimedEvent {
            event_type: EventType::NoteOn,
            absolute_time_ticks: seconds_to_gesture_ticks(center - half),
            pitch,
        });
        events.push(TimedEvent {
            event_type: EventType::NoteOff,
            absolute_time_ticks: seconds_to_gesture_ticks(center + half),
            pitch,
        });
    }
    TimedEventStream::from_events(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(pitch: i64, percent: f64, total: f64, count: i64) -> GestureLayerSpec {
        GestureLayerSpec {
            pitch,
            duration_percent: percent,
            total_duration: total,
            note_count: count,
        }
    }

    #[test]
    fn test_validation_names_layer_and_field() {
        let cases = [
            (spec(128, 50.0, 4.0, 4), "pitch"),
            (spec(-1, 50.0, 4.0, 4), "pitch"),
            (spec(60, 0.5, 4.0, 4), "durationPercent"),
            (spec(60, 101.0, 4.0, 4), "durationPercent"),
            (spec(60, 50.0, 0.5, 4), "totalDuration"),
            (spec(60, 50.0, 11.0, 4), "totalDuration"),
            (spec(60, 50.0, 4.0, 0), "noteCount"),
            (spec(60, 50.0, 4.0, 101), "noteCount"),
            (spec(60, f64::NAN, 4.0, 4), "durationPercent"),
        ];
        for (bad, expected) in cases {
            match bad.validate("layer2") {
                Err(MelodyError::LayerValidation { layer, field, .. }) => {
                    assert_eq!(layer, "layer2");
                    assert_eq!(field, expected);
                }
                other => panic!("expected {} failure, got {:?}", expected, other),
            }
        }
        assert!(spec(0, 1.0, 1.0, 1).validate("layer1").is_ok());
        assert!(spec(127, 100.0, 10.0, 100).validate("layer1").is_ok());
    }

    #[test]
    fn test_encode_ticks() {
        // Four notes over 4 s at 40%: segment 1 s, note 0.396 s
        let layer = spec(64, 40.0, 4.0, 4).validate("layer1").unwrap();
        let stream = layer.encode();
        let ticks: Vec<u64> = stream.events().iter().map(|e| e.absolute_time_ticks).collect();
        assert_eq!(ticks, vec![302, 698, 1302, 1698, 2302, 2698, 3302, 3698]);
        assert!(stream.events().iter().all(|e| e.pitch == 64));
        assert_eq!(stream.events()[1].seconds(), 0.698);
    }

    #[test]
    fn test_pairs_are_never_inverted() {
        for count in [1i64, 3, 7, 50, 100] {
            for percent in [1.0, 33.3, 100.0] {
                let layer = spec(60, percent, 1.0, count).validate("layer1").unwrap();
                let events = layer.encode().events().to_vec();
                assert!(events.windows(2).all(|w| w[0].absolute_time_ticks <= w[1].absolute_time_ticks));
                let mut open = 0i32;
                for e in &events {
                    open += if e.event_type == EventType::NoteOn { 1 } else { -1 };
                    assert!((0..=1).contains(&open));
                }
                assert_eq!(open, 0);
            }
        }
    }

    #[test]
    fn test_full_percent_keeps_guard_band() {
        let layer = spec(60, 100.0, 2.0, 2).validate("layer1").unwrap();
        let events = layer.encode().events().to_vec();
        // First release strictly before the second start
        assert!(events[1].absolute_time_ticks < events[2].absolute_time_ticks);
    }

    #[test]
    fn test_to_sequence() {
        let layer = spec(67, 50.0, 4.0, 2).validate("layer3").unwrap();
        let seq = layer.to_sequence();
        assert_eq!(seq.len(), 2);
        assert!((seq.events()[0].duration() - 0.99).abs() < 1e-12);
        assert!((seq.events()[0].onset() - 0.505).abs() < 1e-12);
        assert_eq!(seq.events()[1].velocity(), DEFAULT_VELOCITY);
    }

    #[test]
    fn test_wire_aliases() {
        let json = r#"{"midiNote":64,"durationPercent":50,"totalDuration":4,"numNotes":5}"#;
        let spec: GestureLayerSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.pitch, 64);
        assert_eq!(spec.note_count, 5);

        let stream = spec.validate("layer1").unwrap().encode();
        let json = serde_json::to_value(&stream).unwrap();
        assert_eq!(json[0]["eventType"], "NoteOn");
        assert!(json[0]["absoluteTimeTicks"].is_u64());
    }
}
