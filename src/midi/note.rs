//! Melodic event representation.
//!
//! A [`MelodicEvent`] is one note: pitch, onset, duration and velocity, with
//! time measured in seconds. Events are immutable once built; operators
//! derive new events instead of editing existing ones.

use super::MAX_PITCH;
use crate::error::{MelodyError, Result};
use serde::{Deserialize, Serialize};

/// Velocity assumed when a wire note omits one.
pub const DEFAULT_VELOCITY: f32 = 0.7;

/// A single note with timing and dynamics.
///
/// Velocity is always stored in the canonical 0.0-1.0 range. The 0-127
/// integer form only appears at the container boundary. Serialized form is
/// the [`WireNote`] shape, validated on the way back in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireNote", into = "WireNote")]
pub struct MelodicEvent {
    pitch: u8,
    onset: f64,
    duration: f64,
    velocity: f32,
}

impl MelodicEvent {
    /// Creates a new event, validating every field.
    ///
    /// # Arguments
    ///
    /// * `pitch` - MIDI note number (0-127)
    /// * `onset` - Start time in seconds, non-negative
    /// * `duration` - Length in seconds, strictly positive
    /// * `velocity` - Dynamics in the range 0.0-1.0
    ///
    /// # Examples
    ///
    /// ```
    /// use gesture_edit::midi::MelodicEvent;
    ///
    /// let note = MelodicEvent::new(60, 0.0, 1.0, 0.8).unwrap();
    /// assert_eq!(note.pitch(), 60);
    /// assert!(MelodicEvent::new(128, 0.0, 1.0, 0.8).is_err());
    /// ```
    pub fn new(pitch: u8, onset: f64, duration: f64, velocity: f32) -> Result<Self> {
        if pitch > MAX_PITCH {
            return Err(MelodyError::validation(
                "pitch",
                format!("must be between 0 and 127, got {}", pitch),
            ));
        }
        if !onset.is_finite() || onset < 0.0 {
            return Err(MelodyError::validation(
                "onset",
                format!("must be a non-negative number of seconds, got {}", onset),
            ));
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(MelodyError::validation(
                "duration",
                format!("must be a positive number of seconds, got {}", duration),
            ));
        }
        if !velocity.is_finite() || !(0.0..=1.0).contains(&velocity) {
            return Err(MelodyError::validation(
                "velocity",
                format!("must be between 0.0 and 1.0, got {}", velocity),
            ));
        }
        Ok(Self {
            pitch,
            onset,
            duration,
            velocity,
        })
    }

    /// MIDI note number (0-127).
    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    /// Start time in seconds.
    pub fn onset(&self) -> f64 {
        self.onset
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Velocity in 0.0-1.0.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Time at which the note stops sounding.
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }

    /// Velocity scaled to the MIDI 0-127 range.
    pub fn midi_velocity(&self) -> u8 {
        (self.velocity * 127.0).round().clamp(0.0, 127.0) as u8
    }

    /// Converts a MIDI 0-127 velocity into the canonical unit.
    pub fn velocity_from_midi(velocity: u8) -> f32 {
        velocity.min(127) as f32 / 127.0
    }

    /// Copy of this event at another pitch. Callers range-check beforehand.
    pub(crate) fn repitched(&self, pitch: u8) -> Self {
        debug_assert!(pitch <= MAX_PITCH);
        Self { pitch, ..*self }
    }

    /// Copy of this event with new timing.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the new onset or duration breaks the
    /// same rules [`MelodicEvent::new`] enforces, e.g. after overflowing to
    /// infinity.
    pub(crate) fn retimed(&self, onset: f64, duration: f64) -> Result<Self> {
        Self::new(self.pitch, onset, duration, self.velocity)
    }

    /// Copy of this event with a new velocity, clamped into 0.0-1.0.
    pub(crate) fn revoiced(&self, velocity: f32) -> Self {
        Self {
            velocity: velocity.clamp(0.0, 1.0),
            ..*self
        }
    }
}

/// The JSON note shape exchanged with callers.
///
/// `{midi, time, duration, velocity}` in seconds. Velocities above 1.0 are
/// read as MIDI 0-127 values and converted on the way in. Exactly 1.0 is the
/// canonical maximum, not MIDI velocity 1; send 1/127 for the quietest note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireNote {
    pub midi: i32,
    pub time: f64,
    pub duration: f64,
    #[serde(default = "default_velocity")]
    pub velocity: f32,
}

fn default_velocity() -> f32 {
    DEFAULT_VELOCITY
}

impl WireNote {
    /// Converts this wire note into a validated event.
    ///
    /// `index` is the note's position in the request, used in errors.
    pub fn to_event(&self, index: usize) -> Result<MelodicEvent> {
        let pitch = super::checked_pitch(self.midi, index)?;
        let velocity = if self.velocity > 1.0 {
            self.velocity / 127.0
        } else {
            self.velocity
        };
        MelodicEvent::new(pitch, self.time, self.duration, velocity).map_err(|e| match e {
            MelodyError::Validation { field, message } => MelodyError::Validation {
                field: format!("notes[{}].{}", index, field),
                message,
            },
            other => other,
        })
    }
}

impl TryFrom<WireNote> for MelodicEvent {
    type Error = MelodyError;

    fn try_from(wire: WireNote) -> Result<Self> {
        wire.to_event(0)
    }
}

impl From<MelodicEvent> for WireNote {
    fn from(event: MelodicEvent) -> Self {
        Self::from(&event)
    }
}

impl From<&MelodicEvent> for WireNote {
    fn from(event: &MelodicEvent) -> Self {
        Self {
            midi: event.pitch as i32,
            time: event.onset,
            duration: event.duration,
            velocity: event.velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let note = MelodicEvent::new(60, 0.5, 1.0, 0.8).unwrap();
        assert_eq!(note.pitch(), 60);
        assert_eq!(note.onset(), 0.5);
        assert_eq!(note.duration(), 1.0);
        assert!((note.end() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_event_validation() {
        assert!(MelodicEvent::new(60, -0.1, 1.0, 0.8).is_err());
        assert!(MelodicEvent::new(60, 0.0, 0.0, 0.8).is_err());
        assert!(MelodicEvent::new(60, 0.0, f64::NAN, 0.8).is_err());
        assert!(MelodicEvent::new(60, 0.0, 1.0, 1.5).is_err());
    }

    #[test]
    fn test_velocity_conversion() {
        let note = MelodicEvent::new(60, 0.0, 1.0, 1.0).unwrap();
        assert_eq!(note.midi_velocity(), 127);
        let note = MelodicEvent::new(60, 0.0, 1.0, 0.5).unwrap();
        assert_eq!(note.midi_velocity(), 64);
        assert!((MelodicEvent::velocity_from_midi(127) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_wire_note_boundary() {
        let wire: WireNote =
            serde_json::from_str(r#"{"midi":60,"time":0.0,"duration":1.0,"velocity":100}"#)
                .unwrap();
        let event = wire.to_event(0).unwrap();
        assert!((event.velocity() - 100.0 / 127.0).abs() < 1e-6);

        let wire: WireNote = serde_json::from_str(r#"{"midi":61,"time":0.0,"duration":1.0}"#).unwrap();
        assert_eq!(wire.velocity, DEFAULT_VELOCITY);

        let wire = WireNote {
            midi: 140,
            time: 0.0,
            duration: 1.0,
            velocity: 0.8,
        };
        assert!(matches!(
            wire.to_event(2),
            Err(MelodyError::RangeOverflow { index: 2, pitch: 140 })
        ));
    }

    #[test]
    fn test_wire_velocity_one_is_full_scale() {
        let wire = |velocity| WireNote {
            midi: 60,
            time: 0.0,
            duration: 1.0,
            velocity,
        };
        let full = wire(1.0).to_event(0).unwrap();
        assert_eq!(full.velocity(), 1.0);
        assert_eq!(full.midi_velocity(), 127);

        let quiet = wire(1.0 / 127.0).to_event(0).unwrap();
        assert_eq!(quiet.midi_velocity(), 1);
        let two = wire(2.0).to_event(0).unwrap();
        assert!((two.velocity() - 2.0 / 127.0).abs() < 1e-12);
        assert_eq!(two.midi_velocity(), 2);
    }

    #[test]
    fn test_event_serializes_as_wire_note() {
        let note = MelodicEvent::new(64, 0.5, 0.25, 0.5).unwrap();
        let json = serde_json::to_value(note).unwrap();
        assert_eq!(json["midi"], 64);
        assert_eq!(json["time"], 0.5);

        let bad = r#"{"midi":200,"time":0.0,"duration":1.0,"velocity":0.5}"#;
        assert!(serde_json::from_str::<MelodicEvent>(bad).is_err());
    }

    #[test]
    fn test_wire_note_field_path() {
        let wire = WireNote {
            midi: 60,
            time: 0.0,
            duration: -1.0,
            velocity: 0.8,
        };
        match wire.to_event(5) {
            Err(MelodyError::Validation { field, .. }) => assert_eq!(field, "notes[5].duration"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
