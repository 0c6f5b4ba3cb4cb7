//! The simple-rhythm gesture: one pitch repeated with a fixed rest.

use crate::error::{MelodyError, Result};
use crate::midi::{checked_pitch, EventSequence, MelodicEvent, DEFAULT_VELOCITY};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimpleRhythm {
    pub note: i64,
    /// Seconds, 0.1-2.
    pub note_duration: f64,
    /// Rest after each note as a percentage of `note_duration`, 0-200.
    pub interval: f64,
    /// Seconds, 1-10.
    pub gesture_duration: f64,
}

impl Default for SimpleRhythm {
    fn default() -> Self {
        Self {
            note: 60,
            note_duration: 0.5,
            interval: 50.0,
            gesture_duration: 4.0,
        }
    }
}

impl SimpleRhythm {
    /// Repeats the note while a whole note still fits in the gesture.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first out-of-range field.
    pub fn generate(&self) -> Result<EventSequence> {
        let invalid_note =
            || MelodyError::validation("note", format!("must be between 0 and 127, got {}", self.note));
        let pitch = i32::try_from(self.note)
            .map_err(|_| invalid_note())
            .and_then(|note| checked_pitch(note, 0).map_err(|_| invalid_note()))?;
        if !(0.1..=2.0).contains(&self.note_duration) {
            return Err(MelodyError::validation(
                "noteDuration",
                format!("must be between 0.1 and 2 seconds, got {}", self.note_duration),
            ));
        }
        if !(0.0..=200.0).contains(&self.interval) {
            return Err(MelodyError::validation(
                "interval",
                format!("must be between 0 and 200 percent, got {}", self.interval),
            ));
        }
        if !(1.0..=10.0).contains(&self.gesture_duration) {
            return Err(MelodyError::validation(
                "gestureDuration",
                format!("must be between 1 and 10 seconds, got {}", self.gesture_duration),
            ));
        }

        let period = self.note_duration * (1.0 + self.interval / 100.0);
        // Tolerance so a note ending exactly on the boundary is kept
        let limit = self.gesture_duration + 1e-9;
        let events = (0..)
            .map(|k| k as f64 * period)
            .take_while(|onset| onset + self.note_duration <= limit)
            .map(|onset| MelodicEvent::new(pitch, onset, self.note_duration, DEFAULT_VELOCITY))
            .collect::<Result<Vec<_>>>()?;
        Ok(EventSequence::from_events(events))
    }
}
