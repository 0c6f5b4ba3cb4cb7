//! Persisted editor settings.
//!
//! Settings are one JSON document with camelCase keys. Only `rootNote` and
//! `selectedScale` affect the engine: they supply the key whenever a caller
//! does not pass one explicitly.

use crate::error::{MelodyError, Result};
use crate::midi::{EventSequence, WireNote};
use crate::theory::{ScaleModel, ScaleResolution};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Editor settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Mode name, e.g. "major" or "harmonic minor".
    pub selected_scale: String,
    /// Note name of the key's root, e.g. "C" or "F#".
    pub root_note: String,
    pub octave: u8,
    /// Piano-roll zoom in percent.
    pub zoom_level: u32,
    pub edit_mode: bool,
    /// The last edited melody, as produced by [`serialize_midi_data`].
    pub last_midi_data: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_scale: "major".to_string(),
            root_note: "C".to_string(),
            octave: 4,
            zoom_level: 100,
            edit_mode: false,
            last_midi_data: None,
        }
    }
}

impl Settings {
    /// Resolves the configured key.
    ///
    /// An unknown mode falls back to major and is flagged in the result.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `rootNote` is not a note name.
    pub fn scale_selection(&self) -> Result<ScaleResolution> {
        ScaleModel::from_names(&self.root_note, &self.selected_scale)
    }

    /// Resolves the key to use for a request: explicit names win, missing
    /// ones come from these settings.
    pub fn resolve_scale(&self, root: Option<&str>, mode: Option<&str>) -> Result<ScaleResolution> {
        ScaleModel::from_names(
            root.unwrap_or(&self.root_note),
            mode.unwrap_or(&self.selected_scale),
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Saves the settings to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_json()?)?;
        tracing::debug!("Saved settings to {}", path.as_ref().display());
        Ok(())
    }

    /// Loads settings from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if file reading or parsing fails
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        tracing::debug!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Loads settings from `path` if it exists, otherwise returns defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// One track of stored melody data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackData {
    pub notes: Vec<WireNote>,
}

/// Stored melody: `{tracks: [{notes: [...]}], duration}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MidiData {
    pub tracks: Vec<TrackData>,
    pub duration: f64,
}

/// Serializes a melody into the `lastMidiData` string form.
pub fn serialize_midi_data(sequence: &EventSequence) -> Result<String> {
    let data = MidiData {
        tracks: vec![TrackData {
            notes: sequence.to_wire(),
        }],
        duration: sequence.end(),
    };
    Ok(serde_json::to_string(&data)?)
}

/// Parses a `lastMidiData` string, merging all tracks into one sequence.
///
/// # Errors
///
/// Returns a JSON error for malformed data or a validation error naming the
/// first invalid note.
pub fn deserialize_midi_data(data: &str) -> Result<EventSequence> {
    let data: MidiData = serde_json::from_str(data)?;
    let notes: Vec<WireNote> = data.tracks.into_iter().flat_map(|t| t.notes).collect();
    EventSequence::from_wire(&notes).map_err(|e| match e {
        MelodyError::Validation { field, message } => MelodyError::Validation {
            field: format!("lastMidiData.{}", field),
            message,
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MelodicEvent;
    use crate::theory::Mode;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("gesture-edit-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        let resolved = settings.scale_selection().unwrap();
        assert_eq!(resolved.model, ScaleModel::new(0, Mode::Major));
        assert!(!resolved.fell_back);
        assert_eq!(settings.octave, 4);
        assert_eq!(settings.zoom_level, 100);
    }

    #[test]
    fn test_camel_case_and_partial_documents() {
        let settings = Settings::from_json(r#"{"selectedScale":"dorian","rootNote":"D"}"#).unwrap();
        assert_eq!(settings.selected_scale, "dorian");
        assert_eq!(settings.octave, 4);
        assert_eq!(
            settings.scale_selection().unwrap().model,
            ScaleModel::new(2, Mode::Dorian)
        );

        let json = Settings::default().to_json().unwrap();
        assert!(json.contains("\"lastMidiData\": null"));
        assert!(json.contains("\"zoomLevel\""));
    }

    #[test]
    fn test_explicit_key_wins() {
        let settings = Settings {
            root_note: "A".to_string(),
            selected_scale: "minor".to_string(),
            ..Settings::default()
        };
        let resolved = settings.resolve_scale(Some("E"), None).unwrap();
        assert_eq!(resolved.model, ScaleModel::new(4, Mode::Minor));

        let settings = Settings {
            selected_scale: "klezmer".to_string(),
            ..Settings::default()
        };
        assert!(settings.scale_selection().unwrap().fell_back);
    }

    #[test]
    fn test_file_round_trip() {
        let path = temp_path("settings.json");
        let settings = Settings {
            root_note: "Bb".to_string(),
            edit_mode: true,
            ..Settings::default()
        };
        settings.save_to_file(&path).unwrap();
        let loaded = Settings::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, settings);

        let missing = temp_path("missing.json");
        assert_eq!(Settings::load_or_default(&missing).unwrap(), Settings::default());
    }

    #[test]
    fn test_midi_data() {
        let seq = EventSequence::from_events(vec![
            MelodicEvent::new(60, 0.0, 0.5, 0.8).unwrap(),
            MelodicEvent::new(64, 0.5, 1.0, 0.6).unwrap(),
        ]);
        let data = serialize_midi_data(&seq).unwrap();
        assert!(data.contains("\"tracks\""));
        assert_eq!(deserialize_midi_data(&data).unwrap(), seq);

        let two_tracks = r#"{"tracks":[{"notes":[{"midi":67,"time":1.0,"duration":0.5}]},
            {"notes":[{"midi":60,"time":0.0,"duration":0.5,"velocity":0.9}]}],"duration":1.5}"#;
        let merged = deserialize_midi_data(two_tracks).unwrap();
        assert_eq!(merged.events()[0].pitch(), 60);
        assert_eq!(merged.events()[1].velocity(), 0.7);

        let bad = r#"{"tracks":[{"notes":[{"midi":60,"time":0.0,"duration":0.0}]}],"duration":0}"#;
        match deserialize_midi_data(bad) {
            Err(MelodyError::Validation { field, .. }) => {
                assert_eq!(field, "lastMidiData.notes[0].duration")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
