//! Multi-layer editing session.
//!
//! A session holds up to three named layers, each an [`EventSequence`] with
//! mute and solo flags. Sessions save to JSON or a compact binary form and
//! export to a MIDI container, a decoupled timing document, or a live
//! sound engine.

use crate::error::{MelodyError, Result};
use crate::live::{push_layer, LayerName, LiveSender};
use crate::midi::{encode_tracks, EventSequence, ExportOptions, DEFAULT_TEMPO};
use crate::theory::ScaleModel;
use crate::timing::{to_decoupled, Decoupled, DurationType};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One layer's notes and playback flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub sequence: EventSequence,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
}

impl Layer {
    pub fn new(sequence: EventSequence) -> Self {
        Self {
            sequence,
            ..Self::default()
        }
    }
}

/// Decoupled export of every populated layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoupledExport {
    pub duration_type: DurationType,
    pub layers: BTreeMap<LayerName, Decoupled>,
}

/// A named set of layers plus container settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    /// Tempo in beats per minute, used for container export.
    pub tempo: u32,
    layers: BTreeMap<LayerName, Layer>,
}

impl Session {
    /// Creates a session with three empty layers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tempo: DEFAULT_TEMPO,
            layers: LayerName::ALL
                .into_iter()
                .map(|name| (name, Layer::default()))
                .collect(),
        }
    }

    pub fn layer(&self, name: LayerName) -> Option<&Layer> {
        self.layers.get(&name)
    }

    pub fn layer_mut(&mut self, name: LayerName) -> &mut Layer {
        self.layers.entry(name).or_default()
    }

    /// Replaces a layer's notes, keeping its flags.
    pub fn set_sequence(&mut self, name: LayerName, sequence: EventSequence) {
        self.layer_mut(name).sequence = sequence;
    }

    /// All layers in name order.
    pub fn layers(&self) -> impl Iterator<Item = (LayerName, &Layer)> {
        self.layers.iter().map(|(name, layer)| (*name, layer))
    }

    /// Layers with at least one note.
    pub fn populated_layers(&self) -> impl Iterator<Item = (LayerName, &Layer)> {
        self.layers().filter(|(_, layer)| !layer.sequence.is_empty())
    }

    /// Layers that should sound, considering mute and solo.
    ///
    /// If any layer is soloed, only soloed layers play.
    /// Otherwise, all non-muted layers play.
    pub fn audible_layers(&self) -> impl Iterator<Item = (LayerName, &Layer)> {
        let any_solo = self.layers.values().any(|l| l.solo);
        self.layers().filter(move |(_, layer)| {
            if any_solo {
                layer.solo && !layer.muted
            } else {
                !layer.muted
            }
        })
    }

    /// Latest note end across all layers, in seconds.
    pub fn duration(&self) -> f64 {
        self.layers
            .values()
            .map(|l| l.sequence.end())
            .fold(0.0, f64::max)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let session: Self = serde_json::from_str(json)?;
        Ok(session.with_all_layers())
    }

    /// Saves the session to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_json()?)?;
        tracing::info!("Saved session '{}' to {}", self.name, path.as_ref().display());
        Ok(())
    }

    /// Loads a session from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if file reading or parsing fails, or if a stored note is
    /// invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let session = Self::from_json(&json)?;
        tracing::info!("Loaded session '{}' from {}", session.name, path.as_ref().display());
        Ok(session)
    }

    /// Saves the session in binary form.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_to_binary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = bincode::serialize(self)?;
        fs::write(path.as_ref(), data)?;
        tracing::info!("Saved session '{}' to {}", self.name, path.as_ref().display());
        Ok(())
    }

    /// Loads a session saved with [`Session::save_to_binary`].
    ///
    /// # Errors
    ///
    /// Returns error if file reading or decoding fails
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        let session: Self = bincode::deserialize(&data)?;
        tracing::info!("Loaded session '{}' from {}", session.name, path.as_ref().display());
        Ok(session.with_all_layers())
    }

    fn with_all_layers(mut self) -> Self {
        for name in LayerName::ALL {
            self.layers.entry(name).or_default();
        }
        self
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            tempo: self.tempo,
            name: self.name.clone(),
            ..ExportOptions::default()
        }
    }

    /// Encodes every audible, populated layer as its own container track.
    ///
    /// # Errors
    ///
    /// Returns [`MelodyError::EmptyInput`] if no audible layer has notes.
    pub fn encode_midi(&self) -> Result<Vec<u8>> {
        let tracks: Vec<(&str, &EventSequence)> = self
            .audible_layers()
            .filter(|(_, layer)| !layer.sequence.is_empty())
            .map(|(name, layer)| (name.as_str(), &layer.sequence))
            .collect();
        if tracks.is_empty() {
            return Err(MelodyError::EmptyInput(
                "session has no audible layers with notes".to_string(),
            ));
        }
        Ok(encode_tracks(&tracks, &self.export_options()))
    }

    /// Writes [`Session::encode_midi`] output to a .mid file.
    pub fn export_to_midi<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.encode_midi()?;
        fs::write(path.as_ref(), bytes)?;
        tracing::info!("Exported session '{}' to {}", self.name, path.as_ref().display());
        Ok(())
    }

    /// Converts every populated layer to decoupled form.
    ///
    /// Empty layers are skipped. Mute and solo do not apply.
    ///
    /// # Errors
    ///
    /// Returns [`MelodyError::EmptyInput`] if no layer has notes.
    pub fn export_decoupled(
        &self,
        duration_type: DurationType,
        scale: &ScaleModel,
    ) -> Result<DecoupledExport> {
        let populated: Vec<(LayerName, &Layer)> = self.populated_layers().collect();
        if populated.is_empty() {
            return Err(MelodyError::EmptyInput(
                "session has no layers with notes".to_string(),
            ));
        }
        let layers = populated
            .into_par_iter()
            .map(|(name, layer)| (name, to_decoupled(&layer.sequence, duration_type, scale)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect();
        Ok(DecoupledExport {
            duration_type,
            layers,
        })
    }

    /// Sends every audible layer to the live engine. Returns how many
    /// layers were sent.
    pub fn push_live(&self, sender: &dyn LiveSender) -> usize {
        let mut sent = 0;
        for (name, layer) in self.audible_layers() {
            push_layer(sender, name, &layer.sequence);
            sent += 1;
        }
        tracing::debug!("Pushed {} layers of session '{}'", sent, self.name);
        sent
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new("Untitled Session")
    }
}
