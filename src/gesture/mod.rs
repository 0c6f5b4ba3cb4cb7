//! Gesture timing engine.
//!
//! A gesture layer repeats one pitch at evenly spaced, symmetric positions
//! inside a fixed duration. Layers are encoded into millisecond-resolution
//! NoteOn/NoteOff streams for exact playback, or into melodic events for
//! editing and export.

mod layer;
mod rhythm;

pub use layer::{
    encode_layer, EventType, GestureLayerSpec, TimedEvent, TimedEventStream, ValidLayer,
    GUARD_RATIO,
};
pub use rhythm::SimpleRhythm;

use crate::error::Result;
use crate::midi::EventSequence;
use rayon::prelude::*;
use serde::Serialize;

/// Centers of `note_count` equal segments of `total_duration` seconds.
///
/// Returns an empty list when either argument is not positive.
///
/// # Examples
///
/// ```
/// use gesture_edit::gesture::symmetric_positions;
///
/// assert_eq!(symmetric_positions(4, 4.0), vec![0.5, 1.5, 2.5, 3.5]);
/// assert!(symmetric_positions(0, 4.0).is_empty());
/// ```
pub fn symmetric_positions(note_count: i64, total_duration: f64) -> Vec<f64> {
    if note_count <= 0 || total_duration.is_nan() || total_duration <= 0.0 {
        return Vec::new();
    }
    let segment = total_duration / note_count as f64;
    (0..note_count)
        .map(|i| (i as f64 + 0.5) * segment)
        .collect()
}

/// Default layer name for the layer at `index` ("layer1", "layer2", ...).
pub fn layer_name(index: usize) -> String {
    format!("layer{}", index + 1)
}

/// One encoded layer of a multi-layer gesture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedLayer {
    pub name: String,
    pub events: TimedEventStream,
    pub notes: EventSequence,
}

/// Validates every layer, then encodes them in parallel.
///
/// Output order matches input order. Layers are named by position.
///
/// # Errors
///
/// The first layer that fails validation aborts the whole request with
/// [`crate::MelodyError::LayerValidation`]; nothing is encoded.
pub fn encode_layers(specs: &[GestureLayerSpec]) -> Result<Vec<EncodedLayer>> {
    let validated = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let name = layer_name(i);
            spec.validate(&name).map(|layer| (name, layer))
        })
        .collect::<Result<Vec<_>>>()
        .inspect_err(|e| tracing::warn!("Rejected gesture request: {}", e))?;

    tracing::debug!("Encoding {} gesture layers", validated.len());
    Ok(validated
        .into_par_iter()
        .map(|(name, layer)| EncodedLayer {
            name,
            events: layer.encode(),
            notes: layer.to_sequence(),
        })
        .collect())
}
