//! Melodic transformation operators.
//!
//! Every operator is a pure function of an [`EventSequence`], a
//! [`ScaleModel`] and its parameters, returning a new sequence sorted by
//! onset (counterpoint keeps its documented interleaved order). Operators
//! are exposed both as free functions and through the [`MelodyOperators`]
//! trait, which the [`registry`] dispatches on.

mod analyze;
mod counterpoint;
mod develop;
mod ornament;
mod pitch;
pub mod registry;
mod time;

pub use analyze::{analyze, Contour, MelodyAnalysis, Motif, STEP_LIMIT};
pub use counterpoint::{
    counter_voice, generate_counterpoint, generate_counterpoint_with, CounterStyle,
    CANDIDATE_INTERVALS, COUNTERPOINT_RANGE, VELOCITY_RATIO,
};
pub use develop::{develop, DevelopMethod};
pub use ornament::{ornament, OrnamentStyle, MIN_ORNAMENT_DURATION};
pub use pitch::{harmonize, interval_to_steps, invert, transpose, transpose_diatonic, InvertAxis};
pub use registry::{OperationRegistry, Outcome, ParamKind, ParamSpec, ParamValue, Params};
pub use time::{
    align_to_start, compress_to_scale, duplicate_pattern, evenly_space, mirror_pattern, quantize,
    reverse, scale_positions, scale_time, shift,
};

use crate::error::{MelodyError, Result};
use crate::midi::EventSequence;
use crate::theory::ScaleModel;

/// One method per named melodic operation.
///
/// The documented operators have default implementations. The shape-based
/// ones (`ornament`, `develop`, `analyze`) are left to the implementor so
/// alternative heuristics can be plugged in and tested on their own.
pub trait MelodyOperators: Send + Sync {
    fn transpose(&self, sequence: &EventSequence, semitones: i32) -> Result<EventSequence> {
        transpose(sequence, semitones)
    }

    fn transpose_diatonic(
        &self,
        sequence: &EventSequence,
        scale: &ScaleModel,
        steps: i32,
    ) -> Result<EventSequence> {
        transpose_diatonic(sequence, scale, steps)
    }

    fn invert(&self, sequence: &EventSequence, axis: InvertAxis) -> Result<EventSequence> {
        invert(sequence, axis)
    }

    /// Stretches time by `factor`, which must be at least 1.
    fn augment(&self, sequence: &EventSequence, factor: f64) -> Result<EventSequence> {
        if factor < 1.0 {
            return Err(MelodyError::validation(
                "factor",
                format!("augmentation needs a factor of at least 1, got {}", factor),
            ));
        }
        scale_time(sequence, factor)
    }

    /// Compresses time by `factor`, which must be in (0, 1].
    fn diminish(&self, sequence: &EventSequence, factor: f64) -> Result<EventSequence> {
        if factor > 1.0 {
            return Err(MelodyError::validation(
                "factor",
                format!("diminution needs a factor of at most 1, got {}", factor),
            ));
        }
        scale_time(sequence, factor)
    }

    fn harmonize(
        &self,
        sequence: &EventSequence,
        scale: &ScaleModel,
        interval: i32,
    ) -> Result<EventSequence> {
        harmonize(sequence, scale, interval)
    }

    fn counter_melody(
        &self,
        sequence: &EventSequence,
        scale: &ScaleModel,
        style: CounterStyle,
    ) -> Result<EventSequence> {
        Ok(generate_counterpoint_with(sequence, scale, style)?.sorted())
    }

    fn ornament(
        &self,
        sequence: &EventSequence,
        scale: &ScaleModel,
        style: OrnamentStyle,
    ) -> Result<EventSequence>;

    fn develop(
        &self,
        sequence: &EventSequence,
        scale: &ScaleModel,
        method: DevelopMethod,
    ) -> Result<EventSequence>;

    fn analyze(&self, sequence: &EventSequence, scale: &ScaleModel) -> MelodyAnalysis;
}

/// The built-in heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardOperators;

impl MelodyOperators for StandardOperators {
    fn ornament(
        &self,
        sequence: &EventSequence,
        scale: &ScaleModel,
        style: OrnamentStyle,
    ) -> Result<EventSequence> {
        ornament(sequence, scale, style)
    }

    fn develop(
        &self,
        sequence: &EventSequence,
        scale: &ScaleModel,
        method: DevelopMethod,
    ) -> Result<EventSequence> {
        develop(sequence, scale, method)
    }

    fn analyze(&self, sequence: &EventSequence, scale: &ScaleModel) -> MelodyAnalysis {
        analyze(sequence, scale)
    }
}
