//! Timing normalization for cross-system playback and export.

mod decoupled;
mod realtime;

pub use decoupled::{
    from_decoupled, to_decoupled, Decoupled, DecoupledMetadata, DecoupledNote, DurationType,
};
pub use realtime::realtime_timing;
