//! gesture-edit - Melodic transformation and gesture timing engine.
//!
//! This library provides the core of a MIDI melody editor: scale-aware
//! transformations, counterpoint generation, gesture timing and the
//! timing normalization used for export and live playback.

pub mod error;
pub mod gesture;
pub mod live;
pub mod midi;
pub mod session;
pub mod settings;
pub mod theory;
pub mod timing;
pub mod transform;

// Re-export commonly used types
pub use error::{MelodyError, Result};
pub use live::{LayerName, LiveSender, UdpLiveSender};
pub use midi::{EventSequence, MelodicEvent, WireNote};
pub use session::Session;
pub use settings::Settings;
pub use theory::{Mode, ScaleModel};
pub use transform::{MelodyOperators, OperationRegistry, StandardOperators};
