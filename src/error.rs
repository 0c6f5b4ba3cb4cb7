//! Error types shared by every component of the engine.
//!
//! Operators either return a complete, valid result or one of these errors.
//! Nothing ever hands back a partially transformed sequence.

use thiserror::Error;

/// Errors produced by the melodic engine.
#[derive(Debug, Error)]
pub enum MelodyError {
    /// A parameter fell outside its documented range.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// One layer of a multi-layer request failed validation.
    /// The whole request is aborted; `layer` names the culprit.
    #[error("layer '{layer}' has invalid {field}: {message}")]
    LayerValidation {
        layer: String,
        field: String,
        message: String,
    },

    /// A transformation pushed a pitch outside 0-127.
    #[error("note {index} would move to pitch {pitch}, outside 0-127")]
    RangeOverflow { index: usize, pitch: i32 },

    /// The request needs content but none was supplied.
    #[error("{0} has no notes")]
    EmptyInput(String),

    /// No operator is registered under this name.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The MIDI container could not be decoded.
    #[error("MIDI container error: {0}")]
    Container(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Binary(#[from] bincode::Error),
}

impl MelodyError {
    /// Shorthand for a [`MelodyError::Validation`].
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MelodyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_field() {
        let err = MelodyError::LayerValidation {
            layer: "layer2".to_string(),
            field: "noteCount".to_string(),
            message: "must be between 1 and 100, got 0".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("layer2"));
        assert!(text.contains("noteCount"));

        let err = MelodyError::RangeOverflow {
            index: 3,
            pitch: 130,
        };
        assert_eq!(err.to_string(), "note 3 would move to pitch 130, outside 0-127");
    }
}
