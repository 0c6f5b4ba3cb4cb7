//! Scale and key model.
//!
//! A [`ScaleModel`] is a root pitch class plus a [`Mode`]. It answers two
//! questions for the rest of the engine: which pitch classes belong to the
//! key, and where the nearest in-key pitch to an arbitrary pitch lies.

use crate::error::{MelodyError, Result};
use crate::midi::{checked_pitch, MAX_PITCH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale modes, each defined by a fixed interval pattern from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "major")]
    Major,
    #[serde(rename = "minor")]
    Minor,
    #[serde(rename = "harmonic minor")]
    HarmonicMinor,
    /// Ascending form
    #[serde(rename = "melodic minor")]
    MelodicMinor,
    #[serde(rename = "pentatonic")]
    Pentatonic,
    #[serde(rename = "minor pentatonic")]
    MinorPentatonic,
    #[serde(rename = "blues")]
    Blues,
    #[serde(rename = "chromatic")]
    Chromatic,
    #[serde(rename = "whole tone")]
    WholeTone,
    #[serde(rename = "dorian")]
    Dorian,
    #[serde(rename = "phrygian")]
    Phrygian,
    #[serde(rename = "phrygian dominant")]
    PhrygianDominant,
    #[serde(rename = "lydian")]
    Lydian,
    #[serde(rename = "mixolydian")]
    Mixolydian,
    #[serde(rename = "aeolian")]
    Aeolian,
    #[serde(rename = "locrian")]
    Locrian,
}

impl Mode {
    /// Every supported mode, in menu order.
    pub const ALL: [Mode; 16] = [
        Mode::Major,
        Mode::Minor,
        Mode::HarmonicMinor,
        Mode::MelodicMinor,
        Mode::Pentatonic,
        Mode::MinorPentatonic,
        Mode::Blues,
        Mode::Chromatic,
        Mode::WholeTone,
        Mode::Dorian,
        Mode::Phrygian,
        Mode::PhrygianDominant,
        Mode::Lydian,
        Mode::Mixolydian,
        Mode::Aeolian,
        Mode::Locrian,
    ];

    /// Semitone offsets from the root to each scale degree, ascending.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Mode::Major => &[0, 2, 4, 5, 7, 9, 11],
            Mode::Minor | Mode::Aeolian => &[0, 2, 3, 5, 7, 8, 10],
            Mode::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Mode::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Mode::Pentatonic => &[0, 2, 4, 7, 9],
            Mode::MinorPentatonic => &[0, 3, 5, 7, 10],
            Mode::Blues => &[0, 3, 5, 6, 7, 10],
            Mode::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Mode::WholeTone => &[0, 2, 4, 6, 8, 10],
            Mode::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Mode::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Mode::PhrygianDominant => &[0, 1, 4, 5, 7, 8, 10],
            Mode::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Mode::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Mode::Locrian => &[0, 1, 3, 5, 6, 8, 10],
        }
    }

    /// Lower-case display name, as used in settings documents.
    pub fn name(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
            Mode::HarmonicMinor => "harmonic minor",
            Mode::MelodicMinor => "melodic minor",
            Mode::Pentatonic => "pentatonic",
            Mode::MinorPentatonic => "minor pentatonic",
            Mode::Blues => "blues",
            Mode::Chromatic => "chromatic",
            Mode::WholeTone => "whole tone",
            Mode::Dorian => "dorian",
            Mode::Phrygian => "phrygian",
            Mode::PhrygianDominant => "phrygian dominant",
            Mode::Lydian => "lydian",
            Mode::Mixolydian => "mixolydian",
            Mode::Aeolian => "aeolian",
            Mode::Locrian => "locrian",
        }
    }

    /// Parses a mode name. Case, hyphens and underscores are ignored, so
    /// "Harmonic-Minor" and "harmonic_minor" both work.
    pub fn parse(name: &str) -> Option<Mode> {
        let normalized = name
            .trim()
            .to_lowercase()
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let normalized = match normalized.as_str() {
            "ionian" => "major",
            "natural minor" => "minor",
            "major pentatonic" => "pentatonic",
            other => other,
        };
        Mode::ALL.into_iter().find(|m| m.name() == normalized)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of pitch classes (0-11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PitchClassSet {
    members: [bool; 12],
}

impl PitchClassSet {
    /// Builds a set from pitch classes; values wrap modulo 12.
    pub fn from_classes(classes: impl IntoIterator<Item = u8>) -> Self {
        let mut members = [false; 12];
        for pc in classes {
            members[(pc % 12) as usize] = true;
        }
        Self { members }
    }

    pub fn contains(&self, pitch_class: u8) -> bool {
        self.members[(pitch_class % 12) as usize]
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0u8..12).filter(move |&pc| self.members[pc as usize])
    }

    pub fn len(&self) -> usize {
        self.members.iter().filter(|&&m| m).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.members.contains(&true)
    }
}

/// Diatonic pitch classes of `mode` built on `root`.
///
/// # Examples
///
/// ```
/// use gesture_edit::theory::{pitch_classes, Mode};
///
/// let d_major: Vec<u8> = pitch_classes(2, Mode::Major).iter().collect();
/// assert_eq!(d_major, vec![1, 2, 4, 6, 7, 9, 11]);
/// ```
pub fn pitch_classes(root: u8, mode: Mode) -> PitchClassSet {
    PitchClassSet::from_classes(mode.intervals().iter().map(|&i| (root % 12 + i) % 12))
}

/// Snaps `candidate` to the nearest pitch whose class is in `classes`.
///
/// The closest scale class to the candidate's class is rebuilt in the
/// candidate's octave (ties go to the lower class). A result more than six
/// semitones away is moved one octave toward the candidate, so the snap
/// never jumps further than a half octave. Near the ends of the MIDI range
/// the result is folded back inside 0-127, which is the only case where the
/// half-octave bound can be exceeded. An empty set returns the candidate.
pub fn nearest_pitch_class(candidate: u8, classes: &PitchClassSet) -> u8 {
    let pitch = candidate.min(MAX_PITCH) as i32;
    let class = pitch % 12;
    let octave_base = pitch - class;

    let Some(best) = classes
        .iter()
        .min_by_key(|&pc| ((pc as i32 - class).abs(), pc))
    else {
        return candidate;
    };

    let mut snapped = octave_base + best as i32;
    if snapped - pitch > 6 {
        snapped -= 12;
    } else if pitch - snapped > 6 {
        snapped += 12;
    }

    if snapped < 0 {
        snapped += 12;
    } else if snapped > MAX_PITCH as i32 {
        snapped -= 12;
    }
    snapped as u8
}

/// A key: root pitch class plus mode. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleModel {
    root: u8,
    mode: Mode,
}

impl Default for ScaleModel {
    fn default() -> Self {
        Self::new(0, Mode::Major)
    }
}

/// Outcome of building a scale from names, recording whether the requested
/// mode was unknown and major was used instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleResolution {
    pub model: ScaleModel,
    pub requested_mode: String,
    pub fell_back: bool,
}

impl ScaleModel {
    /// Creates a scale from a root pitch class (wrapped modulo 12) and mode.
    pub fn new(root: u8, mode: Mode) -> Self {
        Self {
            root: root % 12,
            mode,
        }
    }

    /// Builds a scale from a note name ("C", "F#", "Bb") and mode name.
    ///
    /// Unknown mode names fall back to major; the returned resolution says so.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the root note name is not recognised.
    pub fn from_names(root: &str, mode: &str) -> Result<ScaleResolution> {
        let root_pc = super::parse_pitch_class(root).ok_or_else(|| {
            MelodyError::validation("rootNote", format!("unknown note name '{}'", root))
        })?;
        let (resolved, fell_back) = match Mode::parse(mode) {
            Some(m) => (m, false),
            None => {
                tracing::warn!("Unknown scale mode '{}', falling back to major", mode);
                (Mode::Major, true)
            }
        };
        Ok(ScaleResolution {
            model: Self::new(root_pc, resolved),
            requested_mode: mode.to_string(),
            fell_back,
        })
    }

    pub fn root(&self) -> u8 {
        self.root
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Pitch classes belonging to this key.
    pub fn pitch_classes(&self) -> PitchClassSet {
        pitch_classes(self.root, self.mode)
    }

    /// Number of degrees per octave.
    pub fn degree_count(&self) -> usize {
        self.mode.intervals().len()
    }

    /// Whether `pitch` belongs to the key.
    pub fn contains(&self, pitch: u8) -> bool {
        self.pitch_classes().contains(pitch % 12)
    }

    /// Snaps a pitch to the nearest in-key pitch.
    pub fn snap(&self, pitch: u8) -> u8 {
        nearest_pitch_class(pitch, &self.pitch_classes())
    }

    /// Moves `pitch` by `steps` scale degrees, wrapping octaves as the step
    /// count passes the number of degrees. Out-of-key pitches are snapped
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`MelodyError::RangeOverflow`] (tagged with `index`) if the
    /// result leaves 0-127.
    pub fn step(&self, pitch: u8, steps: i32, index: usize) -> Result<u8> {
        let snapped = self.snap(pitch) as i32;
        let intervals = self.mode.intervals();
        let count = intervals.len() as i32;

        let relative = (snapped - self.root as i32).rem_euclid(12);
        let base = snapped - relative;
        let degree = intervals
            .iter()
            .position(|&i| i as i32 == relative)
            .unwrap_or(0) as i32;

        let target = degree + steps;
        let octaves = target.div_euclid(count);
        let target_degree = target.rem_euclid(count) as usize;
        checked_pitch(base + octaves * 12 + intervals[target_degree] as i32, index)
    }
}
