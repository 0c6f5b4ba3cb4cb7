//! Ordered collections of melodic events.
//!
//! Every component accepts an [`EventSequence`] and returns one sorted by
//! onset. Sorting is stable, so events sharing an onset keep their insertion
//! order.

use super::note::{MelodicEvent, WireNote};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// An onset-ordered list of melodic events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<MelodicEvent>", into = "Vec<MelodicEvent>")]
pub struct EventSequence {
    events: Vec<MelodicEvent>,
}

impl EventSequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sequence from events in any order, sorting them by onset.
    pub fn from_events(mut events: Vec<MelodicEvent>) -> Self {
        // sort_by is stable: ties keep insertion order
        events.sort_by(|a, b| a.onset().total_cmp(&b.onset()));
        Self { events }
    }

    /// Builds a sequence that keeps the given order untouched.
    ///
    /// Used by generators whose documented output order is not onset order.
    pub(crate) fn from_ordered(events: Vec<MelodicEvent>) -> Self {
        Self { events }
    }

    /// Validates wire notes and builds a sorted sequence.
    ///
    /// # Errors
    ///
    /// Returns the first note that fails validation, with its index.
    pub fn from_wire(notes: &[WireNote]) -> Result<Self> {
        let events = notes
            .iter()
            .enumerate()
            .map(|(i, n)| n.to_event(i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_events(events))
    }

    /// Converts to the JSON wire shape.
    pub fn to_wire(&self) -> Vec<WireNote> {
        self.events.iter().map(WireNote::from).collect()
    }

    /// Returns a copy re-sorted by onset.
    pub fn sorted(&self) -> Self {
        Self::from_events(self.events.clone())
    }

    /// Returns all events.
    pub fn events(&self) -> &[MelodicEvent] {
        &self.events
    }

    /// Iterates over events in order.
    pub fn iter(&self) -> std::slice::Iter<'_, MelodicEvent> {
        self.events.iter()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the sequence has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Earliest onset, or None when empty.
    pub fn start(&self) -> Option<f64> {
        self.events.iter().map(|e| e.onset()).min_by(f64::total_cmp)
    }

    /// Latest end time (onset + duration), 0.0 when empty.
    pub fn end(&self) -> f64 {
        self.events
            .iter()
            .map(|e| e.end())
            .max_by(f64::total_cmp)
            .unwrap_or(0.0)
    }

    /// Lowest and highest pitch, or None when empty.
    pub fn pitch_range(&self) -> Option<(u8, u8)> {
        let low = self.events.iter().map(|e| e.pitch()).min()?;
        let high = self.events.iter().map(|e| e.pitch()).max()?;
        Some((low, high))
    }

    /// Mean pitch as a real number, or None when empty.
    pub fn mean_pitch(&self) -> Option<f64> {
        if self.events.is_empty() {
            return None;
        }
        let sum: f64 = self.events.iter().map(|e| e.pitch() as f64).sum();
        Some(sum / self.events.len() as f64)
    }

    /// Concatenates another sequence and re-sorts.
    pub fn merged(&self, other: &EventSequence) -> Self {
        let mut events = self.events.clone();
        events.extend_from_slice(&other.events);
        Self::from_events(events)
    }
}

impl From<Vec<MelodicEvent>> for EventSequence {
    fn from(events: Vec<MelodicEvent>) -> Self {
        Self::from_events(events)
    }
}

impl From<EventSequence> for Vec<MelodicEvent> {
    fn from(sequence: EventSequence) -> Self {
        sequence.events
    }
}

impl<'a> IntoIterator for &'a EventSequence {
    type Item = &'a MelodicEvent;
    type IntoIter = std::slice::Iter<'a, MelodicEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
