//! Standard MIDI File (SMF) decoding.
//!
//! Reads a container into a single [`EventSequence`] in seconds.
//! Supports SMF Format 0 (single track) and Format 1 (multi-track) files.
//!
//! # Limitations
//!
//! - Only note on/off events are imported as notes
//! - The first tempo event applies to the whole file
//! - Notes from all tracks and channels are merged into one sequence

use super::{EventSequence, MelodicEvent};
use crate::error::{MelodyError, Result};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Microseconds per quarter note at 120 BPM, used when no tempo is present.
const DEFAULT_MICROSECONDS_PER_BEAT: u32 = 500_000;

/// A note collected in ticks before the tempo is known.
struct TickNote {
    pitch: u8,
    velocity: u8,
    start_tick: u64,
    end_tick: u64,
}

/// Notes still sounding, keyed by (channel, pitch).
type ActiveNotes = BTreeMap<(u8, u8), (u64, u8)>;

/// Decodes container bytes into an onset-ordered sequence.
///
/// # Errors
///
/// Returns [`MelodyError::Container`] if the bytes are not a readable
/// Format 0/1 file with metrical timing.
pub fn decode_container(bytes: &[u8]) -> Result<EventSequence> {
    let smf = Smf::parse(bytes).map_err(|e| MelodyError::Container(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as u64,
        Timing::Timecode(_, _) => {
            return Err(MelodyError::Container(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };
    if ticks_per_beat == 0 {
        return Err(MelodyError::Container(
            "header declares zero ticks per beat".to_string(),
        ));
    }
    if smf.header.format == Format::Sequential {
        return Err(MelodyError::Container(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let mut microseconds_per_beat: Option<u32> = None;
    let mut notes = Vec::new();

    for track in &smf.tracks {
        let (track_notes, track_tempo) = parse_track(track, ticks_per_beat);
        if microseconds_per_beat.is_none() {
            microseconds_per_beat = track_tempo;
        }
        notes.extend(track_notes);
    }

    let usec = microseconds_per_beat.unwrap_or(DEFAULT_MICROSECONDS_PER_BEAT) as f64;
    let to_seconds = |ticks: u64| ticks as f64 * usec / ticks_per_beat as f64 / 1_000_000.0;

    let events = notes
        .iter()
        .map(|n| {
            MelodicEvent::new(
                n.pitch,
                to_seconds(n.start_tick),
                to_seconds(n.end_tick - n.start_tick),
                MelodicEvent::velocity_from_midi(n.velocity),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!("Decoded {} notes from container", events.len());
    Ok(EventSequence::from_events(events))
}

/// Parses one track into tick-based notes plus the first tempo it declares.
fn parse_track(track: &[midly::TrackEvent], ticks_per_beat: u64) -> (Vec<TickNote>, Option<u32>) {
    let mut active_notes: ActiveNotes = BTreeMap::new();
    let mut notes = Vec::new();
    let mut tempo: Option<u32> = None;
    let mut current_tick: u64 = 0;

    for event in track {
        current_tick += event.delta.as_int() as u64;

        match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(value)) => {
                if tempo.is_none() && value.as_int() > 0 {
                    tempo = Some(value.as_int());
                }
            }
            TrackEventKind::Midi { channel, message } => {
                let ch = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        let pitch = key.as_int();
                        // Retriggering a sounding pitch ends the previous note
                        close_note(&mut notes, (ch, pitch), current_tick, &mut active_notes);
                        active_notes.insert((ch, pitch), (current_tick, vel.as_int()));
                    }
                    // Note on with velocity 0 = note off
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        close_note(&mut notes, (ch, key.as_int()), current_tick, &mut active_notes);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // Close any remaining active notes with a one beat duration
    for ((_, pitch), (start_tick, velocity)) in active_notes {
        notes.push(TickNote {
            pitch,
            velocity,
            start_tick,
            end_tick: start_tick + ticks_per_beat,
        });
    }

    notes.sort_by_key(|n| n.start_tick);
    (notes, tempo)
}

/// Ends the sounding note under `key`, if any, at `tick`.
fn close_note(notes: &mut Vec<TickNote>, key: (u8, u8), tick: u64, active: &mut ActiveNotes) {
    if let Some((start_tick, velocity)) = active.remove(&key) {
        notes.push(TickNote {
            pitch: key.1,
            velocity,
            start_tick,
            end_tick: tick.max(start_tick + 1),
        });
    }
}

/// Reads a .mid file from disk and decodes it.
///
/// # Errors
///
/// Returns error if the file cannot be read or decoded
pub fn import_from_midi<P: AsRef<Path>>(path: P) -> Result<EventSequence> {
    let data = fs::read(path.as_ref())?;
    let sequence = decode_container(&data)?;
    tracing::info!(
        "Imported {} notes from {}",
        sequence.len(),
        path.as_ref().display()
    );
    Ok(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{encode_events, ExportOptions};

    #[test]
    fn test_decode_encoded_melody() {
        let seq = EventSequence::from_events(vec![
            MelodicEvent::new(60, 0.0, 0.5, 1.0).unwrap(),
            MelodicEvent::new(64, 0.5, 0.25, 0.5).unwrap(),
            MelodicEvent::new(67, 1.0, 1.0, 0.8).unwrap(),
        ]);
        let bytes = encode_events(&seq, &ExportOptions::default());
        let decoded = decode_container(&bytes).unwrap();

        assert_eq!(decoded.len(), 3);
        for (a, b) in decoded.iter().zip(seq.iter()) {
            assert_eq!(a.pitch(), b.pitch());
            assert!((a.onset() - b.onset()).abs() < 1e-3);
            assert!((a.duration() - b.duration()).abs() < 1e-3);
            assert!((a.velocity() - b.velocity()).abs() < 0.01);
        }
    }

    #[test]
    fn test_decode_respects_tempo() {
        let seq = EventSequence::from_events(vec![MelodicEvent::new(60, 1.0, 1.0, 1.0).unwrap()]);
        let options = ExportOptions {
            tempo: 60,
            ..ExportOptions::default()
        };
        let decoded = decode_container(&encode_events(&seq, &options)).unwrap();
        assert!((decoded.events()[0].onset() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            decode_container(b"not a midi file"),
            Err(MelodyError::Container(_))
        ));
    }
}
