//! Standard MIDI File (SMF) encoding.
//!
//! Turns event sequences (seconds) into a container byte stream. All
//! second-to-tick conversion happens here at the boundary; the core
//! algorithms never see beat ticks.
//!
//! # Format Details
//!
//! Encodes SMF Format 1 (multi-track) with:
//! - Track 0: Tempo and time signature meta events
//! - Tracks 1-N: One note track per input sequence

use super::{seconds_to_ticks, EventSequence, DEFAULT_TEMPO, TICKS_PER_BEAT};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Container-level settings for an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Tempo in beats per minute.
    pub tempo: u32,
    /// Time signature numerator (beats per measure).
    pub time_sig_numerator: u8,
    /// Time signature denominator (beat unit).
    pub time_sig_denominator: u8,
    /// Name written into the tempo track.
    pub name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            time_sig_numerator: 4,
            time_sig_denominator: 4,
            name: "gesture-edit".to_string(),
        }
    }
}

/// Writes a variable-length quantity (VLQ) used for delta times in MIDI.
///
/// VLQ encodes values using 7 bits per byte, with the MSB indicating
/// whether more bytes follow (1 = more bytes, 0 = last byte).
fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    if value == 0 {
        buffer.push(0);
        return;
    }

    let mut temp = value;
    let mut bytes = Vec::with_capacity(4);

    while temp > 0 {
        bytes.push((temp & 0x7F) as u8);
        temp >>= 7;
    }

    // Write bytes in reverse order with continuation bits
    for (i, &byte) in bytes.iter().rev().enumerate() {
        if i < bytes.len() - 1 {
            buffer.push(byte | 0x80);
        } else {
            buffer.push(byte);
        }
    }
}

/// Container events written by the encoder.
enum ContainerEvent {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    /// Set tempo: microseconds per quarter note
    SetTempo { microseconds_per_beat: u32 },
    TimeSignature { numerator: u8, denominator_power: u8 },
    TrackName { name: String },
    EndOfTrack,
}

/// A container event at an absolute tick.
struct TimedEvent {
    tick: u32,
    event: ContainerEvent,
    /// Orders events sharing a tick (lower = first). Equal priorities keep
    /// insertion order.
    priority: u8,
}

impl TimedEvent {
    fn new(tick: u32, event: ContainerEvent, priority: u8) -> Self {
        Self {
            tick,
            event,
            priority,
        }
    }
}

/// Writes a single event to the buffer (without delta time).
fn write_event(event: &ContainerEvent, buffer: &mut Vec<u8>) {
    match event {
        ContainerEvent::NoteOn {
            channel,
            pitch,
            velocity,
        } => {
            buffer.push(0x90 | (channel & 0x0F));
            buffer.push(*pitch);
            buffer.push(*velocity);
        }
        ContainerEvent::NoteOff { channel, pitch } => {
            buffer.push(0x80 | (channel & 0x0F));
            buffer.push(*pitch);
            buffer.push(0);
        }
        ContainerEvent::SetTempo {
            microseconds_per_beat,
        } => {
            // Meta event: FF 51 03 tt tt tt
            buffer.extend_from_slice(&[0xFF, 0x51, 0x03]);
            buffer.push((microseconds_per_beat >> 16) as u8);
            buffer.push((microseconds_per_beat >> 8) as u8);
            buffer.push(*microseconds_per_beat as u8);
        }
        ContainerEvent::TimeSignature {
            numerator,
            denominator_power,
        } => {
            // Meta event: FF 58 04 nn dd cc bb
            buffer.extend_from_slice(&[0xFF, 0x58, 0x04]);
            buffer.push(*numerator);
            buffer.push(*denominator_power);
            buffer.push(24); // Clocks per click
            buffer.push(8); // 32nd notes per quarter
        }
        ContainerEvent::TrackName { name } => {
            buffer.extend_from_slice(&[0xFF, 0x03]);
            let name_bytes = name.as_bytes();
            write_vlq(name_bytes.len() as u32, buffer);
            buffer.extend_from_slice(name_bytes);
        }
        ContainerEvent::EndOfTrack => {
            buffer.extend_from_slice(&[0xFF, 0x2F, 0x00]);
        }
    }
}

/// Builds the track chunk data from a list of timed events.
///
/// Events are sorted by tick position and converted to delta times.
fn build_track_data(events: &mut [TimedEvent]) -> Vec<u8> {
    let mut buffer = Vec::new();
    events.sort_by(|a, b| a.tick.cmp(&b.tick).then(a.priority.cmp(&b.priority)));

    let mut last_tick = 0u32;
    for timed_event in events.iter() {
        let delta = timed_event.tick.saturating_sub(last_tick);
        write_vlq(delta, &mut buffer);
        write_event(&timed_event.event, &mut buffer);
        last_tick = timed_event.tick;
    }

    buffer
}

fn write_track_chunk(out: &mut Vec<u8>, track_data: &[u8]) {
    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
    out.extend_from_slice(track_data);
}

/// Calculates the power of 2 for a time signature denominator.
///
/// E.g., 4 -> 2 (2^2 = 4), 8 -> 3 (2^3 = 8)
fn denominator_to_power(denom: u8) -> u8 {
    match denom {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        16 => 4,
        32 => 5,
        _ => 2, // Default to quarter note
    }
}

/// MIDI channel for the n-th note track, skipping the drum channel.
fn channel_for_track(index: usize) -> u8 {
    let channel = (index % 15) as u8;
    if channel >= 9 {
        channel + 1
    } else {
        channel
    }
}

/// Encodes named sequences into one Format 1 container.
///
/// Each sequence becomes its own note track, in the order given.
pub fn encode_tracks(tracks: &[(&str, &EventSequence)], options: &ExportOptions) -> Vec<u8> {
    let tempo = options.tempo.max(1);
    let mut out = Vec::new();

    let num_tracks = 1 + tracks.len() as u16;
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes()); // Header length (always 6)
    out.extend_from_slice(&1u16.to_be_bytes()); // Format 1 (multi-track)
    out.extend_from_slice(&num_tracks.to_be_bytes());
    out.extend_from_slice(&(TICKS_PER_BEAT as u16).to_be_bytes());

    let end_tick = tracks
        .iter()
        .map(|(_, seq)| seconds_to_ticks(seq.end(), tempo))
        .max()
        .unwrap_or(0);

    // Track 0: Tempo and time signature
    let mut events = vec![
        TimedEvent::new(
            0,
            ContainerEvent::TrackName {
                name: options.name.clone(),
            },
            0,
        ),
        TimedEvent::new(
            0,
            ContainerEvent::TimeSignature {
                numerator: options.time_sig_numerator,
                denominator_power: denominator_to_power(options.time_sig_denominator),
            },
            1,
        ),
        TimedEvent::new(
            0,
            ContainerEvent::SetTempo {
                microseconds_per_beat: 60_000_000 / tempo,
            },
            2,
        ),
        TimedEvent::new(end_tick, ContainerEvent::EndOfTrack, 255),
    ];
    write_track_chunk(&mut out, &build_track_data(&mut events));

    for (index, (name, sequence)) in tracks.iter().enumerate() {
        let channel = channel_for_track(index);
        let mut events = vec![TimedEvent::new(
            0,
            ContainerEvent::TrackName {
                name: name.to_string(),
            },
            0,
        )];

        for note in sequence.iter() {
            let start = seconds_to_ticks(note.onset(), tempo);
            // Zero-length notes would be dropped by most readers
            let end = seconds_to_ticks(note.end(), tempo).max(start + 1);
            events.push(TimedEvent::new(
                start,
                ContainerEvent::NoteOn {
                    channel,
                    pitch: note.pitch(),
                    velocity: note.midi_velocity().max(1),
                },
                11,
            ));
            // Note offs ahead of note ons at the same tick so repeated
            // pitches retrigger cleanly
            events.push(TimedEvent::new(
                end,
                ContainerEvent::NoteOff {
                    channel,
                    pitch: note.pitch(),
                },
                10,
            ));
        }

        let track_end = seconds_to_ticks(sequence.end(), tempo).max(1);
        events.push(TimedEvent::new(track_end, ContainerEvent::EndOfTrack, 255));
        write_track_chunk(&mut out, &build_track_data(&mut events));
    }

    out
}

/// Encodes a single sequence into container bytes.
///
/// # Examples
///
/// ```
/// use gesture_edit::midi::{encode_events, EventSequence, ExportOptions, MelodicEvent};
///
/// let seq = EventSequence::from_events(vec![MelodicEvent::new(60, 0.0, 0.5, 0.8).unwrap()]);
/// let bytes = encode_events(&seq, &ExportOptions::default());
/// assert_eq!(&bytes[..4], b"MThd");
/// ```
pub fn encode_events(sequence: &EventSequence, options: &ExportOptions) -> Vec<u8> {
    encode_tracks(&[("Melody", sequence)], options)
}

/// Encodes a sequence and writes it to a .mid file.
///
/// # Errors
///
/// Returns error if file creation or writing fails
pub fn export_to_midi<P: AsRef<Path>>(
    sequence: &EventSequence,
    options: &ExportOptions,
    path: P,
) -> std::io::Result<()> {
    let bytes = encode_events(sequence, options);
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;
    tracing::info!(
        "Exported {} notes to {}",
        sequence.len(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MelodicEvent;

    #[test]
    fn test_vlq_encoding() {
        let mut buffer = Vec::new();

        write_vlq(0, &mut buffer);
        assert_eq!(buffer, vec![0x00]);
        buffer.clear();

        write_vlq(127, &mut buffer);
        assert_eq!(buffer, vec![0x7F]);
        buffer.clear();

        write_vlq(128, &mut buffer);
        assert_eq!(buffer, vec![0x81, 0x00]);
        buffer.clear();

        write_vlq(0x3FFF, &mut buffer);
        assert_eq!(buffer, vec![0xFF, 0x7F]);
        buffer.clear();

        write_vlq(0x4000, &mut buffer);
        assert_eq!(buffer, vec![0x81, 0x80, 0x00]);
    }

    #[test]
    fn test_denominator_power() {
        assert_eq!(denominator_to_power(4), 2);
        assert_eq!(denominator_to_power(8), 3);
        assert_eq!(denominator_to_power(2), 1);
        assert_eq!(denominator_to_power(16), 4);
    }

    #[test]
    fn test_channels_skip_drums() {
        let channels: Vec<_> = (0..11).map(channel_for_track).collect();
        assert!(!channels.contains(&9));
        assert_eq!(channels[9], 10);
    }

    #[test]
    fn test_header_layout() {
        let seq = EventSequence::from_events(vec![MelodicEvent::new(60, 0.0, 0.5, 0.8).unwrap()]);
        let bytes = encode_events(&seq, &ExportOptions::default());
        assert_eq!(&bytes[0..4], b"MThd");
        // Format 1, two tracks, 480 ticks per beat
        assert_eq!(&bytes[8..10], &[0, 1]);
        assert_eq!(&bytes[10..12], &[0, 2]);
        assert_eq!(&bytes[12..14], &480u16.to_be_bytes());
        assert_eq!(&bytes[14..18], b"MTrk");
    }

    #[test]
    fn test_note_bytes() {
        let seq = EventSequence::from_events(vec![MelodicEvent::new(60, 0.0, 0.5, 1.0).unwrap()]);
        let bytes = encode_events(&seq, &ExportOptions::default());
        // A note on for C4 at full velocity appears in the stream
        assert!(bytes.windows(3).any(|w| w == [0x90, 60, 127]));
        // The matching note off lands one quarter later: delta 480 = 0x83 0x60
        assert!(bytes.windows(5).any(|w| w == [0x83, 0x60, 0x80, 60, 0]));
    }
}
