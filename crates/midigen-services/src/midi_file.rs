//! Standard MIDI File writer
//!
//! Single track (format 0), 480 PPQ, tempo meta event first, end-of-track last.
//! Pitch bends are signed internally and shifted to the unsigned 14-bit wire value here.

use std::fs;
use std::path::Path;

use midigen_core::config::{MAX_BPM, MIN_BPM};
use midigen_core::{schedule, MidiInstruction, TimedInstruction, TICKS_PER_BEAT};
use midly::num::{u4, u7, u14, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, TrackEvent, TrackEventKind};
use tracing::info;

use crate::error::{Result, ServiceError};

/// Largest delta a track event can carry
const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Microseconds per quarter note
pub fn tempo_micros(bpm: u16) -> Result<u32> {
    if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
        return Err(ServiceError::InvalidTempo(bpm));
    }
    Ok(60_000_000 / u32::from(bpm))
}

/// Unsigned wire value for a signed bend
pub fn bend_to_wire(value: i16) -> u16 {
    (i32::from(value) + 8192).clamp(0, 16383) as u16
}

fn track_event(timed: &TimedInstruction) -> Result<TrackEvent<'static>> {
    if timed.delta > MAX_DELTA {
        return Err(ServiceError::TickOverflow(timed.delta));
    }
    let (channel, message) = match timed.instruction {
        MidiInstruction::NoteOn { note, velocity, channel, .. } => {
            (channel, MidiMessage::NoteOn { key: u7::from(note), vel: u7::from(velocity) })
        }
        MidiInstruction::NoteOff { note, velocity, channel, .. } => {
            (channel, MidiMessage::NoteOff { key: u7::from(note), vel: u7::from(velocity) })
        }
        MidiInstruction::PitchBend { value, channel, .. } => {
            (channel, MidiMessage::PitchBend { bend: PitchBend(u14::from(bend_to_wire(value))) })
        }
        MidiInstruction::ControlChange { controller, value, channel, .. } => (
            channel,
            MidiMessage::Controller { controller: u7::from(controller), value: u7::from(value) },
        ),
    };
    Ok(TrackEvent {
        delta: u28::from(timed.delta),
        kind: TrackEventKind::Midi { channel: u4::from(channel), message },
    })
}

/// Encode instructions (any order) as a complete SMF
pub fn smf_bytes(instructions: Vec<MidiInstruction>, bpm: u16) -> Result<Vec<u8>> {
    let timed = schedule(instructions);
    let mut track = Vec::with_capacity(timed.len() + 2);
    track.push(TrackEvent {
        delta: u28::from(0_u32),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo_micros(bpm)?))),
    });
    for event in &timed {
        track.push(track_event(event)?);
    }
    track.push(TrackEvent {
        delta: u28::from(0_u32),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let header = Header::new(Format::SingleTrack, Timing::Metrical(u15::from(TICKS_PER_BEAT as u16)));
    let smf = Smf { header, tracks: vec![track] };
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;
    Ok(bytes)
}

/// Encode and write to `path`, creating parent directories
pub fn write_midi_file(path: &Path, instructions: Vec<MidiInstruction>, bpm: u16) -> Result<()> {
    let count = instructions.len();
    let bytes = smf_bytes(instructions, bpm)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;
    info!(path = %path.display(), events = count, bytes = bytes.len(), "MIDI file written");
    Ok(())
}
