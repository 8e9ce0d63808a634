//! Canonical MIDI instruction type shared by generators, effects and the file writer

use serde::{Deserialize, Serialize};

/// Pitch bend center in the signed representation
pub const PITCH_BEND_CENTER: i16 = 0;
pub const PITCH_BEND_MIN: i16 = -8192;
pub const PITCH_BEND_MAX: i16 = 8191;

/// One absolute-tick MIDI message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MidiInstruction {
    NoteOn { tick: u32, note: u8, velocity: u8, channel: u8 },
    NoteOff { tick: u32, note: u8, velocity: u8, channel: u8 },
    /// `value` is signed, [-8192, 8191]
    PitchBend { tick: u32, value: i16, channel: u8 },
    ControlChange { tick: u32, controller: u8, value: u8, channel: u8 },
}

impl MidiInstruction {
    pub fn tick(&self) -> u32 {
        match *self {
            Self::NoteOn { tick, .. }
            | Self::NoteOff { tick, .. }
            | Self::PitchBend { tick, .. }
            | Self::ControlChange { tick, .. } => tick,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::PitchBend { channel, .. }
            | Self::ControlChange { channel, .. } => channel,
        }
    }

    /// Order among instructions sharing a tick: controllers, bends, offs, then ons
    pub fn same_tick_priority(&self) -> u8 {
        match self {
            Self::ControlChange { .. } => 0,
            Self::PitchBend { .. } => 1,
            Self::NoteOff { .. } => 2,
            Self::NoteOn { .. } => 3,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, Self::NoteOn { .. })
    }

    pub fn note(&self) -> Option<u8> {
        match *self {
            Self::NoteOn { note, .. } | Self::NoteOff { note, .. } => Some(note),
            _ => None,
        }
    }
}

/// Note on/off pair for a sounding note
pub fn note_pair(note: u8, velocity: u8, channel: u8, start: u32, duration: u32) -> [MidiInstruction; 2] {
    [
        MidiInstruction::NoteOn { tick: start, note, velocity, channel },
        MidiInstruction::NoteOff { tick: start + duration, note, velocity: 0, channel },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let bend = MidiInstruction::PitchBend { tick: 12, value: -40, channel: 3 };
        assert_eq!(bend.tick(), 12);
        assert_eq!(bend.channel(), 3);
        assert_eq!(bend.note(), None);

        let [on, off] = note_pair(60, 90, 0, 480, 120);
        assert!(on.is_note_on());
        assert_eq!(off.tick(), 600);
        assert_eq!(off.note(), Some(60));
        assert!(off.same_tick_priority() < on.same_tick_priority());
    }

    #[test]
    fn test_json_shape() {
        let cc = MidiInstruction::ControlChange { tick: 0, controller: 101, value: 0, channel: 0 };
        let json = serde_json::to_string(&cc).unwrap();
        assert!(json.contains("\"type\":\"control_change\""));
        let back: MidiInstruction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cc);
    }
}
