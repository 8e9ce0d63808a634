//! Note-name parsing ("E4", "C#3", "Bb2")

use crate::error::{MidigenError, Result};

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Convert a note name like `E4` to a MIDI number (C4 = 60)
pub fn note_name_to_midi(name: &str) -> Result<u8> {
    let invalid = || MidigenError::InvalidNoteName(name.to_string());
    let trimmed = name.trim();
    let mut chars = trimmed.chars();

    let letter = chars.next().ok_or_else(invalid)?;
    let natural: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(invalid()),
    };

    let rest = chars.as_str();
    let (accidental, octave_str) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i32 = octave_str.parse().map_err(|_| invalid())?;

    let midi = (octave + 1) * 12 + natural + accidental;
    u8::try_from(midi).ok().filter(|&n| n <= 127).ok_or_else(invalid)
}

/// Convert a MIDI number to a sharp-spelled note name
pub fn midi_to_note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}
