//! Scale and chord-tone engine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MidigenError;

/// The seven diatonic modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Self::Major,
        Self::Minor,
        Self::Dorian,
        Self::Phrygian,
        Self::Lydian,
        Self::Mixolydian,
        Self::Locrian,
    ];

    /// Full seven-note scale (semitones from root)
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Self::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::Locrian => &[0, 1, 3, 5, 6, 8, 10],
        }
    }

    /// Triad built on the mode's 1st, 3rd and 5th degrees
    pub fn chord_tones(&self) -> &'static [u8] {
        match self {
            Self::Major | Self::Lydian | Self::Mixolydian => &[0, 4, 7],
            Self::Minor | Self::Dorian | Self::Phrygian => &[0, 3, 7],
            Self::Locrian => &[0, 3, 6],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Dorian => "dorian",
            Self::Phrygian => "phrygian",
            Self::Lydian => "lydian",
            Self::Mixolydian => "mixolydian",
            Self::Locrian => "locrian",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = MidigenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or_else(|| MidigenError::UnknownMode(s.to_string()))
    }
}

/// Pitch classes of `mode` transposed to `root`, sorted ascending without duplicates.
///
/// `root` is any MIDI note; only its pitch class matters.
pub fn get_scale(root: u8, mode: Mode, use_chord_tones: bool) -> Vec<u8> {
    let intervals = if use_chord_tones { mode.chord_tones() } else { mode.intervals() };
    let root_pc = root % 12;
    let mut pcs: Vec<u8> = intervals.iter().map(|&i| (root_pc + i) % 12).collect();
    pcs.sort_unstable();
    pcs.dedup();
    pcs
}

/// Same as [`get_scale`] but resolves the mode by name
pub fn get_scale_by_name(root: u8, mode: &str, use_chord_tones: bool) -> crate::Result<Vec<u8>> {
    Ok(get_scale(root, mode.parse()?, use_chord_tones))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_major() {
        assert_eq!(get_scale(0, Mode::Major, false), vec![0, 2, 4, 5, 7, 9, 11]);
        assert_eq!(get_scale(0, Mode::Major, true), vec![0, 4, 7]);
    }

    #[test]
    fn test_transposed_and_sorted() {
        // A minor triad: A C E -> 9 0 4
        assert_eq!(get_scale(69, Mode::Minor, true), vec![0, 4, 9]);
        // B locrian triad: B D F
        assert_eq!(get_scale(11, Mode::Locrian, true), vec![2, 5, 11]);
    }

    #[test]
    fn test_every_mode_non_empty() {
        for mode in Mode::ALL {
            for root in 0..12 {
                assert_eq!(get_scale(root, mode, false).len(), 7);
                assert_eq!(get_scale(root, mode, true).len(), 3);
            }
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Dorian".parse::<Mode>().unwrap(), Mode::Dorian);
        assert!(matches!("aeolian".parse::<Mode>(), Err(MidigenError::UnknownMode(_))));
        assert!(get_scale_by_name(0, "ionian", true).is_err());
    }
}
