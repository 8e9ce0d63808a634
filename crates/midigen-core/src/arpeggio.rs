//! Arpeggio generator
//!
//! Produces a flat grid of 16th-note slots (`bars * 16` long). Each slot either
//! sounds a MIDI note or is a rest.

use std::fmt;
use std::str::FromStr;

use fastrand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MidigenError;
use crate::scale::{get_scale, Mode};
use crate::timing::{partition_bars, STEPS_PER_BAR};

/// Order in which the source notes are walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArpMode {
    Up,
    Down,
    UpDown,
    Random,
    Order,
}

impl ArpMode {
    pub const ALL: [ArpMode; 5] = [Self::Up, Self::Down, Self::UpDown, Self::Random, Self::Order];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::UpDown => "up_down",
            Self::Random => "random",
            Self::Order => "order",
        }
    }
}

impl fmt::Display for ArpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArpMode {
    type Err = MidigenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or_else(|| MidigenError::UnknownArpMode(s.to_string()))
    }
}

/// Everything the arpeggio generator needs, already validated
#[derive(Debug, Clone)]
pub struct ArpeggioParams {
    /// Root of each segment as a MIDI note
    pub root_notes: Vec<u8>,
    pub mode: Mode,
    pub min_octave: u8,
    pub bars: u32,
    pub use_chord_tones: bool,
    /// Notes per pattern cycle (4, 8 or 16)
    pub steps: u8,
    pub arp_mode: ArpMode,
    /// Extra octaves above `min_octave` to draw notes from
    pub range_octaves: u8,
    /// Per-position chance (0-1) of mutating the pattern in each bar
    pub evolution_rate: f64,
    /// 1 = most variation, 10 = pattern kept as built
    pub repetition_factor: u8,
    /// Tile short patterns as 16ths instead of stretching each note
    pub repeat_pattern: bool,
}

/// Generated arpeggio: one entry per 16th-note slot, `None` = rest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpeggioSequence {
    pub slots: Vec<Option<u8>>,
    /// How many slots a sounding note lasts
    pub slots_per_note: u32,
}

impl ArpeggioSequence {
    pub fn sounding_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots.iter().flatten().copied()
    }
}

/// Build the full arpeggio for every root-note segment
pub fn create_arpeggio(params: &ArpeggioParams, rng: &mut Rng) -> ArpeggioSequence {
    let total_slots = (params.bars * STEPS_PER_BAR) as usize;
    let steps = params.steps.clamp(1, STEPS_PER_BAR as u8) as usize;
    let tiled = params.repeat_pattern || steps == STEPS_PER_BAR as usize;
    let slots_per_note = if tiled { 1 } else { STEPS_PER_BAR / steps as u32 };

    if params.root_notes.is_empty() {
        warn!("Arpeggio requested without root notes, emitting {} bars of rests", params.bars);
    }

    let segments = partition_bars(params.bars, params.root_notes.len());
    let mut slots = Vec::with_capacity(total_slots);

    for (&root, &segment_bars) in params.root_notes.iter().zip(&segments) {
        if segment_bars == 0 {
            continue;
        }
        let source = source_notes(root, params);
        let base = build_pattern(&source, params.arp_mode, steps, rng);
        let base = apply_repetition(base, &source, params.repetition_factor, rng);
        debug!(root, segment_bars, ?source, ?base, "Arpeggio segment");

        for _ in 0..segment_bars {
            let bar_pattern = evolve(&base, &source, params.evolution_rate, rng);
            slots.extend(expand_to_bar(&bar_pattern, tiled));
        }
    }

    slots.resize(total_slots, None);
    ArpeggioSequence { slots, slots_per_note }
}

/// Pitch classes of the segment spread over `min_octave ..= min_octave + range_octaves`
fn source_notes(root: u8, params: &ArpeggioParams) -> Vec<u8> {
    let pcs = get_scale(root, params.mode, params.use_chord_tones);
    let low = params.min_octave as u16;
    let high = low + params.range_octaves as u16;

    let notes: Vec<u8> = (low..=high)
        .flat_map(|octave| pcs.iter().map(move |&pc| pc as u16 + octave * 12))
        .filter(|&n| n <= 127)
        .map(|n| n as u8)
        .collect();

    if notes.is_empty() {
        let fallback = (root as u16 % 12 + low * 12).min(127) as u8;
        warn!(root, fallback, "No source notes in range, using the root alone");
        return vec![fallback];
    }
    notes
}

fn tile(notes: &[u8], steps: usize) -> Vec<u8> {
    notes.iter().copied().cycle().take(steps).collect()
}

fn build_pattern(source: &[u8], mode: ArpMode, steps: usize, rng: &mut Rng) -> Vec<u8> {
    match mode {
        ArpMode::Up => tile(source, steps),
        ArpMode::Down => {
            let reversed: Vec<u8> = source.iter().rev().copied().collect();
            tile(&reversed, steps)
        }
        ArpMode::UpDown => {
            // Each half cycles its own direction, so the turnaround never doubles a note
            let up_len = steps / 2;
            let mut pattern = tile(source, up_len);
            let reversed: Vec<u8> = source.iter().rev().copied().collect();
            pattern.extend(tile(&reversed, steps - up_len));
            pattern
        }
        ArpMode::Random => (0..steps).map(|_| source[rng.usize(..source.len())]).collect(),
        ArpMode::Order => {
            let mut shuffled = source.to_vec();
            rng.shuffle(&mut shuffled);
            tile(&shuffled, steps)
        }
    }
}

/// Replace each position with probability `1 - factor / 10`
fn apply_repetition(mut pattern: Vec<u8>, source: &[u8], factor: u8, rng: &mut Rng) -> Vec<u8> {
    if factor >= 10 {
        return pattern;
    }
    let keep = factor as f64 / 10.0;
    for note in &mut pattern {
        if rng.f64() > keep {
            *note = source[rng.usize(..source.len())];
        }
    }
    pattern
}

/// Nudge notes to a scale neighbour or a fresh pick, returning a new pattern
fn evolve(pattern: &[u8], source: &[u8], rate: f64, rng: &mut Rng) -> Vec<u8> {
    if rate <= 0.0 {
        return pattern.to_vec();
    }
    pattern
        .iter()
        .map(|&note| {
            if rng.f64() >= rate {
                return note;
            }
            let neighbour = source.iter().position(|&n| n == note).filter(|_| rng.bool());
            match neighbour {
                Some(idx) => {
                    let len = source.len();
                    let next = if rng.bool() { (idx + 1) % len } else { (idx + len - 1) % len };
                    source[next]
                }
                None => source[rng.usize(..source.len())],
            }
        })
        .collect()
}

/// Lay one pattern cycle over the 16 slots of a bar
fn expand_to_bar(pattern: &[u8], tiled: bool) -> Vec<Option<u8>> {
    let bar = STEPS_PER_BAR as usize;
    if pattern.is_empty() {
        return vec![None; bar];
    }
    if tiled {
        return pattern.iter().copied().cycle().take(bar).map(Some).collect();
    }
    let slots_per_note = (bar / pattern.len()).max(1);
    let mut slots = Vec::with_capacity(bar);
    for &note in pattern {
        slots.push(Some(note));
        slots.extend(std::iter::repeat_n(None, slots_per_note - 1));
    }
    slots.resize(bar, None);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ArpeggioParams {
        ArpeggioParams {
            root_notes: vec![60],
            mode: Mode::Major,
            min_octave: 4,
            bars: 1,
            use_chord_tones: true,
            steps: 4,
            arp_mode: ArpMode::Up,
            range_octaves: 1,
            evolution_rate: 0.0,
            repetition_factor: 10,
            repeat_pattern: false,
        }
    }

    #[test]
    fn test_quarter_note_triad_scenario() {
        let seq = create_arpeggio(&params(), &mut Rng::with_seed(1));
        let (c, e, g) = (48, 52, 55);
        let expected = vec![
            Some(c), None, None, None,
            Some(e), None, None, None,
            Some(g), None, None, None,
            Some(c + 12), None, None, None,
        ];
        assert_eq!(seq.slots, expected);
        assert_eq!(seq.slots_per_note, 4);
    }

    #[test]
    fn test_length_invariant() {
        let mut rng = Rng::with_seed(7);
        for bars in [1, 3, 7, 16] {
            for steps in [4, 8, 16] {
                for arp_mode in ArpMode::ALL {
                    for repeat_pattern in [false, true] {
                        let p = ArpeggioParams {
                            root_notes: vec![64, 69, 62, 67],
                            bars,
                            steps,
                            arp_mode,
                            repeat_pattern,
                            evolution_rate: 0.35,
                            repetition_factor: 5,
                            ..params()
                        };
                        let seq = create_arpeggio(&p, &mut rng);
                        assert_eq!(seq.slots.len(), (bars * 16) as usize);
                        assert!(seq.sounding_notes().all(|n| n <= 127));
                    }
                }
            }
        }
    }

    #[test]
    fn test_deterministic_under_seed() {
        let p = ArpeggioParams {
            arp_mode: ArpMode::Random,
            bars: 8,
            evolution_rate: 0.5,
            repetition_factor: 3,
            ..params()
        };
        let a = create_arpeggio(&p, &mut Rng::with_seed(42));
        let b = create_arpeggio(&p, &mut Rng::with_seed(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_up_down_has_exact_length_without_repeated_turnaround() {
        let source = vec![48, 52, 55, 60, 64, 67];
        let pattern = build_pattern(&source, ArpMode::UpDown, 8, &mut Rng::with_seed(0));
        assert_eq!(pattern, vec![48, 52, 55, 60, 67, 64, 60, 55]);
    }

    #[test]
    fn test_down_and_order() {
        let source = vec![48, 52, 55];
        let down = build_pattern(&source, ArpMode::Down, 4, &mut Rng::with_seed(0));
        assert_eq!(down, vec![55, 52, 48, 55]);

        let mut order = build_pattern(&source, ArpMode::Order, 3, &mut Rng::with_seed(9));
        order.sort_unstable();
        assert_eq!(order, source);
    }

    #[test]
    fn test_tiled_sixteenths() {
        let p = ArpeggioParams { steps: 4, repeat_pattern: true, ..params() };
        let seq = create_arpeggio(&p, &mut Rng::with_seed(3));
        assert_eq!(seq.slots_per_note, 1);
        assert!(seq.slots.iter().all(Option::is_some));
        assert_eq!(seq.slots[0], seq.slots[4]);
    }

    #[test]
    fn test_full_repetition_keeps_every_bar_identical() {
        let p = ArpeggioParams { bars: 4, steps: 8, ..params() };
        let seq = create_arpeggio(&p, &mut Rng::with_seed(11));
        let first_bar = &seq.slots[..16];
        for bar in seq.slots.chunks(16) {
            assert_eq!(bar, first_bar);
        }
    }

    #[test]
    fn test_notes_come_from_scale() {
        let p = ArpeggioParams {
            bars: 6,
            arp_mode: ArpMode::Random,
            evolution_rate: 1.0,
            repetition_factor: 1,
            use_chord_tones: false,
            ..params()
        };
        let scale = get_scale(60, Mode::Major, false);
        let seq = create_arpeggio(&p, &mut Rng::with_seed(5));
        assert!(seq.sounding_notes().all(|n| scale.contains(&(n % 12))));
        assert!(seq.sounding_notes().all(|n| (48..72).contains(&n)));
    }

    #[test]
    fn test_out_of_range_octaves_fall_back_to_root() {
        let p = ArpeggioParams { min_octave: 11, range_octaves: 1, ..params() };
        let seq = create_arpeggio(&p, &mut Rng::with_seed(2));
        assert!(seq.sounding_notes().all(|n| n == 127));
    }
}
