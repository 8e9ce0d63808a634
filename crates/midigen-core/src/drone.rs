//! Drone generator
//!
//! Sustained chord voicings that rotate every variation interval, with optional
//! octave shifts, octave doublings and diatonic walkdowns into the doubled note.

use fastrand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::scale::{get_scale, Mode};
use crate::timing::{partition_bars, TICKS_PER_BAR};

/// Velocity drop applied to walkdown notes
const WALKDOWN_VELOCITY_DROP: u8 = 15;
/// Root used when no root notes are given (C3)
const FALLBACK_ROOT: u8 = 48;

/// A single sustained note in the drone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneEvent {
    pub note: u8,
    pub start_tick: u32,
    pub duration_ticks: u32,
    pub velocity: u8,
}

impl DroneEvent {
    pub fn new(note: u8, start_tick: u32, duration_ticks: u32, velocity: u8) -> Self {
        Self { note, start_tick, duration_ticks, velocity }
    }

    pub fn end_tick(&self) -> u32 {
        self.start_tick.saturating_add(self.duration_ticks)
    }
}

/// Everything the drone generator needs, already validated
#[derive(Debug, Clone)]
pub struct DroneParams {
    pub root_notes: Vec<u8>,
    pub mode: Mode,
    pub min_octave: u8,
    pub max_octave: u8,
    pub bars: u32,
    pub base_velocity: u8,
    pub variation_interval_bars: u32,
    pub min_notes_held: usize,
    pub octave_doubling_chance: f64,
    pub allow_octave_shifts: bool,
    pub octave_shift_chance: f64,
    pub enable_walkdowns: bool,
    pub walkdown_num_steps: u32,
    pub walkdown_step_ticks: u32,
    /// Shortest sustain left for the target once a walkdown has played
    pub min_target_sustain_ticks: u32,
}

/// Generate all drone events for every root-note segment
pub fn generate_drone_events(params: &DroneParams, rng: &mut Rng) -> Vec<DroneEvent> {
    if params.root_notes.is_empty() {
        return fallback_chord(params);
    }

    let mut events = Vec::new();
    let mut segment_start = 0u32;
    let segments = partition_bars(params.bars, params.root_notes.len());

    for (&root, &segment_bars) in params.root_notes.iter().zip(&segments) {
        if segment_bars == 0 {
            continue;
        }
        let segment_ticks = segment_bars.saturating_mul(TICKS_PER_BAR);
        let segment = Segment::new(root, params);
        debug!(root, segment_bars, chord = ?segment.chord, "Drone segment");

        let interval_ticks = params.variation_interval_bars.max(1).saturating_mul(TICKS_PER_BAR);
        let mut offset = 0u32;
        let mut interval_index = 0usize;
        while offset < segment_ticks {
            let length = interval_ticks.min(segment_ticks - offset);
            segment.emit_interval(
                &mut events,
                interval_index,
                segment_start.saturating_add(offset),
                length,
                params,
                rng,
            );
            offset += length;
            interval_index += 1;
        }
        segment_start = segment_start.saturating_add(segment_ticks);
    }
    events
}

/// C3 major triad held for the whole piece
fn fallback_chord(params: &DroneParams) -> Vec<DroneEvent> {
    warn!("No root notes for drone, falling back to a sustained C major triad");
    let total_ticks = params.bars.saturating_mul(TICKS_PER_BAR);
    get_scale(FALLBACK_ROOT, Mode::Major, true)
        .into_iter()
        .map(|pc| clamp_note(pc as i32 + params.min_octave as i32 * 12))
        .map(|note| DroneEvent::new(note, 0, total_ticks, params.base_velocity))
        .collect()
}

fn clamp_note(note: i32) -> u8 {
    note.clamp(0, 127) as u8
}

/// Per-root precomputed note pools
struct Segment {
    /// Triad in `min_octave`, ascending
    chord: Vec<u8>,
    /// Full scale over the octaves around the drone range, ascending
    diatonic: Vec<u8>,
}

impl Segment {
    fn new(root: u8, params: &DroneParams) -> Self {
        let octave_base = params.min_octave as i32 * 12;
        let mut chord: Vec<u8> = get_scale(root, params.mode, true)
            .into_iter()
            .map(|pc| clamp_note(pc as i32 + octave_base))
            .collect();
        chord.sort_unstable();
        chord.dedup();
        if chord.is_empty() {
            chord.push(root.min(127));
        }

        let low_octave = params.min_octave as i32 - 1;
        let high_octave = params.max_octave as i32 + 1;
        let mut diatonic: Vec<u8> = get_scale(root, params.mode, false)
            .into_iter()
            .flat_map(|pc| (low_octave..=high_octave).map(move |oct| pc as i32 + oct * 12))
            .filter(|n| (0..=127).contains(n))
            .map(|n| n as u8)
            .collect();
        diatonic.sort_unstable();
        diatonic.dedup();

        Self { chord, diatonic }
    }

    /// Four-phase rotation: full, root+top, full, root+middle
    fn voicing(&self, interval_index: usize, min_notes_held: usize) -> Vec<u8> {
        let chord = &self.chord;
        let mut voicing = if chord.len() < 3 {
            chord.clone()
        } else {
            match interval_index % 4 {
                1 => vec![chord[0], chord[chord.len() - 1]],
                3 => vec![chord[0], chord[1]],
                _ => chord.clone(),
            }
        };
        for &note in chord {
            if voicing.len() >= min_notes_held {
                break;
            }
            if !voicing.contains(&note) {
                voicing.push(note);
            }
        }
        voicing.sort_unstable();
        voicing
    }

    fn emit_interval(
        &self,
        events: &mut Vec<DroneEvent>,
        interval_index: usize,
        start: u32,
        length: u32,
        params: &DroneParams,
        rng: &mut Rng,
    ) {
        let mut notes = self.voicing(interval_index, params.min_notes_held);
        if params.allow_octave_shifts {
            shift_one_note(&mut notes, params, rng);
        }
        for &note in &notes {
            events.push(DroneEvent::new(note, start, length, params.base_velocity));
        }
        self.double_one_note(events, &notes, start, length, params, rng);
    }

    /// Add at most one companion note an octave away, optionally walked into
    fn double_one_note(
        &self,
        events: &mut Vec<DroneEvent>,
        notes: &[u8],
        start: u32,
        length: u32,
        params: &DroneParams,
        rng: &mut Rng,
    ) {
        let low = params.min_octave as i32 * 12;
        let high = (params.max_octave as i32 + 2) * 12;
        let mut candidates = notes.to_vec();
        rng.shuffle(&mut candidates);

        for source in candidates {
            if rng.f64() >= params.octave_doubling_chance {
                continue;
            }
            let direction = if rng.bool() { 12 } else { -12 };
            let target = clamp_note(source as i32 + direction);
            if !(low..high).contains(&(target as i32)) || notes.contains(&target) {
                continue;
            }

            // Held pitches are never struck again inside the interval
            let walk: Vec<u8> = if self.walkdown_fits(length, params) {
                self.walkdown(source, target, params.walkdown_num_steps)
                    .into_iter()
                    .filter(|n| !notes.contains(n))
                    .collect()
            } else {
                Vec::new()
            };
            if walk.is_empty() {
                events.push(DroneEvent::new(target, start, length, params.base_velocity));
                return;
            }

            let walk_velocity = params.base_velocity.saturating_sub(WALKDOWN_VELOCITY_DROP).max(1);
            let mut tick = start;
            for &note in &walk {
                events.push(DroneEvent::new(note, tick, params.walkdown_step_ticks, walk_velocity));
                tick += params.walkdown_step_ticks;
            }
            events.push(DroneEvent::new(target, tick, length - (tick - start), params.base_velocity));
            debug!(source, target, ?walk, "Walkdown into doubled note");
            return;
        }
    }

    fn walkdown_fits(&self, length: u32, params: &DroneParams) -> bool {
        let needed = params
            .walkdown_num_steps
            .checked_mul(params.walkdown_step_ticks)
            .and_then(|walk| walk.checked_add(params.min_target_sustain_ticks));
        params.enable_walkdowns
            && params.walkdown_num_steps > 0
            && params.walkdown_step_ticks > 0
            && needed.is_some_and(|needed| length >= needed)
    }

    /// Diatonic steps leading into `target`, approaching from the side `source` sits on
    fn walkdown(&self, source: u8, target: u8, num_steps: u32) -> Vec<u8> {
        let num_steps = num_steps as usize;
        let mut walk: Vec<u8> = if target > source {
            let below: Vec<u8> = self.diatonic.iter().copied().filter(|&n| n < target).collect();
            below[below.len().saturating_sub(num_steps)..].to_vec()
        } else {
            let mut above: Vec<u8> = self
                .diatonic
                .iter()
                .copied()
                .filter(|&n| n > target)
                .take(num_steps)
                .collect();
            above.reverse();
            above
        };
        walk.dedup();
        walk
    }
}

/// Move at most one note of the voicing by an octave, staying within the drone range
fn shift_one_note(notes: &mut Vec<u8>, params: &DroneParams, rng: &mut Rng) {
    let low = params.min_octave as i32 * 12;
    let high = (params.max_octave as i32 + 1) * 12;
    let mut order: Vec<usize> = (0..notes.len()).collect();
    rng.shuffle(&mut order);

    for i in order {
        if rng.f64() >= params.octave_shift_chance {
            continue;
        }
        let direction = if rng.bool() { 12 } else { -12 };
        let shifted = notes[i] as i32 + direction;
        if (low..high).contains(&shifted) && (0..=127).contains(&shifted) {
            notes[i] = shifted as u8;
            break;
        }
    }
    notes.sort_unstable();
    notes.dedup();
}
