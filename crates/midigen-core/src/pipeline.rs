//! Config to instruction list: generate, run the effect chain, schedule

use fastrand::Rng;
use tracing::{debug, info};

use crate::arpeggio::{create_arpeggio, ArpeggioSequence};
use crate::config::{GenerationType, MidiGenConfig};
use crate::drone::{generate_drone_events, DroneEvent};
use crate::instruction::{note_pair, MidiInstruction};
use crate::midi_fx::{MidiFxChain, NoteContext, SequenceInfo};
use crate::scheduler::sort_instructions;
use crate::timing::{TICKS_PER_BAR, TICKS_PER_STEP};
use crate::Result;

/// Velocity for notes no effect gave one to
pub const DEFAULT_VELOCITY: u8 = 64;

/// Raw generator output, before effects
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedEvents {
    Arpeggio(ArpeggioSequence),
    Drone(Vec<DroneEvent>),
}

/// Run the generator selected by the config. The config must already be validated.
pub fn generate(config: &MidiGenConfig, rng: &mut Rng) -> Result<GeneratedEvents> {
    let events = match config.common.generation_type {
        GenerationType::Arpeggio => GeneratedEvents::Arpeggio(create_arpeggio(&config.arpeggio_params()?, rng)),
        GenerationType::Drone => GeneratedEvents::Drone(generate_drone_events(&config.drone_params()?, rng)),
    };
    info!(
        generation_type = config.common.generation_type.name(),
        notes = events.note_count(),
        bars = config.common.bars,
        "Generated"
    );
    Ok(events)
}

/// Piece-level info for sequence processors
pub fn sequence_info(config: &MidiGenConfig) -> SequenceInfo {
    SequenceInfo::new(
        f64::from(config.common.bpm),
        config.common.bars.saturating_mul(TICKS_PER_BAR),
        config.common.channel,
    )
}

impl GeneratedEvents {
    pub fn note_count(&self) -> usize {
        match self {
            Self::Arpeggio(seq) => seq.sounding_notes().count(),
            Self::Drone(events) => events.len(),
        }
    }

    /// One context per sounding note, in start order
    pub fn note_contexts(&self, channel: u8) -> Vec<NoteContext> {
        let mut contexts: Vec<NoteContext> = match self {
            Self::Arpeggio(seq) => seq
                .slots
                .iter()
                .enumerate()
                .filter_map(|(slot, note)| {
                    note.map(|note| NoteContext {
                        note,
                        velocity: None,
                        channel,
                        tick: slot as u32 * TICKS_PER_STEP,
                        duration_ticks: seq.slots_per_note * TICKS_PER_STEP,
                        is_first_note: false,
                        is_last_note: false,
                    })
                })
                .collect(),
            Self::Drone(events) => {
                let mut sorted = events.clone();
                sorted.sort_by_key(|e| e.start_tick);
                sorted
                    .into_iter()
                    .map(|e| NoteContext {
                        note: e.note,
                        velocity: Some(e.velocity),
                        channel,
                        tick: e.start_tick,
                        duration_ticks: e.duration_ticks,
                        is_first_note: false,
                        is_last_note: false,
                    })
                    .collect()
            }
        };
        mark_ends(&mut contexts);
        contexts
    }
}

fn mark_ends(contexts: &mut [NoteContext]) {
    if let Some(first) = contexts.first_mut() {
        first.is_first_note = true;
    }
    if let Some(last) = contexts.last_mut() {
        last.is_last_note = true;
    }
}

/// Note processors per note, then sequence processors in priority order, then sort
pub fn render(
    events: &GeneratedEvents,
    chain: &mut MidiFxChain,
    info: &SequenceInfo,
    rng: &mut Rng,
) -> Vec<MidiInstruction> {
    chain.reset();
    let instructions: Vec<MidiInstruction> = events
        .note_contexts(info.channel)
        .into_iter()
        .map(|ctx| chain.process_note(ctx, rng))
        .filter(|ctx| ctx.duration_ticks > 0)
        .flat_map(|ctx| {
            let velocity = ctx.velocity.unwrap_or(DEFAULT_VELOCITY).clamp(1, 127);
            note_pair(ctx.note.min(127), velocity, ctx.channel, ctx.tick, ctx.duration_ticks)
        })
        .collect();
    finish(instructions, chain, info, rng)
}

/// Run an existing instruction list (e.g. from the legacy adapter) through the chain.
/// Note processors only see note-on velocities.
pub fn render_instructions(
    instructions: Vec<MidiInstruction>,
    chain: &mut MidiFxChain,
    info: &SequenceInfo,
    rng: &mut Rng,
) -> Vec<MidiInstruction> {
    chain.reset();
    let mut instructions = sort_instructions(instructions);
    let note_ons: Vec<usize> = (0..instructions.len()).filter(|&i| instructions[i].is_note_on()).collect();
    let last = note_ons.len().saturating_sub(1);

    for (n, &i) in note_ons.iter().enumerate() {
        if let MidiInstruction::NoteOn { tick, note, velocity, channel } = instructions[i] {
            let ctx = NoteContext {
                note,
                velocity: Some(velocity),
                channel,
                tick,
                duration_ticks: 0,
                is_first_note: n == 0,
                is_last_note: n == last,
            };
            let velocity = chain.process_note(ctx, rng).velocity.unwrap_or(velocity).clamp(1, 127);
            instructions[i] = MidiInstruction::NoteOn { tick, note, velocity, channel };
        }
    }
    finish(instructions, chain, info, rng)
}

fn finish(
    instructions: Vec<MidiInstruction>,
    chain: &mut MidiFxChain,
    info: &SequenceInfo,
    rng: &mut Rng,
) -> Vec<MidiInstruction> {
    let processed = chain.process_sequence(instructions, info, rng);
    debug!(instructions = processed.len(), "Rendered");
    sort_instructions(processed)
}
