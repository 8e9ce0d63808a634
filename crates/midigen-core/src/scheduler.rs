//! Orders instructions and converts them to delta times for the file writer

use crate::instruction::MidiInstruction;

/// An instruction with its delta from the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedInstruction {
    pub delta: u32,
    pub instruction: MidiInstruction,
}

/// Sort by tick, then controllers, bends, note-offs, note-ons. Stable otherwise.
pub fn sort_instructions(mut instructions: Vec<MidiInstruction>) -> Vec<MidiInstruction> {
    instructions.sort_by_key(|i| (i.tick(), i.same_tick_priority()));
    instructions
}

/// Sort and delta-encode. The first delta is the first absolute tick.
pub fn schedule(instructions: Vec<MidiInstruction>) -> Vec<TimedInstruction> {
    let mut last_tick = 0;
    sort_instructions(instructions)
        .into_iter()
        .map(|instruction| {
            let tick = instruction.tick();
            let delta = tick - last_tick;
            last_tick = tick;
            TimedInstruction { delta, instruction }
        })
        .collect()
}

/// Absolute tick of the last instruction, 0 when empty
pub fn end_tick(instructions: &[MidiInstruction]) -> u32 {
    instructions.iter().map(MidiInstruction::tick).max().unwrap_or(0)
}
