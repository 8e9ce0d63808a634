//! Fixed-interval rests carved out of an existing sequence

use std::collections::HashMap;

use fastrand::Rng;
use serde::{Deserialize, Serialize};

use super::{impl_midi_fx_boilerplate, EffectType, MidiFxParam, SequenceInfo};
use crate::instruction::MidiInstruction;
use crate::scheduler::sort_instructions;
use crate::timing::TICKS_PER_STEP;

const STEPS_BETWEEN_RESTS: usize = 0;
const CYCLE_STEPS: usize = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestPatternFx {
    params: Vec<MidiFxParam>,
    bypass: bool,
}

impl Default for RestPatternFx {
    fn default() -> Self {
        Self {
            params: vec![
                MidiFxParam::new("steps_between_rests", 4.0, 1.0, 32.0),
                MidiFxParam::new("cycle_steps", 8.0, 1.0, 64.0),
            ],
            bypass: false,
        }
    }
}

impl RestPatternFx {
    pub const NAME: &'static str = "rest_pattern";

    fn int_param(&self, index: usize) -> u32 {
        self.params[index].value.round().max(1.0) as u32
    }

    /// Whether a note starting at `tick` lands on a rest step
    pub fn is_rest(&self, tick: u32) -> bool {
        let every = self.int_param(STEPS_BETWEEN_RESTS);
        let cycle = self.int_param(CYCLE_STEPS);
        let step = tick / TICKS_PER_STEP;
        (step % cycle) % every == every - 1
    }
}

impl_midi_fx_boilerplate!(RestPatternFx, RestPatternFx::NAME, EffectType::SequenceProcessor, 100, {
    fn process_sequence(
        &mut self,
        events: Vec<MidiInstruction>,
        _info: &SequenceInfo,
        _rng: &mut Rng,
    ) -> Vec<MidiInstruction> {
        // Removed note-ons still waiting for their note-off, per (channel, note)
        let mut pending: HashMap<(u8, u8), u32> = HashMap::new();
        sort_instructions(events)
            .into_iter()
            .filter(|event| match *event {
                MidiInstruction::NoteOn { tick, note, channel, .. } if self.is_rest(tick) => {
                    *pending.entry((channel, note)).or_default() += 1;
                    false
                }
                MidiInstruction::NoteOff { note, channel, .. } => match pending.get_mut(&(channel, note)) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        false
                    }
                    _ => true,
                },
                _ => true,
            })
            .collect()
    }
});
