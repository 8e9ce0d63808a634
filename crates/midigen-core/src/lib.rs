//! midigen-core: arpeggio and drone generation, MIDI effects and scheduling

pub mod arpeggio;
pub mod config;
pub mod drone;
mod error;
pub mod instruction;
pub mod legacy;
pub mod midi_fx;
pub mod note;
pub mod pipeline;
pub mod scale;
pub mod scheduler;
pub mod timing;

pub use arpeggio::{create_arpeggio, ArpMode, ArpeggioParams, ArpeggioSequence};
pub use config::{ArpeggioConfig, CommonConfig, DroneConfig, EffectSpec, GenerationType, MidiGenConfig};
pub use drone::{generate_drone_events, DroneEvent, DroneParams};
pub use error::{MidigenError, Result};
pub use instruction::MidiInstruction;
pub use midi_fx::{EffectType, MidiEffect, MidiFx, MidiFxChain, MidiFxParam, NoteContext, SequenceInfo};
pub use midi_fx::{HumanizeVelocityFx, RestPatternFx, TapeWobbleFx};
pub use note::{midi_to_note_name, note_name_to_midi};
pub use pipeline::GeneratedEvents;
pub use scale::{get_scale, get_scale_by_name, Mode};
pub use scheduler::{schedule, TimedInstruction};
pub use timing::{TICKS_PER_BAR, TICKS_PER_BEAT};
