//! MIDI effects applied between generation and scheduling
//!
//! Note processors rewrite one note at a time while instructions are built.
//! Sequence processors run afterwards on the complete instruction list.

mod humanize;
mod rest_pattern;
mod tape_wobble;

pub use humanize::HumanizeVelocityFx;
pub use rest_pattern::RestPatternFx;
pub use tape_wobble::{DepthUnits, TapeWobbleFx, WobbleCurve};

use fastrand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EffectSpec;
use crate::instruction::MidiInstruction;
use crate::timing::TICKS_PER_BEAT;
use crate::{MidigenError, Result};

/// Effects beyond this count are refused by the chain
pub const MAX_EFFECTS: usize = 8;

/// Which phase of rendering an effect takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectType {
    NoteProcessor,
    SequenceProcessor,
}

/// One note on its way to becoming a note on/off pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteContext {
    pub note: u8,
    /// `None` when the generator left dynamics to the effects (arpeggio)
    pub velocity: Option<u8>,
    pub channel: u8,
    pub tick: u32,
    pub duration_ticks: u32,
    pub is_first_note: bool,
    pub is_last_note: bool,
}

impl NoteContext {
    /// Position inside the current beat, in [0, 1)
    pub fn beat_position(&self) -> f64 {
        (self.tick % TICKS_PER_BEAT) as f64 / TICKS_PER_BEAT as f64
    }
}

/// Whole-piece facts handed to sequence processors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceInfo {
    pub bpm: f64,
    pub ticks_per_beat: u32,
    pub total_ticks: u32,
    pub channel: u8,
}

impl SequenceInfo {
    pub fn new(bpm: f64, total_ticks: u32, channel: u8) -> Self {
        Self { bpm, ticks_per_beat: TICKS_PER_BEAT, total_ticks, channel }
    }

    pub fn duration_secs(&self) -> f64 {
        self.total_ticks as f64 / self.ticks_per_beat as f64 * (60.0 / self.bpm)
    }

    pub fn secs_to_ticks(&self, secs: f64) -> u32 {
        (secs * self.bpm * self.ticks_per_beat as f64 / 60.0).round().max(0.0) as u32
    }
}

/// Parameter for MIDI effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiFxParam {
    pub name: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

impl MidiFxParam {
    pub fn new(name: &str, value: f32, min: f32, max: f32) -> Self {
        Self { name: name.to_string(), value, min, max }
    }
}

/// Trait for MIDI effects
pub trait MidiFx: Send {
    fn name(&self) -> &str;
    fn effect_type(&self) -> EffectType;
    /// Lower runs first
    fn priority(&self) -> u32;
    fn get_params(&self) -> &[MidiFxParam];
    /// Sets a parameter, clamping to its range. Unknown names are ignored.
    fn set_param(&mut self, name: &str, value: f32);
    /// Sets a parameter, rejecting unknown names and out-of-range values
    fn try_set_param(&mut self, name: &str, value: f32) -> Result<()>;
    fn is_bypassed(&self) -> bool;
    fn set_bypass(&mut self, bypass: bool);

    /// Cross-parameter checks run after construction
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Clear per-sequence state
    fn reset(&mut self) {}

    fn process_note(&mut self, ctx: NoteContext, _rng: &mut Rng) -> NoteContext {
        ctx
    }

    fn process_sequence(
        &mut self,
        events: Vec<MidiInstruction>,
        _info: &SequenceInfo,
        _rng: &mut Rng,
    ) -> Vec<MidiInstruction> {
        events
    }
}

fn param_error(effect: &str, param: &str, reason: impl Into<String>) -> MidigenError {
    MidigenError::InvalidEffectParam {
        effect: effect.to_string(),
        param: param.to_string(),
        reason: reason.into(),
    }
}

/// Implements common MidiFx boilerplate for structs with `params: Vec<MidiFxParam>` and `bypass: bool` fields.
/// Usage: `impl_midi_fx_boilerplate!(StructName, "registry_name", EffectType::X, priority, { extra trait items });`
macro_rules! impl_midi_fx_boilerplate {
    ($ty:ty, $name:expr, $kind:expr, $priority:expr, { $($body:tt)* }) => {
        impl super::MidiFx for $ty {
            fn name(&self) -> &str { $name }

            fn effect_type(&self) -> super::EffectType { $kind }

            fn priority(&self) -> u32 { $priority }

            fn get_params(&self) -> &[MidiFxParam] { &self.params }

            fn set_param(&mut self, name: &str, value: f32) {
                if let Some(p) = self.params.iter_mut().find(|p| p.name == name) {
                    p.value = value.clamp(p.min, p.max);
                }
            }

            fn try_set_param(&mut self, name: &str, value: f32) -> crate::Result<()> {
                let p = self
                    .params
                    .iter_mut()
                    .find(|p| p.name == name)
                    .ok_or_else(|| super::param_error($name, name, "unknown parameter"))?;
                if !value.is_finite() || value < p.min || value > p.max {
                    return Err(super::param_error(
                        $name,
                        name,
                        format!("{value} outside {}..={}", p.min, p.max),
                    ));
                }
                p.value = value;
                Ok(())
            }

            fn is_bypassed(&self) -> bool { self.bypass }
            fn set_bypass(&mut self, bypass: bool) { self.bypass = bypass; }

            $($body)*
        }
    };
}

pub(crate) use impl_midi_fx_boilerplate;

/// Enum wrapper for all MIDI effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MidiEffect {
    Humanize(HumanizeVelocityFx),
    TapeWobble(TapeWobbleFx),
    RestPattern(RestPatternFx),
}

impl MidiEffect {
    /// Names accepted by [`MidiEffect::from_name`]
    pub const NAMES: [&'static str; 3] =
        [HumanizeVelocityFx::NAME, TapeWobbleFx::NAME, RestPatternFx::NAME];

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            HumanizeVelocityFx::NAME => Ok(Self::Humanize(HumanizeVelocityFx::default())),
            TapeWobbleFx::NAME => Ok(Self::TapeWobble(TapeWobbleFx::default())),
            RestPatternFx::NAME => Ok(Self::RestPattern(RestPatternFx::default())),
            other => Err(MidigenError::UnknownEffect(other.to_string())),
        }
    }

    /// Build an effect from a config entry, applying and validating its parameters
    pub fn from_spec(spec: &EffectSpec) -> Result<Self> {
        let mut effect = Self::from_name(&spec.name)?;
        for (param, value) in &spec.params {
            match (value, &mut effect) {
                (serde_json::Value::Number(n), fx) => {
                    let value = n
                        .as_f64()
                        .ok_or_else(|| param_error(&spec.name, param, "not a number"))?;
                    fx.as_fx_mut().try_set_param(param, value as f32)?;
                }
                (serde_json::Value::String(s), Self::TapeWobble(fx)) if param == "depth_units" => {
                    fx.depth_units = s.parse()?;
                }
                _ => return Err(param_error(&spec.name, param, format!("unsupported value {value}"))),
            }
        }
        effect.as_fx().validate()?;
        Ok(effect)
    }

    fn as_fx(&self) -> &dyn MidiFx {
        match self {
            Self::Humanize(fx) => fx,
            Self::TapeWobble(fx) => fx,
            Self::RestPattern(fx) => fx,
        }
    }

    fn as_fx_mut(&mut self) -> &mut dyn MidiFx {
        match self {
            Self::Humanize(fx) => fx,
            Self::TapeWobble(fx) => fx,
            Self::RestPattern(fx) => fx,
        }
    }

    pub fn name(&self) -> &str {
        self.as_fx().name()
    }

    pub fn effect_type(&self) -> EffectType {
        self.as_fx().effect_type()
    }

    pub fn priority(&self) -> u32 {
        self.as_fx().priority()
    }

    pub fn get_params(&self) -> &[MidiFxParam] {
        self.as_fx().get_params()
    }

    pub fn set_param(&mut self, name: &str, value: f32) {
        self.as_fx_mut().set_param(name, value);
    }

    pub fn try_set_param(&mut self, name: &str, value: f32) -> Result<()> {
        self.as_fx_mut().try_set_param(name, value)
    }

    pub fn is_bypassed(&self) -> bool {
        self.as_fx().is_bypassed()
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.as_fx_mut().set_bypass(bypass);
    }

    pub fn reset(&mut self) {
        self.as_fx_mut().reset();
    }

    pub fn process_note(&mut self, ctx: NoteContext, rng: &mut Rng) -> NoteContext {
        self.as_fx_mut().process_note(ctx, rng)
    }

    pub fn process_sequence(
        &mut self,
        events: Vec<MidiInstruction>,
        info: &SequenceInfo,
        rng: &mut Rng,
    ) -> Vec<MidiInstruction> {
        self.as_fx_mut().process_sequence(events, info, rng)
    }
}

/// MIDI FX Chain, kept sorted by priority
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MidiFxChain {
    effects: Vec<MidiEffect>,
    pub bypass_all: bool,
}

impl MidiFxChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from config entries. Disabled entries are skipped; broken ones are
    /// dropped with a warning.
    pub fn from_specs(specs: &[EffectSpec]) -> Self {
        let mut chain = Self::new();
        for spec in specs.iter().filter(|s| s.enabled) {
            match MidiEffect::from_spec(spec) {
                Ok(effect) => chain.add(effect),
                Err(e) => warn!(effect = %spec.name, error = %e, "Skipping effect"),
            }
        }
        chain
    }

    /// Insert keeping priority order; equal priorities keep insertion order
    pub fn add(&mut self, effect: MidiEffect) {
        if self.effects.len() >= MAX_EFFECTS {
            warn!(effect = effect.name(), "Effect chain full");
            return;
        }
        debug!(effect = effect.name(), priority = effect.priority(), "Adding effect");
        let index = self.effects.partition_point(|e| e.priority() <= effect.priority());
        self.effects.insert(index, effect);
    }

    pub fn remove(&mut self, index: usize) -> Option<MidiEffect> {
        if index < self.effects.len() {
            return Some(self.effects.remove(index));
        }
        None
    }

    pub fn effects(&self) -> &[MidiEffect] {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut [MidiEffect] {
        &mut self.effects
    }

    pub fn reset(&mut self) {
        self.effects.iter_mut().for_each(MidiEffect::reset);
    }

    fn active(&mut self, kind: EffectType) -> impl Iterator<Item = &mut MidiEffect> {
        let bypass_all = self.bypass_all;
        self.effects
            .iter_mut()
            .filter(move |e| !bypass_all && !e.is_bypassed() && e.effect_type() == kind)
    }

    pub fn process_note(&mut self, mut ctx: NoteContext, rng: &mut Rng) -> NoteContext {
        for effect in self.active(EffectType::NoteProcessor) {
            ctx = effect.process_note(ctx, rng);
        }
        ctx
    }

    pub fn process_sequence(
        &mut self,
        mut events: Vec<MidiInstruction>,
        info: &SequenceInfo,
        rng: &mut Rng,
    ) -> Vec<MidiInstruction> {
        for effect in self.active(EffectType::SequenceProcessor) {
            let before = events.len();
            events = effect.process_sequence(events, info, rng);
            debug!(effect = effect.name(), before, after = events.len(), "Sequence processed");
        }
        events
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str, params: serde_json::Value) -> EffectSpec {
        let mut spec = EffectSpec::new(name);
        if let serde_json::Value::Object(map) = params {
            spec.params = map.into_iter().collect();
        }
        spec
    }

    #[test]
    fn test_from_spec_applies_params() {
        let fx = MidiEffect::from_spec(&spec(
            "tape_wobble",
            json!({ "wow_depth": 10.0, "depth_units": "semitones" }),
        ))
        .unwrap();
        let MidiEffect::TapeWobble(wobble) = &fx else { panic!("wrong effect") };
        assert_eq!(wobble.depth_units, DepthUnits::Semitones);
        let depth = fx.get_params().iter().find(|p| p.name == "wow_depth").unwrap();
        assert_eq!(depth.value, 10.0);
        assert_eq!(fx.effect_type(), EffectType::SequenceProcessor);
    }

    #[test]
    fn test_from_spec_rejects_bad_input() {
        assert!(matches!(
            MidiEffect::from_spec(&spec("reverb", json!({}))),
            Err(MidigenError::UnknownEffect(_))
        ));
        assert!(matches!(
            MidiEffect::from_spec(&spec("tape_wobble", json!({ "wow_rate_hz": 5.0 }))),
            Err(MidigenError::InvalidEffectParam { .. })
        ));
        assert!(matches!(
            MidiEffect::from_spec(&spec("humanize_velocity", json!({ "swing": 1.0 }))),
            Err(MidigenError::InvalidEffectParam { .. })
        ));
        assert!(MidiEffect::from_spec(&spec("rest_pattern", json!({ "cycle_steps": "eight" }))).is_err());
    }

    #[test]
    fn test_chain_skips_bad_and_disabled_specs() {
        let mut disabled = EffectSpec::new("rest_pattern");
        disabled.enabled = false;
        let specs = vec![
            EffectSpec::new("tape_wobble"),
            spec("humanize_velocity", json!({ "base_velocity": 126.0 })),
            EffectSpec::new("chorus"),
            disabled,
            EffectSpec::new("humanize_velocity"),
        ];
        let chain = MidiFxChain::from_specs(&specs);
        let names: Vec<&str> = chain.effects().iter().map(MidiEffect::name).collect();
        assert_eq!(names, vec!["humanize_velocity", "tape_wobble"]);
    }

    #[test]
    fn test_chain_orders_by_priority() {
        let mut chain = MidiFxChain::new();
        chain.add(MidiEffect::from_name("tape_wobble").unwrap());
        chain.add(MidiEffect::from_name("rest_pattern").unwrap());
        chain.add(MidiEffect::from_name("humanize_velocity").unwrap());
        let names: Vec<&str> = chain.effects().iter().map(MidiEffect::name).collect();
        assert_eq!(names, vec!["rest_pattern", "humanize_velocity", "tape_wobble"]);
        assert_eq!(chain.remove(0).map(|e| e.priority()), Some(100));
        assert!(chain.remove(5).is_none());
    }

    #[test]
    fn test_bypassed_effects_do_nothing() {
        let mut chain = MidiFxChain::new();
        chain.add(MidiEffect::from_name("humanize_velocity").unwrap());
        chain.add(MidiEffect::from_name("tape_wobble").unwrap());
        chain.bypass_all = true;

        let ctx = NoteContext {
            note: 60,
            velocity: None,
            channel: 0,
            tick: 0,
            duration_ticks: 120,
            is_first_note: true,
            is_last_note: false,
        };
        let mut rng = Rng::with_seed(1);
        assert_eq!(chain.process_note(ctx, &mut rng), ctx);
        let info = SequenceInfo::new(120.0, 1920, 0);
        assert!(chain.process_sequence(Vec::new(), &info, &mut rng).is_empty());

        chain.bypass_all = false;
        chain.effects_mut()[0].set_bypass(true);
        assert_eq!(chain.process_note(ctx, &mut rng), ctx);
    }

    #[test]
    fn test_set_param_clamps() {
        let mut fx = MidiEffect::from_name("humanize_velocity").unwrap();
        fx.set_param("humanization_range", 500.0);
        let range = fx.get_params().iter().find(|p| p.name == "humanization_range").unwrap();
        assert_eq!(range.value, 64.0);
        assert!(fx.try_set_param("humanization_range", 0.0).is_err());
    }

    #[test]
    fn test_sequence_info_conversions() {
        let info = SequenceInfo::new(120.0, 1920, 0);
        assert!((info.duration_secs() - 2.0).abs() < 1e-9);
        assert_eq!(info.secs_to_ticks(0.5), 480);
    }
}
