//! Typed generation config
//!
//! Every field defaults to the stock CLI value, so a config file only needs the
//! fields it changes. [`MidiGenConfig::validate`] runs before any generation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arpeggio::{ArpMode, ArpeggioParams};
use crate::drone::DroneParams;
use crate::error::{invalid, MidigenError, Result};
use crate::midi_fx::{HumanizeVelocityFx, RestPatternFx, TapeWobbleFx};
use crate::note::note_name_to_midi;
use crate::scale::Mode;
use crate::timing::TICKS_PER_BAR;

pub const MIN_BPM: u16 = 20;
pub const MAX_BPM: u16 = 300;
pub const MAX_OCTAVE: u8 = 9;
pub const VALID_STEPS: [u8; 3] = [4, 8, 16];
/// Longest piece; keeps every tick position inside `u32`
pub const MAX_BARS: u32 = 1024;
pub const MAX_WALKDOWN_STEPS: u32 = 16;
/// Shortest sustain left for a walked-into note
pub const MIN_TARGET_SUSTAIN_TICKS: u32 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    #[default]
    Arpeggio,
    Drone,
}

impl GenerationType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Arpeggio => "arpeggio",
            Self::Drone => "drone",
        }
    }
}

/// Settings shared by both generators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonConfig {
    pub generation_type: GenerationType,
    pub root_notes: Vec<String>,
    pub mode: Mode,
    pub min_octave: u8,
    pub max_octave: u8,
    pub bpm: u16,
    pub bars: u32,
    pub use_chord_tones: bool,
    pub channel: u8,
    /// Fixed seed for reproducible output; random when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            generation_type: GenerationType::Arpeggio,
            root_notes: ["E4", "A4", "D4", "G4"].map(String::from).to_vec(),
            mode: Mode::Minor,
            min_octave: 3,
            max_octave: 5,
            bpm: 120,
            bars: 16,
            use_chord_tones: true,
            channel: 0,
            seed: None,
        }
    }
}

impl CommonConfig {
    pub fn root_midi_notes(&self) -> Result<Vec<u8>> {
        self.root_notes.iter().map(|n| note_name_to_midi(n)).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.root_notes.is_empty() {
            return Err(invalid("root_notes", "at least one root note is required"));
        }
        self.root_midi_notes()?;
        if self.max_octave > MAX_OCTAVE {
            return Err(invalid("max_octave", format!("must be at most {MAX_OCTAVE}")));
        }
        if self.min_octave > self.max_octave {
            return Err(invalid("min_octave", "cannot be greater than max_octave"));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            return Err(invalid("bpm", format!("must be between {MIN_BPM} and {MAX_BPM}")));
        }
        if !(1..=MAX_BARS).contains(&self.bars) {
            return Err(invalid("bars", format!("must be between 1 and {MAX_BARS}")));
        }
        if self.channel > 15 {
            return Err(invalid("channel", "must be between 0 and 15"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpeggioConfig {
    pub steps: u8,
    pub arp_mode: ArpMode,
    pub range_octaves: u8,
    pub evolution_rate: f64,
    pub repetition_factor: u8,
    /// Tile the pattern as 16ths instead of holding each note for its step length
    pub repeat_pattern: bool,
}

impl Default for ArpeggioConfig {
    fn default() -> Self {
        Self {
            steps: 8,
            arp_mode: ArpMode::UpDown,
            range_octaves: 2,
            evolution_rate: 0.35,
            repetition_factor: 9,
            repeat_pattern: false,
        }
    }
}

impl ArpeggioConfig {
    fn validate(&self) -> Result<()> {
        if !VALID_STEPS.contains(&self.steps) {
            return Err(invalid("steps", "must be 4, 8 or 16"));
        }
        if self.range_octaves < 1 {
            return Err(invalid("range_octaves", "must be at least 1 octave"));
        }
        if !(0.0..=1.0).contains(&self.evolution_rate) {
            return Err(invalid("evolution_rate", "must be between 0 and 1"));
        }
        if !(1..=10).contains(&self.repetition_factor) {
            return Err(invalid("repetition_factor", "must be between 1 and 10"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DroneConfig {
    pub base_velocity: u8,
    pub variation_interval_bars: u32,
    pub min_notes_held: usize,
    pub octave_doubling_chance: f64,
    pub allow_octave_shifts: bool,
    pub octave_shift_chance: f64,
    pub enable_walkdowns: bool,
    pub walkdown_num_steps: u32,
    pub walkdown_step_ticks: u32,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            base_velocity: 70,
            variation_interval_bars: 1,
            min_notes_held: 2,
            octave_doubling_chance: 0.25,
            allow_octave_shifts: true,
            octave_shift_chance: 0.1,
            enable_walkdowns: true,
            walkdown_num_steps: 2,
            walkdown_step_ticks: 240,
        }
    }
}

impl DroneConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=127).contains(&self.base_velocity) {
            return Err(invalid("base_velocity", "must be between 1 and 127"));
        }
        if !(1..=MAX_BARS).contains(&self.variation_interval_bars) {
            return Err(invalid("variation_interval_bars", format!("must be between 1 and {MAX_BARS}")));
        }
        if self.min_notes_held < 1 {
            return Err(invalid("min_notes_held", "must hold at least 1 note"));
        }
        if !(0.0..=1.0).contains(&self.octave_doubling_chance) {
            return Err(invalid("octave_doubling_chance", "must be between 0 and 1"));
        }
        if !(0.0..=1.0).contains(&self.octave_shift_chance) {
            return Err(invalid("octave_shift_chance", "must be between 0 and 1"));
        }
        if self.walkdown_num_steps > MAX_WALKDOWN_STEPS {
            return Err(invalid("walkdown_num_steps", format!("must be at most {MAX_WALKDOWN_STEPS}")));
        }
        if !(1..=TICKS_PER_BAR).contains(&self.walkdown_step_ticks) {
            return Err(invalid("walkdown_step_ticks", format!("must be between 1 and {TICKS_PER_BAR}")));
        }
        Ok(())
    }
}

/// One `[[effects]]` entry. Parameters not given keep the effect's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_json::Value>,
}

fn enabled_by_default() -> bool {
    true
}

impl EffectSpec {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), enabled: true, params: BTreeMap::new() }
    }
}

fn default_effects() -> Vec<EffectSpec> {
    vec![
        EffectSpec::new(HumanizeVelocityFx::NAME),
        EffectSpec::new(TapeWobbleFx::NAME),
        EffectSpec { enabled: false, ..EffectSpec::new(RestPatternFx::NAME) },
    ]
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiGenConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arpeggio: Option<ArpeggioConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drone: Option<DroneConfig>,
    #[serde(default = "default_effects")]
    pub effects: Vec<EffectSpec>,
}

impl Default for MidiGenConfig {
    fn default() -> Self {
        Self {
            common: CommonConfig::default(),
            arpeggio: Some(ArpeggioConfig::default()),
            drone: Some(DroneConfig::default()),
            effects: default_effects(),
        }
    }
}

impl MidiGenConfig {
    /// Check every range; the section for the selected generation type must exist.
    /// Effect entries are checked later, when the chain is built.
    pub fn validate(&self) -> Result<()> {
        self.common.validate()?;
        match self.common.generation_type {
            GenerationType::Arpeggio => self.arpeggio_section()?.validate(),
            GenerationType::Drone => self.drone_section()?.validate(),
        }
    }

    fn arpeggio_section(&self) -> Result<&ArpeggioConfig> {
        self.arpeggio.as_ref().ok_or(MidigenError::MissingSection("arpeggio"))
    }

    fn drone_section(&self) -> Result<&DroneConfig> {
        self.drone.as_ref().ok_or(MidigenError::MissingSection("drone"))
    }

    pub fn arpeggio_params(&self) -> Result<ArpeggioParams> {
        let arp = self.arpeggio_section()?;
        Ok(ArpeggioParams {
            root_notes: self.common.root_midi_notes()?,
            mode: self.common.mode,
            min_octave: self.common.min_octave,
            bars: self.common.bars,
            use_chord_tones: self.common.use_chord_tones,
            steps: arp.steps,
            arp_mode: arp.arp_mode,
            range_octaves: arp.range_octaves,
            evolution_rate: arp.evolution_rate,
            repetition_factor: arp.repetition_factor,
            repeat_pattern: arp.repeat_pattern,
        })
    }

    pub fn drone_params(&self) -> Result<DroneParams> {
        let drone = self.drone_section()?;
        Ok(DroneParams {
            root_notes: self.common.root_midi_notes()?,
            mode: self.common.mode,
            min_octave: self.common.min_octave,
            max_octave: self.common.max_octave,
            bars: self.common.bars,
            base_velocity: drone.base_velocity,
            variation_interval_bars: drone.variation_interval_bars,
            min_notes_held: drone.min_notes_held,
            octave_doubling_chance: drone.octave_doubling_chance,
            allow_octave_shifts: drone.allow_octave_shifts,
            octave_shift_chance: drone.octave_shift_chance,
            enable_walkdowns: drone.enable_walkdowns,
            walkdown_num_steps: drone.walkdown_num_steps,
            walkdown_step_ticks: drone.walkdown_step_ticks,
            min_target_sustain_ticks: MIN_TARGET_SUSTAIN_TICKS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: MidigenError) -> &'static str {
        match err {
            MidigenError::InvalidConfig { field, .. } => field,
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_defaults_validate() {
        let mut config = MidiGenConfig::default();
        assert!(config.validate().is_ok());
        config.common.generation_type = GenerationType::Drone;
        assert!(config.validate().is_ok());
    }

    fn common_error(edit: impl FnOnce(&mut CommonConfig)) -> &'static str {
        let mut config = MidiGenConfig::default();
        edit(&mut config.common);
        field_of(config.validate().unwrap_err())
    }

    fn arpeggio_error(edit: impl FnOnce(&mut ArpeggioConfig)) -> &'static str {
        let mut arp = ArpeggioConfig::default();
        edit(&mut arp);
        let config = MidiGenConfig { arpeggio: Some(arp), ..MidiGenConfig::default() };
        field_of(config.validate().unwrap_err())
    }

    fn drone_error(edit: impl FnOnce(&mut DroneConfig)) -> &'static str {
        let mut drone = DroneConfig::default();
        edit(&mut drone);
        let mut config = MidiGenConfig { drone: Some(drone), ..MidiGenConfig::default() };
        config.common.generation_type = GenerationType::Drone;
        field_of(config.validate().unwrap_err())
    }

    #[test]
    fn test_common_ranges() {
        assert_eq!(common_error(|c| c.root_notes.clear()), "root_notes");
        assert_eq!(common_error(|c| c.min_octave = 6), "min_octave");
        assert_eq!(common_error(|c| c.max_octave = 10), "max_octave");
        assert_eq!(common_error(|c| c.bpm = 19), "bpm");
        assert_eq!(common_error(|c| c.bpm = 301), "bpm");
        assert_eq!(common_error(|c| c.bars = 0), "bars");
        assert_eq!(common_error(|c| c.bars = MAX_BARS + 1), "bars");
        assert_eq!(common_error(|c| c.channel = 16), "channel");
    }

    #[test]
    fn test_bad_root_note() {
        let mut config = MidiGenConfig::default();
        config.common.root_notes.push("H2".into());
        assert!(matches!(config.validate(), Err(MidigenError::InvalidNoteName(_))));
    }

    #[test]
    fn test_arpeggio_ranges() {
        assert_eq!(arpeggio_error(|a| a.steps = 6), "steps");
        assert_eq!(arpeggio_error(|a| a.range_octaves = 0), "range_octaves");
        assert_eq!(arpeggio_error(|a| a.evolution_rate = 1.5), "evolution_rate");
        assert_eq!(arpeggio_error(|a| a.repetition_factor = 0), "repetition_factor");
        assert_eq!(arpeggio_error(|a| a.repetition_factor = 11), "repetition_factor");
    }

    #[test]
    fn test_drone_ranges() {
        assert_eq!(drone_error(|d| d.base_velocity = 0), "base_velocity");
        assert_eq!(drone_error(|d| d.variation_interval_bars = 0), "variation_interval_bars");
        assert_eq!(drone_error(|d| d.min_notes_held = 0), "min_notes_held");
        assert_eq!(drone_error(|d| d.octave_doubling_chance = -0.1), "octave_doubling_chance");
        assert_eq!(drone_error(|d| d.octave_shift_chance = 2.0), "octave_shift_chance");
        assert_eq!(drone_error(|d| d.walkdown_step_ticks = 0), "walkdown_step_ticks");
        assert_eq!(drone_error(|d| d.walkdown_step_ticks = 100_000), "walkdown_step_ticks");
        assert_eq!(drone_error(|d| d.walkdown_num_steps = 100_000), "walkdown_num_steps");
        assert_eq!(drone_error(|d| d.variation_interval_bars = 3_000_000), "variation_interval_bars");
    }

    #[test]
    fn test_missing_section() {
        let mut config = MidiGenConfig::default();
        config.arpeggio = None;
        assert!(matches!(config.validate(), Err(MidigenError::MissingSection("arpeggio"))));
        config.common.generation_type = GenerationType::Drone;
        config.drone = None;
        assert!(matches!(config.validate(), Err(MidigenError::MissingSection("drone"))));
    }

    #[test]
    fn test_toml_partial_file() {
        let text = r#"
            [common]
            generation_type = "drone"
            root_notes = ["C3"]
            mode = "dorian"
            bars = 4

            [drone]
            base_velocity = 90

            [[effects]]
            name = "tape_wobble"
            wow_depth = 10
            depth_units = "semitones"
        "#;
        let config: MidiGenConfig = toml::from_str(text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.common.mode, Mode::Dorian);
        assert_eq!(config.common.bpm, 120);
        assert!(config.arpeggio.is_none());

        let drone = config.drone_params().unwrap();
        assert_eq!(drone.root_notes, vec![48]);
        assert_eq!(drone.base_velocity, 90);
        assert_eq!(drone.walkdown_step_ticks, 240);

        assert_eq!(config.effects.len(), 1);
        let wobble = &config.effects[0];
        assert!(wobble.enabled);
        assert_eq!(wobble.params["depth_units"], serde_json::json!("semitones"));
        assert_eq!(wobble.params["wow_depth"].as_f64(), Some(10.0));
    }

    #[test]
    fn test_missing_effects_use_defaults() {
        let config: MidiGenConfig = toml::from_str("[arpeggio]\nsteps = 16\n").unwrap();
        let names: Vec<&str> = config.effects.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["humanize_velocity", "tape_wobble", "rest_pattern"]);
        assert!(!config.effects[2].enabled);
        assert_eq!(config.arpeggio_params().unwrap().steps, 16);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = MidiGenConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: MidiGenConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
