//! Tape wobble: wow and flutter rendered as a thinned-out pitch bend curve

use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use fastrand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{impl_midi_fx_boilerplate, EffectType, MidiFxParam, SequenceInfo};
use crate::instruction::{MidiInstruction, PITCH_BEND_CENTER, PITCH_BEND_MAX, PITCH_BEND_MIN};
use crate::MidigenError;

/// Pitch bend range set up through RPN 0
pub const BEND_RANGE_SEMITONES: f64 = 2.0;
const MIN_SAMPLE_RATE_HZ: f64 = 20.0;
const MAX_SAMPLE_RATE_HZ: f64 = 50.0;

const WOW_RATE: usize = 0;
const WOW_DEPTH: usize = 1;
const FLUTTER_RATE: usize = 2;
const FLUTTER_DEPTH: usize = 3;
const RANDOMNESS: usize = 4;
const MIN_BEND_INTERVAL_MS: usize = 5;
const BEND_THRESHOLD: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthUnits {
    #[default]
    Cents,
    Semitones,
}

impl DepthUnits {
    fn to_semitones(self, depth: f64) -> f64 {
        match self {
            Self::Cents => depth / 100.0,
            Self::Semitones => depth,
        }
    }
}

impl fmt::Display for DepthUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cents => "cents",
            Self::Semitones => "semitones",
        })
    }
}

impl FromStr for DepthUnits {
    type Err = MidigenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cents" => Ok(Self::Cents),
            "semitones" => Ok(Self::Semitones),
            other => Err(MidigenError::InvalidEffectParam {
                effect: TapeWobbleFx::NAME.to_string(),
                param: "depth_units".to_string(),
                reason: format!("expected cents or semitones, got {other}"),
            }),
        }
    }
}

/// Emitted bend points, plus how many samples they were thinned from
#[derive(Debug, Clone, PartialEq)]
pub struct WobbleCurve {
    /// (seconds, signed bend value)
    pub points: Vec<(f64, i16)>,
    pub samples_computed: usize,
}

impl WobbleCurve {
    pub fn compression_ratio(&self) -> f64 {
        self.samples_computed as f64 / self.points.len().max(1) as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapeWobbleFx {
    params: Vec<MidiFxParam>,
    bypass: bool,
    pub depth_units: DepthUnits,
}

impl Default for TapeWobbleFx {
    fn default() -> Self {
        Self {
            params: vec![
                MidiFxParam::new("wow_rate_hz", 0.5, 0.1, 1.0),
                MidiFxParam::new("wow_depth", 25.0, 0.0, 50.0),
                MidiFxParam::new("flutter_rate_hz", 8.0, 3.0, 12.0),
                MidiFxParam::new("flutter_depth", 5.0, 0.0, 10.0),
                MidiFxParam::new("randomness", 0.5, 0.0, 1.0),
                MidiFxParam::new("min_bend_interval_ms", 50.0, 5.0, 1000.0),
                MidiFxParam::new("bend_threshold", 640.0, 1.0, 1024.0),
            ],
            bypass: false,
            depth_units: DepthUnits::Cents,
        }
    }
}

impl TapeWobbleFx {
    pub const NAME: &'static str = "tape_wobble";

    fn param(&self, index: usize) -> f64 {
        self.params[index].value as f64
    }

    /// Internal sampling rate: four samples per cycle of the faster component, 20..=50 Hz
    pub fn sample_rate_hz(&self) -> f64 {
        let fastest = self.param(WOW_RATE).max(self.param(FLUTTER_RATE));
        (fastest * 4.0).clamp(MIN_SAMPLE_RATE_HZ, MAX_SAMPLE_RATE_HZ)
    }

    /// Sample the wobble signal over `duration_secs` and keep only the points worth sending
    pub fn wobble_curve(&self, duration_secs: f64, rng: &mut Rng) -> WobbleCurve {
        if duration_secs <= 0.0 {
            return WobbleCurve { points: Vec::new(), samples_computed: 0 };
        }
        let sample_rate = self.sample_rate_hz();
        let randomness = self.param(RANDOMNESS);
        let wow_phase = rng.f64() * TAU * randomness;
        let flutter_phase = rng.f64() * TAU * randomness;
        let wow_depth = self.depth_units.to_semitones(self.param(WOW_DEPTH));
        let flutter_depth = self.depth_units.to_semitones(self.param(FLUTTER_DEPTH));
        let min_interval = self.param(MIN_BEND_INTERVAL_MS) / 1000.0;
        let threshold = self.param(BEND_THRESHOLD).round() as i32;

        let samples = (duration_secs * sample_rate) as usize;
        let mut points = Vec::new();
        let mut last_value = i32::from(PITCH_BEND_CENTER);
        let mut last_time = 0.0;

        for i in 0..samples {
            let t = i as f64 / sample_rate;
            let semitones = wow_depth * (TAU * self.param(WOW_RATE) * t + wow_phase).sin()
                + flutter_depth * (TAU * self.param(FLUTTER_RATE) * t + flutter_phase).sin();
            let value = semitones_to_bend(semitones);
            if t - last_time >= min_interval && (i32::from(value) - last_value).abs() >= threshold {
                points.push((t, value));
                last_value = i32::from(value);
                last_time = t;
            }
        }
        WobbleCurve { points, samples_computed: samples }
    }
}

/// Signed 14-bit bend for an offset in semitones under a ±2 semitone range
pub fn semitones_to_bend(semitones: f64) -> i16 {
    let value = (semitones / BEND_RANGE_SEMITONES * 8192.0).round();
    value.clamp(f64::from(PITCH_BEND_MIN), f64::from(PITCH_BEND_MAX)) as i16
}

/// RPN 0 (pitch bend sensitivity) = 2 semitones, then RPN null
fn bend_range_setup(channel: u8) -> [MidiInstruction; 6] {
    let cc = |controller, value| MidiInstruction::ControlChange { tick: 0, controller, value, channel };
    [cc(101, 0), cc(100, 0), cc(6, BEND_RANGE_SEMITONES as u8), cc(38, 0), cc(101, 127), cc(100, 127)]
}

impl_midi_fx_boilerplate!(TapeWobbleFx, TapeWobbleFx::NAME, EffectType::SequenceProcessor, 200, {
    fn process_sequence(
        &mut self,
        events: Vec<MidiInstruction>,
        info: &SequenceInfo,
        rng: &mut Rng,
    ) -> Vec<MidiInstruction> {
        let channel = info.channel;
        let end_tick = events
            .iter()
            .map(MidiInstruction::tick)
            .max()
            .unwrap_or(0)
            .max(info.total_ticks);
        let span = SequenceInfo { total_ticks: end_tick, ..*info };
        let curve = self.wobble_curve(span.duration_secs(), rng);
        debug!(
            points = curve.points.len(),
            samples = curve.samples_computed,
            ratio = curve.compression_ratio(),
            "Tape wobble curve"
        );

        let mut out = Vec::with_capacity(events.len() + curve.points.len() + 8);
        out.extend(bend_range_setup(channel));
        out.push(MidiInstruction::PitchBend { tick: 0, value: PITCH_BEND_CENTER, channel });
        out.extend(events);
        out.extend(
            curve
                .points
                .iter()
                .map(|&(t, value)| (span.secs_to_ticks(t), value))
                .filter(|&(tick, _)| tick > 0 && tick < end_tick)
                .map(|(tick, value)| MidiInstruction::PitchBend { tick, value, channel }),
        );
        out.push(MidiInstruction::PitchBend { tick: end_tick, value: PITCH_BEND_CENTER, channel });
        out
    }
});
