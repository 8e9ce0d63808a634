//! Velocity humanization with beat emphasis and short phrasing trends

use fastrand::Rng;
use serde::{Deserialize, Serialize};

use super::{impl_midi_fx_boilerplate, param_error, EffectType, MidiFxParam, NoteContext};

const RANGE: usize = 0;
const BASE_VELOCITY: usize = 1;
const DOWNBEAT_EMPHASIS: usize = 2;
const PATTERN_STRENGTH: usize = 3;
const TREND_PROBABILITY: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanizeVelocityFx {
    params: Vec<MidiFxParam>,
    bypass: bool,
    /// -1, 0 or 1
    trend: i32,
    /// Notes left in the current run after this one
    trend_remaining: u32,
}

impl Default for HumanizeVelocityFx {
    fn default() -> Self {
        Self {
            params: vec![
                MidiFxParam::new("humanization_range", 10.0, 1.0, 64.0),
                MidiFxParam::new("base_velocity", 85.0, 1.0, 127.0),
                MidiFxParam::new("downbeat_emphasis", 4.0, 0.0, 20.0),
                MidiFxParam::new("pattern_strength", 0.6, 0.0, 1.0),
                MidiFxParam::new("trend_probability", 0.3, 0.0, 1.0),
            ],
            bypass: false,
            trend: 0,
            trend_remaining: 0,
        }
    }
}

impl HumanizeVelocityFx {
    pub const NAME: &'static str = "humanize_velocity";

    fn int_param(&self, index: usize) -> i32 {
        self.params[index].value.round() as i32
    }

    /// Phrase shape: lean into the first note, relax the last
    fn position_emphasis(&self, ctx: &NoteContext) -> i32 {
        let strength = self.params[PATTERN_STRENGTH].value;
        if ctx.is_first_note {
            (3.0 * strength).round() as i32
        } else if ctx.is_last_note {
            -(2.0 * strength).round() as i32
        } else {
            0
        }
    }

    /// Accent on the beat, lighter accent on the off-beat 8th
    fn beat_emphasis(&self, ctx: &NoteContext, rng: &mut Rng) -> i32 {
        let position = ctx.beat_position();
        let strength = self.params[PATTERN_STRENGTH].value as f64;
        if position < 0.1 {
            let pattern = if rng.f64() < strength { 2 } else { 0 };
            self.int_param(DOWNBEAT_EMPHASIS) + pattern
        } else if (position - 0.5).abs() < 0.1 {
            i32::from(rng.f64() < strength)
        } else {
            0
        }
    }

    fn next_trend(&mut self, rng: &mut Rng) -> i32 {
        if self.trend_remaining == 0 {
            if rng.f64() < self.params[TREND_PROBABILITY].value as f64 {
                self.trend = if rng.bool() { 1 } else { -1 };
                // The starting note counts toward the 3..=8 note run
                self.trend_remaining = rng.u32(3..=8) - 1;
            } else {
                self.trend = 0;
            }
        } else {
            self.trend_remaining -= 1;
        }
        self.trend
    }
}

impl_midi_fx_boilerplate!(HumanizeVelocityFx, HumanizeVelocityFx::NAME, EffectType::NoteProcessor, 100, {
    fn validate(&self) -> crate::Result<()> {
        let base = self.params[BASE_VELOCITY].value;
        let half_range = self.params[RANGE].value / 2.0;
        let downbeat = self.params[DOWNBEAT_EMPHASIS].value;
        if base + half_range + downbeat > 127.0 {
            return Err(param_error(
                Self::NAME,
                "base_velocity",
                "base_velocity + humanization_range/2 + downbeat_emphasis exceeds 127",
            ));
        }
        if base - half_range < 1.0 {
            return Err(param_error(
                Self::NAME,
                "base_velocity",
                "base_velocity - humanization_range/2 is below 1",
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.trend = 0;
        self.trend_remaining = 0;
    }

    fn process_note(&mut self, mut ctx: NoteContext, rng: &mut Rng) -> NoteContext {
        let base = ctx.velocity.map_or(self.int_param(BASE_VELOCITY), i32::from);
        let half_range = self.int_param(RANGE) / 2;
        let jitter = rng.i32(-half_range..=half_range);
        let trend = self.next_trend(rng) * 2;
        let velocity = base
            + self.position_emphasis(&ctx)
            + self.beat_emphasis(&ctx, rng)
            + trend
            + jitter;
        ctx.velocity = Some(velocity.clamp(1, 127) as u8);
        ctx
    }
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi_fx::MidiFx;

    fn ctx(tick: u32) -> NoteContext {
        NoteContext {
            note: 60,
            velocity: None,
            channel: 0,
            tick,
            duration_ticks: 120,
            is_first_note: false,
            is_last_note: false,
        }
    }

    /// No jitter, no trends, no pattern accents
    fn steady() -> HumanizeVelocityFx {
        let mut fx = HumanizeVelocityFx::default();
        fx.try_set_param("humanization_range", 1.0).unwrap();
        fx.try_set_param("pattern_strength", 0.0).unwrap();
        fx.try_set_param("trend_probability", 0.0).unwrap();
        fx
    }

    #[test]
    fn test_downbeat_emphasis() {
        let mut fx = steady();
        let mut rng = Rng::with_seed(0);
        assert_eq!(fx.process_note(ctx(0), &mut rng).velocity, Some(89));
        assert_eq!(fx.process_note(ctx(480), &mut rng).velocity, Some(89));
        assert_eq!(fx.process_note(ctx(120), &mut rng).velocity, Some(85));
        assert_eq!(fx.process_note(ctx(240), &mut rng).velocity, Some(85));
    }

    #[test]
    fn test_explicit_velocity_is_the_base() {
        let mut fx = steady();
        let mut rng = Rng::with_seed(0);
        let note = NoteContext { velocity: Some(50), ..ctx(120) };
        assert_eq!(fx.process_note(note, &mut rng).velocity, Some(50));
    }

    #[test]
    fn test_first_and_last_note_shape() {
        let mut fx = steady();
        fx.try_set_param("pattern_strength", 1.0).unwrap();
        let mut rng = Rng::with_seed(0);
        let first = NoteContext { is_first_note: true, ..ctx(120) };
        let last = NoteContext { is_last_note: true, ..ctx(120) };
        assert_eq!(fx.process_note(first, &mut rng).velocity, Some(88));
        assert_eq!(fx.process_note(last, &mut rng).velocity, Some(83));
    }

    #[test]
    fn test_velocity_stays_in_range() {
        let mut fx = HumanizeVelocityFx::default();
        fx.try_set_param("humanization_range", 64.0).unwrap();
        let mut rng = Rng::with_seed(5);
        for (i, base) in [1u8, 10, 64, 120, 127].into_iter().cycle().take(500).enumerate() {
            let note = NoteContext { velocity: Some(base), ..ctx(i as u32 * 60) };
            let v = fx.process_note(note, &mut rng).velocity.unwrap();
            assert!((1..=127).contains(&v));
        }
    }

    #[test]
    fn test_trend_runs_then_resets() {
        let mut fx = steady();
        fx.try_set_param("trend_probability", 1.0).unwrap();
        let mut rng = Rng::with_seed(11);
        let first = fx.process_note(ctx(120), &mut rng).velocity.unwrap();
        assert!(first == 83 || first == 87);
        assert!((2..=7).contains(&fx.trend_remaining));
        fx.reset();
        assert_eq!(fx.trend, 0);
        assert_eq!(fx.trend_remaining, 0);
    }

    #[test]
    fn test_trend_run_length() {
        let mut lengths = Vec::new();
        for seed in 0..64 {
            let mut fx = steady();
            fx.try_set_param("trend_probability", 1.0).unwrap();
            let mut rng = Rng::with_seed(seed);
            let first = fx.process_note(ctx(120), &mut rng).velocity.unwrap();
            assert_ne!(first, 85);
            // No new trend may start once this run ends
            fx.try_set_param("trend_probability", 0.0).unwrap();
            let mut run = 1;
            while fx.process_note(ctx(120), &mut rng).velocity.unwrap() == first {
                run += 1;
                assert!(run <= 8, "seed {seed} trend ran past 8 notes");
            }
            lengths.push(run);
        }
        assert!(lengths.iter().all(|n| (3..=8).contains(n)));
        assert!(lengths.contains(&3));
        assert!(lengths.contains(&8));
    }

    #[test]
    fn test_cross_checks() {
        let mut fx = HumanizeVelocityFx::default();
        assert!(fx.validate().is_ok());
        fx.try_set_param("base_velocity", 125.0).unwrap();
        assert!(fx.validate().is_err());
        fx.try_set_param("base_velocity", 3.0).unwrap();
        assert!(fx.validate().is_err());
    }

    #[test]
    fn test_deterministic_under_seed() {
        let run = |seed| {
            let mut fx = HumanizeVelocityFx::default();
            let mut rng = Rng::with_seed(seed);
            (0..32).map(|i| fx.process_note(ctx(i * 120), &mut rng).velocity).collect::<Vec<_>>()
        };
        assert_eq!(run(3), run(3));
    }
}
