//! The six-stage SoundFont-style volume envelope.

use alloc::sync::Arc;
use resona_core::EngineConfig;

use crate::generator::{Generator, Release};

/// Stage of the six-stage envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SfStage {
    /// Holding zero before the attack starts.
    #[default]
    Delay,
    /// Ramping 0 → 1, optionally through a squared (convex) curve.
    Attack,
    /// Holding the peak.
    Hold,
    /// Falling toward the sustain level.
    Decay,
    /// Holding the sustain level until release.
    Sustain,
    /// Falling from the release point to zero.
    Release,
    /// Envelope exhausted.
    Done,
}

/// Six-stage delay/attack/hold/decay/sustain/release generator.
///
/// This is the envelope the sound-bank articulation data drives: each
/// timed stage is gated by a sample counter, the decay additionally by
/// reaching the sustain level. A stage whose configured duration collapses
/// to zero falls through into the next stage within the same `generate()`
/// call — the walk is a loop bounded by the stage count, so a bank that
/// zeroes every duration cannot spin forever.
///
/// `init` layout: `[delay_s, attack_s, hold_s, decay_s, sustain_level,
/// release_s, square_attack_flag]`.
#[derive(Debug, Clone)]
pub struct EnvGenSF {
    cfg: Arc<EngineConfig>,
    delay_s: f32,
    attack_s: f32,
    hold_s: f32,
    decay_s: f32,
    sustain_level: f32,
    release_s: f32,
    square_attack: bool,
    stage: SfStage,
    counter: u32,
    stage_len: u32,
    value: f32,
    release_from: f32,
}

impl EnvGenSF {
    /// Create an idle generator; call `init` (or the setters) before use.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            cfg,
            delay_s: 0.0,
            attack_s: 0.0,
            hold_s: 0.0,
            decay_s: 0.0,
            sustain_level: 1.0,
            release_s: 0.0,
            square_attack: false,
            stage: SfStage::Delay,
            counter: 0,
            stage_len: 0,
            value: 0.0,
            release_from: 0.0,
        }
    }

    /// Set all six stage parameters in engine-native units.
    #[allow(clippy::too_many_arguments)]
    pub fn set_stages(
        &mut self,
        delay_s: f32,
        attack_s: f32,
        hold_s: f32,
        decay_s: f32,
        sustain_level: f32,
        release_s: f32,
    ) {
        self.delay_s = delay_s.max(0.0);
        self.attack_s = attack_s.max(0.0);
        self.hold_s = hold_s.max(0.0);
        self.decay_s = decay_s.max(0.0);
        self.sustain_level = sustain_level;
        self.release_s = release_s.max(0.0);
    }

    /// Square the attack ramp for a convex rise.
    pub fn set_square_attack(&mut self, on: bool) {
        self.square_attack = on;
    }

    /// Current stage.
    pub fn stage(&self) -> SfStage {
        self.stage
    }

    /// Current output level without advancing.
    pub fn value(&self) -> f32 {
        self.value
    }

    fn samples(&self, seconds: f32) -> u32 {
        libm::roundf(seconds * self.cfg.sample_rate()) as u32
    }

    fn enter(&mut self, stage: SfStage) {
        self.stage = stage;
        self.counter = 0;
        self.stage_len = match stage {
            SfStage::Delay => self.samples(self.delay_s),
            SfStage::Attack => self.samples(self.attack_s),
            SfStage::Hold => self.samples(self.hold_s),
            SfStage::Decay => self.samples(self.decay_s),
            SfStage::Sustain | SfStage::Done => 0,
            SfStage::Release => self.samples(self.release_s),
        };
        if stage == SfStage::Release {
            self.release_from = self.value;
        }
    }
}

impl Generator for EnvGenSF {
    fn init(&mut self, params: &[f32]) {
        let get = |i: usize| params.get(i).copied();
        self.set_stages(
            get(0).unwrap_or(0.0),
            get(1).unwrap_or(0.0),
            get(2).unwrap_or(0.0),
            get(3).unwrap_or(0.0),
            get(4).unwrap_or(1.0),
            get(5).unwrap_or(0.0),
        );
        self.square_attack = get(6).unwrap_or(0.0) != 0.0;
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        if phase >= 0.0 {
            self.value = 0.0;
            self.enter(SfStage::Delay);
        } else {
            // Re-gate the current stage against changed durations without
            // moving the position.
            let stage = self.stage;
            let counter = self.counter;
            self.enter(stage);
            self.counter = counter.min(self.stage_len);
        }
    }

    fn generate(&mut self) -> f32 {
        // Bounded fall-through: zero-length stages are crossed inside one
        // call, at most once per stage.
        for _ in 0..7 {
            match self.stage {
                SfStage::Delay => {
                    if self.counter < self.stage_len {
                        self.counter += 1;
                        self.value = 0.0;
                        return 0.0;
                    }
                    self.enter(SfStage::Attack);
                }
                SfStage::Attack => {
                    if self.counter < self.stage_len {
                        self.counter += 1;
                        let level = self.counter as f32 / self.stage_len as f32;
                        self.value = if self.square_attack {
                            level * level
                        } else {
                            level
                        };
                        return self.value;
                    }
                    self.value = 1.0;
                    self.enter(SfStage::Hold);
                }
                SfStage::Hold => {
                    if self.counter < self.stage_len {
                        self.counter += 1;
                        self.value = 1.0;
                        return 1.0;
                    }
                    self.enter(SfStage::Decay);
                }
                SfStage::Decay => {
                    // Gated by the counter and by the level threshold.
                    if self.counter < self.stage_len && self.value > self.sustain_level {
                        self.counter += 1;
                        let step = (1.0 - self.sustain_level) / self.stage_len as f32;
                        self.value -= step;
                        if self.value < self.sustain_level {
                            self.value = self.sustain_level;
                        }
                        return self.value;
                    }
                    self.value = self.sustain_level;
                    self.enter(SfStage::Sustain);
                }
                SfStage::Sustain => {
                    self.value = self.sustain_level;
                    return self.value;
                }
                SfStage::Release => {
                    if self.counter < self.stage_len && self.value > 0.0 {
                        self.counter += 1;
                        let step = self.release_from / self.stage_len as f32;
                        self.value -= step;
                        if self.value < 0.0 {
                            self.value = 0.0;
                        }
                        return self.value;
                    }
                    self.value = 0.0;
                    self.enter(SfStage::Done);
                }
                SfStage::Done => return 0.0,
            }
        }
        self.value
    }

    fn is_finished(&self) -> bool {
        self.stage == SfStage::Done
    }
}

impl Release for EnvGenSF {
    /// Force the stage index to release regardless of the current stage.
    fn release(&mut self) {
        if self.stage != SfStage::Done {
            self.enter(SfStage::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Arc<EngineConfig> {
        Arc::new(EngineConfig::new(44100.0, 16384))
    }

    #[test]
    fn full_contour_walks_all_stages() {
        let mut env = EnvGenSF::new(cfg());
        env.init(&[0.01, 0.01, 0.01, 0.01, 0.5, 0.01, 0.0]);

        for _ in 0..441 {
            assert_eq!(env.generate(), 0.0);
        }
        assert_eq!(env.stage(), SfStage::Delay);

        let mut last = 0.0;
        for _ in 0..441 {
            let v = env.generate();
            assert!(v >= last, "attack must be monotonic");
            last = v;
        }
        assert_eq!(last, 1.0);

        for _ in 0..441 {
            assert_eq!(env.generate(), 1.0);
        }

        for _ in 0..441 {
            let v = env.generate();
            assert!(v <= last, "decay must be monotonic");
            last = v;
        }
        assert!((last - 0.5).abs() < 1e-3);

        // Sustain holds
        for _ in 0..10_000 {
            assert!((env.generate() - 0.5).abs() < 1e-3);
        }
        assert_eq!(env.stage(), SfStage::Sustain);

        env.release();
        for _ in 0..441 {
            env.generate();
        }
        assert!(env.is_finished());
        assert_eq!(env.generate(), 0.0);
    }

    #[test]
    fn zero_duration_stages_fall_through_in_one_call() {
        let mut env = EnvGenSF::new(cfg());
        // No delay, no attack, no hold: the very first sample must
        // already be past those stages, at the sustain level.
        env.init(&[0.0, 0.0, 0.0, 0.0, 0.75, 0.1, 0.0]);
        let first = env.generate();
        assert!((first - 0.75).abs() < 1e-6, "got {first}");
        assert_eq!(env.stage(), SfStage::Sustain);
    }

    #[test]
    fn all_zero_durations_terminate() {
        let mut env = EnvGenSF::new(cfg());
        env.init(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        // Sustain level 0 still parks in Sustain until released.
        assert_eq!(env.generate(), 0.0);
        env.release();
        assert_eq!(env.generate(), 0.0);
        assert!(env.is_finished());
    }

    #[test]
    fn square_attack_is_convex() {
        let mut env = EnvGenSF::new(cfg());
        env.init(&[0.0, 0.01, 0.0, 0.0, 1.0, 0.01, 1.0]);
        // Halfway through a 441-sample attack, a squared ramp sits near
        // 0.25 instead of 0.5.
        let mut v = 0.0;
        for _ in 0..220 {
            v = env.generate();
        }
        assert!(v < 0.3, "squared attack midpoint was {v}");
    }

    #[test]
    fn release_from_mid_attack_has_no_jump() {
        let mut env = EnvGenSF::new(cfg());
        env.init(&[0.0, 0.01, 0.0, 0.0, 0.8, 0.02, 0.0]);
        for _ in 0..200 {
            env.generate();
        }
        let before = env.value();
        env.release();
        assert_eq!(env.stage(), SfStage::Release);
        let after = env.generate();
        assert!(
            (after - before).abs() < 0.01,
            "release jumped from {before} to {after}"
        );
    }

    #[test]
    fn decay_level_threshold_gates_stage() {
        let mut env = EnvGenSF::new(cfg());
        // Sustain at full level: decay has nothing to do and must be
        // crossed immediately.
        env.init(&[0.0, 0.0, 0.0, 1.0, 1.0, 0.1, 0.0]);
        let v = env.generate();
        assert_eq!(v, 1.0);
        assert_eq!(env.stage(), SfStage::Sustain);
    }
}
