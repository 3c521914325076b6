//! Direct-calculation oscillators.
//!
//! Each oscillator computes its waveform from the running phase every
//! sample — no tables. Phase is kept in radians in `[0, 2π)` and the
//! per-sample increment is derived from [`EngineConfig::radians_per_sample`].
//!
//! Setting a frequency is deliberately inert: the increment is only
//! recomputed by [`Generator::reset`] (or by [`FreqModulate::modulate`],
//! which is the frequency-modulation path). This lets a caller stage a new
//! frequency and apply it at a block boundary without a mid-cycle jump.

use alloc::sync::Arc;
use core::f32::consts::TAU;
use libm::sinf;
use resona_core::EngineConfig;

use crate::generator::{FreqModulate, Generator};

/// Add `offset` to `phase` and wrap into `[0, 2π)`.
///
/// Loops rather than subtracting once, so arbitrarily large modulation
/// offsets normalize correctly.
#[inline]
fn wrap_phase(mut phase: f32, offset: f32) -> f32 {
    phase += offset;
    while phase >= TAU {
        phase -= TAU;
    }
    while phase < 0.0 {
        phase += TAU;
    }
    phase
}

/// Shared phase-accumulator state for the direct-calculation family.
#[derive(Debug, Clone)]
struct PhaseAccum {
    cfg: Arc<EngineConfig>,
    frequency: f32,
    phase: f32,
    phase_inc: f32,
}

impl PhaseAccum {
    fn new(cfg: Arc<EngineConfig>) -> Self {
        let phase_inc = 440.0 * cfg.radians_per_sample();
        Self {
            cfg,
            frequency: 440.0,
            phase: 0.0,
            phase_inc,
        }
    }

    /// Recompute the increment; set the phase when `phase >= 0`.
    fn reset(&mut self, phase: f32) {
        self.phase_inc = self.frequency * self.cfg.radians_per_sample();
        if phase >= 0.0 {
            self.phase = wrap_phase(0.0, phase);
        }
    }

    fn modulate(&mut self, delta_hz: f32) {
        self.phase_inc = (self.frequency + delta_hz) * self.cfg.radians_per_sample();
    }

    /// Return the current phase, then advance by one sample.
    #[inline]
    fn advance(&mut self) -> f32 {
        let p = self.phase;
        self.phase = wrap_phase(self.phase, self.phase_inc);
        p
    }
}

macro_rules! phase_osc_common {
    () => {
        /// Staged frequency in Hz. Takes effect at the next `reset` call.
        pub fn set_frequency(&mut self, freq_hz: f32) {
            self.accum.frequency = freq_hz;
        }

        /// Currently set frequency in Hz.
        pub fn frequency(&self) -> f32 {
            self.accum.frequency
        }

        /// Current phase in radians.
        pub fn phase(&self) -> f32 {
            self.accum.phase
        }
    };
}

/// Sine oscillator — one `libm::sinf` call per sample.
///
/// `init` layout: `[frequency]`.
#[derive(Debug, Clone)]
pub struct SineOsc {
    accum: PhaseAccum,
}

impl SineOsc {
    /// Create a sine oscillator at 440 Hz.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            accum: PhaseAccum::new(cfg),
        }
    }

    phase_osc_common!();
}

impl Generator for SineOsc {
    fn init(&mut self, params: &[f32]) {
        if let Some(&f) = params.first() {
            self.accum.frequency = f;
        }
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.accum.reset(phase);
    }

    #[inline]
    fn generate(&mut self) -> f32 {
        sinf(self.accum.advance())
    }

    fn is_finished(&self) -> bool {
        true
    }
}

impl FreqModulate for SineOsc {
    fn modulate(&mut self, delta_hz: f32) {
        self.accum.modulate(delta_hz);
    }

    fn phase_modulate(&mut self, offset: f32) {
        self.accum.phase = wrap_phase(self.accum.phase, offset);
    }
}

/// Sawtooth oscillator — closed-form ramp in phase, −1 at phase 0 rising
/// to +1 just before the wrap.
///
/// `init` layout: `[frequency]`.
#[derive(Debug, Clone)]
pub struct SawOsc {
    accum: PhaseAccum,
}

impl SawOsc {
    /// Create a sawtooth oscillator at 440 Hz.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            accum: PhaseAccum::new(cfg),
        }
    }

    phase_osc_common!();
}

impl Generator for SawOsc {
    fn init(&mut self, params: &[f32]) {
        if let Some(&f) = params.first() {
            self.accum.frequency = f;
        }
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.accum.reset(phase);
    }

    #[inline]
    fn generate(&mut self) -> f32 {
        let phase = self.accum.advance();
        phase / core::f32::consts::PI - 1.0
    }

    fn is_finished(&self) -> bool {
        true
    }
}

impl FreqModulate for SawOsc {
    fn modulate(&mut self, delta_hz: f32) {
        self.accum.modulate(delta_hz);
    }

    fn phase_modulate(&mut self, offset: f32) {
        self.accum.phase = wrap_phase(self.accum.phase, offset);
    }
}

/// Triangle oscillator — piecewise-linear closed form in phase, starting
/// at 0 and peaking at ±1.
///
/// `init` layout: `[frequency]`.
#[derive(Debug, Clone)]
pub struct TriangleOsc {
    accum: PhaseAccum,
}

impl TriangleOsc {
    /// Create a triangle oscillator at 440 Hz.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            accum: PhaseAccum::new(cfg),
        }
    }

    phase_osc_common!();
}

impl Generator for TriangleOsc {
    fn init(&mut self, params: &[f32]) {
        if let Some(&f) = params.first() {
            self.accum.frequency = f;
        }
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.accum.reset(phase);
    }

    #[inline]
    fn generate(&mut self) -> f32 {
        // Quarter-cycle form: rise 0->1, fall 1->-1, rise -1->0.
        let p = self.accum.advance() * (2.0 / core::f32::consts::PI);
        if p < 1.0 {
            p
        } else if p < 3.0 {
            2.0 - p
        } else {
            p - 4.0
        }
    }

    fn is_finished(&self) -> bool {
        true
    }
}

impl FreqModulate for TriangleOsc {
    fn modulate(&mut self, delta_hz: f32) {
        self.accum.modulate(delta_hz);
    }

    fn phase_modulate(&mut self, offset: f32) {
        self.accum.phase = wrap_phase(self.accum.phase, offset);
    }
}

/// Square/pulse oscillator — comparator against a duty-cycle threshold
/// with configurable output levels.
///
/// `init` layout: `[frequency, duty_percent, min_level, max_level]`;
/// trailing values default to 50% duty and ±1.
#[derive(Debug, Clone)]
pub struct SquareOsc {
    accum: PhaseAccum,
    duty_percent: f32,
    threshold: f32,
    min_level: f32,
    max_level: f32,
}

impl SquareOsc {
    /// Create a 50% duty square oscillator at 440 Hz with ±1 levels.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            accum: PhaseAccum::new(cfg),
            duty_percent: 50.0,
            threshold: core::f32::consts::PI,
            min_level: -1.0,
            max_level: 1.0,
        }
    }

    phase_osc_common!();

    /// Staged duty cycle in percent; applied at the next `reset`.
    pub fn set_duty_percent(&mut self, duty: f32) {
        self.duty_percent = duty.clamp(0.0, 100.0);
    }

    /// Set output levels for the low and high halves of the cycle.
    pub fn set_levels(&mut self, min_level: f32, max_level: f32) {
        self.min_level = min_level;
        self.max_level = max_level;
    }
}

impl Generator for SquareOsc {
    fn init(&mut self, params: &[f32]) {
        if let Some(&f) = params.first() {
            self.accum.frequency = f;
        }
        if let Some(&d) = params.get(1) {
            self.set_duty_percent(d);
        }
        if let Some(&lo) = params.get(2) {
            self.min_level = lo;
        }
        if let Some(&hi) = params.get(3) {
            self.max_level = hi;
        }
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.threshold = TAU * self.duty_percent / 100.0;
        self.accum.reset(phase);
    }

    #[inline]
    fn generate(&mut self) -> f32 {
        let phase = self.accum.advance();
        if phase < self.threshold {
            self.max_level
        } else {
            self.min_level
        }
    }

    fn is_finished(&self) -> bool {
        true
    }
}

impl FreqModulate for SquareOsc {
    fn modulate(&mut self, delta_hz: f32) {
        self.accum.modulate(delta_hz);
    }

    fn phase_modulate(&mut self, offset: f32) {
        self.accum.phase = wrap_phase(self.accum.phase, offset);
    }
}

/// Integer-period square oscillator.
///
/// Advances a per-sample integer counter instead of a float phase
/// accumulator: faster, and free of accumulator jitter. The period is
/// rounded to a whole number of samples, so the produced frequency is
/// quantized to `sample_rate / round(sample_rate / f)` — a small,
/// deliberate error traded for the integer inner loop.
///
/// `init` layout: `[frequency, duty_percent, min_level, max_level]`.
#[derive(Debug, Clone)]
pub struct FastSquareOsc {
    cfg: Arc<EngineConfig>,
    frequency: f32,
    duty_percent: f32,
    min_level: f32,
    max_level: f32,
    period: u32,
    high_len: u32,
    counter: u32,
}

impl FastSquareOsc {
    /// Create a 50% duty integer-period square at 440 Hz.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        let mut osc = Self {
            cfg,
            frequency: 440.0,
            duty_percent: 50.0,
            min_level: -1.0,
            max_level: 1.0,
            period: 1,
            high_len: 1,
            counter: 0,
        };
        osc.reset(0.0);
        osc
    }

    /// Staged frequency in Hz; applied at the next `reset`.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.frequency = freq_hz;
    }

    /// The frequency actually produced after period rounding.
    pub fn quantized_frequency(&self) -> f32 {
        self.cfg.sample_rate() / self.period as f32
    }

    /// Staged duty cycle in percent; applied at the next `reset`.
    pub fn set_duty_percent(&mut self, duty: f32) {
        self.duty_percent = duty.clamp(0.0, 100.0);
    }

    fn recompute(&mut self) {
        let samples = self.cfg.sample_rate() / self.frequency.max(1e-3);
        self.period = (libm::roundf(samples) as u32).max(1);
        self.high_len = libm::roundf(self.period as f32 * self.duty_percent / 100.0) as u32;
    }
}

impl Generator for FastSquareOsc {
    fn init(&mut self, params: &[f32]) {
        if let Some(&f) = params.first() {
            self.frequency = f;
        }
        if let Some(&d) = params.get(1) {
            self.set_duty_percent(d);
        }
        if let Some(&lo) = params.get(2) {
            self.min_level = lo;
        }
        if let Some(&hi) = params.get(3) {
            self.max_level = hi;
        }
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.recompute();
        if phase >= 0.0 {
            let frac = wrap_phase(0.0, phase) / TAU;
            self.counter = (frac * self.period as f32) as u32 % self.period;
        } else {
            self.counter %= self.period;
        }
    }

    #[inline]
    fn generate(&mut self) -> f32 {
        let out = if self.counter < self.high_len {
            self.max_level
        } else {
            self.min_level
        };
        self.counter += 1;
        if self.counter >= self.period {
            self.counter = 0;
        }
        out
    }

    fn is_finished(&self) -> bool {
        true
    }
}

impl FreqModulate for FastSquareOsc {
    fn modulate(&mut self, delta_hz: f32) {
        let set = self.frequency;
        self.frequency = set + delta_hz;
        self.recompute();
        self.frequency = set;
        self.counter %= self.period;
    }

    fn phase_modulate(&mut self, offset: f32) {
        let shift = (offset / TAU * self.period as f32) as i64;
        let wrapped = (self.counter as i64 + shift).rem_euclid(self.period as i64);
        self.counter = wrapped as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Arc<EngineConfig> {
        Arc::new(EngineConfig::new(44100.0, 16384))
    }

    /// Advance one period and check the phase comes back to the start.
    fn assert_period_returns_phase<O: FreqModulate>(osc: &mut O, phase_of: impl Fn(&O) -> f32) {
        let start = phase_of(osc);
        let period = 44100 / 441;
        for _ in 0..period {
            osc.generate();
        }
        assert!(
            (phase_of(osc) - start).abs() < 1e-3,
            "phase drifted: {} -> {}",
            start,
            phase_of(osc)
        );
    }

    #[test]
    fn sine_one_period_returns_to_start_phase() {
        let mut osc = SineOsc::new(cfg());
        osc.init(&[441.0]);
        assert_period_returns_phase(&mut osc, |o| o.phase());
    }

    #[test]
    fn saw_one_period_returns_to_start_phase() {
        let mut osc = SawOsc::new(cfg());
        osc.init(&[441.0]);
        assert_period_returns_phase(&mut osc, |o| o.phase());
    }

    #[test]
    fn triangle_one_period_returns_to_start_phase() {
        let mut osc = TriangleOsc::new(cfg());
        osc.init(&[441.0]);
        assert_period_returns_phase(&mut osc, |o| o.phase());
    }

    #[test]
    fn set_frequency_is_inert_until_reset() {
        let mut osc = SineOsc::new(cfg());
        osc.init(&[440.0]);
        let inc_before = osc.accum.phase_inc;
        osc.set_frequency(880.0);
        assert_eq!(osc.accum.phase_inc, inc_before, "setter must not retune");
        osc.reset(-1.0);
        assert!(
            (osc.accum.phase_inc - 2.0 * inc_before).abs() < 1e-6,
            "reset applies the staged frequency"
        );
    }

    #[test]
    fn reset_negative_keeps_position() {
        let mut osc = SineOsc::new(cfg());
        osc.init(&[440.0]);
        for _ in 0..17 {
            osc.generate();
        }
        let pos = osc.phase();
        osc.reset(-1.0);
        assert_eq!(osc.phase(), pos);
    }

    #[test]
    fn modulate_retunes_immediately() {
        let mut osc = SineOsc::new(cfg());
        osc.init(&[440.0]);
        let inc = osc.accum.phase_inc;
        osc.modulate(440.0);
        assert!((osc.accum.phase_inc - 2.0 * inc).abs() < 1e-6);
    }

    #[test]
    fn phase_modulate_handles_many_periods() {
        let mut osc = SineOsc::new(cfg());
        osc.init(&[440.0]);
        // 5 whole periods plus a quarter turn
        osc.phase_modulate(5.0 * TAU + core::f32::consts::FRAC_PI_2);
        assert!(
            (osc.phase() - core::f32::consts::FRAC_PI_2).abs() < 1e-3,
            "large offset should normalize, got {}",
            osc.phase()
        );
        osc.phase_modulate(-7.0 * TAU);
        assert!((osc.phase() - core::f32::consts::FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn square_duty_threshold() {
        let mut osc = SquareOsc::new(cfg());
        osc.init(&[441.0, 25.0, 0.0, 1.0]);
        let period = 100;
        let high: usize = (0..period).map(|_| osc.generate() as usize).sum();
        assert!(
            (high as i32 - 25).abs() <= 1,
            "expected ~25 high samples, got {high}"
        );
    }

    #[test]
    fn square_levels_configurable() {
        let mut osc = SquareOsc::new(cfg());
        osc.init(&[441.0, 50.0, 0.2, 0.8]);
        for _ in 0..200 {
            let s = osc.generate();
            assert!(s == 0.2 || s == 0.8, "unexpected level {s}");
        }
    }

    #[test]
    fn fast_square_period_is_exact_integer() {
        let mut osc = FastSquareOsc::new(cfg());
        osc.init(&[441.0, 50.0]);
        // 44100 / 441 = 100 samples exactly
        let first = osc.generate();
        for _ in 0..99 {
            osc.generate();
        }
        assert_eq!(osc.generate(), first, "counter must wrap after one period");
    }

    #[test]
    fn fast_square_quantizes_frequency() {
        let mut osc = FastSquareOsc::new(cfg());
        osc.init(&[440.0, 50.0]);
        // 44100/440 = 100.23 rounds to 100 -> 441 Hz produced
        assert!((osc.quantized_frequency() - 441.0).abs() < 1e-3);
    }

    #[test]
    fn oscillators_report_finished() {
        assert!(SineOsc::new(cfg()).is_finished());
        assert!(FastSquareOsc::new(cfg()).is_finished());
    }
}
