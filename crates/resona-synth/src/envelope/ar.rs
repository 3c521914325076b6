//! Fixed-duration attack/release generators.
//!
//! These run a complete 0 → peak → 0 contour over a preset total duration
//! with no sustain phase — the shape for percussive one-shots and
//! fixed-length control sweeps. Three curve variants: linear ([`EnvGen`]),
//! convex ([`EnvGenExp`]) and concave ([`EnvGenLog`]).

use alloc::sync::Arc;
use libm::powf;
use resona_core::EngineConfig;

use super::ENV_BIAS;
use crate::generator::Generator;

/// Sample counts and boundaries shared by the three variants.
#[derive(Debug, Clone)]
struct ArTiming {
    cfg: Arc<EngineConfig>,
    peak: f32,
    duration: f32,
    attack: f32,
    decay: f32,
    total_samples: u32,
    attack_time: u32,
    decay_time: u32,
    decay_start: u32,
    index: u32,
}

impl ArTiming {
    fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            cfg,
            peak: 1.0,
            duration: 1.0,
            attack: 0.0,
            decay: 0.0,
            total_samples: 0,
            attack_time: 0,
            decay_time: 0,
            decay_start: 0,
            index: 0,
        }
    }

    fn set_params(&mut self, params: &[f32]) {
        if let Some(&p) = params.first() {
            self.peak = p;
        }
        if let Some(&d) = params.get(1) {
            self.duration = d.max(0.0);
        }
        if let Some(&a) = params.get(2) {
            self.attack = a.max(0.0);
        }
        if let Some(&d) = params.get(3) {
            self.decay = d.max(0.0);
        }
    }

    /// Recompute sample counts; re-arm at `phase` seconds when phase >= 0.
    fn reset(&mut self, phase: f32) {
        let sr = self.cfg.sample_rate();
        self.total_samples = libm::roundf(self.duration * sr) as u32;
        let mut attack = libm::roundf(self.attack * sr) as u32;
        let mut decay = libm::roundf(self.decay * sr) as u32;
        // Attack + decay may not exceed the total; shrink both equally.
        let sum = attack + decay;
        if sum > self.total_samples {
            let excess = sum - self.total_samples;
            let half = excess / 2;
            attack = attack.saturating_sub(half);
            decay = decay.saturating_sub(excess - half);
        }
        self.attack_time = attack;
        self.decay_time = decay;
        self.decay_start = self.total_samples - decay;
        if phase >= 0.0 {
            self.index = ((phase * sr) as u32).min(self.total_samples);
        }
    }

    fn is_finished(&self) -> bool {
        self.index >= self.total_samples
    }
}

/// Linear fixed-duration AR generator.
///
/// `init` layout: `[peak, duration_s, attack_s, decay_s]`.
///
/// Output rises 0 → peak over the attack, holds the peak, and falls back
/// to 0 over the decay; the peak is reached exactly at the attack/decay
/// boundary sample.
#[derive(Debug, Clone)]
pub struct EnvGen {
    timing: ArTiming,
    value: f32,
    attack_inc: f32,
    decay_inc: f32,
}

impl EnvGen {
    /// Create an idle generator; call `init` before use.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            timing: ArTiming::new(cfg),
            value: 0.0,
            attack_inc: 0.0,
            decay_inc: 0.0,
        }
    }

    /// Total duration in samples.
    pub fn total_samples(&self) -> u32 {
        self.timing.total_samples
    }

    /// Attack length in samples.
    pub fn attack_samples(&self) -> u32 {
        self.timing.attack_time
    }

    /// Decay length in samples.
    pub fn decay_samples(&self) -> u32 {
        self.timing.decay_time
    }

    /// Sample index at which the decay begins.
    pub fn decay_start(&self) -> u32 {
        self.timing.decay_start
    }
}

impl Generator for EnvGen {
    fn init(&mut self, params: &[f32]) {
        self.timing.set_params(params);
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.timing.reset(phase);
        self.attack_inc = if self.timing.attack_time > 0 {
            self.timing.peak / self.timing.attack_time as f32
        } else {
            0.0
        };
        self.decay_inc = if self.timing.decay_time > 0 {
            self.timing.peak / self.timing.decay_time as f32
        } else {
            0.0
        };
        if phase >= 0.0 {
            self.value = value_at_linear(&self.timing, self.timing.index);
        }
    }

    fn generate(&mut self) -> f32 {
        let t = &mut self.timing;
        if t.index >= t.total_samples {
            return 0.0;
        }
        let out = self.value;
        t.index += 1;
        if t.index < t.attack_time {
            self.value += self.attack_inc;
        } else if t.index == t.attack_time || t.index <= t.decay_start {
            // Land on the peak exactly at the boundary, hold through it.
            self.value = t.peak;
        } else {
            self.value -= self.decay_inc;
            if self.value < 0.0 || t.index >= t.total_samples {
                self.value = 0.0;
            }
        }
        out
    }

    fn is_finished(&self) -> bool {
        self.timing.is_finished()
    }
}

/// Linear level for an arbitrary re-arm position.
fn value_at_linear(t: &ArTiming, index: u32) -> f32 {
    if index >= t.total_samples {
        0.0
    } else if index < t.attack_time {
        t.peak * index as f32 / t.attack_time as f32
    } else if index <= t.decay_start {
        t.peak
    } else {
        t.peak * (t.total_samples - index) as f32 / t.decay_time.max(1) as f32
    }
}

/// Curved fixed-duration AR: geometric recurrence mapped through the
/// bias constant. `convex == true` accelerates into the boundary
/// (exponential); `false` is its time-mirror (logarithmic).
#[derive(Debug, Clone)]
struct CurvedAr {
    timing: ArTiming,
    convex: bool,
    state: f32,
    attack_ratio: f32,
    decay_ratio: f32,
    value: f32,
}

impl CurvedAr {
    fn new(cfg: Arc<EngineConfig>, convex: bool) -> Self {
        Self {
            timing: ArTiming::new(cfg),
            convex,
            state: ENV_BIAS,
            attack_ratio: 1.0,
            decay_ratio: 1.0,
            value: 0.0,
        }
    }

    fn reset(&mut self, phase: f32) {
        self.timing.reset(phase);
        let span = (1.0 + ENV_BIAS) / ENV_BIAS;
        self.attack_ratio = ratio_over(span, self.timing.attack_time);
        self.decay_ratio = ratio_over(span, self.timing.decay_time);
        if phase >= 0.0 {
            self.state = if self.convex { ENV_BIAS } else { 1.0 + ENV_BIAS };
            self.value = 0.0;
            // Re-arm positions inside the contour restart the recurrence
            // from the nearest boundary.
            if self.timing.index >= self.timing.attack_time {
                self.value = self.timing.peak;
            }
        }
    }

    fn generate(&mut self) -> f32 {
        let t = &mut self.timing;
        if t.index >= t.total_samples {
            return 0.0;
        }
        let out = self.value;
        t.index += 1;
        if t.index < t.attack_time {
            self.state = step(self.state, self.attack_ratio, self.convex);
            self.value = t.peak * frac(self.state, self.convex);
        } else if t.index == t.attack_time || t.index <= t.decay_start {
            self.value = t.peak;
            // Prime the decay recurrence the moment the hold region ends.
            if t.index == t.decay_start {
                self.state = if self.convex { ENV_BIAS } else { 1.0 + ENV_BIAS };
            }
        } else {
            self.state = step(self.state, self.decay_ratio, self.convex);
            self.value = t.peak * (1.0 - frac(self.state, self.convex));
            if t.index >= t.total_samples {
                self.value = 0.0;
            }
        }
        out
    }
}

/// Per-sample multiplier spanning `span` over `count` samples.
fn ratio_over(span: f32, count: u32) -> f32 {
    if count == 0 {
        span
    } else {
        powf(span, 1.0 / count as f32)
    }
}

/// One recurrence step: multiply toward 1+bias (convex) or divide back
/// toward the bias (its time-mirror).
#[inline]
fn step(state: f32, ratio: f32, convex: bool) -> f32 {
    if convex { state * ratio } else { state / ratio }
}

/// Map the biased state onto a 0..1 progress fraction.
#[inline]
fn frac(state: f32, convex: bool) -> f32 {
    if convex {
        state - ENV_BIAS
    } else {
        1.0 - (state - ENV_BIAS)
    }
}

/// Exponential (convex) fixed-duration AR generator.
///
/// `init` layout: `[peak, duration_s, attack_s, decay_s]`.
#[derive(Debug, Clone)]
pub struct EnvGenExp {
    inner: CurvedAr,
}

impl EnvGenExp {
    /// Create an idle generator; call `init` before use.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            inner: CurvedAr::new(cfg, true),
        }
    }
}

impl Generator for EnvGenExp {
    fn init(&mut self, params: &[f32]) {
        self.inner.timing.set_params(params);
        self.inner.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.inner.reset(phase);
    }

    fn generate(&mut self) -> f32 {
        self.inner.generate()
    }

    fn is_finished(&self) -> bool {
        self.inner.timing.is_finished()
    }
}

/// Logarithmic (concave) fixed-duration AR generator — the time-mirror
/// of [`EnvGenExp`].
///
/// `init` layout: `[peak, duration_s, attack_s, decay_s]`.
#[derive(Debug, Clone)]
pub struct EnvGenLog {
    inner: CurvedAr,
}

impl EnvGenLog {
    /// Create an idle generator; call `init` before use.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            inner: CurvedAr::new(cfg, false),
        }
    }
}

impl Generator for EnvGenLog {
    fn init(&mut self, params: &[f32]) {
        self.inner.timing.set_params(params);
        self.inner.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.inner.reset(phase);
    }

    fn generate(&mut self) -> f32 {
        self.inner.generate()
    }

    fn is_finished(&self) -> bool {
        self.inner.timing.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Arc<EngineConfig> {
        Arc::new(EngineConfig::new(44100.0, 16384))
    }

    #[test]
    fn reference_timing_at_44100() {
        let mut env = EnvGen::new(cfg());
        env.init(&[1.0, 1.0, 0.1, 0.2]);
        assert_eq!(env.total_samples(), 44100);
        assert_eq!(env.attack_samples(), 4410);
        assert_eq!(env.decay_samples(), 8820);
        assert_eq!(env.decay_start(), 35280);
    }

    #[test]
    fn reference_contour_at_44100() {
        let mut env = EnvGen::new(cfg());
        env.init(&[1.0, 1.0, 0.1, 0.2]);

        let mut last = -1.0f32;
        for n in 0..44100u32 {
            let v = env.generate();
            if n < 4410 {
                assert!(v >= last - 1e-6, "attack not monotonic at {n}");
            } else if n <= 35280 {
                assert!((v - 1.0).abs() < 1e-3, "hold broken at {n}: {v}");
            } else {
                assert!(v <= last + 1e-6, "decay not monotonic at {n}");
            }
            last = v;
        }
        assert!(env.is_finished());
        assert_eq!(env.generate(), 0.0);
    }

    #[test]
    fn peak_reached_exactly_at_attack_boundary() {
        let mut env = EnvGen::new(cfg());
        env.init(&[0.75, 1.0, 0.1, 0.2]);
        let mut v = 0.0;
        for _ in 0..=4410 {
            v = env.generate();
        }
        assert_eq!(v, 0.75, "peak must land exactly on the boundary");
    }

    #[test]
    fn attack_decay_clamped_symmetrically() {
        let mut env = EnvGen::new(cfg());
        // attack + decay = 1.5 s against a 1 s total: excess 0.5 s
        env.init(&[1.0, 1.0, 0.75, 0.75]);
        assert_eq!(
            env.attack_samples() + env.decay_samples(),
            env.total_samples()
        );
        // 0.25 s shaved off each side
        assert_eq!(env.attack_samples(), 22050);
        assert_eq!(env.decay_samples(), 22050);
    }

    #[test]
    fn exp_is_convex_log_is_concave() {
        let mut exp = EnvGenExp::new(cfg());
        let mut log = EnvGenLog::new(cfg());
        exp.init(&[1.0, 0.5, 0.25, 0.25]);
        log.init(&[1.0, 0.5, 0.25, 0.25]);

        // Halfway through the attack the convex curve is below the
        // linear midpoint, the concave curve above it.
        let half = 44100 / 8;
        let mut ve = 0.0;
        let mut vl = 0.0;
        for _ in 0..half {
            ve = exp.generate();
            vl = log.generate();
        }
        assert!(ve < 0.5, "exp attack midpoint {ve} should be under 0.5");
        assert!(vl > 0.5, "log attack midpoint {vl} should be over 0.5");
    }

    #[test]
    fn curved_variants_start_and_end_at_zero() {
        for log in [false, true] {
            let mut env: alloc::boxed::Box<dyn Generator> = if log {
                alloc::boxed::Box::new(EnvGenLog::new(cfg()))
            } else {
                alloc::boxed::Box::new(EnvGenExp::new(cfg()))
            };
            env.init(&[1.0, 0.1, 0.03, 0.05]);
            assert!(env.generate().abs() < 1e-6);
            let total = 4410;
            let mut last = 0.0;
            for _ in 0..total {
                last = env.generate();
            }
            assert!(env.is_finished());
            assert!(last.abs() < 0.05, "end level {last}");
        }
    }

    #[test]
    fn reset_negative_applies_params_in_place() {
        let mut env = EnvGen::new(cfg());
        env.init(&[1.0, 1.0, 0.1, 0.2]);
        for _ in 0..1000 {
            env.generate();
        }
        let pos = env.timing.index;
        env.timing.decay = 0.3;
        env.reset(-1.0);
        assert_eq!(env.timing.index, pos, "position must not move");
        assert_eq!(env.decay_samples(), 13230);
    }
}
