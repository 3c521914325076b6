//! Envelope segments and the plain segment-chain generator.

use alloc::sync::Arc;
use alloc::vec::Vec;
use libm::powf;
use resona_core::EngineConfig;
use serde::{Deserialize, Serialize};

use super::ENV_BIAS;
use crate::generator::Generator;

/// Curve shape of one envelope segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveKind {
    /// Constant increment per sample.
    #[default]
    Linear,
    /// Convex: geometric recurrence accelerating into the end level.
    Exponential,
    /// Concave: the time-mirror of [`CurveKind::Exponential`] — same
    /// recurrence with the start/end roles swapped.
    Logarithmic,
    /// Hold the start level for the segment duration. Used by the
    /// sustain state machine to mark the wait point.
    Sustain,
}

impl CurveKind {
    /// Decode a positional parameter value; unknown values are linear.
    pub fn from_param(value: f32) -> Self {
        match value as i32 {
            1 => CurveKind::Exponential,
            2 => CurveKind::Logarithmic,
            3 => CurveKind::Sustain,
            _ => CurveKind::Linear,
        }
    }

    /// Encode for a positional parameter list.
    pub fn to_param(self) -> f32 {
        match self {
            CurveKind::Linear => 0.0,
            CurveKind::Exponential => 1.0,
            CurveKind::Logarithmic => 2.0,
            CurveKind::Sustain => 3.0,
        }
    }
}

/// One envelope segment: run from `start` to `end` over `rate` seconds
/// along a [`CurveKind`].
///
/// `init` converts the rate to a sample count against the engine sample
/// rate. Linear segments add a constant increment each sample; exp/log
/// segments multiply a bias-offset state by a precomputed geometric ratio
/// — one shared formula, with the roles of start and end swapped between
/// the two, so log is exactly the time-mirror of exp.
#[derive(Debug, Clone)]
pub struct Segment {
    rate: f32,
    start: f32,
    end: f32,
    curve: CurveKind,
    count: u32,
    index: u32,
    value: f32,
    incr: f32,
    ratio: f32,
    state: f32,
}

impl Segment {
    /// Describe a segment; it is inert until [`Segment::init`] runs.
    pub fn new(rate: f32, start: f32, end: f32, curve: CurveKind) -> Self {
        Self {
            rate,
            start,
            end,
            curve,
            count: 0,
            index: 0,
            value: start,
            incr: 0.0,
            ratio: 1.0,
            state: ENV_BIAS,
        }
    }

    /// Segment duration in seconds.
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Target level.
    pub fn end(&self) -> f32 {
        self.end
    }

    /// Configured start level (before any seeding override).
    pub fn start(&self) -> f32 {
        self.start
    }

    /// Curve shape.
    pub fn curve(&self) -> CurveKind {
        self.curve
    }

    /// Current output level.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Arm the segment, overriding the start level with `start` — the
    /// chain seeds each segment with the previous segment's final output
    /// so transitions stay continuous.
    pub fn init(&mut self, cfg: &EngineConfig, start: f32) {
        self.start = start;
        self.count = (libm::roundf(self.rate * cfg.sample_rate()) as u32).max(1);
        self.index = 0;
        self.value = start;
        let range = self.end - self.start;
        match self.curve {
            CurveKind::Linear => {
                self.incr = range / self.count as f32;
            }
            CurveKind::Sustain => {
                self.incr = 0.0;
            }
            CurveKind::Exponential => {
                self.state = ENV_BIAS;
                self.ratio = span_ratio(self.count);
            }
            CurveKind::Logarithmic => {
                self.state = 1.0 + ENV_BIAS;
                self.ratio = 1.0 / span_ratio(self.count);
            }
        }
    }

    /// Apply a changed rate without moving the current position: the
    /// remaining distance to `end` is re-spread over the new remaining
    /// sample count.
    pub fn retime(&mut self, cfg: &EngineConfig) {
        let new_count = (libm::roundf(self.rate * cfg.sample_rate()) as u32).max(1);
        let done = self.index.min(new_count);
        let remaining = (new_count - done).max(1);
        self.count = new_count;
        self.index = done;
        match self.curve {
            CurveKind::Linear => {
                self.incr = (self.end - self.value) / remaining as f32;
            }
            CurveKind::Sustain => {}
            CurveKind::Exponential => {
                // Re-derive the biased state from the current level and
                // re-span the recurrence over what is left.
                let range = self.end - self.start;
                let frac = if range.abs() > 1e-9 {
                    (self.value - self.start) / range
                } else {
                    1.0
                };
                self.state = frac + ENV_BIAS;
                self.ratio = powf((1.0 + ENV_BIAS) / self.state, 1.0 / remaining as f32);
            }
            CurveKind::Logarithmic => {
                let range = self.end - self.start;
                let frac = if range.abs() > 1e-9 {
                    (self.value - self.start) / range
                } else {
                    1.0
                };
                self.state = (1.0 - frac) + ENV_BIAS;
                self.ratio = powf(ENV_BIAS / self.state, 1.0 / remaining as f32);
            }
        }
    }

    /// Produce the current level, then advance one sample.
    pub fn generate(&mut self) -> f32 {
        let out = self.value;
        if self.index < self.count {
            self.index += 1;
            match self.curve {
                CurveKind::Linear => self.value += self.incr,
                CurveKind::Sustain => {}
                CurveKind::Exponential => {
                    self.state *= self.ratio;
                    let range = self.end - self.start;
                    self.value = self.start + range * (self.state - ENV_BIAS);
                }
                CurveKind::Logarithmic => {
                    self.state *= self.ratio;
                    let range = self.end - self.start;
                    self.value = self.start + range * (1.0 - (self.state - ENV_BIAS));
                }
            }
            if self.index >= self.count && self.curve != CurveKind::Sustain {
                // Land on the target exactly.
                self.value = self.end;
            }
        }
        out
    }

    /// All samples consumed.
    pub fn is_finished(&self) -> bool {
        self.index >= self.count
    }
}

/// Ratio spanning bias → 1+bias over `count` multiplications.
fn span_ratio(count: u32) -> f32 {
    powf((1.0 + ENV_BIAS) / ENV_BIAS, 1.0 / count.max(1) as f32)
}

/// A chain of segments run in order.
///
/// When the active segment finishes, the next one is armed seeded with the
/// *current* output value as its start level — whatever the next segment's
/// configured start was. That seeding is what keeps the output continuous
/// across segment boundaries even when levels were edited mid-note.
///
/// `init` layout: `[start, seg_count, (rate_s, level, curve)…]` with
/// curves encoded per [`CurveKind::from_param`].
#[derive(Debug, Clone)]
pub struct EnvGenSeg {
    cfg: Arc<EngineConfig>,
    segments: Vec<Segment>,
    start: f32,
    current: usize,
    value: f32,
}

impl EnvGenSeg {
    /// Build a chain from explicit segments.
    pub fn new(cfg: Arc<EngineConfig>, start: f32, segments: Vec<Segment>) -> Self {
        let mut env = Self {
            cfg,
            segments,
            start,
            current: 0,
            value: start,
        };
        env.reset(0.0);
        env
    }

    /// Number of segments in the chain.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Chain start level.
    pub fn start_level(&self) -> f32 {
        self.start
    }

    /// Read-only view of the segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Current output level without advancing.
    pub fn value(&self) -> f32 {
        self.value
    }
}

impl Generator for EnvGenSeg {
    fn init(&mut self, params: &[f32]) {
        let mut it = params.iter().copied();
        self.start = it.next().unwrap_or(0.0);
        let count = it.next().unwrap_or(0.0) as usize;
        self.segments.clear();
        let mut level = self.start;
        for _ in 0..count {
            let rate = it.next().unwrap_or(0.0);
            let end = it.next().unwrap_or(0.0);
            let curve = CurveKind::from_param(it.next().unwrap_or(0.0));
            self.segments.push(Segment::new(rate, level, end, curve));
            level = end;
        }
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        if phase >= 0.0 {
            self.current = 0;
            self.value = self.start;
            if let Some(seg) = self.segments.first_mut() {
                seg.init(&self.cfg, self.start);
            }
        } else if let Some(seg) = self.segments.get_mut(self.current) {
            seg.retime(&self.cfg);
        }
    }

    fn generate(&mut self) -> f32 {
        let Some(seg) = self.segments.get_mut(self.current) else {
            return self.value;
        };
        let out = seg.generate();
        self.value = seg.value();
        if seg.is_finished() {
            self.current += 1;
            let seed = self.value;
            if let Some(next) = self.segments.get_mut(self.current) {
                next.init(&self.cfg, seed);
            }
        }
        out
    }

    fn is_finished(&self) -> bool {
        self.current >= self.segments.len()
    }
}
