//! Sustain-capable segment envelopes.
//!
//! [`EnvGenSegSus`] adds a four-state machine to the segment chain: the
//! non-final segments run as the attack portion, the machine pauses ahead
//! of the designated release segment (the last one) while the note is
//! held, and [`Release::release`] jumps straight to the release segment
//! from anywhere — re-initialized from the current output value, so there
//! is no note-off latency and no level jump however far the attack or
//! decay had progressed.
//!
//! [`EnvGenAr`], [`EnvGenAdsr`] and [`EnvGenAdsrMul`] are thin
//! constructors over the same machine.

use alloc::sync::Arc;
use alloc::vec::Vec;
use resona_core::EngineConfig;

use super::def::{EnvDef, SegDef};
use super::segment::{CurveKind, Segment};
use crate::generator::{Generator, Release};

/// State of the sustain machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SusState {
    /// Running the non-final segments.
    #[default]
    Attack = 0,
    /// Paused at the designated release segment — indefinitely when
    /// sustain is on, auto-advancing when it is off.
    SustainWait = 1,
    /// Running the final segment.
    Release = 2,
    /// Release segment exhausted.
    Done = 3,
}

/// Segment-chain envelope with sustain and early release.
///
/// The last segment in the chain is the designated release segment; the
/// ones before it form the attack/decay portion.
///
/// `init` layout: `[start, sustain_flag, seg_count, (rate_s, level,
/// curve)…]` with curves encoded per [`CurveKind::from_param`].
#[derive(Debug, Clone)]
pub struct EnvGenSegSus {
    cfg: Arc<EngineConfig>,
    segments: Vec<Segment>,
    start: f32,
    sustain_on: bool,
    current: usize,
    state: SusState,
    value: f32,
}

impl EnvGenSegSus {
    /// Build a sustain envelope from explicit segments; the last one is
    /// the release segment.
    pub fn new(
        cfg: Arc<EngineConfig>,
        start: f32,
        sustain_on: bool,
        segments: Vec<Segment>,
    ) -> Self {
        let mut env = Self {
            cfg,
            segments,
            start,
            sustain_on,
            current: 0,
            state: SusState::Attack,
            value: start,
        };
        env.reset(0.0);
        env
    }

    /// Build the runtime generator from its value form.
    pub fn from_def(cfg: Arc<EngineConfig>, def: &EnvDef) -> Self {
        let mut level = def.start;
        let segments = def
            .segments
            .iter()
            .map(|s| {
                let seg = Segment::new(s.rate, level, s.level, s.curve);
                level = s.level;
                seg
            })
            .collect();
        Self::new(cfg, def.start, def.sustain, segments)
    }

    /// Capture the current configuration as a value object.
    pub fn definition(&self) -> EnvDef {
        EnvDef {
            start: self.start,
            sustain: self.sustain_on,
            segments: self
                .segments
                .iter()
                .map(|s| SegDef {
                    rate: s.rate(),
                    level: s.end(),
                    curve: s.curve(),
                })
                .collect(),
        }
    }

    /// Current machine state.
    pub fn state(&self) -> SusState {
        self.state
    }

    /// Current output level without advancing.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Whether the machine pauses before the release segment.
    pub fn sustain_on(&self) -> bool {
        self.sustain_on
    }

    fn release_index(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    fn enter_release(&mut self) {
        let idx = self.release_index();
        let seed = self.value;
        if let Some(seg) = self.segments.get_mut(idx) {
            seg.init(&self.cfg, seed);
        }
        self.current = idx;
        self.state = SusState::Release;
    }
}

impl Generator for EnvGenSegSus {
    fn init(&mut self, params: &[f32]) {
        let mut it = params.iter().copied();
        self.start = it.next().unwrap_or(0.0);
        self.sustain_on = it.next().unwrap_or(0.0) != 0.0;
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
            if self.segments.len() <= 1 {
                // Release-only chain: nothing to run before the wait.
                self.state = SusState::SustainWait;
            } else {
                self.state = SusState::Attack;
                if let Some(seg) = self.segments.first_mut() {
                    seg.init(&self.cfg, self.start);
                }
            }
        } else if let Some(seg) = self.segments.get_mut(self.current) {
            seg.retime(&self.cfg);
        }
    }

    fn generate(&mut self) -> f32 {
        match self.state {
            SusState::Attack => {
                let release_index = self.release_index();
                let Some(seg) = self.segments.get_mut(self.current) else {
                    return self.value;
                };
                let out = seg.generate();
                self.value = seg.value();
                if seg.is_finished() {
                    self.current += 1;
                    if self.current >= release_index {
                        self.state = SusState::SustainWait;
                        if !self.sustain_on {
                            self.enter_release();
                        }
                    } else {
                        let seed = self.value;
                        self.segments[self.current].init(&self.cfg, seed);
                    }
                }
                out
            }
            SusState::SustainWait => self.value,
            SusState::Release => {
                let idx = self.release_index();
                let Some(seg) = self.segments.get_mut(idx) else {
                    self.state = SusState::Done;
                    return self.value;
                };
                let out = seg.generate();
                self.value = seg.value();
                if seg.is_finished() {
                    self.state = SusState::Done;
                }
                out
            }
            SusState::Done => self.value,
        }
    }

    fn is_finished(&self) -> bool {
        self.state == SusState::Done
    }
}

impl Release for EnvGenSegSus {
    /// Jump to the release segment from attack or sustain-wait; the
    /// release is re-initialized from the current output value regardless
    /// of how far the earlier segments had progressed.
    fn release(&mut self) {
        if matches!(self.state, SusState::Attack | SusState::SustainWait) {
            self.enter_release();
        }
    }
}

/// Attack/release sustain envelope: one attack segment, a sustain wait,
/// one release segment.
#[derive(Debug, Clone)]
pub struct EnvGenAr {
    inner: EnvGenSegSus,
}

impl EnvGenAr {
    /// Rise to `peak` over `attack_s`, hold while the note sounds, fall
    /// to zero over `release_s`.
    pub fn new(
        cfg: Arc<EngineConfig>,
        attack_s: f32,
        peak: f32,
        release_s: f32,
        curve: CurveKind,
    ) -> Self {
        let segments = alloc::vec![
            Segment::new(attack_s, 0.0, peak, curve),
            Segment::new(release_s, peak, 0.0, curve),
        ];
        Self {
            inner: EnvGenSegSus::new(cfg, 0.0, true, segments),
        }
    }

    /// Current machine state.
    pub fn state(&self) -> SusState {
        self.inner.state()
    }
}

impl Generator for EnvGenAr {
    fn init(&mut self, params: &[f32]) {
        self.inner.init(params);
    }

    fn reset(&mut self, phase: f32) {
        self.inner.reset(phase);
    }

    fn generate(&mut self) -> f32 {
        self.inner.generate()
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Release for EnvGenAr {
    fn release(&mut self) {
        self.inner.release();
    }
}

/// Attack/decay/sustain/release envelope over the sustain machine.
#[derive(Debug, Clone)]
pub struct EnvGenAdsr {
    inner: EnvGenSegSus,
}

impl EnvGenAdsr {
    /// Classic four-phase shape: rise to `peak`, decay to
    /// `sustain_level`, hold, release to `end_level`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: Arc<EngineConfig>,
        attack_s: f32,
        peak: f32,
        decay_s: f32,
        sustain_level: f32,
        release_s: f32,
        end_level: f32,
        curve: CurveKind,
    ) -> Self {
        let segments = alloc::vec![
            Segment::new(attack_s, 0.0, peak, curve),
            Segment::new(decay_s, peak, sustain_level, curve),
            Segment::new(release_s, sustain_level, end_level, curve),
        ];
        Self {
            inner: EnvGenSegSus::new(cfg, 0.0, true, segments),
        }
    }

    /// Current machine state.
    pub fn state(&self) -> SusState {
        self.inner.state()
    }

    /// Current output level without advancing.
    pub fn value(&self) -> f32 {
        self.inner.value()
    }
}

impl Generator for EnvGenAdsr {
    fn init(&mut self, params: &[f32]) {
        self.inner.init(params);
    }

    fn reset(&mut self, phase: f32) {
        self.inner.reset(phase);
    }

    fn generate(&mut self) -> f32 {
        self.inner.generate()
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Release for EnvGenAdsr {
    fn release(&mut self) {
        self.inner.release();
    }
}

/// ADSR with a run of chained decay segments between attack and sustain.
///
/// `init` layout:
/// `[peak, attack_s, curve, n_decay, (rate_s, level)×n_decay, <pad>,
/// release_s, end_level]`.
///
/// The slot after the final decay pair is skipped before the release rate
/// is read; existing parameter blocks pad that slot. Pinned by a
/// regression test — do not re-pack the layout.
#[derive(Debug, Clone)]
pub struct EnvGenAdsrMul {
    inner: EnvGenSegSus,
}

impl EnvGenAdsrMul {
    /// Create an empty multi-decay envelope; call `init` before use.
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            inner: EnvGenSegSus::new(cfg, 0.0, true, Vec::new()),
        }
    }

    /// Current machine state.
    pub fn state(&self) -> SusState {
        self.inner.state()
    }

    /// Number of segments after `init` (attack + decays + release).
    pub fn segment_count(&self) -> usize {
        self.inner.segments.len()
    }

    /// Target level of segment `idx`.
    pub fn segment_level(&self, idx: usize) -> f32 {
        self.inner.segments[idx].end()
    }

    /// Duration in seconds of segment `idx`.
    pub fn segment_rate(&self, idx: usize) -> f32 {
        self.inner.segments[idx].rate()
    }
}

impl Generator for EnvGenAdsrMul {
    fn init(&mut self, params: &[f32]) {
        let get = |i: usize| params.get(i).copied().unwrap_or(0.0);
        let peak = get(0);
        let attack = get(1);
        let curve = CurveKind::from_param(get(2));
        let n_decay = get(3) as usize;

        let mut segments = Vec::with_capacity(n_decay + 2);
        segments.push(Segment::new(attack, 0.0, peak, curve));
        let mut level = peak;
        let mut pos = 4;
        for _ in 0..n_decay {
            let rate = get(pos);
            let end = get(pos + 1);
            segments.push(Segment::new(rate, level, end, curve));
            level = end;
            pos += 2;
        }
        // The slot at `pos` is dead: the reader advances past it before
        // taking the release pair. Callers pad it.
        pos += 1;
        let release = get(pos);
        let end_level = get(pos + 1);
        segments.push(Segment::new(release, level, end_level, curve));

        self.inner.segments = segments;
        self.inner.start = 0.0;
        self.inner.sustain_on = true;
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.inner.reset(phase);
    }

    fn generate(&mut self) -> f32 {
        self.inner.generate()
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Release for EnvGenAdsrMul {
    fn release(&mut self) {
        self.inner.release();
    }
}
