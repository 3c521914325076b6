//! Per-voice channel accumulation, panning, and shared effect buses.
//!
//! Voices deposit their samples into mixer input channels as they
//! generate; once per block the caller drains everything with
//! [`Mixer::out`]. Effect buses hold one externally supplied processor
//! each ([`Effect`]) and one send level per input channel, so a single
//! reverb can serve every sounding voice instead of being duplicated
//! per voice.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use resona_core::{Effect, EngineConfig, PAN_TABLE_LEN};

/// Pan law selecting how a pan position maps to left/right gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanLaw {
    /// Plain crossfade; cheap, dips −6 dB at center.
    #[default]
    Linear,
    /// Quarter-sine table lookup — approximates constant-power panning.
    QuarterSine,
    /// Square-root table lookup.
    SquareRoot,
}

/// Maps a pan position in `[-1, 1]` to independent left/right gains.
///
/// The table laws read the precomputed [`EngineConfig`] curves, keeping
/// trigonometry out of the per-sample path.
#[derive(Debug, Clone)]
pub struct Panner {
    cfg: Arc<EngineConfig>,
    law: PanLaw,
    pan: f32,
    left: f32,
    right: f32,
}

impl Panner {
    /// Centered panner with the given law.
    pub fn new(cfg: Arc<EngineConfig>, law: PanLaw) -> Self {
        let mut p = Self {
            cfg,
            law,
            pan: 0.0,
            left: 0.5,
            right: 0.5,
        };
        p.set(law, 0.0);
        p
    }

    /// Set law and pan position in one call.
    pub fn set(&mut self, law: PanLaw, pan: f32) {
        self.law = law;
        self.set_pan(pan);
    }

    /// Set the pan position, −1 hard left to +1 hard right.
    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
        let frac = (self.pan + 1.0) * 0.5;
        match self.law {
            PanLaw::Linear => {
                self.right = frac;
                self.left = 1.0 - frac;
            }
            PanLaw::QuarterSine => {
                let idx = (frac * (PAN_TABLE_LEN - 1) as f32) as usize;
                self.right = self.cfg.pan_quarter_sine(idx);
                self.left = self.cfg.pan_quarter_sine(PAN_TABLE_LEN - 1 - idx);
            }
            PanLaw::SquareRoot => {
                let idx = (frac * (PAN_TABLE_LEN - 1) as f32) as usize;
                self.right = self.cfg.pan_square_root(idx);
                self.left = self.cfg.pan_square_root(PAN_TABLE_LEN - 1 - idx);
            }
        }
    }

    /// Current pan position.
    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Left gain.
    #[inline]
    pub fn left(&self) -> f32 {
        self.left
    }

    /// Right gain.
    #[inline]
    pub fn right(&self) -> f32 {
        self.right
    }
}

/// One mixer input channel: a running left/right sum for the current
/// block.
#[derive(Debug, Clone)]
struct MixChannel {
    on: bool,
    volume: f32,
    panner: Panner,
    left: f32,
    right: f32,
}

impl MixChannel {
    fn new(cfg: Arc<EngineConfig>) -> Self {
        Self {
            on: true,
            volume: 1.0,
            panner: Panner::new(cfg, PanLaw::Linear),
            left: 0.0,
            right: 0.0,
        }
    }

    /// Panned mono input, already scaled by the channel volume and gains.
    #[inline]
    fn input(&mut self, sample: f32) {
        let s = sample * self.volume;
        self.left += s * self.panner.left();
        self.right += s * self.panner.right();
    }

    /// Unpanned stereo bypass for instruments that computed their own
    /// image.
    #[inline]
    fn input2(&mut self, left: f32, right: f32) {
        self.left += left * self.volume;
        self.right += right * self.volume;
    }

    fn clear(&mut self) {
        self.left = 0.0;
        self.right = 0.0;
    }
}

/// An effect bus: a wrapped processor, per-channel send levels, and an
/// accumulator drained through the effect once per block.
struct FxChannel {
    effect: Box<dyn Effect>,
    sends: Vec<f32>,
    accum: f32,
    volume: f32,
    panner: Panner,
}

impl FxChannel {
    fn new(cfg: Arc<EngineConfig>, effect: Box<dyn Effect>, channels: usize) -> Self {
        let mut sends = Vec::with_capacity(channels);
        sends.resize(channels, 0.0);
        Self {
            effect,
            sends,
            accum: 0.0,
            volume: 1.0,
            panner: Panner::new(cfg, PanLaw::Linear),
        }
    }

    /// Accumulate a scaled contribution from an input channel.
    #[inline]
    fn fx_in(&mut self, channel: usize, sample: f32) {
        self.accum += sample * self.sends[channel];
    }

    /// Run the accumulated sum through the effect and pan the result.
    #[inline]
    fn fx_out(&mut self) -> (f32, f32) {
        let wet = self.effect.process(self.accum) * self.volume;
        self.accum = 0.0;
        (wet * self.panner.left(), wet * self.panner.right())
    }
}

impl core::fmt::Debug for FxChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FxChannel")
            .field("sends", &self.sends)
            .field("accum", &self.accum)
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}

/// The mixer: N input channels, M effect buses, master volume.
#[derive(Debug)]
pub struct Mixer {
    cfg: Arc<EngineConfig>,
    channels: Vec<MixChannel>,
    fx: Vec<FxChannel>,
    left_volume: f32,
    right_volume: f32,
}

impl Mixer {
    /// A mixer with `channels` inputs and no effect buses.
    pub fn new(cfg: Arc<EngineConfig>, channels: usize) -> Self {
        let chans = (0..channels).map(|_| MixChannel::new(cfg.clone())).collect();
        Self {
            cfg,
            channels: chans,
            fx: Vec::new(),
            left_volume: 1.0,
            right_volume: 1.0,
        }
    }

    /// Number of input channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of effect buses.
    pub fn fx_count(&self) -> usize {
        self.fx.len()
    }

    /// Master output volume per side.
    pub fn set_master_volume(&mut self, left: f32, right: f32) {
        self.left_volume = left;
        self.right_volume = right;
    }

    /// Enable or disable a channel; disabled channels are skipped by
    /// [`Mixer::out`] but still accumulate input.
    pub fn set_channel_on(&mut self, channel: usize, on: bool) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.on = on;
        }
    }

    /// Per-channel volume.
    pub fn set_channel_volume(&mut self, channel: usize, volume: f32) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.volume = volume;
        }
    }

    /// Per-channel pan law and position.
    pub fn set_channel_pan(&mut self, channel: usize, law: PanLaw, pan: f32) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.panner.set(law, pan);
        }
    }

    /// Install an effect bus; returns its index.
    pub fn add_fx(&mut self, effect: Box<dyn Effect>) -> usize {
        let channels = self.channels.len();
        self.fx
            .push(FxChannel::new(self.cfg.clone(), effect, channels));
        self.fx.len() - 1
    }

    /// Send level from an input channel into an effect bus.
    pub fn set_fx_send(&mut self, fx: usize, channel: usize, level: f32) {
        if let Some(bus) = self.fx.get_mut(fx) {
            if let Some(send) = bus.sends.get_mut(channel) {
                *send = level;
            }
        }
    }

    /// Effect bus output volume.
    pub fn set_fx_volume(&mut self, fx: usize, volume: f32) {
        if let Some(bus) = self.fx.get_mut(fx) {
            bus.volume = volume;
        }
    }

    /// Effect bus pan law and position.
    pub fn set_fx_pan(&mut self, fx: usize, law: PanLaw, pan: f32) {
        if let Some(bus) = self.fx.get_mut(fx) {
            bus.panner.set(law, pan);
        }
    }

    /// Deposit one panned mono sample into a channel, and into every
    /// effect bus at that channel's send level.
    #[inline]
    pub fn channel_in(&mut self, channel: usize, sample: f32) {
        let Some(ch) = self.channels.get_mut(channel) else {
            return;
        };
        ch.input(sample);
        for bus in &mut self.fx {
            bus.fx_in(channel, sample);
        }
    }

    /// Deposit an already-imaged stereo pair, bypassing the channel
    /// panner. Effect sends still take the mono sum of the pair.
    #[inline]
    pub fn channel_in2(&mut self, channel: usize, left: f32, right: f32) {
        let Some(ch) = self.channels.get_mut(channel) else {
            return;
        };
        ch.input2(left, right);
        let mono = (left + right) * 0.5;
        for bus in &mut self.fx {
            bus.fx_in(channel, mono);
        }
    }

    /// Drain the block: sum every enabled channel, run every effect bus,
    /// apply the master volume, and return `(left, right)`.
    pub fn out(&mut self) -> (f32, f32) {
        let mut left = 0.0;
        let mut right = 0.0;
        for ch in &mut self.channels {
            if ch.on {
                left += ch.left;
                right += ch.right;
            }
            ch.clear();
        }
        for bus in &mut self.fx {
            let (l, r) = bus.fx_out();
            left += l;
            right += r;
        }
        (left * self.left_volume, right * self.right_volume)
    }

    /// Zero all per-block state and clear every effect's internal memory
    /// (reverb tails and the like).
    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.clear();
        }
        for bus in &mut self.fx {
            bus.accum = 0.0;
            bus.effect.reset();
        }
    }
}
