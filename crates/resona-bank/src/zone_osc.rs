//! Loop-aware sample playback bound to a resolved zone.
//!
//! A [`ZoneOscillator`] is initialized straight from a [`Zone`] and the
//! [`SampleData`] it references: the playback increment comes from the
//! ratio of the note frequency to the zone's recorded root frequency,
//! scaled by the ratio of the sample's native rate to the engine rate.
//! Reads are linear-interpolated; looping follows the zone's
//! [`LoopMode`].
//!
//! Unlike the pure oscillators, this generator can finish: a non-looping
//! voice (or an until-release loop after [`Release::release`]) reports
//! [`Generator::is_finished`] once it plays past the sample end.

use std::sync::Arc;

use resona_core::{EngineConfig, cents_to_ratio, midi_to_freq};
use resona_synth::{Generator, Release};

use crate::model::{LoopMode, SampleData, Zone};

/// Sample-playback oscillator initialized from an ingested zone.
#[derive(Debug, Clone)]
pub struct ZoneOscillator {
    cfg: Arc<EngineConfig>,
    sample: Arc<SampleData>,
    frequency: f32,
    root_freq: f32,
    position: f64,
    increment: f64,
    loop_start: f64,
    loop_end: f64,
    end: f64,
    loop_mode: LoopMode,
    attenuation: f32,
    released: bool,
}

impl ZoneOscillator {
    /// Bind an oscillator to a zone at the given note frequency.
    ///
    /// `skip_attack` starts playback directly at the loop-entry state, so
    /// a re-triggered sustained pad resumes without replaying its
    /// transient.
    pub fn from_zone(
        cfg: Arc<EngineConfig>,
        sample: Arc<SampleData>,
        zone: &Zone,
        frequency: f32,
        skip_attack: bool,
    ) -> Self {
        let root_key = zone.root_key.unwrap_or(sample.root_key);
        let root_freq =
            midi_to_freq(f32::from(root_key)) / cents_to_ratio(zone.tune_cents);
        let loop_start = if zone.loop_end > zone.loop_start {
            zone.loop_start
        } else {
            sample.loop_start
        };
        let loop_end = if zone.loop_end > zone.loop_start {
            zone.loop_end
        } else {
            sample.loop_end
        };

        let mut osc = Self {
            cfg,
            sample,
            frequency,
            root_freq,
            position: 0.0,
            increment: 0.0,
            loop_start: f64::from(loop_start),
            loop_end: f64::from(loop_end),
            end: 0.0,
            loop_mode: zone.loop_mode,
            attenuation: zone.attenuation,
            released: false,
        };
        osc.end = osc.sample.data.len() as f64;
        osc.reset(0.0);
        if skip_attack && osc.loop_end > osc.loop_start {
            osc.position = osc.loop_start;
        }
        osc
    }

    /// Staged note frequency; applied at the next `reset`.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.frequency = freq_hz;
    }

    /// Zone attenuation as linear gain, applied per sample.
    pub fn attenuation(&self) -> f32 {
        self.attenuation
    }

    /// Current read position in frames.
    pub fn position(&self) -> f64 {
        self.position
    }

    fn looping(&self) -> bool {
        match self.loop_mode {
            LoopMode::None => false,
            LoopMode::Continuous => true,
            LoopMode::UntilRelease => !self.released,
        }
    }

    #[inline]
    fn read(&self) -> f32 {
        let data = &self.sample.data;
        let idx = self.position as usize;
        if idx + 1 >= data.len() {
            return data.last().copied().unwrap_or(0.0);
        }
        let frac = (self.position - idx as f64) as f32;
        data[idx] + frac * (data[idx + 1] - data[idx])
    }
}

impl Generator for ZoneOscillator {
    /// `init` layout: `[frequency]`.
    fn init(&mut self, params: &[f32]) {
        if let Some(&f) = params.first() {
            self.frequency = f;
        }
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        let rate_ratio = f64::from(self.sample.sample_rate) / f64::from(self.cfg.sample_rate());
        let pitch_ratio = f64::from(self.frequency) / f64::from(self.root_freq);
        self.increment = pitch_ratio * rate_ratio;
        if phase >= 0.0 {
            self.position = f64::from(phase);
            self.released = false;
        }
    }

    fn generate(&mut self) -> f32 {
        if self.position >= self.end {
            return 0.0;
        }
        let out = self.read() * self.attenuation;
        self.position += self.increment;
        if self.looping() && self.loop_end > self.loop_start && self.position >= self.loop_end {
            let span = self.loop_end - self.loop_start;
            self.position = self.loop_start + (self.position - self.loop_end) % span;
        }
        out
    }

    fn is_finished(&self) -> bool {
        !self.looping() && self.position >= self.end
    }
}

impl Release for ZoneOscillator {
    /// End an until-release loop: playback continues past the loop point
    /// out to the sample end.
    fn release(&mut self) {
        self.released = true;
    }
}
