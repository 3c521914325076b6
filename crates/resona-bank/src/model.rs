//! The shared, playback-ready instrument model.
//!
//! Both loaders converge on this shape: a [`SoundBank`] owning
//! [`Instrument`]s, each a list of key/velocity-scoped [`Zone`]s that
//! reference shared [`SampleData`] buffers. All zone parameters are in
//! engine-native units — seconds, linear amplitude, Hz — with the
//! format-specific log units already converted at load time.
//!
//! One decoded sample buffer is reused by every simultaneous voice of its
//! instrument, so buffers live behind `Arc`. A loaded bank itself is
//! shared behind one coarse `RwLock` ([`SharedSoundBank`]): loaders and
//! editors take the write lock, playback takes read locks. There is no
//! finer-grained locking.

use std::sync::{Arc, RwLock};

/// How a zone's sample loops during playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play through once; the voice ends at the sample end.
    #[default]
    None,
    /// Loop the loop region for as long as the voice sounds.
    Continuous,
    /// Loop until release, then play out to the sample end.
    UntilRelease,
}

/// A decoded PCM sample shared by every voice that plays it.
#[derive(Debug, Clone)]
pub struct SampleData {
    /// Display name from the bank file.
    pub name: String,
    /// Normalized mono samples in −1..1.
    pub data: Vec<f32>,
    /// Native rate the sample was recorded at, in Hz.
    pub sample_rate: f32,
    /// Loop start in sample frames.
    pub loop_start: u32,
    /// Loop end in sample frames (exclusive).
    pub loop_end: u32,
    /// MIDI key the recording is pitched at.
    pub root_key: u8,
    /// Fine tune correction in cents.
    pub fine_tune: i8,
}

/// Volume envelope parameters in engine-native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvParams {
    /// Delay before the attack, seconds.
    pub delay: f32,
    /// Attack time, seconds.
    pub attack: f32,
    /// Hold time at peak, seconds.
    pub hold: f32,
    /// Decay time toward sustain, seconds.
    pub decay: f32,
    /// Sustain level, linear amplitude.
    pub sustain: f32,
    /// Release time, seconds.
    pub release: f32,
}

impl Default for EnvParams {
    fn default() -> Self {
        Self {
            delay: 0.0,
            attack: 0.001,
            hold: 0.0,
            decay: 0.001,
            sustain: 1.0,
            release: 0.001,
        }
    }
}

/// A key+velocity-scoped bundle of sample reference, loop data, and
/// converted articulation parameters.
#[derive(Debug, Clone)]
pub struct Zone {
    /// Lowest MIDI key this zone answers.
    pub key_low: u8,
    /// Highest MIDI key this zone answers.
    pub key_high: u8,
    /// Lowest velocity this zone answers.
    pub vel_low: u8,
    /// Highest velocity this zone answers.
    pub vel_high: u8,
    /// Index into [`SoundBank::samples`].
    pub sample: usize,
    /// Root key override; the sample's own root when `None`.
    pub root_key: Option<u8>,
    /// Tuning correction in cents (coarse + fine combined).
    pub tune_cents: f32,
    /// Loop behavior.
    pub loop_mode: LoopMode,
    /// Loop start override in frames.
    pub loop_start: u32,
    /// Loop end override in frames (exclusive).
    pub loop_end: u32,
    /// Attenuation as linear amplitude. Deliberately unclamped: an
    /// out-of-range value in the file plays loud, it does not get
    /// "corrected".
    pub attenuation: f32,
    /// Pan position −1..1.
    pub pan: f32,
    /// Volume envelope in engine-native units.
    pub vol_env: EnvParams,
}

impl Zone {
    /// Whether this zone answers the given key and velocity.
    pub fn matches(&self, key: u8, velocity: u8) -> bool {
        (self.key_low..=self.key_high).contains(&key)
            && (self.vel_low..=self.vel_high).contains(&velocity)
    }
}

/// One playable instrument: a MIDI locale plus its zones.
#[derive(Debug, Clone)]
pub struct Instrument {
    /// Bank number (128 for drum kits).
    pub bank: u16,
    /// Program number within the bank.
    pub program: u8,
    /// Whether the locale marked this a percussion instrument.
    pub is_drum: bool,
    /// Display name.
    pub name: String,
    /// Zones in file order; first match wins on lookup.
    pub zones: Vec<Zone>,
}

impl Instrument {
    /// The first zone matching a key and velocity.
    pub fn zone_for(&self, key: u8, velocity: u8) -> Option<&Zone> {
        self.zones.iter().find(|z| z.matches(key, velocity))
    }
}

/// A loaded sound bank: instruments plus the sample pool they share.
#[derive(Debug, Clone, Default)]
pub struct SoundBank {
    /// Bank display name from the file's INFO data.
    pub name: String,
    /// All instruments, in file order.
    pub instruments: Vec<Instrument>,
    /// Decoded sample pool referenced by zone index.
    pub samples: Vec<Arc<SampleData>>,
}

/// A bank behind its coarse whole-bank lock.
pub type SharedSoundBank = Arc<RwLock<SoundBank>>;

impl SoundBank {
    /// Find an instrument by bank and program number.
    pub fn instrument(&self, bank: u16, program: u8) -> Option<&Instrument> {
        self.instruments
            .iter()
            .find(|i| i.bank == bank && i.program == program)
    }

    /// The sample a zone references.
    pub fn sample(&self, zone: &Zone) -> Option<&Arc<SampleData>> {
        self.samples.get(zone.sample)
    }

    /// Wrap the bank in its coarse lock for sharing with playback.
    ///
    /// Mutation (reloading, editing) takes the write half; every voice
    /// reading zones and samples takes read locks. The lock brackets
    /// whole load/edit operations — there is no per-instrument locking.
    pub fn into_shared(self) -> SharedSoundBank {
        Arc::new(RwLock::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_zone(key_low: u8, key_high: u8, vel_low: u8, vel_high: u8) -> Zone {
        Zone {
            key_low,
            key_high,
            vel_low,
            vel_high,
            sample: 0,
            root_key: None,
            tune_cents: 0.0,
            loop_mode: LoopMode::None,
            loop_start: 0,
            loop_end: 0,
            attenuation: 1.0,
            pan: 0.0,
            vol_env: EnvParams::default(),
        }
    }

    #[test]
    fn zone_matching_is_inclusive() {
        let z = test_zone(60, 72, 0, 127);
        assert!(z.matches(60, 64));
        assert!(z.matches(72, 0));
        assert!(!z.matches(59, 64));
        assert!(!z.matches(73, 64));
    }

    #[test]
    fn velocity_range_filters() {
        let z = test_zone(0, 127, 64, 127);
        assert!(!z.matches(60, 63));
        assert!(z.matches(60, 64));
    }

    #[test]
    fn first_matching_zone_wins() {
        let inst = Instrument {
            bank: 0,
            program: 0,
            is_drum: false,
            name: String::new(),
            zones: vec![test_zone(0, 127, 0, 127), test_zone(60, 60, 0, 127)],
        };
        let z = inst.zone_for(60, 100).unwrap();
        assert_eq!(z.key_high, 127, "earlier zone must win");
    }

    #[test]
    fn instrument_lookup_by_locale() {
        let bank = SoundBank {
            name: "t".into(),
            instruments: vec![
                Instrument {
                    bank: 0,
                    program: 0,
                    is_drum: false,
                    name: "piano".into(),
                    zones: vec![],
                },
                Instrument {
                    bank: 128,
                    program: 0,
                    is_drum: true,
                    name: "drums".into(),
                    zones: vec![],
                },
            ],
            samples: vec![],
        };
        assert_eq!(bank.instrument(0, 0).unwrap().name, "piano");
        assert_eq!(bank.instrument(128, 0).unwrap().name, "drums");
        assert!(bank.instrument(1, 0).is_none());
    }

    #[test]
    fn shared_bank_locks_for_read_and_write() {
        let shared = SoundBank::default().into_shared();
        {
            let mut w = shared.write().unwrap();
            w.name = "loaded".into();
        }
        let r1 = shared.read().unwrap();
        let r2 = shared.read().unwrap();
        assert_eq!(r1.name, "loaded");
        assert_eq!(r2.name, "loaded");
    }
}
