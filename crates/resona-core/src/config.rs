//! Engine configuration — sample-rate-derived constants and lookup tables.
//!
//! [`EngineConfig`] is built once at startup and shared by `Arc` into every
//! generator constructor. All fields are private and immutable; changing the
//! sample rate or table length means building a new value and swapping the
//! `Arc` after every generator referencing the old one has been dropped.

use alloc::vec::Vec;
use core::f32::consts::TAU;
use libm::{powf, sinf, sqrtf};

/// Number of entries in each pan curve table.
pub const PAN_TABLE_LEN: usize = 4096;

/// MIDI key of A4 in the pitch table.
const A4_KEY: i32 = 69;
/// Reference tuning frequency for A4.
const A4_FREQ: f32 = 440.0;

/// Immutable engine-wide configuration.
///
/// Holds the sample rate, the nominal wavetable length, four precomputed
/// per-sample multipliers, the 128-entry equal-tempered pitch table, and the
/// two 4096-entry pan curve tables used by the table-based pan laws.
///
/// # Example
///
/// ```rust
/// use resona_core::EngineConfig;
///
/// let cfg = EngineConfig::new(48000.0, 16384);
/// // phase increment for a 440 Hz sine, in radians per sample
/// let inc = 440.0 * cfg.radians_per_sample();
/// assert!((inc - 440.0 * core::f32::consts::TAU / 48000.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    sample_rate: f32,
    sample_rate_int: u32,
    table_len: usize,
    radians_per_sample: f32,
    index_per_sample: f32,
    index_per_radian: f32,
    seconds_per_sample: f32,
    pitch_table: [f32; 128],
    pan_quarter_sine: Vec<f32>,
    pan_square_root: Vec<f32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(44100.0, 16384)
    }
}

impl EngineConfig {
    /// Build a configuration for the given sample rate and wavetable length.
    ///
    /// `table_len` must match the length the companion
    /// [`WaveTableSet`](crate::WaveTableSet) is built with.
    pub fn new(sample_rate: f32, table_len: usize) -> Self {
        let mut pitch_table = [0.0f32; 128];
        for (key, entry) in pitch_table.iter_mut().enumerate() {
            *entry = A4_FREQ * powf(2.0, (key as i32 - A4_KEY) as f32 / 12.0);
        }

        let last = (PAN_TABLE_LEN - 1) as f32;
        let mut pan_quarter_sine = Vec::with_capacity(PAN_TABLE_LEN);
        let mut pan_square_root = Vec::with_capacity(PAN_TABLE_LEN);
        for n in 0..PAN_TABLE_LEN {
            let x = n as f32 / last;
            pan_quarter_sine.push(sinf(x * core::f32::consts::FRAC_PI_2));
            pan_square_root.push(sqrtf(x));
        }

        Self {
            sample_rate,
            sample_rate_int: sample_rate as u32,
            table_len,
            radians_per_sample: TAU / sample_rate,
            index_per_sample: table_len as f32 / sample_rate,
            index_per_radian: table_len as f32 / TAU,
            seconds_per_sample: 1.0 / sample_rate,
            pitch_table,
            pan_quarter_sine,
            pan_square_root,
        }
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Sample rate as an integer, for counter-based generators.
    #[inline]
    pub fn sample_rate_int(&self) -> u32 {
        self.sample_rate_int
    }

    /// Nominal wavetable length (excluding the guard sample).
    #[inline]
    pub fn table_len(&self) -> usize {
        self.table_len
    }

    /// Radians of phase per sample for a 1 Hz signal.
    ///
    /// Multiply by a frequency in Hz to get a phase increment.
    #[inline]
    pub fn radians_per_sample(&self) -> f32 {
        self.radians_per_sample
    }

    /// Table-index units per sample for a 1 Hz signal.
    #[inline]
    pub fn index_per_sample(&self) -> f32 {
        self.index_per_sample
    }

    /// Table-index units per radian of phase.
    #[inline]
    pub fn index_per_radian(&self) -> f32 {
        self.index_per_radian
    }

    /// Duration of one sample in seconds.
    #[inline]
    pub fn seconds_per_sample(&self) -> f32 {
        self.seconds_per_sample
    }

    /// Equal-tempered frequency for a MIDI key, A4 (key 69) = 440 Hz.
    ///
    /// Keys outside 0..=127 clamp to the table ends.
    #[inline]
    pub fn frequency(&self, key: i32) -> f32 {
        let key = key.clamp(0, 127) as usize;
        self.pitch_table[key]
    }

    /// Quarter-sine pan gain for a table position in `0..PAN_TABLE_LEN`.
    ///
    /// Approximates constant-power panning without runtime trigonometry.
    #[inline]
    pub fn pan_quarter_sine(&self, index: usize) -> f32 {
        self.pan_quarter_sine[index.min(PAN_TABLE_LEN - 1)]
    }

    /// Square-root pan gain for a table position in `0..PAN_TABLE_LEN`.
    #[inline]
    pub fn pan_square_root(&self, index: usize) -> f32 {
        self.pan_square_root[index.min(PAN_TABLE_LEN - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipliers_derive_from_sample_rate() {
        let cfg = EngineConfig::new(48000.0, 8192);
        assert!((cfg.radians_per_sample() - TAU / 48000.0).abs() < 1e-9);
        assert!((cfg.index_per_sample() - 8192.0 / 48000.0).abs() < 1e-6);
        assert!((cfg.index_per_radian() - 8192.0 / TAU).abs() < 1e-3);
        assert!((cfg.seconds_per_sample() - 1.0 / 48000.0).abs() < 1e-12);
        assert_eq!(cfg.sample_rate_int(), 48000);
    }

    #[test]
    fn pitch_table_is_equal_tempered() {
        let cfg = EngineConfig::default();
        assert!((cfg.frequency(69) - 440.0).abs() < 1e-3);
        // One octave up doubles the frequency
        assert!((cfg.frequency(81) - 880.0).abs() < 1e-2);
        // Middle C
        assert!((cfg.frequency(60) - 261.6256).abs() < 1e-2);
    }

    #[test]
    fn pitch_lookup_clamps_out_of_range() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.frequency(-5), cfg.frequency(0));
        assert_eq!(cfg.frequency(500), cfg.frequency(127));
    }

    #[test]
    fn pan_tables_span_zero_to_one() {
        let cfg = EngineConfig::default();
        assert!(cfg.pan_quarter_sine(0).abs() < 1e-6);
        assert!((cfg.pan_quarter_sine(PAN_TABLE_LEN - 1) - 1.0).abs() < 1e-6);
        assert!(cfg.pan_square_root(0).abs() < 1e-6);
        assert!((cfg.pan_square_root(PAN_TABLE_LEN - 1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn pan_lookup_clamps_out_of_range() {
        let cfg = EngineConfig::default();
        assert_eq!(
            cfg.pan_quarter_sine(PAN_TABLE_LEN + 100),
            cfg.pan_quarter_sine(PAN_TABLE_LEN - 1)
        );
    }
}
