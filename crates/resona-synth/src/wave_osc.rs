//! Table-lookup oscillators.
//!
//! These oscillators measure phase in table-length units rather than
//! radians: the increment is `frequency * table_len / sample_rate`
//! ([`EngineConfig::index_per_sample`]), and phase arguments in radians are
//! converted through [`EngineConfig::index_per_radian`]. The guard sample
//! every [`WaveTableSet`] table carries makes rounded and interpolated
//! reads at the table boundary safe without a branch.
//!
//! Three variants trade speed against quality:
//!
//! | Type | Read | Notes |
//! |------|------|-------|
//! | [`WaveOsc`] | nearest sample | fastest float variant |
//! | [`WaveOscInterp`] | linear interpolation | better for short tables |
//! | [`WaveOscFixed`] | nearest, 16.16 fixed index | fastest; caps table length |

use alloc::sync::Arc;
use resona_core::{EngineConfig, WaveTableSet};

use crate::generator::{FreqModulate, Generator};

/// Largest table length addressable by [`WaveOscFixed`].
///
/// The 16.16 index keeps the integer part in 14 bits so `index << 16`
/// stays inside `i32` with headroom for one wrap.
pub const MAX_FIXED_TABLE_LEN: usize = 16384;

/// State shared by the float-indexed table oscillators.
#[derive(Debug, Clone)]
struct TableIndex {
    cfg: Arc<EngineConfig>,
    tables: Arc<WaveTableSet>,
    table_id: usize,
    frequency: f32,
    index: f32,
    index_inc: f32,
}

impl TableIndex {
    fn new(cfg: Arc<EngineConfig>, tables: Arc<WaveTableSet>) -> Self {
        let index_inc = 440.0 * cfg.index_per_sample();
        Self {
            cfg,
            tables,
            table_id: 0,
            frequency: 440.0,
            index: 0.0,
            index_inc,
        }
    }

    fn init(&mut self, params: &[f32]) {
        if let Some(&f) = params.first() {
            self.frequency = f;
        }
        if let Some(&id) = params.get(1) {
            self.table_id = id as usize;
        }
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.index_inc = self.frequency * self.cfg.index_per_sample();
        if phase >= 0.0 {
            self.index = self.wrap(phase * self.cfg.index_per_radian());
        }
    }

    fn modulate(&mut self, delta_hz: f32) {
        self.index_inc = (self.frequency + delta_hz) * self.cfg.index_per_sample();
    }

    fn phase_modulate(&mut self, offset: f32) {
        self.index = self.wrap(self.index + offset * self.cfg.index_per_radian());
    }

    /// Wrap an index into `[0, table_len)`, looping for large offsets.
    fn wrap(&self, mut index: f32) -> f32 {
        let len = self.tables.table_len() as f32;
        while index >= len {
            index -= len;
        }
        while index < 0.0 {
            index += len;
        }
        index
    }

    /// Return the current index, then advance one sample.
    #[inline]
    fn advance(&mut self) -> f32 {
        let i = self.index;
        self.index += self.index_inc;
        let len = self.tables.table_len() as f32;
        while self.index >= len {
            self.index -= len;
        }
        i
    }
}

macro_rules! table_osc_common {
    () => {
        /// Staged frequency in Hz. Takes effect at the next `reset` call.
        pub fn set_frequency(&mut self, freq_hz: f32) {
            self.state.frequency = freq_hz;
        }

        /// Currently set frequency in Hz.
        pub fn frequency(&self) -> f32 {
            self.state.frequency
        }

        /// Select the wavetable to read. Unknown IDs fall back to sine.
        pub fn set_table(&mut self, table_id: usize) {
            self.state.table_id = table_id;
        }

        /// Current position in table-index units.
        pub fn index(&self) -> f32 {
            self.state.index
        }
    };
}

/// Nearest-sample table oscillator — rounds the index and reads one
/// sample. The fastest float variant; quality depends on table length.
///
/// `init` layout: `[frequency, table_id]`.
#[derive(Debug, Clone)]
pub struct WaveOsc {
    state: TableIndex,
}

impl WaveOsc {
    /// Create an oscillator over the given table set, at 440 Hz on sine.
    pub fn new(cfg: Arc<EngineConfig>, tables: Arc<WaveTableSet>) -> Self {
        Self {
            state: TableIndex::new(cfg, tables),
        }
    }

    table_osc_common!();
}

impl Generator for WaveOsc {
    fn init(&mut self, params: &[f32]) {
        self.state.init(params);
    }

    fn reset(&mut self, phase: f32) {
        self.state.reset(phase);
    }

    #[inline]
    fn generate(&mut self) -> f32 {
        let index = self.state.advance();
        let table = self.state.tables.table(self.state.table_id);
        // Rounding may land on table_len; the guard sample covers it.
        table[(index + 0.5) as usize]
    }

    fn is_finished(&self) -> bool {
        true
    }
}

impl FreqModulate for WaveOsc {
    fn modulate(&mut self, delta_hz: f32) {
        self.state.modulate(delta_hz);
    }

    fn phase_modulate(&mut self, offset: f32) {
        self.state.phase_modulate(offset);
    }
}

/// Linear-interpolating table oscillator.
///
/// Reads the two samples bracketing the fractional index and blends.
/// Worth the extra cost on short tables, where rounding error is audible.
///
/// `init` layout: `[frequency, table_id]`.
#[derive(Debug, Clone)]
pub struct WaveOscInterp {
    state: TableIndex,
}

impl WaveOscInterp {
    /// Create an oscillator over the given table set, at 440 Hz on sine.
    pub fn new(cfg: Arc<EngineConfig>, tables: Arc<WaveTableSet>) -> Self {
        Self {
            state: TableIndex::new(cfg, tables),
        }
    }

    table_osc_common!();
}

impl Generator for WaveOscInterp {
    fn init(&mut self, params: &[f32]) {
        self.state.init(params);
    }

    fn reset(&mut self, phase: f32) {
        self.state.reset(phase);
    }

    #[inline]
    fn generate(&mut self) -> f32 {
        let index = self.state.advance();
        let table = self.state.tables.table(self.state.table_id);
        let i = index as usize;
        let frac = index - i as f32;
        // i + 1 may be table_len; the guard sample covers it.
        table[i] + frac * (table[i + 1] - table[i])
    }

    fn is_finished(&self) -> bool {
        true
    }
}

impl FreqModulate for WaveOscInterp {
    fn modulate(&mut self, delta_hz: f32) {
        self.state.modulate(delta_hz);
    }

    fn phase_modulate(&mut self, offset: f32) {
        self.state.phase_modulate(offset);
    }
}

/// Fixed-point table oscillator — 16.16 index arithmetic, nearest read.
///
/// The fastest variant: the inner loop is an integer add, compare and
/// shift. Two documented limits follow from the 32-bit index:
///
/// - table length must not exceed [`MAX_FIXED_TABLE_LEN`] entries;
/// - phase-modulation offsets must stay within ±half the table length,
///   or the offset arithmetic overflows.
///
/// `init` layout: `[frequency, table_id]`.
#[derive(Debug, Clone)]
pub struct WaveOscFixed {
    cfg: Arc<EngineConfig>,
    tables: Arc<WaveTableSet>,
    table_id: usize,
    frequency: f32,
    index: i32,
    index_inc: i32,
    table_len_fx: i32,
}

impl WaveOscFixed {
    /// Create an oscillator over the given table set, at 440 Hz on sine.
    ///
    /// The table set's length must be at most [`MAX_FIXED_TABLE_LEN`].
    pub fn new(cfg: Arc<EngineConfig>, tables: Arc<WaveTableSet>) -> Self {
        debug_assert!(tables.table_len() <= MAX_FIXED_TABLE_LEN);
        let table_len_fx = (tables.table_len() as i32) << 16;
        let index_inc = Self::to_fixed(440.0 * cfg.index_per_sample());
        Self {
            cfg,
            tables,
            table_id: 0,
            frequency: 440.0,
            index: 0,
            index_inc,
            table_len_fx,
        }
    }

    /// Staged frequency in Hz. Takes effect at the next `reset` call.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.frequency = freq_hz;
    }

    /// Currently set frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Select the wavetable to read. Unknown IDs fall back to sine.
    pub fn set_table(&mut self, table_id: usize) {
        self.table_id = table_id;
    }

    /// Current position in table-index units.
    pub fn index(&self) -> f32 {
        self.index as f32 / 65536.0
    }

    #[inline]
    fn to_fixed(value: f32) -> i32 {
        (value * 65536.0) as i32
    }

    fn wrap(&self, mut index: i32) -> i32 {
        while index >= self.table_len_fx {
            index -= self.table_len_fx;
        }
        while index < 0 {
            index += self.table_len_fx;
        }
        index
    }
}

impl Generator for WaveOscFixed {
    fn init(&mut self, params: &[f32]) {
        if let Some(&f) = params.first() {
            self.frequency = f;
        }
        if let Some(&id) = params.get(1) {
            self.table_id = id as usize;
        }
        self.reset(0.0);
    }

    fn reset(&mut self, phase: f32) {
        self.index_inc = Self::to_fixed(self.frequency * self.cfg.index_per_sample());
        if phase >= 0.0 {
            self.index = self.wrap(Self::to_fixed(phase * self.cfg.index_per_radian()));
        }
    }

    #[inline]
    fn generate(&mut self) -> f32 {
        let table = self.tables.table(self.table_id);
        // Round to nearest by adding half before the shift.
        let pos = ((self.index + 0x8000) >> 16) as usize;
        let out = table[pos];
        self.index += self.index_inc;
        if self.index >= self.table_len_fx {
            self.index -= self.table_len_fx;
        }
        out
    }

    fn is_finished(&self) -> bool {
        true
    }
}

impl FreqModulate for WaveOscFixed {
    fn modulate(&mut self, delta_hz: f32) {
        self.index_inc = Self::to_fixed((self.frequency + delta_hz) * self.cfg.index_per_sample());
    }

    /// Offsets beyond ±half the table length overflow the fixed index;
    /// callers must keep modulation depth inside that bound.
    fn phase_modulate(&mut self, offset: f32) {
        let delta = Self::to_fixed(offset * self.cfg.index_per_radian());
        self.index = self.wrap(self.index + delta);
    }
}
