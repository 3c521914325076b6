//! Band-limited wavetables shared by the table-lookup oscillators.
//!
//! A [`WaveTableSet`] maps small integer IDs to amplitude tables of
//! `table_len + 1` samples. The extra guard sample equals sample 0, so an
//! oscillator that rounds or interpolates past the nominal last index never
//! reads out of bounds.
//!
//! The ten standard tables are built by Fourier summation with Lanczos
//! sigma factors to damp Gibbs ringing near the band edge. User tables are
//! registered through [`WaveTableSet::add_table`] and share the same
//! summation path.
//!
//! The set is owned for the process lifetime behind an `Arc`. Rebuilding
//! (e.g. for a new table length) means constructing a fresh set and
//! swapping the `Arc`; any oscillator still referencing the old set must
//! be dropped first.

use alloc::vec;
use alloc::vec::Vec;
use core::f32::consts::PI;
use libm::sinf;

/// One harmonic in a Fourier-summed table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    /// Harmonic number (1 = fundamental).
    pub number: u32,
    /// Relative amplitude; sign flips phase.
    pub amplitude: f32,
}

impl Partial {
    /// Convenience constructor.
    pub fn new(number: u32, amplitude: f32) -> Self {
        Self { number, amplitude }
    }
}

/// IDs of the ten standard tables.
///
/// The discriminants are stable: they double as `usize` indices into the
/// set, and user tables are appended after [`WaveId::Organ`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(usize)]
pub enum WaveId {
    /// Pure fundamental.
    #[default]
    Sine = 0,
    /// Sawtooth, 32 partials.
    Saw = 1,
    /// Square, odd partials through 31.
    Square = 2,
    /// Triangle, odd partials through 31.
    Triangle = 3,
    /// 25% duty pulse, 32 partials.
    Pulse = 4,
    /// Sawtooth, 8 partials. Duller, usable higher up the keyboard.
    SawSoft = 5,
    /// Square, odd partials through 7.
    SquareSoft = 6,
    /// Triangle, odd partials through 7.
    TriangleSoft = 7,
    /// 25% duty pulse, 8 partials.
    PulseSoft = 8,
    /// Drawbar-style mixture of harmonics 1, 2, 3, 4, 6, 8.
    Organ = 9,
}

impl WaveId {
    /// Number of standard tables.
    pub const COUNT: usize = 10;

    /// The table index for this ID.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The shared set of amplitude tables.
#[derive(Debug, Clone)]
pub struct WaveTableSet {
    table_len: usize,
    tables: Vec<Vec<f32>>,
}

impl Default for WaveTableSet {
    fn default() -> Self {
        Self::new(16384)
    }
}

impl WaveTableSet {
    /// Build the ten standard tables at the given length.
    ///
    /// `table_len` must match the companion
    /// [`EngineConfig`](crate::EngineConfig).
    pub fn new(table_len: usize) -> Self {
        let mut set = Self {
            table_len,
            tables: Vec::with_capacity(WaveId::COUNT),
        };

        // Sine
        set.push_table(&[Partial::new(1, 1.0)]);
        // Saw: 1/k over all partials
        set.push_table(&harmonic_series(32, false, saw_amp));
        // Square: 1/k over odd partials
        set.push_table(&harmonic_series(31, true, saw_amp));
        // Triangle: alternating 1/k^2 over odd partials
        set.push_table(&harmonic_series(31, true, triangle_amp));
        // Pulse, 25% duty: sin(k*pi*d)/k
        set.push_table(&harmonic_series(32, false, pulse_amp));
        // Soft variants
        set.push_table(&harmonic_series(8, false, saw_amp));
        set.push_table(&harmonic_series(7, true, saw_amp));
        set.push_table(&harmonic_series(7, true, triangle_amp));
        set.push_table(&harmonic_series(8, false, pulse_amp));
        // Organ mixture
        set.push_table(&[
            Partial::new(1, 1.0),
            Partial::new(2, 0.5),
            Partial::new(3, 0.25),
            Partial::new(4, 0.125),
            Partial::new(6, 0.0625),
            Partial::new(8, 0.03125),
        ]);

        set
    }

    /// Nominal table length (excluding the guard sample).
    #[inline]
    pub fn table_len(&self) -> usize {
        self.table_len
    }

    /// Number of tables, standard plus user-registered.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True if the set holds no tables (never the case after `new`).
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Register a user table built by Fourier summation; returns its ID.
    pub fn add_table(&mut self, partials: &[Partial]) -> usize {
        self.push_table(partials);
        self.tables.len() - 1
    }

    /// The amplitude slice for a table ID, `table_len + 1` samples long.
    ///
    /// An unknown ID falls back to sine rather than panicking in the audio
    /// path.
    #[inline]
    pub fn table(&self, id: usize) -> &[f32] {
        self.tables
            .get(id)
            .unwrap_or(&self.tables[WaveId::Sine.index()])
    }

    /// The amplitude slice for a standard table.
    #[inline]
    pub fn get(&self, id: WaveId) -> &[f32] {
        &self.tables[id.index()]
    }

    fn push_table(&mut self, partials: &[Partial]) {
        self.tables.push(fourier_table(self.table_len, partials));
    }
}

fn saw_amp(k: u32) -> f32 {
    1.0 / k as f32
}

fn triangle_amp(k: u32) -> f32 {
    // Odd harmonics alternate sign: +1, -1/9, +1/25, ...
    let sign = if (k / 2) % 2 == 0 { 1.0 } else { -1.0 };
    sign / (k * k) as f32
}

fn pulse_amp(k: u32) -> f32 {
    const DUTY: f32 = 0.25;
    sinf(k as f32 * PI * DUTY) / k as f32
}

/// Partials 1..=max (or odd only), amplitudes from `amp`.
fn harmonic_series(max: u32, odd_only: bool, amp: fn(u32) -> f32) -> Vec<Partial> {
    (1..=max)
        .filter(|k| !odd_only || k % 2 == 1)
        .map(|k| Partial::new(k, amp(k)))
        .collect()
}

/// Sum partials into a normalized table with guard sample.
///
/// Each partial is weighted by a Lanczos sigma factor against the highest
/// harmonic present, which damps the Gibbs overshoot at discontinuities.
/// The result is peak-normalized to 1 and carries `table[len] == table[0]`.
fn fourier_table(table_len: usize, partials: &[Partial]) -> Vec<f32> {
    let mut data = vec![0.0f32; table_len + 1];
    if partials.is_empty() {
        return data;
    }

    let max_harmonic = partials.iter().map(|p| p.number).max().unwrap_or(1);
    let phase_step = core::f32::consts::TAU / table_len as f32;

    for p in partials {
        let sigma = lanczos_sigma(p.number, max_harmonic);
        let amp = p.amplitude * sigma;
        for (n, slot) in data.iter_mut().take(table_len).enumerate() {
            *slot += amp * sinf(p.number as f32 * n as f32 * phase_step);
        }
    }

    let peak = data
        .iter()
        .take(table_len)
        .fold(0.0f32, |m, &v| if v.abs() > m { v.abs() } else { m });
    if peak > 0.0 {
        let scale = 1.0 / peak;
        for v in data.iter_mut().take(table_len) {
            *v *= scale;
        }
    }

    // Guard sample: safe rounded/interpolated reads past the last index.
    data[table_len] = data[0];
    data
}

/// Lanczos sigma for harmonic `k` of a series topping out at `max`.
fn lanczos_sigma(k: u32, max: u32) -> f32 {
    if max <= 1 || k == 0 {
        return 1.0;
    }
    let x = PI * k as f32 / (max + 1) as f32;
    sinf(x) / x
}
