//! Unit conversions between sound-bank formats and engine-native values.
//!
//! The two supported container formats measure time and level in
//! incompatible logarithmic units:
//!
//! | Unit | Used by | Engine-native form |
//! |------|---------|--------------------|
//! | time cents (`1200·log2(seconds)`) | SF2 generators | seconds |
//! | 16.16 fixed-point time cents | DLS `art1` scale | seconds |
//! | centibels of attenuation | SF2 | linear amplitude |
//! | 1/65536 dB gain | DLS `wsmp`/`art1` | linear amplitude |
//! | 16.16 fixed-point 0.1% units | DLS sustain level | 0..1 fraction |
//!
//! Both formats converge, through these functions, on the same
//! engine-native fields (seconds, linear amplitude, Hz) consumed by the
//! envelope and oscillator generators. Loaders must route every conversion
//! through here rather than inlining the formulas.
//!
//! None of these functions clamp: an out-of-range attenuation or pitch in a
//! bank file propagates to extreme-but-defined output instead of being
//! silently corrected.

use libm::{exp2f, expf, log2f, logf};

/// Convert SF2 time cents to seconds: `2^(tc/1200)`.
///
/// # Example
/// ```rust
/// use resona_core::time_cents_to_seconds;
///
/// assert!((time_cents_to_seconds(0.0) - 1.0).abs() < 1e-6);
/// assert!((time_cents_to_seconds(-1200.0) - 0.5).abs() < 1e-6);
/// assert!((time_cents_to_seconds(1200.0) - 2.0).abs() < 1e-6);
/// ```
#[inline]
pub fn time_cents_to_seconds(tc: f32) -> f32 {
    exp2f(tc / 1200.0)
}

/// Convert seconds to time cents: `1200·log2(seconds)`.
#[inline]
pub fn seconds_to_time_cents(seconds: f32) -> f32 {
    1200.0 * log2f(seconds)
}

/// Convert a DLS 32-bit articulation time scale (16.16 fixed-point time
/// cents) to seconds.
///
/// The special value `i32::MIN` (0x8000_0000) encodes "instantaneous" and
/// maps to zero seconds.
#[inline]
pub fn dls_time_to_seconds(lscale: i32) -> f32 {
    if lscale == i32::MIN {
        return 0.0;
    }
    time_cents_to_seconds(lscale as f32 / 65536.0)
}

/// Convert a DLS relative gain (1/65536 dB units) to linear amplitude.
#[inline]
pub fn dls_gain_to_linear(lscale: i32) -> f32 {
    db_to_linear(lscale as f32 / 65536.0)
}

/// Convert a DLS 16.16 fixed-point 0.1% value to a 0..1 fraction.
///
/// DLS expresses sustain levels as a percentage in 0.1% units; 100% arrives
/// as `1000 << 16`.
#[inline]
pub fn dls_percent(lscale: i32) -> f32 {
    lscale as f32 / 65536.0 / 1000.0
}

/// Convert SF2 centibels of attenuation to linear amplitude: `10^(-cb/200)`.
///
/// # Example
/// ```rust
/// use resona_core::centibels_to_linear;
///
/// assert!((centibels_to_linear(0.0) - 1.0).abs() < 1e-6);
/// // 60 dB of attenuation
/// assert!((centibels_to_linear(600.0) - 0.001).abs() < 1e-6);
/// ```
#[inline]
pub fn centibels_to_linear(cb: f32) -> f32 {
    exp2f(-cb / 200.0 * core::f32::consts::LOG2_10)
}

/// Convert a pitch offset in cents to a frequency ratio: `2^(cents/1200)`.
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    exp2f(cents / 1200.0)
}

/// Convert decibels to linear gain.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Equal-tempered frequency for a MIDI key, without an
/// [`EngineConfig`](crate::EngineConfig) in hand. A4 (key 69) = 440 Hz.
#[inline]
pub fn midi_to_freq(key: f32) -> f32 {
    440.0 * exp2f((key - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_cents_round_trip() {
        for &secs in &[0.001f32, 0.25, 1.0, 4.0, 20.0] {
            let tc = seconds_to_time_cents(secs);
            assert!(
                (time_cents_to_seconds(tc) - secs).abs() < secs * 1e-4,
                "round trip failed for {secs}"
            );
        }
    }

    #[test]
    fn dls_time_fixed_point() {
        // 0 time cents -> 1 second
        assert!((dls_time_to_seconds(0) - 1.0).abs() < 1e-6);
        // -1200 tc in 16.16 -> 0.5 s
        assert!((dls_time_to_seconds(-1200 << 16) - 0.5).abs() < 1e-6);
        // sentinel -> instantaneous
        assert_eq!(dls_time_to_seconds(i32::MIN), 0.0);
    }

    #[test]
    fn dls_gain_fixed_point() {
        assert!((dls_gain_to_linear(0) - 1.0).abs() < 1e-6);
        // -6.02 dB is half amplitude
        let half = dls_gain_to_linear((-6.02f32 * 65536.0) as i32);
        assert!((half - 0.5).abs() < 1e-3);
    }

    #[test]
    fn dls_percent_full_scale() {
        assert!((dls_percent(1000 << 16) - 1.0).abs() < 1e-6);
        assert!((dls_percent(500 << 16) - 0.5).abs() < 1e-6);
        assert_eq!(dls_percent(0), 0.0);
    }

    #[test]
    fn centibels_attenuation() {
        assert!((centibels_to_linear(0.0) - 1.0).abs() < 1e-6);
        // 200 cb = 20 dB = 0.1 amplitude
        assert!((centibels_to_linear(200.0) - 0.1).abs() < 1e-5);
    }

    #[test]
    fn cents_ratio_octave() {
        assert!((cents_to_ratio(1200.0) - 2.0).abs() < 1e-5);
        assert!((cents_to_ratio(-1200.0) - 0.5).abs() < 1e-5);
        assert!((cents_to_ratio(0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn db_linear_round_trip() {
        for &db in &[-60.0f32, -6.0, 0.0, 6.0, 12.0] {
            let lin = db_to_linear(db);
            assert!((linear_to_db(lin) - db).abs() < 1e-3, "failed at {db} dB");
        }
    }

    #[test]
    fn midi_to_freq_reference_points() {
        assert!((midi_to_freq(69.0) - 440.0).abs() < 1e-3);
        assert!((midi_to_freq(57.0) - 220.0).abs() < 1e-3);
    }
}
