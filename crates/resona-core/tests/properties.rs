//! Property-based tests for resona-core conversions and tables.

use proptest::prelude::*;
use resona_core::{
    EngineConfig, Partial, WaveTableSet, cents_to_ratio, centibels_to_linear, db_to_linear,
    linear_to_db, seconds_to_time_cents, time_cents_to_seconds,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// seconds -> time cents -> seconds is the identity within relative error.
    #[test]
    fn time_cents_round_trip(secs in 0.0005f32..30.0) {
        let back = time_cents_to_seconds(seconds_to_time_cents(secs));
        prop_assert!((back - secs).abs() < secs * 1e-3,
            "round trip {secs} -> {back}");
    }

    /// dB -> linear -> dB is the identity within absolute error.
    #[test]
    fn db_round_trip(db in -90.0f32..24.0) {
        let back = linear_to_db(db_to_linear(db));
        prop_assert!((back - db).abs() < 1e-2, "round trip {db} -> {back}");
    }

    /// Attenuation in centibels is always a gain in (0, 1] for cb >= 0.
    #[test]
    fn centibels_attenuate(cb in 0.0f32..1440.0) {
        let lin = centibels_to_linear(cb);
        prop_assert!(lin > 0.0 && lin <= 1.0 + 1e-6, "cb {cb} gave {lin}");
    }

    /// A cents offset and its negation are reciprocal frequency ratios.
    #[test]
    fn cents_ratio_reciprocal(cents in -4800.0f32..4800.0) {
        let r = cents_to_ratio(cents) * cents_to_ratio(-cents);
        prop_assert!((r - 1.0).abs() < 1e-3, "cents {cents} product {r}");
    }

    /// Pitch table frequency doubles every 12 keys.
    #[test]
    fn pitch_table_octaves(key in 0i32..116) {
        let cfg = EngineConfig::default();
        let ratio = cfg.frequency(key + 12) / cfg.frequency(key);
        prop_assert!((ratio - 2.0).abs() < 1e-3, "key {key} ratio {ratio}");
    }

    /// The guard-sample invariant holds for arbitrary user tables.
    #[test]
    fn user_table_guard_sample(
        harmonics in prop::collection::vec((1u32..64, -1.0f32..1.0), 1..8)
    ) {
        let mut set = WaveTableSet::new(1024);
        let partials: Vec<Partial> = harmonics
            .iter()
            .map(|&(n, a)| Partial::new(n, a))
            .collect();
        let id = set.add_table(&partials);
        let t = set.table(id);
        prop_assert_eq!(t.len(), 1025);
        prop_assert_eq!(t[1024], t[0]);
    }
}
