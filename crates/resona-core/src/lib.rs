//! Resona Core - shared engine state for the resona synthesis framework
//!
//! This crate provides the process-wide values every generator is built
//! against, plus the unit conversions the sound-bank loaders and envelope
//! generators share.
//!
//! # Core Components
//!
//! ## Engine Configuration
//!
//! [`EngineConfig`] is an immutable bundle of sample-rate-derived constants,
//! the equal-tempered pitch table, and the precomputed pan curves. It is
//! built once at startup and shared by `Arc` into every generator:
//!
//! ```rust
//! use resona_core::EngineConfig;
//! extern crate alloc;
//! use alloc::sync::Arc;
//!
//! let cfg = Arc::new(EngineConfig::new(44100.0, 16384));
//! assert_eq!(cfg.sample_rate(), 44100.0);
//! assert!((cfg.frequency(69) - 440.0).abs() < 1e-3);
//! ```
//!
//! Reconfiguration means building a new `EngineConfig` and swapping the
//! `Arc` — never in-place mutation. Every generator holding the old value
//! must be dropped first; there is no hazard detection.
//!
//! ## Wavetables
//!
//! [`WaveTableSet`] holds the band-limited amplitude tables used by the
//! table-lookup oscillators. Ten standard shapes are built by Fourier
//! summation with Gibbs correction; user tables can be registered on top.
//! Every table carries a guard sample equal to sample 0 so rounded and
//! interpolated reads past the nominal last index stay in bounds.
//!
//! ## Unit Conversions
//!
//! The sound-bank formats use logarithmic units (time cents, centibels,
//! fixed-point dB) that must be reconciled into engine-native seconds and
//! linear amplitude. All conversions live in [`units`] — loaders must never
//! duplicate them ad hoc.
//!
//! ## Effect Capability
//!
//! [`Effect`] is the object-safe trait the mixer's effect buses wrap
//! (reverb, flanger, …): per-sample `process`, plus `reset` to clear
//! internal memory such as reverb tails.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! resona-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod config;
pub mod effect;
pub mod units;
pub mod wavetable;

pub use config::{EngineConfig, PAN_TABLE_LEN};
pub use effect::Effect;
pub use units::{
    centibels_to_linear, cents_to_ratio, db_to_linear, dls_gain_to_linear, dls_percent,
    dls_time_to_seconds, linear_to_db, midi_to_freq, seconds_to_time_cents, time_cents_to_seconds,
};
pub use wavetable::{Partial, WaveId, WaveTableSet};
