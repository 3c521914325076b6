//! Resona Synth - signal generators for the resona synthesis framework
//!
//! This crate provides the per-voice building blocks: oscillators,
//! envelope generators, and the mixer that combines voices into a stereo
//! output with shared effect buses.
//!
//! # Core Components
//!
//! ## Generator contract
//!
//! Every generator implements [`Generator`]: positional [`init`], phase
//! [`reset`], per-sample [`generate`], and [`is_finished`] for voice
//! retirement. Oscillators add [`FreqModulate`]; sustain-capable
//! envelopes add [`Release`].
//!
//! [`init`]: Generator::init
//! [`reset`]: Generator::reset
//! [`generate`]: Generator::generate
//! [`is_finished`]: Generator::is_finished
//!
//! ## Oscillators
//!
//! Direct-calculation ([`SineOsc`], [`SawOsc`], [`TriangleOsc`],
//! [`SquareOsc`], [`FastSquareOsc`]) and table-lookup ([`WaveOsc`],
//! [`WaveOscInterp`], [`WaveOscFixed`]) families:
//!
//! ```rust
//! use resona_synth::{Generator, SineOsc};
//! use resona_core::EngineConfig;
//! extern crate alloc;
//! use alloc::sync::Arc;
//!
//! let cfg = Arc::new(EngineConfig::new(48000.0, 16384));
//! let mut osc = SineOsc::new(cfg);
//! osc.init(&[440.0]);
//! let sample = osc.generate();
//! ```
//!
//! ## Envelopes
//!
//! Fixed-duration AR ramps, segment chains with sustain/release state
//! machines, and the six-stage SoundFont generator:
//!
//! ```rust
//! use resona_synth::{CurveKind, EnvGenAdsr, Generator, Release};
//! use resona_core::EngineConfig;
//! extern crate alloc;
//! use alloc::sync::Arc;
//!
//! let cfg = Arc::new(EngineConfig::new(48000.0, 16384));
//! let mut env = EnvGenAdsr::new(cfg, 0.01, 1.0, 0.1, 0.7, 0.3, 0.0,
//!     CurveKind::Exponential);
//! let level = env.generate();
//! env.release(); // note off
//! ```
//!
//! ## Mixer
//!
//! [`Mixer`] accumulates per-voice channel input, pans it through one of
//! three [`PanLaw`]s, feeds shared [`Effect`](resona_core::Effect) buses,
//! and drains to a stereo pair per block with [`Mixer::out`].
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! resona-synth = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod envelope;
pub mod generator;
pub mod mixer;
pub mod oscillator;
pub mod wave_osc;

// Re-export main types at crate root
pub use envelope::{
    CurveKind, ENV_BIAS, EnvDef, EnvGen, EnvGenAdsr, EnvGenAdsrMul, EnvGenAr, EnvGenExp,
    EnvGenLog, EnvGenSF, EnvGenSeg, EnvGenSegSus, SegDef, Segment, SfStage, SusState,
};
pub use generator::{FreqModulate, Generator, Release};
pub use mixer::{Mixer, PanLaw, Panner};
pub use oscillator::{FastSquareOsc, SawOsc, SineOsc, SquareOsc, TriangleOsc};
pub use wave_osc::{MAX_FIXED_TABLE_LEN, WaveOsc, WaveOscFixed, WaveOscInterp};
