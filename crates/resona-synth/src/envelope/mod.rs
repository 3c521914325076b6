//! Envelope generators.
//!
//! Four families, all speaking the [`Generator`](crate::Generator)
//! contract and returning an amplitude multiplier per sample:
//!
//! - [`EnvGen`]/[`EnvGenExp`]/[`EnvGenLog`] — fixed-duration
//!   attack/release ramps with no sustain, for one-shot events.
//! - [`EnvGenSeg`] — an ordered chain of [`Segment`]s, each with its own
//!   rate and curve, run start to finish.
//! - [`EnvGenSegSus`] — the segment chain plus a sustain/release state
//!   machine, with [`EnvGenAr`]/[`EnvGenAdsr`]/[`EnvGenAdsrMul`]
//!   specializations on top.
//! - [`EnvGenSF`] — the six-stage delay/attack/hold/decay/sustain/release
//!   generator driven by sound-bank articulation data.
//!
//! [`EnvDef`] is the pure value form of an envelope — what gets persisted
//! or copied between voices — distinct from the stateful runtime
//! generators that execute it.
//!
//! Exponential and logarithmic curves share one bias constant
//! ([`ENV_BIAS`]) that keeps the geometric recurrences off their
//! unreachable asymptotes at zero and at the peak.

mod ar;
mod def;
mod segment;
mod soundfont;
mod sustain;

pub use ar::{EnvGen, EnvGenExp, EnvGenLog};
pub use def::{EnvDef, SegDef};
pub use segment::{CurveKind, EnvGenSeg, Segment};
pub use soundfont::{EnvGenSF, SfStage};
pub use sustain::{EnvGenAdsr, EnvGenAdsrMul, EnvGenAr, EnvGenSegSus, SusState};

/// Bias keeping exp/log recurrences away from their asymptotes.
///
/// A pure geometric ramp can never reach 0 or the peak exactly; offsetting
/// the curve by this amount and renormalizing makes both endpoints
/// reachable in a finite sample count.
pub const ENV_BIAS: f32 = 0.2;
