//! Capability traits shared by every signal generator.
//!
//! The original surface is split into three traits at the seams where the
//! operations actually differ: every generator runs the [`Generator`]
//! contract; only oscillators can be frequency- or phase-modulated
//! ([`FreqModulate`]); only sustain-capable envelopes and loop-aware sample
//! players can be released early ([`Release`]).

/// Core per-sample generator contract.
///
/// Configuration follows a positional convention: [`init`](Generator::init)
/// takes an ordered list of floating-point values whose meaning is
/// documented per type. This lets file- or script-driven setups configure a
/// generator without per-field binding. Missing trailing values fall back
/// to each type's defaults.
pub trait Generator {
    /// Set generator-specific values from an ordered, positional list.
    fn init(&mut self, params: &[f32]);

    /// Recompute derived per-sample state from the currently set
    /// parameters.
    ///
    /// `phase >= 0.0` re-arms the generator at that phase (radians for
    /// oscillators, the start of the cycle for envelopes). `phase < 0.0`
    /// applies changed parameters without moving the current position —
    /// for oscillators this is how a new frequency takes effect without a
    /// mid-cycle discontinuity: setters alone are inert until `reset`.
    fn reset(&mut self, phase: f32);

    /// Produce the next sample (oscillators) or amplitude multiplier
    /// (envelopes).
    fn generate(&mut self) -> f32;

    /// Whether the owning voice may be retired.
    ///
    /// Oscillators never self-terminate and always return `true`; the
    /// envelope decides when a voice ends.
    fn is_finished(&self) -> bool;
}

/// Frequency- and phase-modulation capability (oscillators only).
pub trait FreqModulate: Generator {
    /// Add `delta_hz` to the set frequency and recompute the phase
    /// increment immediately (frequency modulation).
    fn modulate(&mut self, delta_hz: f32);

    /// Add a phase offset in radians to the running phase and re-normalize.
    ///
    /// Normalization loops, so offsets of arbitrarily many periods land on
    /// the correct phase, not just offsets within one period.
    fn phase_modulate(&mut self, offset: f32);
}

/// Early-release capability (sustain envelopes, zone oscillators).
pub trait Release: Generator {
    /// Force the transition into the release phase from wherever the
    /// generator currently is.
    fn release(&mut self);
}
