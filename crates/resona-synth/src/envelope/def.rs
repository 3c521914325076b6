//! Envelope definitions — the value form of an envelope.
//!
//! An [`EnvDef`] carries everything needed to rebuild a segment envelope:
//! start level, sustain flag, and the ordered segment descriptors. It is
//! what gets persisted, sent over a wire, or copied from one voice onto
//! another — distinct from the stateful runtime generators
//! ([`EnvGenSeg`](super::EnvGenSeg), [`EnvGenSegSus`](super::EnvGenSegSus))
//! that execute it.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use super::segment::CurveKind;

/// One segment descriptor: duration, target level, curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegDef {
    /// Duration in seconds.
    pub rate: f32,
    /// Level at the segment end.
    pub level: f32,
    /// Curve shape.
    pub curve: CurveKind,
}

/// A complete envelope description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvDef {
    /// Output level before the first segment runs.
    pub start: f32,
    /// Pause ahead of the final (release) segment while the note is held.
    pub sustain: bool,
    /// Ordered segment descriptors.
    pub segments: Vec<SegDef>,
}

impl EnvDef {
    /// An empty definition with the given start level and sustain flag.
    pub fn new(start: f32, sustain: bool) -> Self {
        Self {
            start,
            sustain,
            segments: Vec::new(),
        }
    }

    /// Append a segment descriptor.
    pub fn push(&mut self, rate: f32, level: f32, curve: CurveKind) -> &mut Self {
        self.segments.push(SegDef { rate, level, curve });
        self
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Replace this definition with an exact copy of `other` — segment
    /// count, start level, sustain flag, and every (rate, level, curve)
    /// triple reproduced bit for bit.
    pub fn copy_from(&mut self, other: &EnvDef) {
        self.start = other.start;
        self.sustain = other.sustain;
        self.segments.clear();
        self.segments.extend_from_slice(&other.segments);
    }
}
