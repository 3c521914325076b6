//! Resona Bank - sound-bank ingestion for the resona synthesis framework
//!
//! This crate loads the two RIFF-based sampled-instrument container
//! formats — SoundFont 2 (`.sf2`) and Downloadable Sounds (`.dls`) —
//! into one playback-ready model consumed by the synthesis engine.
//!
//! # Pipeline
//!
//! Each format runs the same two-phase pipeline:
//!
//! 1. a binary reader walks the chunk container and materializes the raw,
//!    format-specific record tree ([`sf2::parse_sf2`], [`dls::parse_dls`]);
//! 2. a builder pass converts that tree into the shared
//!    [`SoundBank`] → [`Instrument`] → [`Zone`] → [`SampleData`] model,
//!    reconciling the two formats' incompatible log-scale unit systems
//!    into engine-native seconds, linear amplitude, and Hz.
//!
//! [`load_sound_bank`] dispatches on the RIFF form tag, so callers do
//! not need to know which format a file is:
//!
//! ```rust,ignore
//! use resona_bank::load_sound_bank;
//!
//! let bank = load_sound_bank("strings.sf2")?;
//! let piano = bank.instrument(0, 0).expect("preset 0");
//! let zone = piano.zone_for(60, 100).expect("middle C zone");
//! ```
//!
//! Loading is fully synchronous and all-or-nothing: any structural error
//! discards everything built so far and surfaces a [`BankError`]. A
//! loaded bank is shared with playback behind one coarse lock
//! ([`SharedSoundBank`]).
//!
//! # Playback
//!
//! [`ZoneOscillator`] binds a resolved zone directly to a loop-aware
//! sample player; the zone's converted envelope parameters drive a
//! six-stage `EnvGenSF` from `resona-synth`.

pub mod dls;
mod error;
mod model;
mod riff;
pub mod sf2;
mod zone_osc;

use std::path::Path;

use tracing::info;

pub use error::{BankError, Result};
pub use model::{
    EnvParams, Instrument, LoopMode, SampleData, SharedSoundBank, SoundBank, Zone,
};
pub use riff::{Chunk, ChunkIter, Cursor, FourCc, open_riff};
pub use zone_osc::ZoneOscillator;

/// Load a sound bank from a file, dispatching on the RIFF form tag.
///
/// Recognizes `sfbk` (SoundFont 2) and `DLS ` forms; anything else is
/// [`BankError::UnknownForm`]. The load is synchronous and blocking with
/// no retry; on any failure the partially built structures are dropped
/// and only the error escapes.
pub fn load_sound_bank<P: AsRef<Path>>(path: P) -> Result<SoundBank> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let bank = load_sound_bank_bytes(&bytes)?;
    info!(
        path = %path.display(),
        instruments = bank.instruments.len(),
        samples = bank.samples.len(),
        "loaded sound bank"
    );
    Ok(bank)
}

/// Load a sound bank from an in-memory image.
pub fn load_sound_bank_bytes(bytes: &[u8]) -> Result<SoundBank> {
    let (form, _) = open_riff(bytes)?;
    if form == b"sfbk" {
        let file = sf2::parse_sf2(bytes)?;
        sf2::build_sound_bank(&file)
    } else if form == b"DLS " {
        let file = dls::parse_dls(bytes)?;
        dls::build_sound_bank(&file)
    } else {
        Err(BankError::UnknownForm { form })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_bad_magic() {
        assert!(matches!(
            load_sound_bank_bytes(&[]),
            Err(BankError::BadMagic { .. })
        ));
    }

    #[test]
    fn unknown_form_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        assert!(matches!(
            load_sound_bank_bytes(&buf),
            Err(BankError::UnknownForm { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_sound_bank("/no/such/bank.sf2").unwrap_err();
        assert!(matches!(err, BankError::Io(_)));
    }
}
