//! Error types for sound-bank loading.
//!
//! Every loader failure is a hard stop for that file: no partially built
//! bank is ever exposed, and nothing is silently approximated into
//! default audio. The variants follow the failure taxonomy — malformed
//! container, unsupported feature, oversized allocation — with I/O errors
//! wrapped from the filesystem layer.

use thiserror::Error;

use crate::riff::FourCc;

/// Errors that can occur while loading a sound bank.
#[derive(Debug, Error)]
pub enum BankError {
    /// Filesystem-level read failure.
    #[error("I/O error reading sound bank: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the expected container magic.
    #[error("not a RIFF file (found {found})")]
    BadMagic {
        /// The four bytes found where 'RIFF' was expected.
        found: FourCc,
    },

    /// The RIFF form type names a format this crate does not load.
    #[error("unrecognized RIFF form '{form}' (expected 'sfbk' or 'DLS ')")]
    UnknownForm {
        /// The form type from the RIFF header.
        form: FourCc,
    },

    /// A chunk header or body extends past the end of the data.
    #[error("truncated chunk '{tag}': need {need} bytes, {have} available")]
    Truncated {
        /// Tag of the offending chunk.
        tag: FourCc,
        /// Bytes the chunk claims.
        need: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// Structural damage that is not a simple truncation: a fixed-record
    /// chunk of ragged size, a missing sentinel record, a bag index out
    /// of table bounds.
    #[error("malformed '{tag}' chunk: {reason}")]
    Malformed {
        /// Tag of the offending chunk.
        tag: FourCc,
        /// What was wrong with it.
        reason: String,
    },

    /// A required chunk was absent from the container.
    #[error("missing required chunk '{tag}'")]
    MissingChunk {
        /// Tag of the absent chunk.
        tag: FourCc,
    },

    /// A feature the format allows but this crate does not implement —
    /// reported distinctly rather than approximated.
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// A sample buffer allocation was refused. Not retried.
    #[error("sample buffer allocation failed ({bytes} bytes)")]
    Alloc {
        /// Size of the refused allocation.
        bytes: usize,
    },
}

/// Convenience result type for bank loading.
pub type Result<T> = std::result::Result<T, BankError>;

impl BankError {
    /// Create a [`BankError::Malformed`] for a chunk.
    pub fn malformed(tag: FourCc, reason: impl Into<String>) -> Self {
        BankError::Malformed {
            tag,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_chunk_tag() {
        let err = BankError::Truncated {
            tag: FourCc(*b"phdr"),
            need: 38,
            have: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("phdr"), "got: {msg}");
        assert!(msg.contains("38"), "got: {msg}");
    }

    #[test]
    fn malformed_constructor_carries_reason() {
        let err = BankError::malformed(FourCc(*b"pbag"), "ragged record size");
        assert!(err.to_string().contains("ragged record size"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: BankError = io.into();
        assert!(matches!(err, BankError::Io(_)));
    }
}
