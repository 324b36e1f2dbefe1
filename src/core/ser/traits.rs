// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The CDR2 (XTypes v1.3) encode/decode contract shared by every
//! `xtypes::cdr2` type representation (`TypeIdentifier`, `TypeObject` and
//! its member types, flag bitsets, ...).

use std::fmt;

/// A CDR2 (de)serialization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdrError {
    /// The destination buffer is too small for the value being encoded.
    BufferTooSmall,
    /// The source buffer ran out before decoding finished.
    UnexpectedEof,
    /// The source bytes do not describe a valid value of the target type
    /// (bad discriminant, out-of-range enum, ...).
    InvalidEncoding,
    /// Anything else, with a human-readable reason.
    Other(String),
}

impl fmt::Display for CdrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CdrError::BufferTooSmall => write!(f, "CDR2 buffer too small"),
            CdrError::UnexpectedEof => write!(f, "CDR2 buffer ended unexpectedly"),
            CdrError::InvalidEncoding => write!(f, "CDR2 encoding is invalid"),
            CdrError::Other(reason) => write!(f, "CDR2 error: {reason}"),
        }
    }
}

impl std::error::Error for CdrError {}

impl From<CdrError> for crate::error::Error {
    fn from(e: CdrError) -> Self {
        crate::error::Error::SerializationFailed(e.to_string())
    }
}

/// Encode a value to CDR2 little-endian format.
pub trait Cdr2Encode {
    /// Write this value's CDR2 encoding into `dst`, returning the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`CdrError::BufferTooSmall`] if `dst` cannot hold the
    /// encoding.
    fn encode_cdr2_le(&self, dst: &mut [u8]) -> Result<usize, CdrError>;

    /// An upper bound on the number of bytes [`Cdr2Encode::encode_cdr2_le`]
    /// will write, used to size scratch buffers.
    fn max_cdr2_size(&self) -> usize;
}

/// Decode a value from CDR2 little-endian format.
pub trait Cdr2Decode: Sized {
    /// Decode a value from the front of `src`, returning it along with the
    /// number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`CdrError::UnexpectedEof`] if `src` is shorter than the
    /// encoding requires, or [`CdrError::InvalidEncoding`] if the bytes do
    /// not describe a valid value.
    fn decode_cdr2_le(src: &[u8]) -> Result<(Self, usize), CdrError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdr_error_converts_to_crate_error() {
        let err: crate::error::Error = CdrError::InvalidEncoding.into();
        assert!(matches!(err, crate::error::Error::SerializationFailed(_)));
    }

    #[test]
    fn cdr_error_other_carries_reason() {
        let err = CdrError::Other("bad discriminant".to_string());
        assert_eq!(err.to_string(), "CDR2 error: bad discriminant");
    }
}
