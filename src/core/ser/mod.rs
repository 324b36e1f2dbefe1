// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Low-level CDR2 cursor and parameter-list helpers shared by the opcode
//! engine in `crate::codec`.

pub mod cursor;
pub mod pl_cdr2;
pub mod traits;

pub use cursor::{Cursor, CursorMut};
pub use pl_cdr2::{
    align_offset as pl_align_offset, decode_pl_cdr2_struct, encode_pl_cdr2_struct,
    padding_for_alignment as pl_padding_for_alignment, PlMemberEncoder,
};
pub use traits::{Cdr2Decode, Cdr2Encode, CdrError};

use std::fmt;

/// Serialization error used within core::ser.
#[derive(Debug, Clone)]
pub enum SerError {
    EncoderFailed { reason: String },
    DecoderFailed { reason: String },
    WriteFailed { offset: usize, reason: String },
    ReadFailed { offset: usize, reason: String },
    InvalidData { reason: String },
}

impl fmt::Display for SerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerError::EncoderFailed { reason } => write!(f, "encoder failed: {}", reason),
            SerError::DecoderFailed { reason } => write!(f, "decoder failed: {}", reason),
            SerError::WriteFailed { offset, reason } => {
                write!(f, "write failed at offset {}: {}", offset, reason)
            }
            SerError::ReadFailed { offset, reason } => {
                write!(f, "read failed at offset {}: {}", offset, reason)
            }
            SerError::InvalidData { reason } => write!(f, "invalid data: {}", reason),
        }
    }
}

impl std::error::Error for SerError {}

impl From<SerError> for crate::error::Error {
    fn from(e: SerError) -> Self {
        crate::error::Error::SerializationFailed(e.to_string())
    }
}

pub type SerResult<T> = core::result::Result<T, SerError>;
