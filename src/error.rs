// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type shared by the handle table, entity graph, sertype
//! registry, codec, topic/ktopic layer, type-lookup admin and domain root.

/// Errors returned by `ddscore` operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Malformed, null, empty or otherwise ill-formed input (the generic
    /// `BAD_PARAMETER` condition of the original DDS return-code set).
    BadParameter(String),
    /// Domain configuration (raw struct or XML fragment) could not be parsed.
    ConfigParse(String),

    // ========================================================================
    // Entity Errors
    // ========================================================================
    /// Creation or lookup attempted against an object that is already closed,
    /// or whose identity conflicts with an existing one (topic name reused
    /// with a different type name, `find_topic_locally` on an absent name).
    PreconditionNotMet(String),
    /// A ktopic's QoS does not match the QoS already associated with that
    /// topic name.
    InconsistentPolicy(String),
    /// Operation invoked on an entity of the wrong kind (e.g. `find_topic` on
    /// a reader handle).
    IllegalOperation(String),
    /// Handle table lookup failed: the handle is unknown, already finalized,
    /// or its generation does not match.
    AlreadyDeleted,

    // ========================================================================
    // Codec Errors
    // ========================================================================
    /// CDR serialization failed (opcode stream fault, buffer too small,
    /// unrepresentable value).
    SerializationFailed(String),
    /// CDR deserialization failed (truncated buffer, invalid discriminant,
    /// alignment fault, opcode stream fault).
    DeserializationFailed(String),
    /// The requested CDR representation (XCDR1/XCDR2, LE/BE) is not
    /// supported by this sertype.
    UnsupportedRepresentation,

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Allocation failed or a bounded pool/thread monitor could not start.
    OutOfResources(String),
    /// A wait elapsed before the awaited condition resolved.
    Timeout,

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// The security hook rejected the operation.
    NotAllowedBySecurity,
    /// Catch-all for conditions that do not fit a more specific variant
    /// (mirrors the original `DDS_RETCODE_ERROR`).
    Internal(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Configuration
            Error::BadParameter(msg) => write!(f, "bad parameter: {}", msg),
            Error::ConfigParse(msg) => write!(f, "domain config parse error: {}", msg),
            // Entity
            Error::PreconditionNotMet(msg) => write!(f, "precondition not met: {}", msg),
            Error::InconsistentPolicy(msg) => write!(f, "inconsistent policy: {}", msg),
            Error::IllegalOperation(msg) => write!(f, "illegal operation: {}", msg),
            Error::AlreadyDeleted => write!(f, "handle already deleted"),
            // Codec
            Error::SerializationFailed(msg) => write!(f, "serialization failed: {}", msg),
            Error::DeserializationFailed(msg) => write!(f, "deserialization failed: {}", msg),
            Error::UnsupportedRepresentation => write!(f, "unsupported CDR representation"),
            // Resource
            Error::OutOfResources(msg) => write!(f, "out of resources: {}", msg),
            Error::Timeout => write!(f, "operation timed out"),
            // Other
            Error::NotAllowedBySecurity => write!(f, "not allowed by security"),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Convenient alias for results using the crate's `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
