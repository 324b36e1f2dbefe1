// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-domain sertype registry: deduplication of type descriptors by
//! structural equality.
//!
//! Each sertype kind used to carry its own `ops`/`serdata_ops` vtable
//! pointer; here that is a tagged [`SertypeKind`] instead, since the set of
//! kinds is closed and Rust dispatches on it for free.

use crate::xtypes::TypeIdentifier;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Which family of serdata operations a sertype uses. Stands in for the
/// `ops`/`serdata_ops` vtable pointer pair: two sertypes of different kinds
/// are never equal regardless of their structural data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SertypeKind {
    /// Ordinary keyed or keyless user struct, CDR-encoded.
    DefaultCdr,
    /// Keyless CDR variant (no key fields, no keyhash).
    KeylessCdr,
    /// Discovery built-in topic payload (participant/publication/subscription data).
    BuiltinTopic,
}

/// Sertype flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SertypeFlags(u8);

impl SertypeFlags {
    pub const NONE: SertypeFlags = SertypeFlags(0);
    /// Opcode interpreter must not take the XCDR2-appendable fast path.
    pub const NO_OPTIMIZE: SertypeFlags = SertypeFlags(1 << 0);
    /// Type contains at least one union member anywhere in its tree.
    pub const CONTAINS_UNION: SertypeFlags = SertypeFlags(1 << 1);
    /// Key fits in the 16-byte inline keyhash; no MD5 fallback needed.
    pub const FIXED_KEY: SertypeFlags = SertypeFlags(1 << 2);

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        SertypeFlags(bits)
    }

    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(&self, other: SertypeFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub const fn or(self, other: SertypeFlags) -> Self {
        SertypeFlags(self.0 | other.0)
    }
}

impl std::ops::BitOr for SertypeFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}

/// Polymorphic type descriptor.
///
/// Equality — and therefore registry deduplication — is "same kind, same
/// typename, same structural data", where the structural data is the
/// compiled opcode program (empty until the codec compiler fills it in) and
/// the XTypes [`TypeIdentifier`] it was compiled from.
pub struct Sertype {
    pub typename: String,
    pub kind: SertypeKind,
    pub flags: SertypeFlags,
    pub type_id: TypeIdentifier,
    pub opcodes: Vec<u32>,
    refcount: AtomicI64,
}

impl Sertype {
    #[must_use]
    pub fn new(
        typename: impl Into<String>,
        kind: SertypeKind,
        flags: SertypeFlags,
        type_id: TypeIdentifier,
        opcodes: Vec<u32>,
    ) -> Arc<Sertype> {
        Arc::new(Sertype {
            typename: typename.into(),
            kind,
            flags,
            type_id,
            opcodes,
            refcount: AtomicI64::new(1),
        })
    }

    #[must_use]
    pub fn refcount(&self) -> i64 {
        self.refcount.load(Ordering::Acquire)
    }

    pub(crate) fn ref_inc(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement and return the refcount observed *before* the decrement.
    pub(crate) fn ref_dec(&self) -> i64 {
        self.refcount.fetch_sub(1, Ordering::AcqRel)
    }
}

impl PartialEq for Sertype {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.typename == other.typename
            && self.type_id == other.type_id
            && self.opcodes == other.opcodes
    }
}

impl Eq for Sertype {}

/// Per-domain registry deduplicating sertypes by structural equality.
#[derive(Default)]
pub struct SertypeRegistry {
    by_typename: Mutex<HashMap<String, Vec<Arc<Sertype>>>>,
}

impl SertypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a registered sertype structurally equal to `template`, if any.
    #[must_use]
    pub fn lookup_locked(&self, template: &Sertype) -> Option<Arc<Sertype>> {
        let table = self.by_typename.lock();
        table
            .get(&template.typename)?
            .iter()
            .find(|st| st.as_ref() == template)
            .cloned()
    }

    /// Register `candidate`, or return the already-registered equal sertype.
    ///
    /// Idempotent, matching `create_topic`'s lookup-then-register sequence:
    /// on a hit, the existing entry's refcount is bumped and returned so the
    /// caller can drop its own `candidate` (its refcount started at 1 and
    /// was never published); on a miss, `candidate` itself becomes the
    /// canonical entry.
    pub fn register_locked(&self, candidate: Arc<Sertype>) -> Arc<Sertype> {
        let mut table = self.by_typename.lock();
        let bucket = table.entry(candidate.typename.clone()).or_default();
        if let Some(existing) = bucket.iter().find(|st| st.as_ref() == candidate.as_ref()) {
            existing.ref_inc();
            return existing.clone();
        }
        bucket.push(candidate.clone());
        candidate
    }

    /// Drop a reference; once it reaches zero, remove the sertype from the
    /// registry so a later structurally-equal registration doesn't collide
    /// with a stale `Arc`.
    pub fn unref(&self, st: &Arc<Sertype>) {
        if st.ref_dec() == 1 {
            let mut table = self.by_typename.lock();
            if let Some(bucket) = table.get_mut(&st.typename) {
                bucket.retain(|entry| !Arc::ptr_eq(entry, st));
                if bucket.is_empty() {
                    table.remove(&st.typename);
                }
            }
        }
    }
}
