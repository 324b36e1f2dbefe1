// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handle table: the bijective mapping between small integer handles and
//! entities, with pin/unpin for race-free external references.
//!
//! Pinning an entity through its handle hands out a clone of the stored
//! value (entities are always stored as `Arc<Entity>`, so this is cheap) and
//! bumps a pin counter; `close` marks the handle so no further pin succeeds,
//! but existing pins keep the entity alive until `try_finalize` observes the
//! pin count reach zero. Handles are never reused, which trivially satisfies
//! "a handle is never reused while any pin is outstanding" without needing a
//! generation counter.

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

/// Integer handle assigned by the table. Always positive while valid.
pub type Handle = i64;

struct Slot<T> {
    value: T,
    pin_count: AtomicI32,
    closed: std::sync::atomic::AtomicBool,
}

/// Generic handle table. Instantiated with `T = Arc<Entity>` by the entity
/// graph; kept generic here so the handle/pin contract can be unit tested in
/// isolation from entity construction.
pub struct HandleTable<T> {
    next_handle: AtomicI64,
    slots: DashMap<Handle, Slot<T>>,
}

impl<T: Clone> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> HandleTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_handle: AtomicI64::new(1),
            slots: DashMap::new(),
        }
    }

    /// Allocate a fresh handle bound to `value`.
    ///
    /// The `implicit` flag is not interpreted by the table itself — it is
    /// the entity graph's job to carry the implicit extra reference and
    /// release it via `unpin_and_drop_ref`; the table only needs to know the
    /// handle exists.
    pub fn init(&self, value: T, _implicit: bool) -> Handle {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.slots.insert(
            handle,
            Slot {
                value,
                pin_count: AtomicI32::new(0),
                closed: std::sync::atomic::AtomicBool::new(false),
            },
        );
        handle
    }

    /// Pin a handle, returning a clone of its entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDeleted`] if the handle is unknown, and
    /// [`Error::PreconditionNotMet`] if it is known but already closed.
    pub fn pin(&self, handle: Handle) -> Result<T> {
        let slot = self.slots.get(&handle).ok_or(Error::AlreadyDeleted)?;
        if slot.closed.load(Ordering::Acquire) {
            return Err(Error::PreconditionNotMet(format!(
                "handle {handle} is closed"
            )));
        }
        slot.pin_count.fetch_add(1, Ordering::AcqRel);
        Ok(slot.value.clone())
    }

    /// Release a pin acquired via [`Self::pin`].
    pub fn unpin(&self, handle: Handle) {
        if let Some(slot) = self.slots.get(&handle) {
            slot.pin_count.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Mark a handle closed. Idempotent: closing an already-closed handle is
    /// a `PreconditionNotMet` (mirrors the original's "double free" guard).
    pub fn close(&self, handle: Handle) -> Result<()> {
        let slot = self.slots.get(&handle).ok_or(Error::AlreadyDeleted)?;
        if slot.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::PreconditionNotMet(format!(
                "handle {handle} already closed"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self, handle: Handle) -> bool {
        self.slots
            .get(&handle)
            .map(|slot| slot.closed.load(Ordering::Acquire))
            .unwrap_or(true)
    }

    /// Remove the slot and return its value once closed and unpinned.
    /// Returns `None` (without removing anything) while pins remain
    /// outstanding or the handle was never closed.
    pub fn try_finalize(&self, handle: Handle) -> Option<T> {
        let ready = self.slots.get(&handle).is_some_and(|slot| {
            slot.closed.load(Ordering::Acquire) && slot.pin_count.load(Ordering::Acquire) == 0
        });
        if !ready {
            return None;
        }
        self.slots.remove(&handle).map(|(_, slot)| slot.value)
    }

    #[must_use]
    pub fn pin_count(&self, handle: Handle) -> i32 {
        self.slots
            .get(&handle)
            .map(|slot| slot.pin_count.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_unpin_roundtrip() {
        let table: HandleTable<i32> = HandleTable::new();
        let h = table.init(42, false);
        assert_eq!(table.pin(h).unwrap(), 42);
        assert_eq!(table.pin_count(h), 1);
        table.unpin(h);
        assert_eq!(table.pin_count(h), 0);
    }

    #[test]
    fn closed_handle_rejects_pin() {
        let table: HandleTable<i32> = HandleTable::new();
        let h = table.init(1, false);
        table.close(h).unwrap();
        assert!(matches!(table.pin(h), Err(Error::PreconditionNotMet(_))));
    }

    #[test]
    fn double_close_is_precondition_not_met() {
        let table: HandleTable<i32> = HandleTable::new();
        let h = table.init(1, false);
        table.close(h).unwrap();
        assert!(matches!(table.close(h), Err(Error::PreconditionNotMet(_))));
    }

    #[test]
    fn finalize_waits_for_pins_to_drain() {
        let table: HandleTable<i32> = HandleTable::new();
        let h = table.init(7, false);
        let _entity = table.pin(h).unwrap();
        table.close(h).unwrap();
        assert!(table.try_finalize(h).is_none(), "pin still outstanding");
        table.unpin(h);
        assert_eq!(table.try_finalize(h), Some(7));
    }

    #[test]
    fn handles_are_never_reused() {
        let table: HandleTable<i32> = HandleTable::new();
        let h1 = table.init(1, false);
        let h2 = table.init(2, false);
        assert_ne!(h1, h2);
    }
}
