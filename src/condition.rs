// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Conditions: boolean-valued predicates attached to an entity's listener
//! table and evaluated by a `WaitSet`. `StatusCondition` tracks an entity's
//! enabled/active status bitmask; `GuardCondition` is application-triggered.

use crate::core::rt::waitset::{WaitsetDriver, WaitsetSignal, WaitsetWaitError};
use crate::error::{Error, Result};
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Base interface for all conditions attachable to a `WaitSet`.
pub trait Condition: Send + Sync {
    /// Current trigger value of this condition.
    fn get_trigger_value(&self) -> bool;
    /// Unique identifier for this condition (for comparison/removal).
    fn condition_id(&self) -> u64;
    /// Register a waitset signal so this condition can wake blocked waiters.
    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>);
    /// Remove a previously registered waitset signal.
    fn remove_waitset_signal(&self, signal_id: u64);
    /// Downcast support for dynamic condition handling.
    fn as_any(&self) -> &dyn Any;
}

/// Entity status bitmask. The bit layout is arbitrary (there is no wire
/// format for it) — only the well-known constants matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMask(u32);

impl StatusMask {
    pub const NONE: StatusMask = StatusMask(0);
    pub const ALL: StatusMask = StatusMask(0xFFFF_FFFF);
    pub const DATA_AVAILABLE: StatusMask = StatusMask(1 << 0);
    pub const SAMPLE_LOST: StatusMask = StatusMask(1 << 1);
    pub const SAMPLE_REJECTED: StatusMask = StatusMask(1 << 2);
    pub const LIVELINESS_CHANGED: StatusMask = StatusMask(1 << 3);
    pub const REQUESTED_DEADLINE_MISSED: StatusMask = StatusMask(1 << 4);
    pub const REQUESTED_INCOMPATIBLE_QOS: StatusMask = StatusMask(1 << 5);
    pub const SUBSCRIPTION_MATCHED: StatusMask = StatusMask(1 << 6);
    pub const LIVELINESS_LOST: StatusMask = StatusMask(1 << 7);
    pub const OFFERED_DEADLINE_MISSED: StatusMask = StatusMask(1 << 8);
    pub const OFFERED_INCOMPATIBLE_QOS: StatusMask = StatusMask(1 << 9);
    pub const PUBLICATION_MATCHED: StatusMask = StatusMask(1 << 10);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        StatusMask(bits)
    }

    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(&self, other: StatusMask) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub const fn or(self, other: StatusMask) -> Self {
        StatusMask(self.0 | other.0)
    }

    #[must_use]
    pub const fn and(self, other: StatusMask) -> Self {
        StatusMask(self.0 & other.0)
    }
}

impl std::ops::BitOr for StatusMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}

impl std::ops::BitAnd for StatusMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

struct WaitsetHook {
    id: u64,
    signal: Weak<dyn WaitsetSignal>,
}

/// Condition derived from an entity's enabled/active status bitmask.
pub struct StatusCondition {
    id: u64,
    enabled_statuses: Mutex<StatusMask>,
    active_statuses: Mutex<StatusMask>,
    waitset_signals: Mutex<Vec<WaitsetHook>>,
}

impl StatusCondition {
    #[must_use]
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            enabled_statuses: Mutex::new(StatusMask::NONE),
            active_statuses: Mutex::new(StatusMask::NONE),
            waitset_signals: Mutex::new(Vec::new()),
        }
    }

    pub fn set_enabled_statuses(&self, mask: StatusMask) {
        if let Ok(mut enabled) = self.enabled_statuses.lock() {
            *enabled = mask;
        }
        if self.get_trigger_value() {
            self.notify_waitsets();
        }
    }

    #[must_use]
    pub fn get_enabled_statuses(&self) -> StatusMask {
        self.enabled_statuses
            .lock()
            .map(|m| *m)
            .unwrap_or(StatusMask::NONE)
    }

    /// Called by the entity graph when a status bit changes.
    pub(crate) fn set_active_statuses(&self, mask: StatusMask) {
        let enabled = self.get_enabled_statuses();
        if let Ok(mut active) = self.active_statuses.lock() {
            *active = mask;
        }
        if enabled.and(mask).bits() != 0 {
            self.notify_waitsets();
        }
    }

    #[must_use]
    pub fn get_active_statuses(&self) -> StatusMask {
        self.active_statuses
            .lock()
            .map(|m| *m)
            .unwrap_or(StatusMask::NONE)
    }

    pub(crate) fn clear_active_statuses(&self) {
        if let Ok(mut active) = self.active_statuses.lock() {
            *active = StatusMask::NONE;
        }
    }

    fn notify_waitsets(&self) {
        let mut hooks = match self.waitset_signals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hooks.retain(|hook| {
            if let Some(signal) = hook.signal.upgrade() {
                signal.signal();
                true
            } else {
                false
            }
        });
    }
}

impl Condition for StatusCondition {
    fn get_trigger_value(&self) -> bool {
        self.get_enabled_statuses().and(self.get_active_statuses()).bits() != 0
    }

    fn condition_id(&self) -> u64 {
        self.id
    }

    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>) {
        let mut hooks = match self.waitset_signals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hooks.retain(|hook| hook.signal.upgrade().is_some());
        hooks.push(WaitsetHook {
            id: signal.id(),
            signal: Arc::downgrade(&signal),
        });
        if self.get_trigger_value() {
            signal.signal();
        }
    }

    fn remove_waitset_signal(&self, signal_id: u64) {
        if let Ok(mut hooks) = self.waitset_signals.lock() {
            hooks.retain(|hook| hook.id != signal_id);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Default for StatusCondition {
    fn default() -> Self {
        Self::new()
    }
}

/// Condition whose trigger value is set directly by the application.
pub struct GuardCondition {
    id: u64,
    trigger_value: AtomicBool,
    waitset_signals: Mutex<Vec<WaitsetHook>>,
}

impl GuardCondition {
    #[must_use]
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1_000_000);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            trigger_value: AtomicBool::new(false),
            waitset_signals: Mutex::new(Vec::new()),
        }
    }

    pub fn set_trigger_value(&self, value: bool) {
        self.trigger_value.store(value, Ordering::Release);
        if value {
            self.notify_waitsets();
        }
    }

    fn notify_waitsets(&self) {
        let mut hooks = match self.waitset_signals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hooks.retain(|hook| {
            if let Some(signal) = hook.signal.upgrade() {
                signal.signal();
                true
            } else {
                false
            }
        });
    }
}

impl Condition for GuardCondition {
    fn get_trigger_value(&self) -> bool {
        self.trigger_value.load(Ordering::Acquire)
    }

    fn condition_id(&self) -> u64 {
        self.id
    }

    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>) {
        let mut hooks = match self.waitset_signals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hooks.retain(|hook| hook.signal.upgrade().is_some());
        hooks.push(WaitsetHook {
            id: signal.id(),
            signal: Arc::downgrade(&signal),
        });
        if self.get_trigger_value() {
            signal.signal();
        }
    }

    fn remove_waitset_signal(&self, signal_id: u64) {
        if let Ok(mut hooks) = self.waitset_signals.lock() {
            hooks.retain(|hook| hook.id != signal_id);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Default for GuardCondition {
    fn default() -> Self {
        Self::new()
    }
}

struct AttachedSlot {
    condition: Arc<dyn Condition>,
    slot_index: usize,
    slot_id: u64,
}

/// Blocks a thread until one of its attached conditions becomes true, or a
/// deadline passes. Backed by the same `WaitsetDriver` used for entity
/// `CONDITION`/`WAITSET`/`GUARDCONDITION` kinds.
pub struct WaitSet {
    driver: WaitsetDriver,
    attached: Mutex<Vec<AttachedSlot>>,
}

impl WaitSet {
    /// # Errors
    ///
    /// Returns [`Error::OutOfResources`] if the underlying event object
    /// cannot be created.
    pub fn new() -> Result<Self> {
        let driver = WaitsetDriver::new(crate::core::rt::waitset::WAITSET_DEFAULT_MAX_SLOTS)
            .map_err(|e| Error::OutOfResources(e.to_string()))?;
        Ok(Self {
            driver,
            attached: Mutex::new(Vec::new()),
        })
    }

    /// Attach a condition so `wait` wakes when it becomes true.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfResources`] if the driver has no free slots.
    pub fn attach(&self, condition: Arc<dyn Condition>) -> Result<()> {
        let registration = self
            .driver
            .register_slot()
            .map_err(|e| Error::OutOfResources(e.to_string()))?;
        let (slot_index, slot_id, signal) = registration.into_trait();
        condition.add_waitset_signal(signal);
        self.attached.lock().unwrap_or_else(|p| p.into_inner()).push(AttachedSlot {
            condition,
            slot_index,
            slot_id,
        });
        Ok(())
    }

    /// Detach a previously attached condition by id.
    pub fn detach(&self, condition_id: u64) {
        let mut attached = self.attached.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(pos) = attached
            .iter()
            .position(|a| a.condition.condition_id() == condition_id)
        {
            let slot = attached.remove(pos);
            slot.condition.remove_waitset_signal(slot.slot_id);
            self.driver.unregister_slot(slot.slot_index, slot.slot_id);
        }
    }

    /// Wait until any attached condition is true or `timeout` elapses.
    /// `None` means wait indefinitely (the spec's `INFINITY`); `Some(Duration::ZERO)`
    /// is a poll.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the deadline passes with nothing
    /// triggered.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Vec<Arc<dyn Condition>>> {
        match self.driver.wait(timeout) {
            Ok(_) => {
                let attached = self.attached.lock().unwrap_or_else(|p| p.into_inner());
                Ok(attached
                    .iter()
                    .filter(|a| a.condition.get_trigger_value())
                    .map(|a| a.condition.clone())
                    .collect())
            }
            Err(WaitsetWaitError::Timeout) => Err(Error::Timeout),
            Err(WaitsetWaitError::Io(e)) => Err(Error::Internal(e.to_string())),
        }
    }
}
