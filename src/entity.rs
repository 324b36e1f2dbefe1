// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The entity graph: the common header shared by every object exposed
//! through a handle (domain, participant, topic, publisher, subscriber,
//! writer, reader, condition, waitset, guard condition), their parent/child
//! tree, and the generic close/delete lifecycle built on top of
//! [`crate::handle::HandleTable`].
//!
//! Every [`Entity`] carries its own `m`/`c` mutex and condition variable plus
//! a *separate* observers mutex/condition guarding in-flight listener
//! callouts — listener callbacks must never run while `m` is held, and
//! `close` waits on the observers condition rather than `m` while draining
//! them.

use crate::condition::{StatusCondition, StatusMask};
use crate::error::{Error, Result};
use crate::handle::{Handle, HandleTable};
use parking_lot::{Condvar, Mutex as PlMutex};
use std::any::Any;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Globally unique, monotonically increasing instance id. Used both as the
/// children map's ordering key and as the key the "successor by last-seen
/// id" cursor resumes from.
pub type InstanceId = u64;

fn next_instance_id() -> InstanceId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// The ten entity kinds a handle can refer to. Sertypes, ktopics and
/// type-lookup records are plain heap-owned records with no handle-table
/// entry, so they are not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Domain,
    Participant,
    Topic,
    Publisher,
    Subscriber,
    Writer,
    Reader,
    Condition,
    WaitSet,
    GuardCondition,
}

impl EntityKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Domain => "domain",
            EntityKind::Participant => "participant",
            EntityKind::Topic => "topic",
            EntityKind::Publisher => "publisher",
            EntityKind::Subscriber => "subscriber",
            EntityKind::Writer => "writer",
            EntityKind::Reader => "reader",
            EntityKind::Condition => "condition",
            EntityKind::WaitSet => "waitset",
            EntityKind::GuardCondition => "guardcondition",
        }
    }
}

/// Per-kind behaviour invoked by the generic close/delete path. Deriving
/// entities (domain, topic, writer, ...) implement this instead of each
/// hand-rolling their own teardown sequencing.
pub trait EntityOps: Send + Sync {
    /// Break any operation blocked on this entity's condition variable.
    /// Called before `close` waits for in-flight listeners to drain.
    fn interrupt(&self, _entity: &Entity) {}
    /// Release kind-specific resources. Called once, after the entity is
    /// closed, unpinned by every caller, and its listeners have drained.
    fn delete(&self, _entity: &Entity) {}
    /// Apply a new QoS to an already-created entity, or reject the change.
    fn set_qos(&self, _entity: &Entity, _qos: Arc<dyn Any + Send + Sync>) -> Result<()> {
        Ok(())
    }
    /// Reject status bits this kind never reports.
    fn validate_status(&self, _mask: StatusMask) -> Result<()> {
        Ok(())
    }
    fn statistics(&self, _entity: &Entity) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
    /// Downcast support, for kinds (topic, ktopic-bearing entities) whose
    /// callers need their concrete ops back out of the generic `Entity`.
    fn as_any(&self) -> &dyn Any {
        &()
    }
}

struct NullOps;
impl EntityOps for NullOps {}

/// Common header for every object exposed by a handle.
pub struct Entity {
    pub kind: EntityKind,
    pub iid: InstanceId,
    handle: PlMutex<Option<Handle>>,
    parent: Option<Weak<Entity>>,
    children: PlMutex<BTreeMap<InstanceId, Arc<Entity>>>,
    m: PlMutex<()>,
    c: Condvar,
    observers_m: PlMutex<()>,
    observers_c: Condvar,
    active_listener_calls: AtomicI64,
    refcount: AtomicI64,
    status_condition: StatusCondition,
    enabled_statuses: PlMutex<StatusMask>,
    listeners: PlMutex<Vec<Arc<dyn Fn(StatusMask) + Send + Sync>>>,
    qos: PlMutex<Option<Arc<dyn Any + Send + Sync>>>,
    /// Flag toggled by `set_batch`; only meaningful on `Writer` entities.
    batch_flag: AtomicBool,
    ops: Box<dyn EntityOps>,
}

static ENTITY_HANDLES: OnceLock<HandleTable<Arc<Entity>>> = OnceLock::new();

/// The process-wide handle table binding integer handles to entities.
pub fn entity_handles() -> &'static HandleTable<Arc<Entity>> {
    ENTITY_HANDLES.get_or_init(HandleTable::new)
}

impl Entity {
    /// Build and register a new entity, inserting it into `parent`'s
    /// children (unless `kind == Domain`, which has no parent).
    #[must_use]
    pub fn create(
        kind: EntityKind,
        parent: Option<&Arc<Entity>>,
        ops: Box<dyn EntityOps>,
        implicit: bool,
    ) -> Arc<Entity> {
        let entity = Arc::new(Entity {
            kind,
            iid: next_instance_id(),
            handle: PlMutex::new(None),
            parent: parent.map(Arc::downgrade),
            children: PlMutex::new(BTreeMap::new()),
            m: PlMutex::new(()),
            c: Condvar::new(),
            observers_m: PlMutex::new(()),
            observers_c: Condvar::new(),
            active_listener_calls: AtomicI64::new(0),
            refcount: AtomicI64::new(1),
            status_condition: StatusCondition::new(),
            enabled_statuses: PlMutex::new(StatusMask::NONE),
            listeners: PlMutex::new(Vec::new()),
            qos: PlMutex::new(None),
            batch_flag: AtomicBool::new(false),
            ops,
        });
        let handle = entity_handles().init(entity.clone(), implicit);
        *entity.handle.lock() = Some(handle);
        if let Some(parent) = parent {
            parent.children.lock().insert(entity.iid, entity.clone());
        }
        entity
    }

    #[must_use]
    pub fn with_null_ops(kind: EntityKind, parent: Option<&Arc<Entity>>, implicit: bool) -> Arc<Entity> {
        Self::create(kind, parent, Box::new(NullOps), implicit)
    }

    /// The handle this entity was registered under. Always `Some` after
    /// [`Entity::create`] returns.
    #[must_use]
    pub fn handle(&self) -> Handle {
        (*self.handle.lock()).expect("entity handle set during Entity::create")
    }


    #[must_use]
    pub fn parent_arc(&self) -> Option<Arc<Entity>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        entity_handles().is_closed(self.handle())
    }

    #[must_use]
    pub fn refcount(&self) -> i64 {
        self.refcount.load(Ordering::Acquire)
    }

    pub fn ref_inc(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    pub fn ref_dec(&self) {
        self.refcount.fetch_sub(1, Ordering::AcqRel);
    }

    /// Pin this entity's handle, mirroring [`crate::handle::HandleTable::pin`].
    ///
    /// # Errors
    ///
    /// See [`crate::handle::HandleTable::pin`].
    pub fn pin(handle: Handle) -> Result<Arc<Entity>> {
        entity_handles().pin(handle)
    }

    /// Release a pin and wake anything waiting in `delete` for the pin
    /// count to drain.
    pub fn unpin(&self) {
        entity_handles().unpin(self.handle());
        self.c.notify_all();
    }

    pub fn set_qos(self: &Arc<Entity>, qos: Arc<dyn Any + Send + Sync>) -> Result<()> {
        self.ops.set_qos(self, qos.clone())?;
        *self.qos.lock() = Some(qos);
        Ok(())
    }

    #[must_use]
    pub fn get_qos(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.qos.lock().clone()
    }

    #[must_use]
    pub fn status_condition(&self) -> &StatusCondition {
        &self.status_condition
    }

    pub fn set_enabled_statuses(&self, mask: StatusMask) {
        *self.enabled_statuses.lock() = mask;
        self.status_condition.set_enabled_statuses(mask);
    }

    #[must_use]
    pub fn get_enabled_statuses(&self) -> StatusMask {
        *self.enabled_statuses.lock()
    }

    /// Register a status-change callback. Listeners are run outside `m`,
    /// under the observers mutex/cond bookkeeping so `close` can wait for
    /// them to drain before calling `delete`.
    pub fn add_listener(&self, callback: Arc<dyn Fn(StatusMask) + Send + Sync>) {
        self.listeners.lock().push(callback);
    }

    pub fn clear_listeners(&self) {
        self.listeners.lock().clear();
    }

    /// Raise `status` as active and invoke every registered listener with
    /// it. Mirrors the "interrupt, then drain observers" ordering used by
    /// `close`: listener callouts are tracked so a concurrent close can wait
    /// for them instead of tearing the entity down underneath one.
    pub fn notify_status(&self, status: StatusMask) {
        self.status_condition.set_active_statuses(status);
        let callbacks = self.listeners.lock().clone();
        if callbacks.is_empty() {
            return;
        }
        self.active_listener_calls.fetch_add(1, Ordering::AcqRel);
        for callback in callbacks {
            callback(status);
        }
        if self.active_listener_calls.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.observers_m.lock();
            self.observers_c.notify_all();
        }
    }

    /// Downcast this entity's kind-specific ops, e.g. to recover a topic's
    /// `TopicOps` and reach its ktopic/sertype/filter state.
    #[must_use]
    pub fn ops_as_any(&self) -> &dyn Any {
        self.ops.as_any()
    }

    #[must_use]
    pub fn batch_flag(&self) -> bool {
        self.batch_flag.load(Ordering::Acquire)
    }

    /// Close, drain listeners, call `delete`, wait for outstanding pins and
    /// finally remove this entity's handle and detach it from its parent.
    ///
    /// Per the entity invariants: children must already be gone (freed
    /// before their parent) before this is called on a non-leaf entity; use
    /// [`Entity::delete_recursive`] to have that handled for you.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionNotMet`] if the handle is already
    /// closed, and [`Error::AlreadyDeleted`] if the handle is unknown.
    pub fn delete(self: &Arc<Entity>) -> Result<()> {
        entity_handles().close(self.handle())?;
        self.ops.interrupt(self);
        self.c.notify_all();

        {
            let mut guard = self.observers_m.lock();
            while self.active_listener_calls.load(Ordering::Acquire) > 0 {
                self.observers_c.wait(&mut guard);
            }
        }

        self.ops.delete(self);

        loop {
            if entity_handles().try_finalize(self.handle()).is_some() {
                break;
            }
            let mut guard = self.m.lock();
            self.c.wait(&mut guard);
        }

        if let Some(parent) = self.parent_arc() {
            parent.children.lock().remove(&self.iid);
        }
        Ok(())
    }

    /// Delete this entity's children first (depth-first, leaves before
    /// their parent), then this entity itself.
    ///
    /// # Errors
    ///
    /// See [`Entity::delete`].
    pub fn delete_recursive(self: &Arc<Entity>) -> Result<()> {
        let mut cursor = ChildCursor::new();
        let mut children = Vec::new();
        while let Some(child) = cursor.next(self) {
            children.push(child);
        }
        for child in children {
            if !child.is_closed() {
                child.delete_recursive()?;
            }
        }
        self.delete()
    }
}

/// Resumable cursor over a parent's children, walking strictly-increasing
/// instance ids. Tolerates concurrent insertion/removal: a child inserted
/// after the cursor last ran will naturally sort after `last_seen` and be
/// picked up; one removed is simply absent from the next `range` query. The
/// parent's children lock is held only for the duration of one `next` call,
/// never across the caller's per-child callout.
pub struct ChildCursor {
    last_seen: Option<InstanceId>,
}

impl ChildCursor {
    #[must_use]
    pub fn new() -> Self {
        Self { last_seen: None }
    }

    #[must_use]
    pub fn next(&mut self, parent: &Entity) -> Option<Arc<Entity>> {
        let children = parent.children.lock();
        let found = match self.last_seen {
            Some(last) => children
                .range((Bound::Excluded(last), Bound::Unbounded))
                .next(),
            None => children.iter().next(),
        };
        found.map(|(iid, child)| {
            self.last_seen = Some(*iid);
            child.clone()
        })
    }
}

impl Default for ChildCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `set_batch`'s flag to every writer reachable from `root`, skipping
/// readers and every other kind, using the resumable children cursor so the
/// parent's lock is never held across a child callout. `root` is typically
/// a participant; domains are walked and re-located by id one level up, in
/// the domain registry, since they may be destroyed mid-traversal.
pub fn set_batch_recursive(root: &Arc<Entity>, flag: bool) {
    let mut cursor = ChildCursor::new();
    while let Some(child) = cursor.next(root) {
        if child.kind == EntityKind::Writer {
            child.batch_flag.store(flag, Ordering::Release);
        }
        set_batch_recursive(&child, flag);
    }
}
