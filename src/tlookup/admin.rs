// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type-lookup admin: the dual-indexed registry of in-flight and resolved
//! type identifiers, their dependent proxy endpoints, and the
//! resolved-condition `resolve` waits on.
//!
//! Grounded on `ddsi_type_lookup.c`'s `tl_admin`/`tl_meta` pair: one entry
//! per type identifier, reachable by either its minimal or complete id,
//! carrying a state machine (NEW -> REQUESTED -> RESOLVED), a dependent-GUID
//! set, and a refcount. The original indexes both trees with an AVL tree;
//! `TypeIdentifier` here has no total order (it's `Eq + Hash`, not `Ord`; see
//! DESIGN.md), so both indices are hash maps instead.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::guid::Guid;
use crate::sertype::{Sertype, SertypeRegistry};
use crate::xtypes::TypeIdentifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlmState {
    New,
    Requested,
    Resolved,
}

/// One type identifier's admin-side record.
pub struct Tlm {
    pub type_id: TypeIdentifier,
    state: Mutex<TlmState>,
    sertype: Mutex<Option<Arc<Sertype>>>,
    dependents: Mutex<HashSet<Guid>>,
    refcount: AtomicI64,
    resolved: Condvar,
}

impl Tlm {
    fn new(type_id: TypeIdentifier) -> Arc<Tlm> {
        Arc::new(Tlm {
            type_id,
            state: Mutex::new(TlmState::New),
            sertype: Mutex::new(None),
            dependents: Mutex::new(HashSet::new()),
            refcount: AtomicI64::new(0),
            resolved: Condvar::new(),
        })
    }

    #[must_use]
    pub fn refcount(&self) -> i64 {
        self.refcount.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn sertype(&self) -> Option<Arc<Sertype>> {
        self.sertype.lock().clone()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        *self.state.lock() == TlmState::Resolved
    }

    #[must_use]
    pub fn dependents(&self) -> Vec<Guid> {
        self.dependents.lock().iter().copied().collect()
    }
}

/// The type-lookup admin tree, one per domain. Holds every in-flight or
/// resolved type identifier reachable from this domain's topics/readers.
pub struct TlAdmin {
    lock: Mutex<TlAdminState>,
}

struct TlAdminState {
    by_complete: HashMap<TypeIdentifier, Arc<Tlm>>,
    by_minimal: HashMap<TypeIdentifier, Vec<Arc<Tlm>>>,
}

impl TlAdmin {
    #[must_use]
    pub fn new() -> Arc<TlAdmin> {
        Arc::new(TlAdmin {
            lock: Mutex::new(TlAdminState {
                by_complete: HashMap::new(),
                by_minimal: HashMap::new(),
            }),
        })
    }

    fn find_locked(state: &TlAdminState, type_id: &TypeIdentifier) -> Option<Arc<Tlm>> {
        if let Some(tlm) = state.by_complete.get(type_id) {
            return Some(tlm.clone());
        }
        state
            .by_minimal
            .get(type_id)
            .and_then(|candidates| candidates.first().cloned())
    }

    fn insert_locked(state: &mut TlAdminState, tlm: Arc<Tlm>) {
        match tlm.type_id.equivalence_kind() {
            Some(crate::xtypes::EquivalenceKind::Complete) | None => {
                state.by_complete.insert(tlm.type_id.clone(), tlm);
            }
            Some(crate::xtypes::EquivalenceKind::Minimal) => {
                state.by_minimal.entry(tlm.type_id.clone()).or_default().push(tlm);
            }
        }
    }

    /// `tlm_ref(type_id | sertype, proxy_guid?)`.
    ///
    /// If `sertype` already carries a back-pointer to a tlm (tracked by the
    /// sertype's own type id matching an existing entry), reuse it. Else
    /// look up by identifier, creating a NEW entry if missing. Binding
    /// `sertype` transitions the entry to RESOLVED and wakes `resolve`
    /// waiters; `proxy_guid`, if given, is added to the dependent set.
    pub fn tlm_ref(
        &self,
        type_id: &TypeIdentifier,
        sertype: Option<Arc<Sertype>>,
        proxy_guid: Option<Guid>,
    ) -> Arc<Tlm> {
        let mut state = self.lock.lock();
        let tlm = match Self::find_locked(&state, type_id) {
            Some(existing) => existing,
            None => {
                let created = Tlm::new(type_id.clone());
                Self::insert_locked(&mut state, created.clone());
                created
            }
        };
        drop(state);

        if let Some(sertype) = sertype {
            let mut current = tlm.sertype.lock();
            if current.is_none() {
                *current = Some(sertype);
                drop(current);
                *tlm.state.lock() = TlmState::Resolved;
                tlm.resolved.notify_all();
                crate::debug!("type-lookup: {:?} resolved locally", tlm.type_id);
            }
        }
        if let Some(guid) = proxy_guid {
            tlm.dependents.lock().insert(guid);
        }
        tlm.refcount.fetch_add(1, Ordering::AcqRel);
        tlm
    }

    /// `tlm_unref`: drop `proxy_guid` from the dependent set (if given) and
    /// decrement the refcount; at zero, remove the entry from both indices.
    pub fn tlm_unref(&self, tlm: &Arc<Tlm>, proxy_guid: Option<Guid>) {
        if let Some(guid) = proxy_guid {
            tlm.dependents.lock().remove(&guid);
        }
        if tlm.refcount.fetch_sub(1, Ordering::AcqRel) == 1 {
            let mut state = self.lock.lock();
            state.by_complete.remove(&tlm.type_id);
            if let Some(bucket) = state.by_minimal.get_mut(&tlm.type_id) {
                bucket.retain(|candidate| !Arc::ptr_eq(candidate, tlm));
                if bucket.is_empty() {
                    state.by_minimal.remove(&tlm.type_id);
                }
            }
        }
    }

    /// For each proxy endpoint GUID listed against `tlm`, if `has_type`
    /// reports it still lacks a type binding, call `bind` with the tlm's
    /// sertype. Mirrors `register_with_proxy_endpoints` walking the
    /// dependent list under the endpoint's own lock (the endpoint lock
    /// itself lives in the (external) RTPS collaborator, so it is modeled
    /// here as the caller-supplied `has_type`/`bind` callbacks).
    pub fn register_with_proxy_endpoints(
        &self,
        tlm: &Arc<Tlm>,
        mut has_type: impl FnMut(Guid) -> bool,
        mut bind: impl FnMut(Guid, Arc<Sertype>),
    ) {
        let Some(sertype) = tlm.sertype() else { return };
        for guid in tlm.dependents() {
            if !has_type(guid) {
                bind(guid, sertype.clone());
            }
        }
    }

    /// `resolve(type_id, timeout) -> sertype | TIMEOUT`.
    ///
    /// `request` is called (§4.H) to issue a wire request the first time an
    /// entry is seen NEW; `resolve` otherwise only waits and re-checks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if `timeout` elapses before the type
    /// resolves.
    pub fn resolve(
        &self,
        type_id: &TypeIdentifier,
        timeout: Duration,
        mut request: impl FnMut(&TypeIdentifier),
    ) -> Result<Arc<Sertype>> {
        let tlm = self.tlm_ref(type_id, None, None);
        if let Some(sertype) = tlm.sertype() {
            return Ok(sertype);
        }

        {
            let mut tlm_state = tlm.state.lock();
            if *tlm_state == TlmState::New {
                *tlm_state = TlmState::Requested;
                drop(tlm_state);
                request(type_id);
            }
        }

        if timeout.is_zero() {
            return tlm.sertype().ok_or_else(|| Error::Timeout);
        }

        let deadline = Instant::now() + timeout;
        let mut guard = tlm.state.lock();
        while *guard != TlmState::Resolved {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }
            let timed_out = tlm.resolved.wait_for(&mut guard, remaining).timed_out();
            if timed_out && *guard != TlmState::Resolved {
                return Err(Error::Timeout);
            }
        }
        drop(guard);
        tlm.sertype().ok_or_else(|| Error::Timeout)
    }
}

/// Admin-side half of `find_topic_globally` (SPEC_FULL.md §3): a topic name
/// a local caller is waiting to see announced by a remote participant.
/// Gated behind the `topic-discovery` Cargo feature, off by default,
/// parity with Cyclone's `DDSI_INCLUDE_TOPIC_DISCOVERY` build flag — the
/// RTPS announcement path itself stays an external collaborator, so this
/// only provides the wait/wake half of the operation.
#[cfg(feature = "topic-discovery")]
pub struct TopicDiscovery {
    waiting: Mutex<HashMap<String, Arc<Condvar>>>,
}

#[cfg(feature = "topic-discovery")]
impl TopicDiscovery {
    #[must_use]
    pub fn new() -> TopicDiscovery {
        TopicDiscovery {
            waiting: Mutex::new(HashMap::new()),
        }
    }

    /// Block until `notify_topic_discovered(name)` is called or `timeout`
    /// elapses. `Duration::ZERO` polls once without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no matching announcement arrives in
    /// time.
    pub fn await_topic(&self, name: &str, timeout: Duration) -> Result<()> {
        let signal = {
            let mut waiting = self.waiting.lock();
            waiting.entry(name.to_string()).or_insert_with(|| Arc::new(Condvar::new())).clone()
        };
        if timeout.is_zero() {
            return Err(Error::Timeout);
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.waiting.lock();
        while guard.contains_key(name) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }
            if signal.wait_for(&mut guard, remaining).timed_out() && guard.contains_key(name) {
                return Err(Error::Timeout);
            }
        }
        Ok(())
    }

    /// Called by the (external) RTPS collaborator once a remote
    /// participant's topic announcement for `name` is observed; wakes every
    /// local `await_topic` waiter for that name.
    pub fn notify_topic_discovered(&self, name: &str) {
        if let Some(signal) = self.waiting.lock().remove(name) {
            signal.notify_all();
        }
    }
}

#[cfg(feature = "topic-discovery")]
impl Default for TopicDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

/// Find or create a sertype's admin entry and register it against
/// `registry` when the type-lookup protocol hands back a freshly
/// deserialized sertype. Supports `handle_reply`'s dedup-through-registry
/// step without `tlookup::protocol` needing to reach into `SertypeRegistry`
/// directly.
#[must_use]
pub fn dedup_resolved_sertype(registry: &SertypeRegistry, candidate: Arc<Sertype>) -> Arc<Sertype> {
    registry.register_locked(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sertype::{SertypeFlags, SertypeKind};
    use crate::xtypes::TypeKind;

    fn make_sertype() -> Arc<Sertype> {
        Sertype::new(
            "Command",
            SertypeKind::DefaultCdr,
            SertypeFlags::FIXED_KEY,
            TypeIdentifier::Primitive(TypeKind::TK_INT32),
            vec![],
        )
    }

    #[test]
    fn tlm_ref_creates_new_entry_unresolved() {
        let admin = TlAdmin::new();
        let tlm = admin.tlm_ref(&TypeIdentifier::Primitive(TypeKind::TK_INT32), None, None);
        assert!(!tlm.is_resolved());
        assert_eq!(tlm.refcount(), 1);
    }

    #[test]
    fn tlm_ref_binding_sertype_resolves_and_wakes_waiters() {
        let admin = TlAdmin::new();
        let type_id = TypeIdentifier::Primitive(TypeKind::TK_INT32);
        let tlm = admin.tlm_ref(&type_id, None, None);
        assert!(!tlm.is_resolved());
        let tlm2 = admin.tlm_ref(&type_id, Some(make_sertype()), None);
        assert!(Arc::ptr_eq(&tlm, &tlm2));
        assert!(tlm.is_resolved());
    }

    #[test]
    fn tlm_unref_to_zero_removes_entry() {
        let admin = TlAdmin::new();
        let type_id = TypeIdentifier::Primitive(TypeKind::TK_INT32);
        let tlm = admin.tlm_ref(&type_id, None, None);
        admin.tlm_unref(&tlm, None);
        let state = admin.lock.lock();
        assert!(TlAdmin::find_locked(&state, &type_id).is_none());
    }

    #[test]
    fn resolve_returns_immediately_once_bound() {
        let admin = TlAdmin::new();
        let type_id = TypeIdentifier::Primitive(TypeKind::TK_INT32);
        admin.tlm_ref(&type_id, Some(make_sertype()), None);
        let result = admin.resolve(&type_id, Duration::ZERO, |_| {});
        assert!(result.is_ok());
    }

    #[test]
    fn resolve_times_out_when_never_bound() {
        let admin = TlAdmin::new();
        let type_id = TypeIdentifier::Primitive(TypeKind::TK_INT64);
        let mut requested = false;
        let result = admin.resolve(&type_id, Duration::from_millis(10), |_| requested = true);
        assert!(requested);
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[cfg(feature = "topic-discovery")]
    #[test]
    fn await_topic_times_out_then_succeeds_after_notify() {
        let discovery = TopicDiscovery::new();
        let timed_out = discovery.await_topic("robot/commands", Duration::from_millis(10));
        assert!(matches!(timed_out, Err(Error::Timeout)));

        let discovery = Arc::new(TopicDiscovery::new());
        let waiter = discovery.clone();
        let handle = std::thread::spawn(move || waiter.await_topic("robot/commands", Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        discovery.notify_topic_discovered("robot/commands");
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn register_with_proxy_endpoints_binds_only_unbound() {
        let admin = TlAdmin::new();
        let type_id = TypeIdentifier::Primitive(TypeKind::TK_INT32);
        let guid_a = Guid::new([1; 12], [0; 4]);
        let guid_b = Guid::new([2; 12], [0; 4]);
        let tlm = admin.tlm_ref(&type_id, Some(make_sertype()), Some(guid_a));
        admin.tlm_ref(&type_id, None, Some(guid_b));

        let mut bound = Vec::new();
        admin.register_with_proxy_endpoints(&tlm, |guid| guid == guid_a, |guid, _| bound.push(guid));
        assert_eq!(bound, vec![guid_b]);
    }
}
