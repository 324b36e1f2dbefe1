// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant-owned state: the ktopic table (keyed by topic name, ordered).
//! The sertype registry topics dedupe against is a domain-owned global (see
//! [`crate::domain::DomainRoot::sertypes`]), not participant state — two
//! participants under the same domain must dedupe a structurally-identical
//! sertype against each other. Everything else about a participant — its
//! handle, parent (domain) link, child table (publishers/subscribers/
//! topics) — is the generic [`Entity`] machinery; this module only adds
//! what's specific to being a participant.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::entity::{Entity, EntityOps};
use crate::xtypes::TypeIdentifier;

/// One name's worth of shared topic state: the QoS and type name every
/// topic entity of that name must agree with, and the RTPS-topic-per-type
/// map `create_topic` step 7 maintains.
pub struct KTopic {
    pub name: String,
    pub type_name: Mutex<String>,
    pub qos: Mutex<crate::qos::QosProfile>,
    /// type-id -> (RTPS topic guid, refcount), keyed by the sertype's wire
    /// type identifier so two structurally-identical types sharing a name
    /// still get independent RTPS-level topics if their type ids differ.
    pub rtps_topics: Mutex<HashMap<TypeIdentifier, (crate::guid::Guid, u64)>>,
    refcount: std::sync::atomic::AtomicI64,
    /// Fences QoS-mutating operations on this ktopic's dependent topics
    /// while non-zero, the equivalent of `dds_topic_defer_set_qos`/
    /// `dds_topic_allow_set_qos`. Topics are immutable over their lifetime
    /// in this crate (`create_topic` takes the final `QosProfile` up
    /// front), so nothing increments this counter yet — it exists so a
    /// future QoS-mutation entry point has the same fencing the teacher's
    /// `dds_topic.c` already does, rather than needing to invent it later.
    defer_set_qos: std::sync::atomic::AtomicU32,
}

impl KTopic {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, qos: crate::qos::QosProfile) -> Arc<KTopic> {
        Arc::new(KTopic {
            name: name.into(),
            type_name: Mutex::new(type_name.into()),
            qos: Mutex::new(qos),
            rtps_topics: Mutex::new(HashMap::new()),
            refcount: std::sync::atomic::AtomicI64::new(1),
            defer_set_qos: std::sync::atomic::AtomicU32::new(0),
        })
    }

    /// Fence QoS mutation on this ktopic's dependent topics.
    pub fn defer_set_qos(&self) {
        self.defer_set_qos.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
    }

    /// Release a previous [`KTopic::defer_set_qos`] fence.
    pub fn allow_set_qos(&self) {
        self.defer_set_qos.fetch_sub(1, std::sync::atomic::Ordering::AcqRel);
    }

    /// Whether QoS mutation on this ktopic's dependent topics is currently
    /// fenced.
    #[must_use]
    pub fn is_set_qos_deferred(&self) -> bool {
        self.defer_set_qos.load(std::sync::atomic::Ordering::Acquire) > 0
    }

    #[must_use]
    pub fn refcount(&self) -> i64 {
        self.refcount.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn ref_inc(&self) {
        self.refcount.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
    }

    /// Decrement and return the refcount observed before the decrement.
    pub fn ref_dec(&self) -> i64 {
        self.refcount.fetch_sub(1, std::sync::atomic::Ordering::AcqRel)
    }
}

/// Participant-kind `Entity` ops: owns the ktopic table, recovered from a
/// participant `Entity` via [`Entity::ops_as_any`]/[`participant_state`].
pub struct ParticipantOps {
    ktopics: Mutex<BTreeMap<String, Arc<KTopic>>>,
}

impl ParticipantOps {
    #[must_use]
    pub fn new() -> Self {
        ParticipantOps {
            ktopics: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn find_ktopic(&self, name: &str) -> Option<Arc<KTopic>> {
        self.ktopics.lock().get(name).cloned()
    }

    pub fn insert_ktopic(&self, ktopic: Arc<KTopic>) {
        self.ktopics.lock().insert(ktopic.name.clone(), ktopic);
    }

    pub fn remove_ktopic_if_unreferenced(&self, name: &str) {
        let mut table = self.ktopics.lock();
        if let Some(kt) = table.get(name) {
            if kt.refcount() <= 0 {
                table.remove(name);
            }
        }
    }
}

impl Default for ParticipantOps {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityOps for ParticipantOps {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Create a participant entity under `domain`, owning its own ktopic table.
/// Sertype dedup happens against `domain`'s shared registry instead.
#[must_use]
pub fn create_participant(domain: &Arc<Entity>, implicit: bool) -> Arc<Entity> {
    Entity::create(
        crate::entity::EntityKind::Participant,
        Some(domain),
        Box::new(ParticipantOps::new()),
        implicit,
    )
}

/// Recover a participant entity's [`ParticipantOps`].
///
/// # Panics
///
/// Panics if `participant` was not created by [`create_participant`] — a
/// programmer error, never a runtime condition a caller works around.
#[must_use]
pub fn participant_state(participant: &Entity) -> &ParticipantOps {
    participant
        .ops_as_any()
        .downcast_ref::<ParticipantOps>()
        .expect("entity is not a participant")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;

    #[test]
    fn participant_starts_with_empty_ktopic_table() {
        let domain = Entity::with_null_ops(EntityKind::Domain, None, false);
        let participant = create_participant(&domain, false);
        let state = participant_state(&participant);
        assert!(state.find_ktopic("anything").is_none());
    }

    #[test]
    fn insert_then_find_ktopic_roundtrips() {
        let domain = Entity::with_null_ops(EntityKind::Domain, None, false);
        let participant = create_participant(&domain, false);
        let state = participant_state(&participant);
        let kt = KTopic::new("robot/commands", "Command", crate::qos::QosProfile::default());
        state.insert_ktopic(kt.clone());
        let found = state.find_ktopic("robot/commands").expect("inserted");
        assert!(Arc::ptr_eq(&found, &kt));
    }

    #[test]
    fn defer_set_qos_is_counted_and_reversible() {
        let kt = KTopic::new("robot/commands", "Command", crate::qos::QosProfile::default());
        assert!(!kt.is_set_qos_deferred());
        kt.defer_set_qos();
        kt.defer_set_qos();
        assert!(kt.is_set_qos_deferred());
        kt.allow_set_qos();
        assert!(kt.is_set_qos_deferred());
        kt.allow_set_qos();
        assert!(!kt.is_set_qos_deferred());
    }
}
