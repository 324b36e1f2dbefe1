// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The topic/ktopic layer: `create_topic`'s full validation, ktopic reuse,
//! QoS reconciliation, sertype dedup and RTPS-topic-per-type bookkeeping
//! pipeline, plus `find_topic_locally` and advisory content filtering.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::domain_state;
use crate::entity::{ChildCursor, Entity, EntityKind, EntityOps};
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterChain};
use crate::guid::Guid;
use crate::participant::{participant_state, KTopic};
use crate::qos::QosProfile;
use crate::rtps::SecurityHook;
use crate::sertype::Sertype;

/// `[A-Za-z_/][A-Za-z0-9_/]*`.
fn is_valid_topic_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '/' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/')
}

/// `create_topic`'s QoS merge step: an explicit user profile wins outright,
/// since [`QosProfile`] (unlike the original's incremental policy-by-policy
/// merge) is a single all-or-nothing struct with no partial/unset state to
/// merge field-by-field.
#[must_use]
pub fn merge_qos(user: Option<QosProfile>, defaults: &QosProfile) -> QosProfile {
    user.unwrap_or_else(|| defaults.clone())
}

/// No real `RtpsBinding` exposes "allocate a topic-level GUID" — that
/// allocation lives entirely below the core, in the transport it is never
/// constructed from per [`crate::guid::Guid`]'s own docs. Until a binding
/// contributes one, each first-occurrence RTPS topic gets a synthetic,
/// locally unique placeholder so the ktopic's type-id map still has
/// something to key on.
fn next_synthetic_guid() -> Guid {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    Guid::new([0; 12], (n as u32).to_be_bytes())
}

/// Topic-kind `Entity` ops: the ktopic/sertype this topic is linked to, and
/// its installed content filter.
pub struct TopicOps {
    pub ktopic: Arc<KTopic>,
    pub sertype: Arc<Sertype>,
    filter: Mutex<FilterChain>,
}

impl TopicOps {
    #[must_use]
    pub fn filter(&self) -> FilterChain {
        self.filter.lock().clone()
    }

    pub fn set_filter(&self, filter: Filter) {
        *self.filter.lock() = FilterChain::with(filter);
    }

    pub fn clear_filter(&self) {
        *self.filter.lock() = FilterChain::none();
    }
}

impl EntityOps for TopicOps {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn delete(&self, _entity: &Entity) {
        self.ktopic.ref_dec();
    }
}

/// Recover a topic entity's [`TopicOps`].
///
/// # Panics
///
/// Panics if `topic` was not created by [`create_topic`].
#[must_use]
pub fn topic_state(topic: &Entity) -> &TopicOps {
    topic.ops_as_any().downcast_ref::<TopicOps>().expect("entity is not a topic")
}

/// `create_topic(participant, name, sertype_in_out, qos, security, listener)`.
///
/// On success, `sertype_in_out` is updated in place to the canonical,
/// possibly-already-registered sertype the caller should use from then on.
///
/// # Errors
///
/// - [`Error::BadParameter`] if `name` fails `[A-Za-z_/][A-Za-z0-9_/]*` or
///   starts with the reserved `DCPS` prefix.
/// - [`Error::NotAllowedBySecurity`] if the security hook rejects the
///   creation.
/// - [`Error::PreconditionNotMet`] if a ktopic of this name already exists
///   under a different type name.
/// - [`Error::InconsistentPolicy`] if a ktopic of this name already exists
///   with incompatible QoS.
pub fn create_topic(
    participant: &Arc<Entity>,
    name: &str,
    sertype_in_out: &mut Arc<Sertype>,
    qos: QosProfile,
    security: &dyn SecurityHook,
) -> Result<Arc<Entity>> {
    if !is_valid_topic_name(name) || name.starts_with("DCPS") {
        return Err(Error::BadParameter(format!("invalid topic name {name:?}")));
    }

    let qos = merge_qos(Some(qos), &QosProfile::default());
    qos.validate().map_err(Error::BadParameter)?;

    if !security.check_create_topic(participant.handle(), name, &qos) {
        return Err(Error::NotAllowedBySecurity);
    }

    let state = participant_state(participant);

    let ktopic = match state.find_ktopic(name) {
        None => {
            let kt = KTopic::new(name, sertype_in_out.typename.clone(), qos);
            state.insert_ktopic(kt.clone());
            kt
        }
        Some(kt) => {
            if *kt.type_name.lock() != sertype_in_out.typename {
                return Err(Error::PreconditionNotMet(format!(
                    "topic {name:?} already exists with type {:?}, requested {:?}",
                    kt.type_name.lock(),
                    sertype_in_out.typename
                )));
            }
            if *kt.qos.lock() != qos {
                return Err(Error::InconsistentPolicy(format!(
                    "topic {name:?} already exists with incompatible QoS"
                )));
            }
            kt.ref_inc();
            kt
        }
    };

    let domain = participant
        .parent_arc()
        .expect("a participant entity always has a domain parent");
    let canonical_sertype = domain_state(&domain).sertypes().register_locked(sertype_in_out.clone());
    *sertype_in_out = canonical_sertype.clone();

    let topic = Entity::create(
        EntityKind::Topic,
        Some(participant),
        Box::new(TopicOps {
            ktopic: ktopic.clone(),
            sertype: canonical_sertype.clone(),
            filter: Mutex::new(FilterChain::none()),
        }),
        false,
    );

    {
        let mut rtps_topics = ktopic.rtps_topics.lock();
        rtps_topics
            .entry(canonical_sertype.type_id.clone())
            .and_modify(|(_, refcount)| *refcount += 1)
            .or_insert_with(|| (next_synthetic_guid(), 1));
    }

    // Type-lookup reference acquisition and proxy-endpoint announcement
    // (§4.G/H) happen once the caller has the topic entity in hand, via
    // `crate::tlookup::admin::tlm_ref`.

    Ok(topic)
}

/// `find_topic_locally(scope, name, timeout)`'s non-waiting half: search
/// `scope`'s topic children for a matching name and, on a hit, create a
/// *new* topic handle sharing the same ktopic/sertype so deleting the
/// original does not tear down shared state. The global-lookup timeout
/// variant lives in `crate::tlookup::protocol`.
#[must_use]
pub fn find_topic_locally(scope: &Arc<Entity>, name: &str) -> Option<Arc<Entity>> {
    let mut cursor = ChildCursor::new();
    while let Some(child) = cursor.next(scope) {
        if child.kind == EntityKind::Topic {
            let ts = topic_state(&child);
            if ts.ktopic.name == name {
                ts.ktopic.ref_inc();
                ts.sertype.ref_inc();
                let shared = Entity::create(
                    EntityKind::Topic,
                    child.parent_arc().as_ref(),
                    Box::new(TopicOps {
                        ktopic: ts.ktopic.clone(),
                        sertype: ts.sertype.clone(),
                        filter: Mutex::new(FilterChain::none()),
                    }),
                    false,
                );
                return Some(shared);
            }
        }
        if let Some(found) = find_topic_locally(&child, name) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::create_participant;
    use crate::rtps::AllowAllSecurity;
    use crate::sertype::{SertypeFlags, SertypeKind};
    use crate::xtypes::TypeIdentifier;
    use crate::xtypes::TypeKind;

    fn make_sertype(name: &str) -> Arc<Sertype> {
        Sertype::new(
            name,
            SertypeKind::DefaultCdr,
            SertypeFlags::FIXED_KEY,
            TypeIdentifier::Primitive(TypeKind::TK_INT32),
            vec![],
        )
    }

    #[test]
    fn rejects_names_starting_with_digit_or_dcps() {
        assert!(!is_valid_topic_name("1bad"));
        assert!(!is_valid_topic_name(""));
        assert!(is_valid_topic_name("robot/commands"));
    }

    #[test]
    fn create_topic_rejects_dcps_prefix() {
        let domain = crate::domain::bare_domain_entity();
        let participant = create_participant(&domain, false);
        let mut st = make_sertype("Command");
        let err = create_topic(&participant, "DCPSParticipant", &mut st, QosProfile::default(), &AllowAllSecurity);
        assert!(matches!(err, Err(Error::BadParameter(_))));
    }

    #[test]
    fn create_topic_twice_reuses_ktopic_and_bumps_refcount() {
        let domain = crate::domain::bare_domain_entity();
        let participant = create_participant(&domain, false);
        let mut st1 = make_sertype("Command");
        let t1 = create_topic(&participant, "robot/commands", &mut st1, QosProfile::default(), &AllowAllSecurity).unwrap();
        let mut st2 = make_sertype("Command");
        let t2 = create_topic(&participant, "robot/commands", &mut st2, QosProfile::default(), &AllowAllSecurity).unwrap();

        let ts1 = topic_state(&t1);
        let ts2 = topic_state(&t2);
        assert!(Arc::ptr_eq(&ts1.ktopic, &ts2.ktopic));
        assert!(Arc::ptr_eq(&ts1.sertype, &ts2.sertype));
        assert_eq!(ts1.ktopic.refcount(), 2);
    }

    #[test]
    fn create_topic_rejects_semantically_invalid_qos() {
        let domain = crate::domain::bare_domain_entity();
        let participant = create_participant(&domain, false);
        let mut st = make_sertype("Command");
        let mut invalid = QosProfile::default();
        invalid.history = crate::qos::History::KeepLast(0);
        let err = create_topic(&participant, "robot/commands", &mut st, invalid, &AllowAllSecurity);
        assert!(matches!(err, Err(Error::BadParameter(_))));
    }

    #[test]
    fn create_topic_rejects_type_name_conflict() {
        let domain = crate::domain::bare_domain_entity();
        let participant = create_participant(&domain, false);
        let mut st1 = make_sertype("Command");
        let _t1 = create_topic(&participant, "robot/commands", &mut st1, QosProfile::default(), &AllowAllSecurity).unwrap();
        let mut st2 = make_sertype("Telemetry");
        let err = create_topic(&participant, "robot/commands", &mut st2, QosProfile::default(), &AllowAllSecurity);
        assert!(matches!(err, Err(Error::PreconditionNotMet(_))));
    }

    #[test]
    fn create_topic_rejects_qos_conflict() {
        let domain = crate::domain::bare_domain_entity();
        let participant = create_participant(&domain, false);
        let mut st1 = make_sertype("Command");
        let _t1 = create_topic(&participant, "robot/commands", &mut st1, QosProfile::default(), &AllowAllSecurity).unwrap();
        let mut conflicting = QosProfile::default();
        conflicting.history = crate::qos::History::KeepAll;
        let mut st2 = make_sertype("Command");
        let err = create_topic(&participant, "robot/commands", &mut st2, conflicting, &AllowAllSecurity);
        assert!(matches!(err, Err(Error::InconsistentPolicy(_))));
    }

    #[test]
    fn find_topic_locally_shares_ktopic_state() {
        let domain = crate::domain::bare_domain_entity();
        let participant = create_participant(&domain, false);
        let mut st = make_sertype("Command");
        let original = create_topic(&participant, "robot/commands", &mut st, QosProfile::default(), &AllowAllSecurity).unwrap();

        let found = find_topic_locally(&participant, "robot/commands").expect("topic exists");
        assert!(!Arc::ptr_eq(&original, &found));
        assert!(Arc::ptr_eq(&topic_state(&original).ktopic, &topic_state(&found).ktopic));

        original.delete().unwrap();
        // shared ktopic survives the original topic's deletion
        assert_eq!(topic_state(&found).ktopic.refcount(), 1);
    }
}
