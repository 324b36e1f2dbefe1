//! Multi-module scenario tests exercising end-to-end behavior that no
//! single unit's colocated tests cover on their own: domain lifecycle
//! feeding the topic/ktopic layer, recursive and union-bearing codec
//! programs, cross-admin type-lookup resolution, and key-hash determinism.

use std::sync::Arc;
use std::time::Duration;

use ddscore::codec::{deserialize, extract_key, keyhash, serialize, Op, OpFlags, OpKind, Subtype, Value};
use ddscore::config::{ConfigSource, DomainConfig};
use ddscore::domain::{DomainRoot, DEFAULT_DOMAIN_ID};
use ddscore::participant::create_participant;
use ddscore::qos::{History, QosProfile};
use ddscore::rtps::{AllowAllSecurity, NullRtps};
use ddscore::sertype::{Sertype, SertypeFlags, SertypeKind};
use ddscore::tlookup::{handle_reply, handle_request, TlAdmin};
use ddscore::topic::{create_topic, find_topic_locally, topic_state};
use ddscore::xtypes::{TypeIdentifier, TypeKind};
use ddscore::{Error, Guid};

fn command_sertype() -> Arc<Sertype> {
    Sertype::new(
        "Command",
        SertypeKind::DefaultCdr,
        SertypeFlags::FIXED_KEY,
        TypeIdentifier::Primitive(TypeKind::TK_INT32),
        vec![],
    )
}

/// S1: create a topic, create it again with the same name/type/QoS, confirm
/// ktopic and sertype are shared and refcounted, then `find_topic_locally`
/// it and confirm the shared state survives deleting the original handle.
#[test]
fn s1_topic_reuse_and_local_lookup() {
    let domain = ddscore::domain::bare_domain_entity();
    let participant = create_participant(&domain, false);

    let mut st1 = command_sertype();
    let t1 = create_topic(&participant, "robot/commands", &mut st1, QosProfile::default(), &AllowAllSecurity).unwrap();

    let mut st2 = command_sertype();
    let t2 = create_topic(&participant, "robot/commands", &mut st2, QosProfile::default(), &AllowAllSecurity).unwrap();

    let ts1 = topic_state(&t1);
    let ts2 = topic_state(&t2);
    assert!(Arc::ptr_eq(&ts1.ktopic, &ts2.ktopic));
    assert!(Arc::ptr_eq(&ts1.sertype, &ts2.sertype));
    assert_eq!(ts1.ktopic.refcount(), 2);

    let found = find_topic_locally(&participant, "robot/commands").expect("topic exists");
    assert!(Arc::ptr_eq(&topic_state(&found).ktopic, &ts1.ktopic));

    t1.delete().unwrap();
    assert_eq!(topic_state(&found).ktopic.refcount(), 2);

    assert!(find_topic_locally(&participant, "nonexistent/topic").is_none());
}

/// S2: a topic name already bound to a different type name is rejected with
/// `PreconditionNotMet` regardless of QoS.
#[test]
fn s2_type_name_conflict_is_rejected() {
    let domain = ddscore::domain::bare_domain_entity();
    let participant = create_participant(&domain, false);

    let mut st1 = command_sertype();
    let _t1 = create_topic(&participant, "robot/commands", &mut st1, QosProfile::default(), &AllowAllSecurity).unwrap();

    let mut st2 = Sertype::new(
        "Telemetry",
        SertypeKind::DefaultCdr,
        SertypeFlags::FIXED_KEY,
        TypeIdentifier::Primitive(TypeKind::TK_FLOAT64),
        vec![],
    );
    let err = create_topic(&participant, "robot/commands", &mut st2, QosProfile::default(), &AllowAllSecurity);
    assert!(matches!(err, Err(Error::PreconditionNotMet(_))));
}

/// S3: a topic name already bound to the same type name but incompatible
/// QoS is rejected with `InconsistentPolicy`.
#[test]
fn s3_qos_conflict_is_rejected() {
    let domain = ddscore::domain::bare_domain_entity();
    let participant = create_participant(&domain, false);

    let mut st1 = command_sertype();
    let _t1 = create_topic(&participant, "robot/commands", &mut st1, QosProfile::default(), &AllowAllSecurity).unwrap();

    let mut conflicting = QosProfile::default();
    conflicting.history = History::KeepAll;
    let mut st2 = command_sertype();
    let err = create_topic(&participant, "robot/commands", &mut st2, conflicting, &AllowAllSecurity);
    assert!(matches!(err, Err(Error::InconsistentPolicy(_))));
}

/// S4: `struct Msg { u32 a; sequence<Msg> children; i32 b; }` — the same
/// four opcode words serve every recursion depth via a self-referential
/// `Seq` jump target, and round-trips through several nesting levels.
#[test]
fn s4_recursive_type_round_trips() {
    let ops = vec![
        Op::new(OpKind::Adr, Subtype::By4, OpFlags::NONE, 0).0,
        Op::new(OpKind::Adr, Subtype::Seq, OpFlags::NONE, 1).0,
        0,
        Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 2).0,
    ];

    fn leaf(a: u32, b: i32) -> Value {
        Value::Struct(vec![Value::U32(a), Value::Seq(vec![]), Value::I32(b)])
    }

    let value = Value::Struct(vec![
        Value::U32(1),
        Value::Seq(vec![
            Value::Struct(vec![Value::U32(2), Value::Seq(vec![leaf(4, 40)]), Value::I32(20)]),
            leaf(3, 30),
        ]),
        Value::I32(10),
    ]);

    let mut bytes = Vec::new();
    serialize(&ops, &value, true, &mut bytes).unwrap();
    assert_eq!(deserialize(&ops, &bytes, true).unwrap(), value);
}

/// S5: `union U switch(long) { case 0: long x; case 1: Inner y; default:
/// sequence<octet> z; }` nested inside a struct — every case, including the
/// default arm for an unlisted discriminant, round-trips.
#[test]
fn s5_nested_union_round_trips_every_case() {
    let ops = vec![
        Op::new(OpKind::Adr, Subtype::Uni, OpFlags::NONE, 0).0,
        3,
        Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        Op::new(OpKind::Jeq, Subtype::By4, OpFlags::NONE, 9).0,
        0,
        Op::new(OpKind::Jeq, Subtype::By4, OpFlags::NONE, 11).0,
        1,
        Op::new(OpKind::Jeq, Subtype::By4, OpFlags::DEF, 17).0,
        Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0,
        Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        Op::new(OpKind::Adr, Subtype::Ext, OpFlags::NONE, 0).0,
        14,
        Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        Op::new(OpKind::Adr, Subtype::By4, OpFlags::NONE, 0).0,
        Op::new(OpKind::Adr, Subtype::By4, OpFlags::NONE, 1).0,
        Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        Op::new(OpKind::Adr, Subtype::Seq, OpFlags::NONE, 0).0,
        20,
        Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        Op::new(OpKind::Adr, Subtype::By1, OpFlags::NONE, 0).0,
        Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
    ];

    let cases = vec![
        Value::Struct(vec![Value::Union {
            discriminant: 0,
            value: Box::new(Value::Struct(vec![Value::I32(42)])),
        }]),
        Value::Struct(vec![Value::Union {
            discriminant: 1,
            value: Box::new(Value::Struct(vec![Value::Struct(vec![Value::U32(7), Value::U32(9)])])),
        }]),
        Value::Struct(vec![Value::Union {
            discriminant: 99,
            value: Box::new(Value::Struct(vec![Value::Seq(vec![
                Value::Struct(vec![Value::U8(1)]),
                Value::Struct(vec![Value::U8(2)]),
            ])])),
        }]),
    ];

    for value in cases {
        let mut bytes = Vec::new();
        serialize(&ops, &value, true, &mut bytes).unwrap();
        assert_eq!(deserialize(&ops, &bytes, true).unwrap(), value);
    }
}

/// S6: a type-lookup `resolve()` call against a `TlAdmin` with no wire
/// collaborator times out; wiring a second admin's `handle_request` /
/// `handle_reply` pair through in-process channels resolves it instead.
#[test]
fn s6_type_lookup_times_out_then_resolves_across_admins() {
    let requester = TlAdmin::new();
    let type_id = TypeIdentifier::Primitive(TypeKind::TK_INT32);

    // A local reader endpoint is the dependent waiting on this type; without
    // a registered dependent `handle_reply` has nothing to notify.
    let dependent = Guid::new([9; 12], [9; 4]);
    requester.tlm_ref(&type_id, None, Some(dependent));

    let mut requested = false;
    let timeout_result = requester.resolve(&type_id, Duration::from_millis(20), |_| requested = true);
    assert!(requested);
    assert!(matches!(timeout_result, Err(Error::Timeout)));

    // A second, "remote" domain's admin already has the type bound.
    let responder = TlAdmin::new();
    responder.tlm_ref(&type_id, Some(command_sertype()), None);

    let request_writer = Guid::new([1; 12], [1; 4]);
    let reply = handle_request(
        &responder,
        &ddscore::tlookup::TlRequest {
            writer_guid: request_writer,
            sequence_number: 1,
            type_ids: vec![type_id.clone()],
        },
    );
    assert_eq!(reply.entries.len(), 1);

    let registry = ddscore::sertype::SertypeRegistry::new();
    handle_reply(
        &requester,
        &registry,
        &reply,
        |_guid| false,
        |_guid, _sertype| {},
    );

    let resolved = requester.resolve(&type_id, Duration::ZERO, |_| {});
    assert!(resolved.is_ok());
}

/// S7: the same sample always produces the same keyhash, and changing a
/// key field changes the hash while changing a non-key field does not.
#[test]
fn s7_keyhash_is_deterministic_and_key_field_sensitive() {
    let ops = vec![
        Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN | OpFlags::KEY, 0).0,
        Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 1).0,
    ];

    let sample = Value::Struct(vec![Value::I32(7), Value::I32(100)]);
    let same_key_different_payload = Value::Struct(vec![Value::I32(7), Value::I32(999)]);
    let different_key = Value::Struct(vec![Value::I32(8), Value::I32(100)]);

    let hash_a = keyhash(&ops, &sample, false).unwrap();
    let hash_b = keyhash(&ops, &same_key_different_payload, false).unwrap();
    let hash_c = keyhash(&ops, &different_key, false).unwrap();

    assert_eq!(hash_a, hash_b, "non-key field must not affect the keyhash");
    assert_ne!(hash_a, hash_c, "key field must affect the keyhash");
    assert_eq!(hash_a, keyhash(&ops, &sample, false).unwrap(), "keyhash must be deterministic");

    assert_eq!(extract_key(&ops, &sample).unwrap(), 7i32.to_be_bytes());
}

/// Domain creation feeding straight into topic creation: `DomainRoot::create`
/// provisions the default participant this whole pipeline runs on top of.
#[test]
fn domain_lifecycle_feeds_the_topic_layer() {
    let root = DomainRoot::create(
        DEFAULT_DOMAIN_ID,
        false,
        ConfigSource::Raw(DomainConfig::empty()),
        Arc::new(NullRtps),
    )
    .unwrap();

    let mut st = command_sertype();
    let topic = create_topic(
        &root.default_participant,
        "robot/commands",
        &mut st,
        QosProfile::default(),
        &AllowAllSecurity,
    )
    .unwrap();
    assert_eq!(topic_state(&topic).ktopic.name, "robot/commands");

    // The default participant's sertype is registered against the domain,
    // not the participant, so it's reachable straight off `root`.
    let canonical = root.sertypes().lookup_locked(&st).expect("registered by create_topic");
    assert!(Arc::ptr_eq(&canonical, &st));

    // Component E/G globals are composed alongside the participant, not
    // left for some other entry point to construct.
    let _ = root.tl_admin();
    let _ = root.serdata_pool();

    root.free().unwrap();
}
