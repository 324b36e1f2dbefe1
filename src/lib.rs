// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS core - entity, type and serialization substrate for a DDS domain
//!
//! The handle table, entity graph, type (sertype) registry, CDR codec and
//! type-lookup machinery that sit underneath a DDS participant. This crate
//! owns entity identity and lifetime, type representation and wire
//! (de)serialization; it does not own RTPS wire transport, discovery,
//! security enforcement or IDL compilation — those are pluggable
//! collaborators (see [`rtps::RtpsBinding`], [`rtps::SecurityHook`]).
//!
//! ## Modules Overview
//!
//! - [`handle`] - opaque, never-reused entity handles
//! - [`entity`] - the parent/child entity graph, refcounting, listeners
//! - [`sertype`] - per-domain type descriptor registry
//! - [`codec`] - opcode-driven CDR serialize/deserialize/normalize/key/print
//! - [`serdata`] - pooled wire-format sample buffers
//! - [`participant`] / [`topic`] - the ktopic layer built on the entity graph
//! - [`tlookup`] - type-lookup admin tree and request/reply wire protocol
//! - [`rtps`] - collaborator traits a concrete RTPS binding implements
//! - [`xtypes`] - XTypes v1.3 type identifiers and type objects
//! - [`qos`] - Quality of Service policies
//! - [`config`] - domain configuration
//! - [`logging`] - compile-time configurable logging macros

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// CDR (Common Data Representation) opcode engine: serialize, deserialize,
/// normalize, key extraction and human-readable printing.
pub mod codec;
/// Global domain configuration.
pub mod config;
/// Advisory content filters attached to topics.
pub mod filter;
/// Reader/writer/topic/participant/... entity graph.
pub mod entity;
/// Crate-wide error and result types.
pub mod error;
/// RTPS-level identity: GUID prefixes and entity ids.
pub mod guid;
/// Opaque, never-reused entity handles.
pub mod handle;
/// Conditions and wait sets (`StatusCondition`, `GuardCondition`, `WaitSet`).
pub mod condition;
/// Low-level CDR2 cursor, parameter-list and trait primitives.
pub mod core;
/// The domain root: `create_domain`/`domain_free` lifecycle and the global
/// domain tree.
pub mod domain;
/// Compile-time configurable logging system (zero-cost when disabled).
pub mod logging;
/// Participant-scoped shared topic state (`KTopic`) and its registries.
pub mod participant;
/// `QoS` (Quality of Service) policies for DDS entities.
pub mod qos;
/// Pooled wire-format sample buffers (`Serdata`).
pub mod serdata;
/// Per-domain type descriptor registry (`Sertype`).
pub mod sertype;
/// Collaborator traits a concrete RTPS/security binding implements.
pub mod rtps;
/// The topic/ktopic layer: `create_topic`, topic name grammar, local lookup.
pub mod topic;
/// Type-lookup admin tree and request/reply wire protocol.
pub mod tlookup;
/// XTypes v1.3 support (type identifiers, type objects, CDR2 codecs).
pub mod xtypes;

pub use core::ser::{Cdr2Decode, Cdr2Encode, CdrError};
pub use domain::{DomainRoot, DEFAULT_DOMAIN_ID};
pub use entity::{Entity, EntityKind, EntityOps};
pub use error::{Error, Result};
pub use guid::Guid;
pub use handle::{Handle, HandleTable};
pub use participant::{participant_state, KTopic};
pub use qos::QosProfile;
pub use rtps::{NullRtps, RtpsBinding, SecurityHook};
pub use sertype::{Sertype, SertypeFlags, SertypeKind, SertypeRegistry};
pub use tlookup::{TlAdmin, Tlm};
pub use topic::{create_topic, find_topic_locally, TopicOps};

/// Crate version string.
pub const VERSION: &str = "0.2.0";
