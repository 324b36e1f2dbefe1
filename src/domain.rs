// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The domain root: `create_domain`/`domain_free`'s global-mutex-guarded
//! domain tree, the DEFAULT-id resolution rule, and the shared thread
//! monitor every domain optionally references.
//!
//! Grounded on `dds_domain.c`'s `dds_domain_create_internal_xml_or_raw`/
//! `dds_domain_free`: domains live in a process-wide table keyed by id,
//! `DEFAULT` resolves to the lowest existing id, and creating over a
//! closed-but-not-yet-freed implicit domain blocks on the global condition
//! instead of failing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::config::{ConfigSource, DomainConfig};
use crate::entity::{Entity, EntityKind, EntityOps};
use crate::error::{Error, Result};
use crate::participant::create_participant;
use crate::rtps::RtpsBinding;
use crate::serdata::SerdataPool;
use crate::sertype::SertypeRegistry;
use crate::tlookup::TlAdmin;

/// Sentinel domain id meaning "whatever domain already exists, or the
/// lowest id if I'm creating one" — mirrors Cyclone's `DDS_DOMAIN_DEFAULT`.
pub const DEFAULT_DOMAIN_ID: u32 = u32::MAX;

struct ThreadMonitor {
    refcount: Mutex<u32>,
}

static THREAD_MONITOR: OnceLock<ThreadMonitor> = OnceLock::new();

fn thread_monitor() -> &'static ThreadMonitor {
    THREAD_MONITOR.get_or_init(|| ThreadMonitor { refcount: Mutex::new(0) })
}

/// Start (if not already running) the shared thread-liveness monitor and
/// take a reference on it. Every domain that starts RTPS holds one
/// reference; the monitor itself stops only when the last domain frees.
fn thread_monitor_start() {
    let mut refcount = thread_monitor().refcount.lock();
    if *refcount == 0 {
        crate::debug!("domain: starting shared thread monitor");
    }
    *refcount += 1;
}

/// Drop this domain's reference on the thread monitor, stopping it once no
/// domain references it any longer.
fn thread_monitor_stop() {
    let mut refcount = thread_monitor().refcount.lock();
    *refcount = refcount.saturating_sub(1);
    if *refcount == 0 {
        crate::debug!("domain: stopping shared thread monitor, no domains left");
    }
}

/// Domain-kind `Entity` ops: the globals every participant/topic under this
/// domain shares — the sertype registry (Component C), the type-lookup
/// admin tree (Component G) and the serdata pool (Component E), recovered
/// from a domain `Entity` via [`Entity::ops_as_any`]/[`domain_state`].
pub struct DomainOps {
    sertypes: SertypeRegistry,
    tl_admin: Arc<TlAdmin>,
    serdata_pool: Arc<SerdataPool>,
}

impl DomainOps {
    fn new() -> Self {
        DomainOps {
            sertypes: SertypeRegistry::new(),
            tl_admin: TlAdmin::new(),
            serdata_pool: Arc::new(SerdataPool::new()),
        }
    }

    /// The per-domain sertype registry every participant's `create_topic`
    /// dedupes structurally-equal sertypes against.
    #[must_use]
    pub fn sertypes(&self) -> &SertypeRegistry {
        &self.sertypes
    }

    #[must_use]
    pub fn tl_admin(&self) -> &Arc<TlAdmin> {
        &self.tl_admin
    }

    #[must_use]
    pub fn serdata_pool(&self) -> &Arc<SerdataPool> {
        &self.serdata_pool
    }
}

impl EntityOps for DomainOps {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Recover a domain entity's [`DomainOps`].
///
/// # Panics
///
/// Panics if `domain` was not created by [`DomainRoot::create`].
#[must_use]
pub fn domain_state(domain: &Entity) -> &DomainOps {
    domain
        .ops_as_any()
        .downcast_ref::<DomainOps>()
        .expect("entity is not a domain")
}

/// A domain entity carrying real (but empty) [`DomainOps`] — the shared
/// registries every participant/topic under it needs — without registering
/// it in the process-wide domain tree or starting RTPS. Lets participant-
/// and topic-layer code be exercised against a domain's shared state
/// without paying for a full [`DomainRoot::create`].
#[must_use]
pub fn bare_domain_entity() -> Arc<Entity> {
    Entity::create(EntityKind::Domain, None, Box::new(DomainOps::new()), true)
}

/// One DDS domain: its entity (the root of the entity graph, carrying the
/// shared registries in its [`DomainOps`]), its resolved config, the RTPS
/// collaborator it was created with, and the default participant created
/// alongside it.
pub struct DomainRoot {
    pub id: u32,
    pub entity: Arc<Entity>,
    pub config: DomainConfig,
    pub rtps: Arc<dyn RtpsBinding>,
    pub default_participant: Arc<Entity>,
    pub tstart: Instant,
}

struct DomainRegistry {
    domains: Mutex<BTreeMap<u32, Arc<DomainRoot>>>,
    cond: Condvar,
}

static REGISTRY: OnceLock<DomainRegistry> = OnceLock::new();

fn registry() -> &'static DomainRegistry {
    REGISTRY.get_or_init(|| DomainRegistry { domains: Mutex::new(BTreeMap::new()), cond: Condvar::new() })
}

/// Generates the synthetic default participant entity-name
/// (`dds_domain_init`'s "set the default participant entity-name" step).
fn default_participant_name(domain_id: u32) -> String {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("participant_domain{domain_id}_{n}")
}

impl DomainRoot {
    /// `domain_create(id, config)`.
    ///
    /// Resolves `DEFAULT_DOMAIN_ID` to the minimum existing domain id
    /// (allocating a fresh domain 0 if none exist yet); explicit ids that
    /// already have a live domain fail with [`Error::PreconditionNotMet`].
    /// An implicit create racing a domain that is closed-but-not-yet-freed
    /// waits on the global condition and retries rather than failing.
    ///
    /// On any failure past RTPS init, already-completed stages are unwound
    /// in reverse order: RTPS is torn down and (if this domain was the one
    /// that started it) the thread monitor reference is released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionNotMet`] if `id` already names a live,
    /// explicitly-created domain, [`Error::ConfigParse`] if `config` is XML
    /// and malformed, or whatever `rtps.init`/`rtps.start` returns.
    pub fn create(id: u32, implicit: bool, config: ConfigSource, rtps: Arc<dyn RtpsBinding>) -> Result<Arc<DomainRoot>> {
        loop {
            let mut domains = registry().domains.lock();

            let resolved_id = if id == DEFAULT_DOMAIN_ID {
                domains.keys().next().copied().unwrap_or(0)
            } else {
                id
            };

            if let Some(existing) = domains.get(&resolved_id) {
                if id != DEFAULT_DOMAIN_ID {
                    return Err(Error::PreconditionNotMet(format!(
                        "domain {resolved_id} already exists"
                    )));
                }
                if existing.entity.is_closed() {
                    registry().cond.wait(&mut domains);
                    continue;
                }
                return Ok(Arc::clone(existing));
            }

            // miss: allocate and initialize, unwinding on failure.
            let tstart = Instant::now();
            let resolved_config = config.resolve(resolved_id)?;
            let domain_entity = Entity::create(EntityKind::Domain, None, Box::new(DomainOps::new()), implicit);

            if let Err(e) = rtps.init(resolved_id, &resolved_config) {
                let _ = domain_entity.delete();
                return Err(e);
            }

            thread_monitor_start();

            let default_participant = create_participant(&domain_entity, true);
            {
                // init built-in topics/writers step: no-op at this layer —
                // the external RtpsBinding owns the built-in endpoints
                // themselves once `start` below brings RTPS up.
            }

            if let Err(e) = rtps.start() {
                let _ = default_participant.delete();
                thread_monitor_stop();
                let _ = domain_entity.delete();
                return Err(e);
            }

            crate::info!("domain {resolved_id}: created ({})", default_participant_name(resolved_id));

            let root = Arc::new(DomainRoot {
                id: resolved_id,
                entity: domain_entity,
                config: resolved_config,
                rtps,
                default_participant,
                tstart,
            });
            domains.insert(resolved_id, Arc::clone(&root));
            return Ok(root);
        }
    }

    /// `domain_free`: stop RTPS, stop built-ins, deregister from the thread
    /// monitor, finish RTPS, remove from the domain tree, and broadcast the
    /// global condition so any implicit-create retry loop wakes up.
    ///
    /// # Errors
    ///
    /// Returns whatever `rtps.stop`/`rtps.fini` returns; the domain is
    /// still removed from the tree and the condition still broadcast even
    /// if RTPS teardown fails, so a later `create_domain` is not wedged.
    pub fn free(self: &Arc<DomainRoot>) -> Result<()> {
        let stop_result = self.rtps.stop();
        let _ = self.default_participant.delete_recursive();
        thread_monitor_stop();
        let fini_result = self.rtps.fini();

        registry().domains.lock().remove(&self.id);
        registry().cond.notify_all();

        crate::info!("domain {}: freed", self.id);
        stop_result.and(fini_result)
    }

    /// Look up a currently-registered domain by id, without creating one.
    #[must_use]
    pub fn find(id: u32) -> Option<Arc<DomainRoot>> {
        registry().domains.lock().get(&id).cloned()
    }

    /// The sertype registry every participant under this domain dedupes
    /// `create_topic`'s sertypes against.
    #[must_use]
    pub fn sertypes(&self) -> &SertypeRegistry {
        domain_state(&self.entity).sertypes()
    }

    /// The type-lookup admin tree (Component G) this domain's topics and
    /// readers resolve remote type identifiers through.
    #[must_use]
    pub fn tl_admin(&self) -> &Arc<TlAdmin> {
        domain_state(&self.entity).tl_admin()
    }

    /// The pooled serdata free-list (Component E) this domain's writers and
    /// readers allocate wire-format samples from.
    #[must_use]
    pub fn serdata_pool(&self) -> &Arc<SerdataPool> {
        domain_state(&self.entity).serdata_pool()
    }
}
