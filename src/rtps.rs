// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! External-collaborator contracts: the seams this crate calls out through
//! for wire transport and security, without depending on either concretely.
//!
//! [`NullRtps`] and [`AllowAllSecurity`] satisfy both for unit/integration
//! tests; a real transport/security stack plugs in by implementing the
//! traits and handing `Arc<dyn RtpsBinding>`/`Arc<dyn SecurityHook>` to
//! [`crate::domain::DomainRoot::create`].

use std::sync::Arc;

use crate::config::DomainConfig;
use crate::error::Result;
use crate::handle::Handle as EntityHandle;
use crate::guid::Guid;
use crate::qos::QosProfile;
use crate::serdata::Serdata;

/// The wire-transport seam: startup/shutdown lifecycle plus the one
/// operation the core needs to hand a serialized sample off to the network.
pub trait RtpsBinding: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the binding cannot initialize for `domain_id`
    /// with `config` (bad network config, port already bound, ...).
    fn init(&self, domain_id: u32, config: &DomainConfig) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if discovery/transport threads fail to start.
    fn start(&self) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if shutdown could not be requested cleanly.
    fn stop(&self) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if teardown left resources in an inconsistent state.
    fn fini(&self) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if the sample could not be handed to the transport
    /// (no route, congestion, binding not started).
    fn publish(&self, writer_guid: Guid, serdata: Arc<Serdata>) -> Result<()>;
    /// Any local participant's built-in type-lookup request writer, used by
    /// [`crate::tlookup::protocol`] to address an outbound request.
    fn type_lookup_writer(&self) -> Option<Guid>;
}

/// The security seam consulted before an entity is created.
pub trait SecurityHook: Send + Sync {
    /// `false` rejects the creation with [`crate::error::Error::NotAllowedBySecurity`].
    fn check_create_topic(&self, participant: EntityHandle, name: &str, qos: &QosProfile) -> bool;
}

/// An [`RtpsBinding`] that accepts every lifecycle call and drops every
/// published sample. Used where a real transport is out of scope: unit
/// tests, and any host embedding only the entity/type/serialization core.
#[derive(Debug, Default)]
pub struct NullRtps;

impl RtpsBinding for NullRtps {
    fn init(&self, _domain_id: u32, _config: &DomainConfig) -> Result<()> {
        Ok(())
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn fini(&self) -> Result<()> {
        Ok(())
    }

    fn publish(&self, _writer_guid: Guid, _serdata: Arc<Serdata>) -> Result<()> {
        Ok(())
    }

    fn type_lookup_writer(&self) -> Option<Guid> {
        None
    }
}

/// A [`SecurityHook`] that allows every creation.
#[derive(Debug, Default)]
pub struct AllowAllSecurity;

impl SecurityHook for AllowAllSecurity {
    fn check_create_topic(&self, _participant: EntityHandle, _name: &str, _qos: &QosProfile) -> bool {
        true
    }
}
