// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime primitives shared across the entity graph and serdata pool.

pub mod indexring;
pub mod slabpool;
pub mod waitset;

pub use indexring::{IndexEntry, IndexRing};
pub use slabpool::{SlabHandle, SlabPool};
pub use waitset::{
    WaitsetDriver, WaitsetRegistration, WaitsetSignal, WaitsetWaitError, WAITSET_DEFAULT_MAX_SLOTS,
};
