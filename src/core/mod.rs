// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Core Runtime Components
//!
//! Low-level infrastructure shared across the HDDS stack.
//!
//! ## Overview
//!
//! This module contains performance-critical primitives and protocol
//! implementations used by higher-level DDS APIs.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `rt` | Runtime primitives (slab pools, waitsets, hubs) |
//! | `ser` | CDR2 serialization helpers |
//!
//! ## Note
//!
//! Most users should use the higher-level entity/topic/domain APIs at the
//! crate root instead of interacting with core modules directly.

/// Runtime primitives (slab pools, waitsets, hub) shared across transports.
pub mod rt;
/// Serialization helpers (CDR2 encoding/decoding).
pub mod ser;
/// Helper routines used by hot-path formatting utilities.
pub mod string_utils;
