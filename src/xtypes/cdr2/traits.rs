// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Re-exports the CDR2 encode/decode contract; the canonical definitions
//! live in [`crate::core::ser::traits`] alongside the parameter-list helpers
//! every `xtypes::cdr2` type is built on.

pub use crate::core::ser::traits::{Cdr2Decode, Cdr2Encode, CdrError};
