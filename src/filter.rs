// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Content filtering: an advisory, side-effect-free predicate a reader
//! consults before caching a sample.
//!
//! Unlike the teacher's SQL-expression evaluator this is deliberately
//! minimal: `set_filter` installs a single `(fn, ctx)` pair per topic, and
//! the public untyped read path always calls through the same
//! [`FilterChain`] trampoline whether or not a filter was ever installed —
//! so the generic reader code never has to branch on "is this topic
//! filtered".

use std::sync::Arc;

use crate::codec::Value;

/// A filter predicate: given the decoded sample and its opaque context,
/// return `true` to keep it. Must be side-effect-free — it may run more
/// than once per sample (e.g. once per matched reader) and must not be
/// relied on for anything but the keep/drop decision.
pub type FilterFn = Arc<dyn Fn(&Value, &(dyn std::any::Any + Send + Sync)) -> bool + Send + Sync>;

/// A `(predicate, context)` pair installed on a topic by `set_filter`.
#[derive(Clone)]
pub struct Filter {
    predicate: FilterFn,
    ctx: Arc<dyn std::any::Any + Send + Sync>,
}

impl Filter {
    #[must_use]
    pub fn new(predicate: FilterFn, ctx: Arc<dyn std::any::Any + Send + Sync>) -> Self {
        Filter { predicate, ctx }
    }

    #[must_use]
    pub fn evaluate(&self, value: &Value) -> bool {
        (self.predicate)(value, self.ctx.as_ref())
    }
}

/// The chaining trampoline a reader calls on every candidate sample,
/// regardless of whether a filter is installed. `None` means "unfiltered",
/// and always keeps the sample — so callers never need a separate
/// unfiltered code path.
#[derive(Clone, Default)]
pub struct FilterChain {
    filter: Option<Filter>,
}

impl FilterChain {
    #[must_use]
    pub fn none() -> Self {
        FilterChain { filter: None }
    }

    #[must_use]
    pub fn with(filter: Filter) -> Self {
        FilterChain { filter: Some(filter) }
    }

    /// Run the installed filter, if any, against `value`. Always `true`
    /// when no filter is installed.
    #[must_use]
    pub fn keep(&self, value: &Value) -> bool {
        match &self.filter {
            Some(f) => f.evaluate(value),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_chain_keeps_everything() {
        let chain = FilterChain::none();
        assert!(chain.keep(&Value::I32(0)));
    }

    #[test]
    fn installed_filter_consults_context() {
        let threshold: Arc<dyn std::any::Any + Send + Sync> = Arc::new(10i32);
        let predicate: FilterFn = Arc::new(|value, ctx| {
            let threshold = ctx.downcast_ref::<i32>().copied().unwrap_or(0);
            value.as_i64().map(|v| v > threshold as i64).unwrap_or(false)
        });
        let chain = FilterChain::with(Filter::new(predicate, threshold));
        assert!(chain.keep(&Value::I32(42)));
        assert!(!chain.keep(&Value::I32(1)));
    }
}
