// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-thread state: the tag stack and thread-scoped level overrides.
//!
//! The state lives in a `thread_local!` slot, so only the owning thread ever touches it and no
//! locking is needed.  The slot is reclaimed by the thread-local destructor when the thread
//! exits.  Access goes through `try_with` so that logging from another thread-local's
//! destructor degrades to "no context" instead of panicking.
//!
//! Level overrides are keyed by [`OverrideKey`].  An instance bumps its generation when it
//! shuts down; entries another thread stored under an older generation are then ignored,
//! and dropped the next time that thread looks at them.

use super::tags::{TagSnapshot, TagStack};
use crate::level::LevelMask;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Which [`Logging`](crate::Logging) instance, and which of its lifetimes, an override
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OverrideKey {
    pub(crate) instance: u64,
    pub(crate) generation: u64,
}

/// The overrides one thread holds for one [`Logging`](crate::Logging) instance.
#[derive(Debug)]
struct LevelOverrides {
    generation: u64,
    all: Option<LevelMask>,
    domains: HashMap<String, LevelMask>,
    // the instance's count of threads holding overrides
    active: Arc<AtomicUsize>,
}

impl LevelOverrides {
    fn new(generation: u64, active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        LevelOverrides {
            generation,
            all: None,
            domains: HashMap::new(),
            active,
        }
    }

    fn is_empty(&self) -> bool {
        self.all.is_none() && self.domains.is_empty()
    }
}

impl Drop for LevelOverrides {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
struct ThreadContext {
    tags: TagStack,
    // keyed by instance id
    overrides: HashMap<u64, LevelOverrides>,
}

thread_local! {
    static CONTEXT: RefCell<ThreadContext> = RefCell::new(ThreadContext::default());
}

impl ThreadContext {
    /// The live overrides for `key`, after dropping an entry left from an older generation.
    fn live_overrides(&mut self, key: OverrideKey) -> Option<&mut LevelOverrides> {
        if self
            .overrides
            .get(&key.instance)
            .is_some_and(|o| o.generation != key.generation)
        {
            self.overrides.remove(&key.instance);
        }
        self.overrides.get_mut(&key.instance)
    }
}

fn with_context<R>(f: impl FnOnce(&mut ThreadContext) -> R) -> Option<R> {
    CONTEXT
        .try_with(|cell| cell.try_borrow_mut().ok().map(|mut ctx| f(&mut ctx)))
        .ok()
        .flatten()
}

pub(crate) fn push_tag(id: &str, value: &str) {
    with_context(|ctx| ctx.tags.push(id, value));
}

pub(crate) fn pop_tag(id: &str) {
    with_context(|ctx| ctx.tags.pop(id));
}

pub(crate) fn tag_value(id: &str) -> Option<String> {
    with_context(|ctx| ctx.tags.value(id).map(str::to_string)).flatten()
}

pub(crate) fn current_tags() -> Vec<String> {
    with_context(|ctx| ctx.tags.values()).unwrap_or_default()
}

pub(crate) fn snapshot_tags() -> TagSnapshot {
    TagSnapshot {
        stack: with_context(|ctx| ctx.tags.clone()).unwrap_or_default(),
    }
}

pub(crate) fn restore_tags(snapshot: &TagSnapshot) {
    with_context(|ctx| ctx.tags = snapshot.stack.clone());
}

pub(crate) fn clear_tags() {
    with_context(|ctx| ctx.tags.clear());
}

/// Sets a thread override for `key`.  `domain == None` is the wildcard entry.
pub(crate) fn set_override(
    key: OverrideKey,
    active: &Arc<AtomicUsize>,
    domain: Option<&str>,
    mask: LevelMask,
) {
    with_context(|ctx| {
        if ctx.live_overrides(key).is_none() {
            ctx.overrides
                .insert(key.instance, LevelOverrides::new(key.generation, active.clone()));
        }
        let Some(overrides) = ctx.overrides.get_mut(&key.instance) else {
            return;
        };
        match domain {
            None => overrides.all = Some(mask),
            Some(domain) => {
                overrides.domains.insert(domain.to_string(), mask);
            }
        }
    });
}

/// Clears one thread override.  Returns whether anything was cleared.
pub(crate) fn clear_override(key: OverrideKey, domain: Option<&str>) -> bool {
    with_context(|ctx| {
        let Some(overrides) = ctx.live_overrides(key) else {
            return false;
        };
        let cleared = match domain {
            None => overrides.all.take().is_some(),
            Some(domain) => overrides.domains.remove(domain).is_some(),
        };
        if overrides.is_empty() {
            ctx.overrides.remove(&key.instance);
        }
        cleared
    })
    .unwrap_or(false)
}

/// The calling thread's override for `domain`: the domain entry first, then the wildcard.
pub(crate) fn override_for(key: OverrideKey, domain: &str) -> Option<LevelMask> {
    with_context(|ctx| {
        let overrides = ctx.live_overrides(key)?;
        overrides
            .domains
            .get(domain)
            .copied()
            .or(overrides.all)
    })
    .flatten()
}

/// Drops every override the calling thread holds for `instance`.
pub(crate) fn clear_instance(instance: u64) {
    with_context(|ctx| ctx.overrides.remove(&instance));
}
