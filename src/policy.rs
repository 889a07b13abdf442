// SPDX-License-Identifier: MIT OR Apache-2.0

//! Global and per-domain level policy.
//!
//! The policy is independent of handlers.  The global mask lives in an atomic so the common
//! case (no per-domain entries) is a single load; per-domain masks live in a map behind the
//! reader-friendly [`Spinlock`].  Updates replace a whole entry, so a concurrent reader sees
//! either the old mask or the new one, never a mix.

use crate::level::{LevelMask, Severity};
use crate::spinlock::Spinlock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// The mask every fresh policy starts with.
pub const DEFAULT_MASK: LevelMask = Severity::Warning.and_above();

#[derive(Debug)]
pub(crate) struct LevelPolicy {
    global: AtomicU32,
    domains: Spinlock<HashMap<Arc<str>, LevelMask>>,
    // lets the hot path skip the map when nobody configured a domain
    has_domains: AtomicBool,
}

impl LevelPolicy {
    pub(crate) fn new() -> Self {
        LevelPolicy {
            global: AtomicU32::new(DEFAULT_MASK.bits()),
            domains: Spinlock::new(HashMap::new()),
            has_domains: AtomicBool::new(false),
        }
    }

    /// Stores `mask` for `domain`, or as the global default when `domain` is `None`/empty.
    pub(crate) fn set_mask(&self, domain: Option<&str>, mask: LevelMask) {
        match domain.filter(|d| !d.is_empty()) {
            None => self.global.store(mask.bits(), Ordering::Release),
            Some(domain) => {
                let key: Arc<str> = Arc::from(domain);
                self.domains.with_mut(|map| {
                    map.insert(key, mask);
                });
                self.has_domains.store(true, Ordering::Release);
            }
        }
    }

    /// The mask configured for `domain`, falling back to the global mask on a miss.
    pub(crate) fn mask(&self, domain: Option<&str>) -> LevelMask {
        if let Some(domain) = domain.filter(|d| !d.is_empty()) {
            if self.has_domains.load(Ordering::Acquire) {
                if let Some(mask) = self.domains.with(|map| map.get(domain).copied()) {
                    return mask;
                }
            }
        }
        LevelMask::from_bits(self.global.load(Ordering::Acquire))
    }

    /// Forgets every per-domain entry and restores the default global mask.
    pub(crate) fn reset(&self) {
        self.domains.with_mut(|map| map.clear());
        self.has_domains.store(false, Ordering::Release);
        self.global.store(DEFAULT_MASK.bits(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_domain_reads_global() {
        let policy = LevelPolicy::new();
        assert_eq!(policy.mask(Some("anything")), DEFAULT_MASK);
        policy.set_mask(None, Severity::Error.and_above());
        assert_eq!(policy.mask(Some("anything")), Severity::Error.and_above());
        assert_eq!(policy.mask(None), Severity::Error.and_above());
    }

    #[test]
    fn domain_entry_overrides_global() {
        let policy = LevelPolicy::new();
        policy.set_mask(Some("net"), LevelMask::ALL);
        assert_eq!(policy.mask(Some("net")), LevelMask::ALL);
        assert_eq!(policy.mask(Some("media")), DEFAULT_MASK);
        // the empty domain is the global key
        policy.set_mask(Some(""), LevelMask::NONE);
        assert_eq!(policy.mask(None), LevelMask::NONE);
        assert_eq!(policy.mask(Some("net")), LevelMask::ALL);
    }

    #[test]
    fn reset_restores_defaults() {
        let policy = LevelPolicy::new();
        policy.set_mask(Some("net"), LevelMask::ALL);
        policy.set_mask(None, LevelMask::NONE);
        policy.reset();
        assert_eq!(policy.mask(Some("net")), DEFAULT_MASK);
    }

    #[test]
    fn concurrent_readers_never_see_partial_masks() {
        let policy = Arc::new(LevelPolicy::new());
        let a = Severity::Debug | Severity::Fatal;
        let b = Severity::Trace | Severity::Error;
        policy.set_mask(Some("net"), a);
        let writer = {
            let policy = policy.clone();
            std::thread::spawn(move || {
                for i in 0..5000 {
                    policy.set_mask(Some("net"), if i % 2 == 0 { b } else { a });
                }
            })
        };
        for _ in 0..5000 {
            let seen = policy.mask(Some("net"));
            assert!(seen == a || seen == b, "torn mask {seen}");
        }
        writer.join().unwrap();
    }
}
