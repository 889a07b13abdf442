// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counters for conditions the pipeline absorbs instead of reporting.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time copy of a [`Logging`](crate::Logging) instance's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diagnostics {
    /// Sink invocations that panicked.  The panic was contained.
    pub handler_panics: u64,
    /// Records that passed the level check and were handed to the registry.
    pub records_dispatched: u64,
    /// Records that went through the output queue.
    pub records_queued: u64,
    /// Records currently waiting for the output thread.
    pub records_pending: usize,
    /// Registered handlers.
    pub handlers: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    handler_panics: AtomicU64,
    records_dispatched: AtomicU64,
    records_queued: AtomicU64,
}

impl Counters {
    pub(crate) fn handler_panicked(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dispatched(&self) {
        self.records_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn queued(&self) {
        self.records_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, records_pending: usize, handlers: usize) -> Diagnostics {
        Diagnostics {
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            records_dispatched: self.records_dispatched.load(Ordering::Relaxed),
            records_queued: self.records_queued.load(Ordering::Relaxed),
            records_pending,
            handlers,
        }
    }
}
