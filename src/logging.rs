// SPDX-License-Identifier: MIT OR Apache-2.0

//! The logging state object.

use crate::console_sink::ConsoleSink;
use crate::context::thread_context::{self, OverrideKey};
use crate::diagnostics::{Counters, Diagnostics};
use crate::dispatch::fan_out;
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::level::{LevelMask, Severity};
use crate::log_record::LogRecord;
use crate::output_queue::{OutputQueue, Route};
use crate::policy::LevelPolicy;
use crate::spinlock::Spinlock;
use std::fmt::Arguments;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::ThreadId;

/// The domain the library logs its own warnings under.
pub const SELF_DOMAIN: &str = "domainlog";

static INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/**
One logging pipeline: level policy, handler registry, output queue.

Components share a pipeline by sharing a reference to a `Logging` (usually the process-wide
one from [`global_logger`](crate::global_logger)); tests and embedders can create as many
independent instances as they like.

# Levels

The effective mask of a log call is the calling thread's override for the domain, else the
thread's wildcard override, else the policy entry for the domain, else the global mask.

```rust
use domainlog::{Logging, Severity};

let logging = Logging::new();
logging.set_level(None, Severity::Warning);
logging.set_level(Some("net"), Severity::Debug);

assert!(logging.is_enabled("net", Severity::Debug));
assert!(!logging.is_enabled("other", Severity::Debug));
assert!(logging.is_enabled("other", Severity::Error));

logging.set_thread_level(Some("other"), Severity::Trace);
assert!(logging.is_enabled("other", Severity::Trace));
logging.clear_thread_level(Some("other"));
assert!(!logging.is_enabled("other", Severity::Trace));
```

# Dispatch

[`log`](Self::log) checks the level, builds the record once, and offers it to every
registered handler in registration order.  Sinks run on the calling thread (unless an
output thread is designated, see [`set_output_thread`](Self::set_output_thread)), so a slow
sink slows down every caller; keeping sinks fast is the registrant's job.

# Teardown

[`shutdown`](Self::shutdown) (also run on drop) delivers queued records, removes and
destroys every handler, retires thread overrides, and restores the default policy.
*/
pub struct Logging {
    id: u64,
    policy: LevelPolicy,
    handlers: Spinlock<Vec<Handler>>,
    default_handler: Spinlock<Option<Handler>>,
    queue: OutputQueue,
    // threads currently holding an override for this instance
    overrides_active: Arc<AtomicUsize>,
    // bumped by shutdown; older thread overrides no longer apply
    override_generation: AtomicU64,
    counters: Counters,
}

impl std::fmt::Debug for Logging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logging")
            .field("id", &self.id)
            .field("global_mask", &self.level_mask(None))
            .field("handlers", &self.handlers.with(Vec::len))
            .field("queue", &self.queue)
            .finish()
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self::new()
    }
}

impl Logging {
    /// An instance with the default policy and no handlers.
    pub fn new() -> Self {
        Logging {
            id: INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            policy: LevelPolicy::new(),
            handlers: Spinlock::new(Vec::new()),
            default_handler: Spinlock::new(None),
            queue: OutputQueue::new(),
            overrides_active: Arc::new(AtomicUsize::new(0)),
            override_generation: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// An instance whose default handler writes to stdout.
    pub fn with_console() -> Self {
        let logging = Self::new();
        logging.install_console();
        logging
    }

    pub(crate) fn install_console(&self) -> Handler {
        let handler = Handler::new(Arc::new(ConsoleSink::stdout()));
        self.replace_default(handler.clone());
        handler
    }

    // ---------------------------------------------------------------- levels

    /// Enables `severity` and everything more severe for `domain`, or globally when
    /// `domain` is `None` or empty.
    pub fn set_level(&self, domain: Option<&str>, severity: Severity) {
        self.policy.set_mask(domain, severity.and_above());
    }

    /// Stores an explicit mask for `domain`, or globally when `domain` is `None` or empty.
    pub fn set_level_mask(&self, domain: Option<&str>, mask: LevelMask) {
        self.policy.set_mask(domain, mask);
    }

    /// The policy mask of `domain` (the global mask when the domain has no entry).
    ///
    /// Thread overrides are not considered; see [`effective_mask`](Self::effective_mask).
    pub fn level_mask(&self, domain: Option<&str>) -> LevelMask {
        self.policy.mask(domain)
    }

    /// Overrides the level of `domain` (every domain when `None`) on the calling thread.
    pub fn set_thread_level(&self, domain: Option<&str>, severity: Severity) {
        self.set_thread_level_mask(domain, severity.and_above());
    }

    pub fn set_thread_level_mask(&self, domain: Option<&str>, mask: LevelMask) {
        thread_context::set_override(
            self.override_key(),
            &self.overrides_active,
            domain.filter(|d| !d.is_empty()),
            mask,
        );
    }

    /// Removes the calling thread's override for `domain` (the wildcard one when `None`).
    ///
    /// Returns whether there was one.
    pub fn clear_thread_level(&self, domain: Option<&str>) -> bool {
        thread_context::clear_override(self.override_key(), domain.filter(|d| !d.is_empty()))
    }

    fn override_key(&self) -> OverrideKey {
        OverrideKey {
            instance: self.id,
            generation: self.override_generation.load(Ordering::Acquire),
        }
    }

    /// The mask a log call for `domain` on the calling thread is checked against.
    pub fn effective_mask(&self, domain: &str) -> LevelMask {
        if self.overrides_active.load(Ordering::Acquire) != 0 {
            if let Some(mask) = thread_context::override_for(self.override_key(), domain) {
                return mask;
            }
        }
        self.policy.mask(Some(domain))
    }

    #[cfg(test)]
    pub(crate) fn overrides_active(&self) -> usize {
        self.overrides_active.load(Ordering::Acquire)
    }

    /// Whether a record of `domain` at `severity` would be dispatched from this thread.
    ///
    /// Call sites with expensive arguments check this before formatting them.
    #[inline]
    pub fn is_enabled(&self, domain: &str, severity: Severity) -> bool {
        self.effective_mask(domain).contains(severity)
    }

    // ---------------------------------------------------------------- logging

    /// Logs a preformatted message.
    pub fn log(&self, domain: &str, severity: Severity, message: &str) {
        if self.is_enabled(domain, severity) {
            self.dispatch(domain, severity, message.to_string());
        }
    }

    /// Logs `format_args!` output; the arguments are only formatted when enabled.
    ///
    /// ```rust
    /// use domainlog::{Logging, Severity};
    ///
    /// let logging = Logging::new();
    /// let peer = "10.0.0.7";
    /// logging.log_args("net", Severity::Error, format_args!("lost {peer}"));
    /// ```
    pub fn log_args(&self, domain: &str, severity: Severity, args: Arguments<'_>) {
        if self.is_enabled(domain, severity) {
            let message = match args.as_str() {
                Some(s) => s.to_string(),
                None => args.to_string(),
            };
            self.dispatch(domain, severity, message);
        }
    }

    fn dispatch(&self, domain: &str, severity: Severity, message: String) {
        let record = LogRecord::new(domain, severity, message)
            .with_tags(thread_context::current_tags());
        self.counters.dispatched();
        let handlers = self.handlers.with(Clone::clone);
        if handlers.is_empty() {
            return;
        }
        match self.queue.route(Arc::new(record), handlers) {
            Route::Deliver(record, handlers) => self.deliver(&record, &handlers),
            Route::DrainThenDeliver(record, handlers) => {
                self.drain_queue();
                self.deliver(&record, &handlers);
            }
            Route::Queued => self.counters.queued(),
        }
    }

    fn deliver(&self, record: &LogRecord, handlers: &[Handler]) {
        fan_out(record, handlers, &self.counters);
    }

    fn drain_queue(&self) -> usize {
        self.queue
            .drain(&|record, handlers| self.deliver(record, handlers))
    }

    fn warn_internal(&self, message: &str) {
        self.log(SELF_DOMAIN, Severity::Warning, message);
    }

    // ---------------------------------------------------------------- handlers

    /// Appends `handler` to the registry.
    ///
    /// Adding a handler that is already registered, or one that was removed before, does
    /// nothing.
    pub fn add_handler(&self, handler: Handler) {
        if handler.is_removed() {
            return;
        }
        self.handlers.with_mut(|handlers| {
            if !handlers.contains(&handler) {
                handlers.push(handler);
            }
        });
    }

    /// Unregisters `handler`, waits for deliveries to it that are still running, and
    /// destroys it.
    ///
    /// May be called from any thread, including from inside a sink.  When called from
    /// inside `handler`'s own sink, destruction happens once that delivery returns.
    pub fn remove_handler(&self, handler: &Handler) -> Result<()> {
        let removed = self.handlers.with_mut(|handlers| {
            let position = handlers.iter().position(|h| h == handler)?;
            Some(handlers.remove(position))
        });
        let Some(removed) = removed else {
            return Err(Error::UnknownHandler);
        };
        self.default_handler.with_mut(|slot| {
            if slot.as_ref() == Some(&removed) {
                *slot = None;
            }
        });
        removed.retire();
        Ok(())
    }

    /// The registered handlers, in fan-out order.
    pub fn handlers(&self) -> Vec<Handler> {
        self.handlers.with(Clone::clone)
    }

    /// Replaces the default handler by one that calls `f`, limited to `domain` if given.
    ///
    /// ```rust
    /// use domainlog::{Logging, Severity};
    /// use std::sync::{Arc, Mutex};
    ///
    /// let logging = Logging::with_console();
    /// let lines = Arc::new(Mutex::new(Vec::new()));
    /// let sink = lines.clone();
    /// logging
    ///     .set_log_function(None, move |record| {
    ///         sink.lock().unwrap().push(record.message().to_string())
    ///     })
    ///     .unwrap();
    /// assert_eq!(logging.handlers().len(), 1);
    ///
    /// logging.log("app", Severity::Error, "captured");
    /// assert_eq!(*lines.lock().unwrap(), vec!["captured"]);
    /// ```
    pub fn set_log_function<F>(&self, domain: Option<&str>, f: F) -> Result<Handler>
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        let handler = Handler::from_fn(f);
        handler.set_domain(domain)?;
        self.replace_default(handler.clone());
        Ok(handler)
    }

    /// Replaces the default handler by one that writes rendered lines into `writer`.
    pub fn set_log_writer<W>(&self, writer: W) -> Handler
    where
        W: Write + Send + 'static,
    {
        let handler = Handler::new(Arc::new(ConsoleSink::writer(Box::new(writer))));
        self.replace_default(handler.clone());
        handler
    }

    fn replace_default(&self, handler: Handler) {
        let old = self
            .default_handler
            .with_mut(|slot| slot.replace(handler.clone()));
        self.add_handler(handler);
        if let Some(old) = old {
            // already gone if someone removed it explicitly
            let _ = self.remove_handler(&old);
        }
    }

    // ---------------------------------------------------------------- output thread

    /// Designates the thread that drains the output queue and may call
    /// [`flush`](Self::flush).  `None` returns to synchronous delivery.
    ///
    /// While a thread is designated, records logged on any other thread are queued, and
    /// reach their sinks when the designated thread flushes or logs.  Clearing the
    /// designation delivers whatever is still queued on the calling thread, including
    /// records that other threads were queueing while the designation changed.
    pub fn set_output_thread(&self, thread: Option<ThreadId>) {
        self.queue.set_output_thread(thread);
        if thread.is_none() && self.queue.pending() != 0 {
            self.drain_queue();
        }
    }

    pub fn output_thread(&self) -> Option<ThreadId> {
        self.queue.output_thread()
    }

    /// Delivers everything queued before the call, then flushes every sink.
    ///
    /// When an output thread is designated, only that thread may flush.  Flushing from
    /// another thread is a programming error: it panics in debug builds and is ignored
    /// (with a warning under the `domainlog` domain) in release builds.  With no thread
    /// designated, any thread may flush, and records left over from an earlier designation
    /// are delivered first.
    pub fn flush(&self) {
        if self.queue.output_thread().is_some() {
            if !self.queue.is_output_thread() {
                self.warn_internal("flush called from a thread other than the output thread");
                debug_assert!(false, "flush called from a thread other than the output thread");
                return;
            }
            self.drain_queue();
        } else if self.queue.pending() != 0 {
            self.drain_queue();
        }
        for handler in self.handlers() {
            handler.flush();
        }
    }

    // ---------------------------------------------------------------- lifecycle

    /// Counters for conditions the pipeline absorbed.
    pub fn diagnostics(&self) -> Diagnostics {
        self.counters
            .snapshot(self.queue.pending(), self.handlers.with(Vec::len))
    }

    /// Delivers queued records, removes and destroys every handler, retires the thread
    /// overrides of every thread and restores the default policy.
    ///
    /// The instance stays usable afterwards.
    pub fn shutdown(&self) {
        self.queue.set_output_thread(None);
        let delivered = self.drain_queue();
        if delivered != 0 {
            self.warn_internal(&format!(
                "delivered {delivered} queued records during shutdown"
            ));
        }
        let handlers = self.handlers.with_mut(std::mem::take);
        self.default_handler.with_mut(|slot| *slot = None);
        for handler in &handlers {
            handler.flush();
            handler.retire();
        }
        // other threads' overrides go stale; this thread's are dropped now
        self.override_generation.fetch_add(1, Ordering::AcqRel);
        thread_context::clear_instance(self.id);
        self.policy.reset();
    }
}

impl Drop for Logging {
    fn drop(&mut self) {
        self.shutdown();
    }
}
