// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handlers: a sink plus its domain filter, user data and lifecycle.
//!
//! # Lifecycle
//!
//! A [`Handler`] is created, optionally registered with a [`Logging`](crate::Logging)
//! instance, and eventually destroyed.  Destruction closes the sink and runs the destroy
//! callback, exactly once, at the first of:
//!
//! - removal from the registry (after in-flight deliveries to it have finished),
//! - teardown of the instance it is registered with,
//! - the last clone of the handle being dropped.
//!
//! # Quiescing
//!
//! Every delivery enters the handler by bumping an in-flight counter and then checks the
//! removed flag; removal sets the flag and then waits for the counter to drain.  Both sides
//! use sequentially consistent operations, so either the delivery sees the flag and skips,
//! or removal sees the delivery and waits for it.
//!
//! Removal never waits while the removing thread is itself inside a delivery.  The handler
//! may be on that thread's own stack, or another thread may be removing one of ours from
//! its sink at the same moment, and either way waiting would deadlock.  Instead destruction
//! is handed to whichever delivery leaves last; if nothing is in flight it happens at once.

use crate::error::{Result, validate_domain};
use crate::log_record::LogRecord;
use crate::sink::Sink;
use crate::spinlock::Spinlock;
use std::any::Any;
use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering::SeqCst};
use std::sync::{Arc, Mutex, PoisonError};

static HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque payload owned by whoever registered the handler.
pub type UserData = Arc<dyn Any + Send + Sync>;

type DestroyFn = Box<dyn FnOnce(Option<UserData>) + Send>;

/// Unique identity of a handler for the lifetime of the process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

thread_local! {
    // handlers whose sink is currently executing on this thread, innermost last
    static ACTIVE: RefCell<Vec<HandlerId>> = const { RefCell::new(Vec::new()) };
}

fn delivering_on_this_thread() -> bool {
    ACTIVE
        .try_with(|active| !active.borrow().is_empty())
        .unwrap_or(false)
}

/// What happened when a record was offered to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Domain filter mismatch, or the handler was already removed.
    Skipped,
    /// The sink panicked; the panic was contained.
    Panicked,
}

struct HandlerInner {
    id: HandlerId,
    sink: Arc<dyn Sink>,
    domain: Spinlock<Option<Arc<str>>>,
    user_data: Spinlock<Option<UserData>>,
    on_destroy: Mutex<Option<DestroyFn>>,
    in_flight: AtomicUsize,
    removed: AtomicBool,
    destroy_deferred: AtomicBool,
    destroyed: AtomicBool,
}

impl HandlerInner {
    fn destroy_once(&self) {
        if self.destroyed.swap(true, SeqCst) {
            return;
        }
        let _ = catch_unwind(AssertUnwindSafe(|| self.sink.close()));
        let on_destroy = self
            .on_destroy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let user_data = self.user_data.with_mut(Option::take);
        if let Some(on_destroy) = on_destroy {
            let _ = catch_unwind(AssertUnwindSafe(|| on_destroy(user_data)));
        }
    }

    fn leave(&self) {
        if self.in_flight.fetch_sub(1, SeqCst) == 1 && self.destroy_deferred.load(SeqCst) {
            self.destroy_once();
        }
    }
}

impl Drop for HandlerInner {
    fn drop(&mut self) {
        self.destroy_once();
    }
}

/**
A registered output: a [`Sink`], an optional domain filter, optional user data, and a destroy
callback.

`Handler` is a cheap handle (an `Arc` inside); clones refer to the same handler, and equality
is identity.

# Examples

```rust
use domainlog::{Handler, Logging, Severity};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

let logging = Logging::new();
let seen = Arc::new(AtomicUsize::new(0));
let counter = seen.clone();
let handler = Handler::from_fn(move |_record| {
    counter.fetch_add(1, Ordering::Relaxed);
});
handler.set_domain(Some("net")).unwrap();
logging.add_handler(handler.clone());

logging.log("net", Severity::Error, "delivered");
logging.log("media", Severity::Error, "filtered out");
assert_eq!(seen.load(Ordering::Relaxed), 1);

logging.remove_handler(&handler).unwrap();
assert!(handler.is_destroyed());
```
*/
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerInner>,
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Handler {}

impl Hash for Handler {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.inner.id)
            .field("domain", &self.domain())
            .field("sink", &self.inner.sink)
            .finish()
    }
}

impl Handler {
    /// Wraps `sink` in a new handler that matches every domain.
    pub fn new(sink: Arc<dyn Sink>) -> Handler {
        Handler {
            inner: Arc::new(HandlerInner {
                id: HandlerId(HANDLER_ID.fetch_add(1, SeqCst)),
                sink,
                domain: Spinlock::new(None),
                user_data: Spinlock::new(None),
                on_destroy: Mutex::new(None),
                in_flight: AtomicUsize::new(0),
                removed: AtomicBool::new(false),
                destroy_deferred: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// A handler that invokes `f` for every record it receives.
    pub fn from_fn<F>(f: F) -> Handler
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        Handler::new(Arc::new(CallbackSink::new(f)))
    }

    /// The full form: callback, destroy callback and initial user data.
    ///
    /// `destroy` receives the user data held at destruction time.
    pub fn create<F, D>(callback: F, destroy: D, user_data: Option<UserData>) -> Handler
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
        D: FnOnce(Option<UserData>) + Send + 'static,
    {
        let handler = Handler::from_fn(callback).on_destroy(destroy);
        handler.set_user_data(user_data);
        handler
    }

    /// Sets the callback run once when this handler is destroyed.
    pub fn on_destroy<D>(self, destroy: D) -> Handler
    where
        D: FnOnce(Option<UserData>) + Send + 'static,
    {
        *self
            .inner
            .on_destroy
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(destroy));
        self
    }

    pub fn id(&self) -> HandlerId {
        self.inner.id
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.inner.sink
    }

    /// Limits the handler to records of exactly `domain`.  `None` (or `""`) matches all.
    pub fn set_domain(&self, domain: Option<&str>) -> Result<()> {
        let domain = match domain.filter(|d| !d.is_empty()) {
            Some(d) => {
                validate_domain(d)?;
                Some(Arc::from(d))
            }
            None => None,
        };
        self.inner.domain.with_mut(|slot| *slot = domain);
        Ok(())
    }

    pub fn domain(&self) -> Option<Arc<str>> {
        self.inner.domain.with(Clone::clone)
    }

    pub fn set_user_data(&self, user_data: Option<UserData>) {
        // the old value is dropped after the lock is released
        let _old = self
            .inner
            .user_data
            .with_mut(|slot| std::mem::replace(slot, user_data));
    }

    pub fn user_data(&self) -> Option<UserData> {
        self.inner.user_data.with(Clone::clone)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(SeqCst)
    }

    /// Whether the handler has been removed from a registry.  A removed handler cannot be
    /// registered again.
    pub fn is_removed(&self) -> bool {
        self.inner.removed.load(SeqCst)
    }

    /// Whether a record of `domain` passes this handler's filter.
    pub fn matches(&self, domain: &str) -> bool {
        self.inner
            .domain
            .with(|filter| filter.as_deref().is_none_or(|f| f == domain))
    }

    pub(crate) fn deliver(&self, record: &LogRecord) -> Delivery {
        if !self.matches(record.domain()) {
            return Delivery::Skipped;
        }
        let inner = &self.inner;
        inner.in_flight.fetch_add(1, SeqCst);
        if inner.removed.load(SeqCst) {
            inner.leave();
            return Delivery::Skipped;
        }
        let _ = ACTIVE.try_with(|active| active.borrow_mut().push(inner.id));
        let result = catch_unwind(AssertUnwindSafe(|| inner.sink.write(record)));
        let _ = ACTIVE.try_with(|active| active.borrow_mut().pop());
        inner.leave();
        match result {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Panicked,
        }
    }

    pub(crate) fn flush(&self) {
        if !self.inner.removed.load(SeqCst) {
            let _ = catch_unwind(AssertUnwindSafe(|| self.inner.sink.flush()));
        }
    }

    /// Stops deliveries, waits for in-flight ones, then destroys the handler.
    ///
    /// Called from inside a sink, it does not wait: destruction runs when the last in-flight
    /// delivery leaves, which may be after this returns.
    ///
    /// Idempotent: only the first call does anything.
    pub(crate) fn retire(&self) {
        let inner = &self.inner;
        if inner.removed.swap(true, SeqCst) {
            return;
        }
        if delivering_on_this_thread() {
            // leave() sees the flag after its decrement, or we see zero here
            inner.destroy_deferred.store(true, SeqCst);
            if inner.in_flight.load(SeqCst) == 0 {
                inner.destroy_once();
            }
            return;
        }
        while inner.in_flight.load(SeqCst) != 0 {
            std::thread::yield_now();
        }
        inner.destroy_once();
    }
}

/// Sink adapter for plain callbacks.
pub struct CallbackSink {
    callback: Box<dyn Fn(&LogRecord) + Send + Sync>,
}

impl CallbackSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }
}

impl Debug for CallbackSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}

impl Sink for CallbackSink {
    fn write(&self, record: &LogRecord) {
        (self.callback)(record)
    }
}
