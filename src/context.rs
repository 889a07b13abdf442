// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread-local context: tags for correlation, carried across threads on request.
//!
//! Every thread owns a stack of named tags.  The active value of each tag is attached to
//! every record logged from that thread, so lines belonging to one call, one request or
//! one stream can be correlated.
//!
//! # Tags
//!
//! ```rust
//! use domainlog::context;
//!
//! context::push_tag("call", "c-1");
//! context::push_tag("stream", "audio");
//! context::push_tag("call", "c-2"); // shadows c-1
//! assert_eq!(context::current_tags(), vec!["c-2", "audio"]);
//!
//! context::pop_tag("call"); // restores c-1
//! assert_eq!(context::tag_value("call").as_deref(), Some("c-1"));
//! context::pop_tag("call");
//! context::pop_tag("stream");
//! assert!(context::current_tags().is_empty());
//! ```
//!
//! Prefer [`TagGuard`] when the tag belongs to a lexical scope.
//!
//! # Crossing thread boundaries
//!
//! Context is never shared between threads by reference.  To give a new thread the tags of
//! the thread that created it, take a [`TagSnapshot`] and paste it on the new thread:
//!
//! ```rust
//! use domainlog::context;
//!
//! let _guard = context::TagGuard::push("job", "j-9");
//! let snapshot = context::snapshot_tags();
//! let handle = std::thread::spawn(move || {
//!     context::restore_tags(&snapshot);
//!     snapshot.release();
//!     context::current_tags()
//! });
//! assert_eq!(handle.join().unwrap(), vec!["j-9"]);
//! ```
//!
//! [`spawn`] does exactly that.  For futures that hop between executor threads, wrap them in
//! [`ApplyTags`].
//!
//! # Level overrides
//!
//! Thread-scoped severity overrides belong to a [`Logging`](crate::Logging) instance and are
//! set through it ([`Logging::set_thread_level`](crate::Logging::set_thread_level)); they
//! live in the same per-thread slot as the tags.  Shutting the instance down retires them on
//! every thread, not only on the one that called it.

mod apply_tags;
mod tags;
pub(crate) mod thread_context;

#[cfg(test)]
mod tests;

pub use apply_tags::ApplyTags;
pub use tags::TagSnapshot;

use std::thread::JoinHandle;

/// Pushes `value` for `id` on the calling thread, shadowing any previous value of `id`.
pub fn push_tag(id: &str, value: &str) {
    thread_context::push_tag(id, value);
}

/// Pops the innermost value of `id`, restoring the one before it.
///
/// Popping an identifier that was never pushed is a no-op.
pub fn pop_tag(id: &str) {
    thread_context::pop_tag(id);
}

/// The active value of every tag on the calling thread, in push order of distinct identifiers.
pub fn current_tags() -> Vec<String> {
    thread_context::current_tags()
}

/// The active value of `id`, if any.
pub fn tag_value(id: &str) -> Option<String> {
    thread_context::tag_value(id)
}

/// Copies the calling thread's tags into an owned snapshot.
pub fn snapshot_tags() -> TagSnapshot {
    thread_context::snapshot_tags()
}

/// Replaces the calling thread's tags with `snapshot`.
///
/// Intended for a freshly started thread; whatever tags were present are overwritten.
pub fn restore_tags(snapshot: &TagSnapshot) {
    thread_context::restore_tags(snapshot);
}

/// Releases a snapshot.  Equivalent to dropping it.
pub fn release_snapshot(snapshot: TagSnapshot) {
    snapshot.release();
}

/// Removes every tag from the calling thread.
pub fn clear_tags() {
    thread_context::clear_tags();
}

/// Pushes a tag for the lifetime of the guard.
///
/// ```rust
/// use domainlog::context::{self, TagGuard};
///
/// {
///     let _call = TagGuard::push("call", "c-3");
///     assert_eq!(context::current_tags(), vec!["c-3"]);
/// }
/// assert!(context::current_tags().is_empty());
/// ```
#[derive(Debug)]
#[must_use = "the tag is popped as soon as the guard is dropped"]
pub struct TagGuard {
    id: String,
}

impl TagGuard {
    pub fn push(id: &str, value: &str) -> TagGuard {
        push_tag(id, value);
        TagGuard { id: id.to_string() }
    }
}

impl Drop for TagGuard {
    fn drop(&mut self) {
        pop_tag(&self.id);
    }
}

/// Spawns a thread that starts with a copy of the caller's tags.
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let snapshot = snapshot_tags();
    std::thread::spawn(move || {
        restore_tags(&snapshot);
        snapshot.release();
        f()
    })
}

/// Like [`spawn`], with a thread name.
pub fn spawn_named<F, T>(name: String, f: F) -> std::io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let snapshot = snapshot_tags();
    std::thread::Builder::new().name(name).spawn(move || {
        restore_tags(&snapshot);
        snapshot.release();
        f()
    })
}
