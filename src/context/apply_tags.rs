// SPDX-License-Identifier: MIT OR Apache-2.0

//! Carrying tags across async executor boundaries.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::tags::TagSnapshot;
use super::thread_context::{restore_tags, snapshot_tags};

/// A [`Future`] wrapper that installs a tag snapshot around every poll.
///
/// Executors move futures between worker threads, and thread-local tags do not follow.
/// `ApplyTags` pastes its snapshot onto whichever thread polls it, and restores that
/// thread's own tags when the poll returns (or unwinds).  Tags pushed inside the future
/// are visible for the rest of that poll only.
///
/// # Examples
///
/// ```rust
/// use domainlog::context::{self, ApplyTags};
///
/// # async fn example() {
/// context::push_tag("request", "r-17");
/// let wrapped = ApplyTags::new(context::snapshot_tags(), async {
///     context::current_tags()
/// });
/// context::pop_tag("request");
///
/// assert_eq!(wrapped.await, vec!["r-17".to_string()]);
/// assert!(context::current_tags().is_empty());
/// # }
/// ```
pub struct ApplyTags<F> {
    tags: TagSnapshot,
    inner: F,
}

impl<F> ApplyTags<F> {
    /// Wraps `inner` so that each of its polls sees `tags` as the thread's tag stack.
    ///
    /// The snapshot is taken by the caller, usually with
    /// [`snapshot_tags`](crate::context::snapshot_tags) just before the future is handed
    /// to an executor.  It is cloned into the polling thread on every poll; changes made
    /// during one poll are not carried into the next.
    ///
    /// # Arguments
    ///
    /// * `tags` - The tag stack to install while `inner` is polled
    /// * `inner` - The future to wrap
    ///
    /// # Examples
    ///
    /// Polling on a thread with its own tags:
    ///
    /// ```
    /// use domainlog::context::{self, ApplyTags};
    /// use std::future::Future;
    /// use std::task::{Context, Poll, Waker};
    ///
    /// context::push_tag("job", "import");
    /// let snapshot = context::snapshot_tags();
    /// context::pop_tag("job");
    ///
    /// context::push_tag("worker", "w3");
    /// let mut wrapped = Box::pin(ApplyTags::new(snapshot, async { context::current_tags() }));
    /// let mut cx = Context::from_waker(Waker::noop());
    /// assert_eq!(wrapped.as_mut().poll(&mut cx), Poll::Ready(vec!["import".to_string()]));
    ///
    /// // the worker's own tags are back once the poll returns
    /// assert_eq!(context::current_tags(), vec!["w3".to_string()]);
    /// context::pop_tag("worker");
    /// ```
    pub fn new(tags: TagSnapshot, inner: F) -> Self {
        ApplyTags { tags, inner }
    }
}

/// Puts the polling thread's tags back when dropped.
struct RestoreTags(TagSnapshot);

impl Drop for RestoreTags {
    fn drop(&mut self) {
        restore_tags(&self.0);
    }
}

impl<F> Future for ApplyTags<F>
where
    F: Future,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // SAFETY: `tags` is only read, and `inner` is never moved out of the pinned wrapper
        let this = unsafe { self.get_unchecked_mut() };
        let inner = unsafe { Pin::new_unchecked(&mut this.inner) };
        let _restore = RestoreTags(snapshot_tags());
        restore_tags(&this.tags);
        inner.poll(cx)
    }
}
