// SPDX-License-Identifier: MIT OR Apache-2.0

//! The optional asynchronous output path.
//!
//! Once an output thread is designated, records logged from any other thread are not
//! handed to sinks on the calling thread.  They go, together with the registry snapshot
//! taken at dispatch, into an unbounded channel that only the designated thread drains.
//! Draining happens when that thread calls flush, when it logs itself (earlier records go
//! first), and when the owning instance is torn down.
//!
//! # Flush barrier
//!
//! A drain holds the receiver for its whole duration, sends a barrier marker through the
//! channel and then delivers messages until it reads its own marker back.  Everything
//! enqueued before the marker was sent is therefore delivered before the drain returns,
//! while records that producers keep sending afterwards do not extend it.
//!
//! Sinks invoked by a drain may log again.  Those records are delivered in place: the
//! thread is already the one holding the receiver, so it neither re-enters the drain nor
//! waits for itself.  This applies only to the queue being drained; a record logged to a
//! different instance from inside the drain follows that instance's own routing.
//!
//! # Changing the designation
//!
//! Routing holds the designation's read lock from the moment it looks at the output thread
//! until the record is in the channel.  Replacing the designation takes the write lock, so
//! once [`OutputQueue::set_output_thread`] returns, every record routed under the old
//! designation is already counted in [`OutputQueue::pending`].

use crate::handler::Handler;
use crate::log_record::LogRecord;
use crate::spinlock::Spinlock;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use wasm_safe_mutex::mpsc;

// how long one receive waits before checking again; the barrier always arrives
const RECV_SLICE: Duration = Duration::from_millis(100);

static QUEUE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // queues this thread is draining right now, innermost last
    static DRAINING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks a queue as being drained on this thread until dropped.
struct DrainMark(u64);

impl DrainMark {
    fn new(queue: u64) -> Self {
        let _ = DRAINING.try_with(|d| d.borrow_mut().push(queue));
        DrainMark(queue)
    }
}

impl Drop for DrainMark {
    fn drop(&mut self) {
        let _ = DRAINING.try_with(|d| {
            let mut draining = d.borrow_mut();
            if let Some(at) = draining.iter().rposition(|&q| q == self.0) {
                draining.remove(at);
            }
        });
    }
}

enum QueueMessage {
    Record {
        record: Arc<LogRecord>,
        handlers: Vec<Handler>,
    },
    Barrier(u64),
}

/// What the caller of [`OutputQueue::route`] must do with the record.
pub(crate) enum Route {
    /// Hand the record to its handlers now, on this thread.
    Deliver(Arc<LogRecord>, Vec<Handler>),
    /// Drain the queue first, then deliver.
    DrainThenDeliver(Arc<LogRecord>, Vec<Handler>),
    Queued,
}

pub(crate) struct OutputQueue {
    id: u64,
    sender: mpsc::Sender<QueueMessage>,
    receiver: Mutex<mpsc::Receiver<QueueMessage>>,
    output_thread: Spinlock<Option<ThreadId>>,
    pending: AtomicUsize,
    next_barrier: AtomicU64,
}

impl std::fmt::Debug for OutputQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputQueue")
            .field("output_thread", &self.output_thread())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl OutputQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        OutputQueue {
            id: QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            sender,
            receiver: Mutex::new(receiver),
            output_thread: Spinlock::new(None),
            pending: AtomicUsize::new(0),
            next_barrier: AtomicU64::new(0),
        }
    }

    pub(crate) fn output_thread(&self) -> Option<ThreadId> {
        self.output_thread.with(|t| *t)
    }

    /// Replaces the designated thread, returning the previous one.
    ///
    /// Waits for records that are being routed under the old designation to reach the
    /// channel.
    pub(crate) fn set_output_thread(&self, thread: Option<ThreadId>) -> Option<ThreadId> {
        self.output_thread
            .with_mut(|slot| std::mem::replace(slot, thread))
    }

    /// Records waiting in the channel.
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether the calling thread is the designated output thread.
    pub(crate) fn is_output_thread(&self) -> bool {
        self.output_thread() == Some(std::thread::current().id())
    }

    fn draining_here(&self) -> bool {
        DRAINING
            .try_with(|d| d.borrow().contains(&self.id))
            .unwrap_or(false)
    }

    pub(crate) fn route(&self, record: Arc<LogRecord>, handlers: Vec<Handler>) -> Route {
        // held until the record is in the channel; see set_output_thread
        let designation = self.output_thread.read();
        let Some(output) = *designation else {
            return Route::Deliver(record, handlers);
        };
        if output == std::thread::current().id() {
            if self.pending() == 0 || self.draining_here() {
                Route::Deliver(record, handlers)
            } else {
                Route::DrainThenDeliver(record, handlers)
            }
        } else if self.draining_here() {
            // a sink running inside a drain logged after the designation moved
            Route::Deliver(record, handlers)
        } else {
            self.pending.fetch_add(1, Ordering::AcqRel);
            let _ = self.sender.send_sync(QueueMessage::Record { record, handlers });
            Route::Queued
        }
    }

    /// Delivers every record enqueued before the call, through `deliver`.
    ///
    /// Returns the number of records delivered.  A drain of this queue started from inside
    /// another drain of it on the same thread returns immediately.
    pub(crate) fn drain(&self, deliver: &dyn Fn(&LogRecord, &[Handler])) -> usize {
        if self.draining_here() {
            return 0;
        }
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let _mark = DrainMark::new(self.id);
        let barrier = self.next_barrier.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send_sync(QueueMessage::Barrier(barrier));
        let mut delivered = 0;
        loop {
            match receiver.recv_sync_timeout(Instant::now() + RECV_SLICE) {
                Ok(QueueMessage::Record { record, handlers }) => {
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                    deliver(&record, &handlers);
                    delivered += 1;
                }
                Ok(QueueMessage::Barrier(id)) if id == barrier => break,
                Ok(QueueMessage::Barrier(_)) => {}
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use crate::inmemory_sink::InMemorySink;

    fn record(message: &str) -> Arc<LogRecord> {
        Arc::new(LogRecord::new("q", Severity::Error, message.to_string()))
    }

    fn deliver_all(record: &LogRecord, handlers: &[Handler]) {
        for handler in handlers {
            handler.deliver(record);
        }
    }

    #[test]
    fn without_output_thread_everything_is_direct() {
        let queue = OutputQueue::new();
        assert!(matches!(
            queue.route(record("a"), Vec::new()),
            Route::Deliver(..)
        ));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn other_threads_enqueue_until_drained() {
        let queue = Arc::new(OutputQueue::new());
        queue.set_output_thread(Some(std::thread::current().id()));
        let sink = Arc::new(InMemorySink::new());
        let handler = Handler::new(sink.clone());

        let producer = {
            let queue = queue.clone();
            let handler = handler.clone();
            std::thread::spawn(move || {
                for i in 0..10 {
                    let route = queue.route(record(&i.to_string()), vec![handler.clone()]);
                    assert!(matches!(route, Route::Queued));
                }
            })
        };
        producer.join().unwrap();
        assert_eq!(queue.pending(), 10);
        assert!(sink.is_empty());

        assert_eq!(queue.drain(&deliver_all), 10);
        assert_eq!(queue.pending(), 0);
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(sink.messages(), expected);
    }

    #[test]
    fn output_thread_drains_before_its_own_records() {
        let queue = Arc::new(OutputQueue::new());
        queue.set_output_thread(Some(std::thread::current().id()));
        {
            let queue = queue.clone();
            std::thread::spawn(move || {
                queue.route(record("earlier"), Vec::new());
            })
            .join()
            .unwrap();
        }
        assert!(matches!(
            queue.route(record("mine"), Vec::new()),
            Route::DrainThenDeliver(..)
        ));
        queue.drain(&deliver_all);
        assert!(matches!(
            queue.route(record("mine"), Vec::new()),
            Route::Deliver(..)
        ));
    }

    #[test]
    fn nested_drain_returns_immediately() {
        let queue = Arc::new(OutputQueue::new());
        queue.set_output_thread(Some(std::thread::current().id()));
        {
            let queue = queue.clone();
            std::thread::spawn(move || {
                queue.route(record("x"), Vec::new());
            })
            .join()
            .unwrap();
        }
        let inner = Arc::new(AtomicUsize::new(usize::MAX));
        let seen = inner.clone();
        let nested = queue.clone();
        let delivered = queue.drain(&move |_, _| {
            seen.store(nested.drain(&deliver_all), Ordering::SeqCst);
        });
        assert_eq!(delivered, 1);
        assert_eq!(inner.load(Ordering::SeqCst), 0);
    }

    fn enqueue_from_another_thread(queue: &Arc<OutputQueue>, message: &str) {
        let queue = queue.clone();
        let message = message.to_string();
        std::thread::spawn(move || {
            assert!(matches!(
                queue.route(record(&message), Vec::new()),
                Route::Queued
            ));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn draining_one_queue_does_not_bypass_another() {
        let first = Arc::new(OutputQueue::new());
        let second = Arc::new(OutputQueue::new());
        first.set_output_thread(Some(std::thread::current().id()));
        let elsewhere = std::thread::spawn(|| ()).thread().id();
        second.set_output_thread(Some(elsewhere));
        enqueue_from_another_thread(&first, "x");

        let other = second.clone();
        let delivered = first.drain(&move |_, _| {
            assert!(matches!(
                other.route(record("forwarded"), Vec::new()),
                Route::Queued
            ));
        });
        assert_eq!(delivered, 1);
        assert_eq!(second.pending(), 1);
        assert!(!first.draining_here());
    }

    #[test]
    fn nested_drains_of_different_queues() {
        let first = Arc::new(OutputQueue::new());
        let second = Arc::new(OutputQueue::new());
        first.set_output_thread(Some(std::thread::current().id()));
        second.set_output_thread(Some(std::thread::current().id()));
        enqueue_from_another_thread(&first, "a");
        enqueue_from_another_thread(&second, "b");

        let inner = Arc::new(AtomicUsize::new(usize::MAX));
        let seen = inner.clone();
        let (outer_queue, inner_queue) = (first.clone(), second.clone());
        first.drain(&move |_, _| {
            seen.store(inner_queue.drain(&deliver_all), Ordering::SeqCst);
            // still inside the outer drain once the inner one is done
            assert!(outer_queue.draining_here());
        });
        assert_eq!(inner.load(Ordering::SeqCst), 1);
        assert_eq!(second.pending(), 0);
        assert!(!first.draining_here());
        assert!(!second.draining_here());
    }

    #[test]
    fn clearing_the_designation_waits_for_routing_in_progress() {
        let queue = Arc::new(OutputQueue::new());
        let output = std::thread::current().id();
        let routed = Arc::new(AtomicUsize::new(0));
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let routed = routed.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        if let Route::Queued = queue.route(record(&i.to_string()), Vec::new()) {
                            routed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        let mut drained = 0;
        while producers.iter().any(|p| !p.is_finished()) {
            queue.set_output_thread(Some(output));
            std::thread::yield_now();
            queue.set_output_thread(None);
            drained += queue.drain(&deliver_all);
            // nothing routed under the old designation arrives after the drain
            assert_eq!(queue.pending(), 0);
        }
        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(queue.pending(), 0);
        assert_eq!(drained, routed.load(Ordering::SeqCst));
    }
}
