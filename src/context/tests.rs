// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests for the context module.

use super::*;
use crate::{Logging, Severity};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn shadowed_tag_is_restored_by_pop() {
    clear_tags();
    push_tag("id", "a");
    push_tag("id", "b");
    assert_eq!(tag_value("id").as_deref(), Some("b"));
    pop_tag("id");
    assert_eq!(tag_value("id").as_deref(), Some("a"));
    pop_tag("id");
    assert_eq!(tag_value("id"), None);
    // one pop too many
    pop_tag("id");
    assert!(current_tags().is_empty());
}

#[test]
fn current_tags_follow_first_push_order() {
    clear_tags();
    push_tag("call", "c-1");
    push_tag("stream", "s-1");
    push_tag("call", "c-2");
    assert_eq!(current_tags(), vec!["c-2", "s-1"]);
    pop_tag("call");
    assert_eq!(current_tags(), vec!["c-1", "s-1"]);
    clear_tags();
}

#[test]
fn snapshot_round_trips_to_a_fresh_thread() {
    clear_tags();
    push_tag("call", "c-1");
    push_tag("stream", "s-1");
    let expected = current_tags();
    let snapshot = snapshot_tags();

    // later changes here do not leak into the snapshot
    pop_tag("stream");
    push_tag("other", "o");

    let seen = std::thread::spawn(move || {
        assert!(current_tags().is_empty());
        restore_tags(&snapshot);
        release_snapshot(snapshot);
        current_tags()
    })
    .join()
    .unwrap();
    assert_eq!(seen, expected);
    assert_eq!(current_tags(), vec!["c-1", "o"]);
    clear_tags();
}

#[test]
fn restore_overwrites_existing_tags() {
    clear_tags();
    push_tag("a", "1");
    let snapshot = snapshot_tags();
    clear_tags();
    push_tag("b", "2");
    restore_tags(&snapshot);
    assert_eq!(current_tags(), vec!["1"]);
    assert_eq!(snapshot.values(), vec!["1"]);
    clear_tags();
}

#[test]
fn tag_guard_pops_on_drop() {
    clear_tags();
    {
        let _outer = TagGuard::push("req", "r-1");
        {
            let _inner = TagGuard::push("req", "r-2");
            assert_eq!(tag_value("req").as_deref(), Some("r-2"));
        }
        assert_eq!(tag_value("req").as_deref(), Some("r-1"));
    }
    assert!(current_tags().is_empty());
}

#[test]
fn spawn_carries_tags() {
    clear_tags();
    let _job = TagGuard::push("job", "j-1");
    let tags = spawn(current_tags).join().unwrap();
    assert_eq!(tags, vec!["j-1"]);
    let named = spawn_named("tagged-worker".to_string(), || {
        (
            std::thread::current().name().map(str::to_string),
            current_tags(),
        )
    })
    .unwrap()
    .join()
    .unwrap();
    assert_eq!(named.0.as_deref(), Some("tagged-worker"));
    assert_eq!(named.1, vec!["j-1"]);
}

#[test_executors::async_test]
async fn apply_tags_installs_and_restores() {
    clear_tags();
    push_tag("request", "r-17");
    let wrapped = ApplyTags::new(snapshot_tags(), async { current_tags() });
    pop_tag("request");
    push_tag("poller", "p");

    assert_eq!(wrapped.await, vec!["r-17"]);
    assert_eq!(current_tags(), vec!["p"]);
    clear_tags();
}

#[test]
fn thread_override_set_then_clear_restores_mask() {
    let logging = Logging::new();
    logging.set_level(Some("net"), Severity::Error);
    let before = logging.effective_mask("net");
    logging.set_thread_level(Some("net"), Severity::Debug);
    assert_ne!(logging.effective_mask("net"), before);
    logging.clear_thread_level(Some("net"));
    assert_eq!(logging.effective_mask("net"), before);
}

#[test]
fn overrides_stay_on_their_thread() {
    let logging = Arc::new(Logging::new());
    logging.set_thread_level(None, Severity::Debug);
    let other = {
        let logging = logging.clone();
        std::thread::spawn(move || logging.is_enabled("d", Severity::Debug))
            .join()
            .unwrap()
    };
    assert!(!other);
    assert!(logging.is_enabled("d", Severity::Debug));
    logging.clear_thread_level(None);
}

#[test]
fn thread_exit_reclaims_override_slot() {
    let logging = Arc::new(Logging::new());
    let active = Arc::new(AtomicUsize::new(0));
    let observed = active.clone();
    let handle = {
        let logging = logging.clone();
        std::thread::spawn(move || {
            logging.set_thread_level(Some("d"), Severity::Debug);
            observed.store(logging.overrides_active(), Ordering::SeqCst);
        })
    };
    handle.join().unwrap();
    assert_eq!(active.load(Ordering::SeqCst), 1);
    // the exited thread's slot was dropped with its thread-locals
    assert_eq!(logging.overrides_active(), 0);
}

#[test]
fn shutdown_retires_overrides_held_by_other_threads() {
    let logging = Arc::new(Logging::new());
    let (set_tx, set_rx) = std::sync::mpsc::channel();
    let (shut_tx, shut_rx) = std::sync::mpsc::channel::<()>();
    let holder = {
        let logging = logging.clone();
        std::thread::spawn(move || {
            logging.set_thread_level(None, Severity::Debug);
            set_tx.send(logging.is_enabled("d", Severity::Debug)).unwrap();
            shut_rx.recv().unwrap();
            let after_shutdown = logging.is_enabled("d", Severity::Debug);
            // a fresh override after shutdown applies again
            logging.set_thread_level(Some("d"), Severity::Message);
            (after_shutdown, logging.is_enabled("d", Severity::Message))
        })
    };
    assert!(set_rx.recv().unwrap());
    logging.shutdown();
    shut_tx.send(()).unwrap();
    let (after_shutdown, fresh) = holder.join().unwrap();
    assert!(!after_shutdown);
    assert!(fresh);
    assert_eq!(logging.overrides_active(), 0);
}

#[test]
fn apply_tags_restores_when_the_inner_future_panics() {
    use std::future::Future;
    use std::task::{Context, Waker};

    clear_tags();
    let empty = snapshot_tags();
    push_tag("outer", "o");
    let failing = ApplyTags::new(empty, async {
        push_tag("inner", "i");
        panic!("future failed");
    });
    let mut failing = Box::pin(failing);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = failing
            .as_mut()
            .poll(&mut Context::from_waker(Waker::noop()));
    }));
    assert!(result.is_err());
    assert_eq!(current_tags(), vec!["o"]);
    clear_tags();
}

#[test]
fn apply_tags_installs_the_snapshot_afresh_on_each_poll() {
    use std::future::Future;
    use std::task::{Context, Poll, Waker};

    clear_tags();
    push_tag("request", "r-1");
    let snapshot = snapshot_tags();
    clear_tags();

    let mut polls = 0;
    let seen = std::future::poll_fn(move |cx| {
        polls += 1;
        if polls == 1 {
            push_tag("scratch", "s");
            cx.waker().wake_by_ref();
            Poll::Pending
        } else {
            Poll::Ready(current_tags())
        }
    });
    let mut wrapped = Box::pin(ApplyTags::new(snapshot, seen));
    let mut cx = Context::from_waker(Waker::noop());
    assert!(wrapped.as_mut().poll(&mut cx).is_pending());
    assert!(current_tags().is_empty());
    assert_eq!(
        wrapped.as_mut().poll(&mut cx),
        Poll::Ready(vec!["r-1".to_string()])
    );
}
