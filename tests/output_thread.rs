// SPDX-License-Identifier: MIT OR Apache-2.0

use domainlog::{Handler, InMemorySink, Logging, Severity};
use std::sync::Arc;
use std::sync::mpsc;

#[test]
fn flush_is_a_barrier_for_earlier_records() {
    let logging = Arc::new(Logging::new());
    let sink = Arc::new(InMemorySink::new());
    logging.add_handler(Handler::new(sink.clone()));

    let (ready_tx, ready_rx) = mpsc::channel();
    let (go_tx, go_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel();

    let output = {
        let logging = logging.clone();
        let sink = sink.clone();
        std::thread::Builder::new()
            .name("log-output".to_string())
            .spawn(move || {
                logging.set_output_thread(Some(std::thread::current().id()));
                ready_tx.send(()).unwrap();
                go_rx.recv().unwrap();
                logging.flush();
                done_tx.send(sink.messages()).unwrap();
            })
            .unwrap()
    };

    ready_rx.recv().unwrap();
    for i in 0..100 {
        logging.log("app", Severity::Error, &i.to_string());
    }
    // nothing reaches the sink off the output thread
    assert!(sink.is_empty());
    assert_eq!(logging.diagnostics().records_pending, 100);

    go_tx.send(()).unwrap();
    let delivered = done_rx.recv().unwrap();
    output.join().unwrap();

    let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
    assert_eq!(delivered, expected);
    assert_eq!(logging.diagnostics().records_queued, 100);
    assert_eq!(logging.diagnostics().records_pending, 0);
}

#[test]
fn producers_racing_a_flush_lose_nothing() {
    let logging = Arc::new(Logging::new());
    let sink = Arc::new(InMemorySink::new());
    logging.add_handler(Handler::new(sink.clone()));
    logging.set_output_thread(Some(std::thread::current().id()));

    let producers: Vec<_> = (0..4)
        .map(|t| {
            let logging = logging.clone();
            std::thread::spawn(move || {
                for i in 0..250 {
                    logging.log("app", Severity::Error, &format!("{t}:{i}"));
                }
            })
        })
        .collect();
    while producers.iter().any(|p| !p.is_finished()) {
        logging.flush();
    }
    for producer in producers {
        producer.join().unwrap();
    }
    logging.flush();

    let messages = sink.messages();
    assert_eq!(messages.len(), 1000);
    // per-producer order is preserved
    for t in 0..4 {
        let prefix = format!("{t}:");
        let own: Vec<usize> = messages
            .iter()
            .filter_map(|m| m.strip_prefix(&prefix))
            .map(|i| i.parse().unwrap())
            .collect();
        assert_eq!(own, (0..250).collect::<Vec<_>>());
    }
}

#[test]
fn sink_logging_during_drain_is_delivered() {
    let logging = Arc::new(Logging::new());
    let sink = Arc::new(InMemorySink::new());
    logging.add_handler(Handler::new(sink.clone()));
    let echo = {
        let logging = Arc::downgrade(&logging);
        Handler::from_fn(move |record| {
            if record.domain() == "app" {
                if let Some(logging) = logging.upgrade() {
                    logging.log("echo", Severity::Error, record.message());
                }
            }
        })
    };
    logging.add_handler(echo);
    logging.set_output_thread(Some(std::thread::current().id()));

    {
        let logging = logging.clone();
        std::thread::spawn(move || logging.log("app", Severity::Error, "ping"))
            .join()
            .unwrap();
    }
    logging.flush();
    assert_eq!(sink.messages(), vec!["ping", "ping"]);
}

#[test]
fn shutdown_delivers_queued_records() {
    let logging = Arc::new(Logging::new());
    let sink = Arc::new(InMemorySink::new());
    logging.add_handler(Handler::new(sink.clone()));
    logging.set_output_thread(Some(std::thread::current().id()));
    {
        let logging = logging.clone();
        std::thread::spawn(move || logging.log("app", Severity::Error, "pending"))
            .join()
            .unwrap();
    }
    logging.shutdown();
    let records = sink.drain_records();
    assert_eq!(records[0].message(), "pending");
    // followed by the notice about it
    assert_eq!(records[1].domain(), domainlog::SELF_DOMAIN);
}

#[test]
fn draining_one_instance_does_not_bypass_another_instances_queue() {
    let first = Arc::new(Logging::new());
    let second = Arc::new(Logging::new());
    let second_sink = Arc::new(InMemorySink::new());
    second.add_handler(Handler::new(second_sink.clone()));
    let forward = {
        let second = second.clone();
        Handler::from_fn(move |record| second.log("forwarded", Severity::Error, record.message()))
    };
    forward.set_domain(Some("app")).unwrap();
    first.add_handler(forward);

    first.set_output_thread(Some(std::thread::current().id()));
    let elsewhere = std::thread::spawn(|| ()).thread().id();
    second.set_output_thread(Some(elsewhere));
    {
        let first = first.clone();
        std::thread::spawn(move || first.log("app", Severity::Error, "hop"))
            .join()
            .unwrap();
    }
    first.flush();

    // still waiting for the second instance's own output thread
    assert!(second_sink.is_empty());
    assert_eq!(second.diagnostics().records_pending, 1);
    second.set_output_thread(None);
    assert_eq!(second_sink.messages(), vec!["hop"]);
}

#[test]
fn toggling_the_output_thread_strands_nothing() {
    let logging = Arc::new(Logging::new());
    let sink = Arc::new(InMemorySink::new());
    logging.add_handler(Handler::new(sink.clone()));
    let output = std::thread::current().id();

    let producers: Vec<_> = (0..4)
        .map(|t| {
            let logging = logging.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    logging.log("app", Severity::Error, &format!("{t}:{i}"));
                }
            })
        })
        .collect();
    while producers.iter().any(|p| !p.is_finished()) {
        logging.set_output_thread(Some(output));
        std::thread::yield_now();
        logging.set_output_thread(None);
    }
    for producer in producers {
        producer.join().unwrap();
    }

    // no flush: clearing the designation already delivered everything queued under it
    assert_eq!(logging.diagnostics().records_pending, 0);
    assert_eq!(sink.len(), 2000);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "output thread")]
fn flush_off_the_output_thread_panics_in_debug() {
    let logging = Arc::new(Logging::new());
    let output = std::thread::spawn(|| ()).thread().id();
    logging.set_output_thread(Some(output));
    logging.flush();
}
