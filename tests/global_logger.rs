// SPDX-License-Identifier: MIT OR Apache-2.0

use domainlog::global_logger;
use domainlog::{Handler, InMemorySink, Severity};
use std::sync::{Arc, Mutex};

static TEST_LOGGER_GUARD: Mutex<()> = Mutex::new(());

#[test]
fn init_applies_level_directives_from_environment() {
    let _guard = TEST_LOGGER_GUARD.lock().unwrap();
    // SAFETY: tests in this binary that touch the environment hold the guard
    unsafe { std::env::set_var(domainlog::LEVEL_ENV, "error,net=debug") };
    global_logger::init();
    unsafe { std::env::remove_var(domainlog::LEVEL_ENV) };

    assert!(global_logger::is_enabled("net", Severity::Debug));
    assert!(!global_logger::is_enabled("other", Severity::Warning));
    global_logger::uninit();
    assert!(global_logger::is_enabled("other", Severity::Warning));
    assert!(!global_logger::is_enabled("net", Severity::Debug));
}

#[test]
fn malformed_environment_is_reported_not_fatal() {
    let _guard = TEST_LOGGER_GUARD.lock().unwrap();
    let sink = Arc::new(InMemorySink::new());
    global_logger::add_handler(Handler::new(sink.clone()));
    unsafe { std::env::set_var(domainlog::LEVEL_ENV, "net=loud") };
    global_logger::init();
    unsafe { std::env::remove_var(domainlog::LEVEL_ENV) };

    let records = sink.drain_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].domain(), domainlog::SELF_DOMAIN);
    assert_eq!(records[0].severity(), Severity::Warning);
    global_logger::uninit();
}

#[test]
fn init_uninit_cycles() {
    let _guard = TEST_LOGGER_GUARD.lock().unwrap();
    for _ in 0..3 {
        global_logger::init();
        let sink = Arc::new(InMemorySink::new());
        let handler = Handler::new(sink.clone());
        global_logger::add_handler(handler.clone());
        global_logger::log_args("cycle", Severity::Error, format_args!("n={}", 1));
        assert_eq!(sink.messages(), vec!["n=1"]);
        global_logger::uninit();
        assert!(handler.is_destroyed());
        assert!(global_logger::global().handlers().is_empty());
    }
}
