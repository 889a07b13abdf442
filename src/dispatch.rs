// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of one record to a registry snapshot.
//!
//! # Architecture
//!
//! A log call flows through [`Logging`](crate::Logging) like this:
//! 1. The effective mask for (calling thread, domain) is computed; a clear bit returns
//!    before anything is allocated.
//! 2. The record is built once: message, the thread's tags, a timestamp.
//! 3. The registry is copied under its read lock (a vector of `Arc` clones) and the lock
//!    is released.
//! 4. The output queue decides whether the snapshot is delivered on this thread or handed
//!    to the designated output thread.
//! 5. [`fan_out`] offers the record to every handler of the snapshot in registration order.
//!
//! Handlers added after step 3 do not see the record.  Handlers removed after step 3 skip
//! it if their removal completed first, and otherwise receive it before their removal
//! completes.

use crate::diagnostics::Counters;
use crate::handler::{Delivery, Handler};
use crate::log_record::LogRecord;

/// Offers `record` to each handler in order.  A panicking sink is counted and skipped.
pub(crate) fn fan_out(record: &LogRecord, handlers: &[Handler], counters: &Counters) {
    for handler in handlers {
        if handler.deliver(record) == Delivery::Panicked {
            counters.handler_panicked();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use crate::inmemory_sink::InMemorySink;
    use std::sync::Arc;

    #[test]
    fn panicking_handler_does_not_stop_the_others() {
        let before = Arc::new(InMemorySink::new());
        let after = Arc::new(InMemorySink::new());
        let handlers = vec![
            Handler::new(before.clone()),
            Handler::from_fn(|_| panic!("broken sink")),
            Handler::new(after.clone()),
        ];
        let counters = Counters::default();
        let record = LogRecord::new("d", Severity::Error, "m".to_string());
        fan_out(&record, &handlers, &counters);
        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 1);
        assert_eq!(counters.snapshot(0, 0).handler_panics, 1);
    }

    #[test]
    fn domain_filtered_handlers_are_skipped() {
        let net = Arc::new(InMemorySink::new());
        let handler = Handler::new(net.clone());
        handler.set_domain(Some("net")).unwrap();
        let counters = Counters::default();
        fan_out(
            &LogRecord::new("media", Severity::Error, "m".to_string()),
            &[handler.clone()],
            &counters,
        );
        fan_out(
            &LogRecord::new("net", Severity::Error, "m".to_string()),
            &[handler],
            &counters,
        );
        assert_eq!(net.len(), 1);
    }
}
