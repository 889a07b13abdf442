// SPDX-License-Identifier: MIT OR Apache-2.0

//! # In-Memory Sink
//!
//! A sink that keeps rendered lines in memory instead of writing them anywhere.  It is the
//! tool of choice for tests that need to assert on what was logged, and for hosts that
//! want to inspect recent output programmatically.
//!
//! The sink stores whole records, so tests can check domains, severities and tags as well
//! as the rendered text.

use crate::log_record::LogRecord;
use crate::sink::Sink;
use std::sync::{Mutex, PoisonError};

/// A sink that stores every record it receives.
///
/// # Example
///
/// ```rust
/// use domainlog::{Handler, InMemorySink, Logging, Severity};
/// use std::sync::Arc;
///
/// let logging = Logging::new();
/// let sink = Arc::new(InMemorySink::new());
/// logging.add_handler(Handler::new(sink.clone()));
///
/// logging.log("net", Severity::Error, "connection refused");
///
/// let logs = sink.drain_logs();
/// assert!(logs.contains("net-error- connection refused"));
/// assert_eq!(sink.drain_logs(), "");
/// ```
#[derive(Debug, Default)]
pub struct InMemorySink {
    records: Mutex<Vec<LogRecord>>,
}

// ============================================================================
// BOILERPLATE TRAIT IMPLEMENTATIONS
// ============================================================================
//
// - Debug, Default: Derived (empty buffer)
// - Clone: NOT implemented - share through Arc instead, a copy would silently split the log
// - PartialEq/Eq/Hash: NOT implemented - equality of loggers is not meaningful
// - Send/Sync: Automatic via Mutex

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all rendered lines joined with newlines and clears the buffer.
    pub fn drain_logs(&self) -> String {
        let mut records = self.lock();
        let result = records
            .iter()
            .map(LogRecord::render)
            .collect::<Vec<_>>()
            .join("\n");
        records.clear();
        result
    }

    /// Removes and returns the stored records.
    pub fn drain_records(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// The messages stored so far, without clearing them.
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.message().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sink for InMemorySink {
    fn write(&self, record: &LogRecord) {
        self.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;

    #[test]
    fn drain_clears_buffer() {
        let sink = InMemorySink::new();
        sink.write(&LogRecord::new("x", Severity::Warning, "first".to_string()));
        sink.write(&LogRecord::new("x", Severity::Error, "second".to_string()));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.messages(), vec!["first", "second"]);
        let logs = sink.drain_logs();
        assert!(logs.contains("first"));
        assert!(logs.contains("second"));
        assert!(sink.is_empty());
        assert_eq!(sink.drain_logs(), "");
    }
}
