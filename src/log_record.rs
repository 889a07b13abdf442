// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log record type.
//!
//! A [`LogRecord`] is built exactly once per enabled log call, after the level check has
//! passed, and is then shared (behind an `Arc`) by every handler that receives it.  The
//! message has already been expanded; handlers never see format arguments.
//!
//! # Example
//!
//! ```rust
//! use domainlog::{LogRecord, Severity};
//!
//! let record = LogRecord::new("net", Severity::Warning, "socket closed".to_string());
//! assert_eq!(record.domain(), "net");
//! assert!(record.to_string().ends_with("net-warning- socket closed"));
//! ```

use crate::Severity;
use chrono::{DateTime, Local};
use std::fmt::{Debug, Display};
use std::time::SystemTime;

/**
One line of log output, before rendering.

The record carries the domain and severity it was logged with, the formatted message, the
values of the calling thread's tags at the moment of the call, and a wall-clock timestamp.
*/
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogRecord {
    domain: String,
    severity: Severity,
    message: String,
    tags: Vec<String>,
    timestamp: SystemTime,
}

impl LogRecord {
    /// Creates a record stamped with the current time and no tags.
    pub fn new(domain: &str, severity: Severity, message: String) -> Self {
        Self {
            domain: domain.to_string(),
            severity,
            message,
            tags: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    pub(crate) fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Tag values active on the logging thread, in push order of distinct identifiers.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Renders the record as one line of text, without the trailing newline.
    ///
    /// This is the format used by the console and file handlers:
    /// `YYYY-mm-dd HH:MM:SS:mmm domain-severity-[tag][tag] message`.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let time: DateTime<Local> = self.timestamp.into();
        write!(
            f,
            "{} {}-{}-",
            time.format("%Y-%m-%d %H:%M:%S:%3f"),
            self.domain,
            self.severity
        )?;
        for tag in &self.tags {
            write!(f, "[{}]", tag)?;
        }
        write!(f, " {}", self.message)
    }
}
/*
Boilerplate notes for LogRecord:

IMPLEMENTED:
- Debug, Clone, PartialEq/Eq, Hash: derived, all fields support them
- Display: the rendered line

NOT IMPLEMENTED:
- Default: a record without a domain or message is not meaningful
- Ord/PartialOrd: no meaningful ordering between records
- Copy: owns heap data
*/
