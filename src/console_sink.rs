// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::log_record::LogRecord;
use crate::sink::Sink;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/**
The default sink: one rendered line per record on stdout, stderr, or any writer.

[`crate::global_logger::init`] installs one of these writing to stdout.  A writer-backed
console sink is what [`Logging::set_log_writer`](crate::Logging::set_log_writer) installs.

Write errors are ignored; logging must never take down the host.
 */
pub struct ConsoleSink {
    target: Target,
}

enum Target {
    Stdout,
    Stderr,
    Writer(Mutex<Box<dyn Write + Send>>),
}

// ============================================================================
// BOILERPLATE TRAIT IMPLEMENTATIONS
// ============================================================================
//
// - Debug: Implemented by hand, the boxed writer has no Debug
// - Default: Implemented - stdout, like the handler installed by init
// - Clone/Copy/PartialEq/Hash: NOT implemented - a writer-backed sink owns a resource
// - Send/Sync: Automatic, the writer is behind a Mutex

impl std::fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = match self.target {
            Target::Stdout => "stdout",
            Target::Stderr => "stderr",
            Target::Writer(_) => "writer",
        };
        f.debug_struct("ConsoleSink").field("target", &target).finish()
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl ConsoleSink {
    pub const fn stdout() -> Self {
        Self {
            target: Target::Stdout,
        }
    }

    pub const fn stderr() -> Self {
        Self {
            target: Target::Stderr,
        }
    }

    /// Writes lines into `writer`, for example an already opened file.
    pub fn writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            target: Target::Writer(Mutex::new(writer)),
        }
    }
}

impl Sink for ConsoleSink {
    fn write(&self, record: &LogRecord) {
        let mut line = record.render();
        line.push('\n');
        let _ = match &self.target {
            Target::Stdout => std::io::stdout().lock().write_all(line.as_bytes()),
            Target::Stderr => std::io::stderr().lock().write_all(line.as_bytes()),
            Target::Writer(writer) => writer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write_all(line.as_bytes()),
        };
    }

    fn flush(&self) {
        let _ = match &self.target {
            Target::Stdout => std::io::stdout().flush(),
            Target::Stderr => std::io::stderr().flush(),
            Target::Writer(writer) => writer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .flush(),
        };
    }

    fn close(&self) {
        self.flush();
    }
}
