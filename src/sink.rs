//SPDX-License-Identifier: MIT OR Apache-2.0
use crate::log_record::LogRecord;
use std::fmt::Debug;

/**
The write capability behind a [`Handler`](crate::Handler).

Sinks are called from whichever thread logged the record (or from the designated output
thread when the output queue is in use).  They must be fast and must not block for long:
a slow sink stalls every other handler and every calling thread on the synchronous path.
Panics raised by a sink are caught at the dispatch boundary and counted; they never reach
the code that logged.
*/
pub trait Sink: Debug + Send + Sync {
    /**
    Writes one complete record.
    */
    fn write(&self, record: &LogRecord);

    /**
    Pushes buffered output down to the underlying resource.

    Also the point where deferred maintenance (such as a requested file reopen) may be serviced.
    */
    fn flush(&self) {}

    /**
    Releases the underlying resource.  Called once, when the owning handler is destroyed,
    but implementations must tolerate repeated calls.
    */
    fn close(&self) {}
}

/*
Boilerplate notes.

# Sink

Clone makes no sense for something that may own a file.
PartialEq/Eq/Hash: handlers have identity, sinks do not need one.
Default is not sensible (where would a file sink write?).
Send/Sync are required: sinks are shared by every logging thread.
*/
