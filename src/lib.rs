//SPDX-License-Identifier: MIT OR Apache-2.0
/*!
# domainlog

domainlog is a domain-scoped logging core meant to be shared by many independent components
of one process.

# The problem

A process that links a dozen libraries wants one log pipeline: one place where lines are
written, one place where levels are configured.  But each library wants to be configured on
its own ("debug for the network stack, warnings for everything else"), none of them should
know about the others, and some of them log from threads that must not stall.

# Domains and levels

Every log call names a *domain*, a short string identifying the component.  Severities are
bits in a mask:

| Severity  | Bit |
|-----------|-----|
| `Debug`   | 1   |
| `Trace`   | 2   |
| `Message` | 4   |
| `Warning` | 8   |
| `Error`   | 16  |
| `Fatal`   | 32  |

The effective mask for a call is, in order of precedence, the calling thread's override for
the domain, the thread's override for all domains, the policy entry for the domain, and the
global mask (warning and above unless configured).

```rust
use domainlog::{Logging, Severity, InMemorySink, Handler};
use std::sync::Arc;

let logging = Logging::new();
let sink = Arc::new(InMemorySink::new());
logging.add_handler(Handler::new(sink.clone()));

logging.set_level(None, Severity::Warning);
logging.set_level(Some("net"), Severity::Debug);

logging.log("net", Severity::Debug, "x");
logging.log("other", Severity::Debug, "x");
logging.log("other", Severity::Error, "y");
assert_eq!(sink.messages(), vec!["x", "y"]);
```

`Fatal` is only a level; logging at it does not terminate anything.

# Handlers

A [`Handler`] wraps a [`Sink`] with an optional domain filter, optional user data and a
destroy callback that runs exactly once.  Handlers can be added and removed from any
thread at any time, including from inside a sink; removal waits for deliveries already in
progress before destroying the handler.  The crate ships a [`ConsoleSink`], a rotating
[`FileSink`] and an [`InMemorySink`] for tests.

# Tags

The [`context`] module keeps a per-thread stack of named tags whose values are attached to
every record, so lines can be correlated across components.  Tags cross thread boundaries
only as explicit snapshots.

# Output thread

By default sinks run on the thread that logged.  A process can instead designate one output
thread; records logged elsewhere are queued and reach the sinks when that thread flushes.

# The process-wide instance

[`global_logger`] holds the instance components share; [`global_logger::init`] installs a
console handler and reads `DOMAINLOG_LEVEL` (see [`LevelSpec`]).
*/

mod config;
mod console_sink;
pub mod context;
mod diagnostics;
mod dispatch;
mod error;
mod file_handler;
pub mod global_logger;
mod handler;
mod inmemory_sink;
mod level;
mod log_record;
mod logging;
mod output_queue;
mod policy;
mod sink;
mod spinlock;

pub use config::{LEVEL_ENV, LevelSpec};
pub use console_sink::ConsoleSink;
pub use diagnostics::Diagnostics;
pub use error::{Error, Result};
pub use file_handler::{
    ArchiveNaming, Clock, FileHandlerConfig, FileSink, FileSystem, StdFileSystem, SystemClock,
};
pub use handler::{CallbackSink, Handler, HandlerId, UserData};
pub use inmemory_sink::InMemorySink;
pub use level::{LevelMask, Severity};
pub use log_record::LogRecord;
pub use logging::{Logging, SELF_DOMAIN};
pub use policy::DEFAULT_MASK;
pub use sink::Sink;
