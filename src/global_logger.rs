// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide logging instance.
//!
//! Independent components share one pipeline by logging through the instance returned by
//! [`global`].  The instance exists from first use; [`init`] gives it the default console
//! handler and applies the `DOMAINLOG_LEVEL` directives, [`uninit`] tears it down again.
//!
//! # Architecture
//!
//! The instance is a [`Logging`] stored in a `OnceLock`, so it is created lazily and never
//! moved.  `init`/`uninit` only change what the instance holds; references handed out by
//! [`global`] stay valid for the life of the process.
//!
//! # Examples
//!
//! ```
//! use domainlog::{global_logger, Severity};
//!
//! global_logger::init();
//! global_logger::set_level(Some("net"), Severity::Debug);
//! global_logger::log("net", Severity::Debug, "resolving peer");
//! global_logger::uninit();
//! ```
//!
//! Functions in this module are thin wrappers over the [`Logging`] methods of the same
//! name; use [`global`] for the rest of the API.

use crate::config::{LEVEL_ENV, LevelSpec};
use crate::error::Result;
use crate::handler::Handler;
use crate::level::{LevelMask, Severity};
use crate::logging::Logging;
use std::fmt::Arguments;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

static GLOBAL: OnceLock<Logging> = OnceLock::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// The process-wide instance.
pub fn global() -> &'static Logging {
    GLOBAL.get_or_init(Logging::new)
}

/// Installs the default console handler and applies `DOMAINLOG_LEVEL`.
///
/// Idempotent: calls after the first (until [`uninit`]) do nothing.  A malformed
/// `DOMAINLOG_LEVEL` is reported as a warning under the `domainlog` domain and otherwise
/// ignored.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        return;
    }
    let logging = global();
    logging.install_console();
    match LevelSpec::from_env(LEVEL_ENV) {
        Ok(Some(spec)) => spec.apply(logging),
        Ok(None) => {}
        Err(e) => logging.log(
            crate::logging::SELF_DOMAIN,
            Severity::Warning,
            &format!("ignoring {LEVEL_ENV}: {e}"),
        ),
    }
}

/// Removes and destroys every handler of the global instance and restores its default
/// policy.  Does nothing unless [`init`] ran.
pub fn uninit() {
    if INITIALIZED.swap(false, Ordering::AcqRel) {
        global().shutdown();
    }
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

pub fn set_level(domain: Option<&str>, severity: Severity) {
    global().set_level(domain, severity);
}

pub fn set_level_mask(domain: Option<&str>, mask: LevelMask) {
    global().set_level_mask(domain, mask);
}

pub fn level_mask(domain: Option<&str>) -> LevelMask {
    global().level_mask(domain)
}

pub fn set_thread_level(domain: Option<&str>, severity: Severity) {
    global().set_thread_level(domain, severity);
}

pub fn clear_thread_level(domain: Option<&str>) -> bool {
    global().clear_thread_level(domain)
}

pub fn is_enabled(domain: &str, severity: Severity) -> bool {
    global().is_enabled(domain, severity)
}

pub fn log(domain: &str, severity: Severity, message: &str) {
    global().log(domain, severity, message);
}

pub fn log_args(domain: &str, severity: Severity, args: Arguments<'_>) {
    global().log_args(domain, severity, args);
}

pub fn add_handler(handler: Handler) {
    global().add_handler(handler);
}

pub fn remove_handler(handler: &Handler) -> Result<()> {
    global().remove_handler(handler)
}

pub fn set_output_thread(thread: Option<ThreadId>) {
    global().set_output_thread(thread);
}

pub fn flush() {
    global().flush();
}
