// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration and construction errors.
//!
//! Nothing on the log-call path returns these; they are reported by the operations
//! that change configuration or build handlers.

use std::io;
use std::path::PathBuf;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The handler is not registered with this logging instance.
    #[error("handler is not registered")]
    UnknownHandler,

    /// Domains are short printable strings.
    #[error("invalid log domain {0:?}")]
    InvalidDomain(String),

    #[error("unknown severity {0:?}")]
    InvalidLevel(String),

    /// A level directive could not be parsed.
    #[error("invalid level directive: {0}")]
    InvalidSpec(String),

    /// The file handler's directory could not be created.
    #[error("failed to create log directory at {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Checks that `domain` may be used as a policy key or handler filter.
pub(crate) fn validate_domain(domain: &str) -> Result<()> {
    if domain.chars().any(char::is_control) {
        return Err(Error::InvalidDomain(domain.to_string()));
    }
    Ok(())
}
