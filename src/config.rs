// SPDX-License-Identifier: MIT OR Apache-2.0

//! Textual level configuration.
//!
//! A [`LevelSpec`] is a comma-separated list of directives:
//!
//! - `<level>` sets the global mask,
//! - `<domain>=<level>` sets the mask of one domain.
//!
//! A level is either a severity name (that severity and everything above it) or an explicit
//! mask of names joined by `|`, or `none`.
//!
//! ```rust
//! use domainlog::{LevelSpec, Logging, Severity};
//!
//! let spec: LevelSpec = "error,net=debug,media=trace|fatal".parse().unwrap();
//! let logging = Logging::new();
//! spec.apply(&logging);
//!
//! assert!(logging.is_enabled("net", Severity::Message));
//! assert!(!logging.is_enabled("media", Severity::Error));
//! assert!(!logging.is_enabled("other", Severity::Warning));
//! ```

use crate::error::{Error, Result, validate_domain};
use crate::level::{LevelMask, Severity};
use crate::logging::Logging;
use std::fmt::Display;
use std::str::FromStr;

/// The environment variable [`global_logger::init`](crate::global_logger::init) reads.
pub const LEVEL_ENV: &str = "DOMAINLOG_LEVEL";

/// A parsed list of level directives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelSpec {
    global: Option<LevelMask>,
    domains: Vec<(String, LevelMask)>,
}

fn parse_level(text: &str) -> Result<LevelMask> {
    let text = text.trim();
    if text.contains('|') || text.eq_ignore_ascii_case("none") {
        text.parse()
    } else {
        Ok(text.parse::<Severity>()?.and_above())
    }
}

impl LevelSpec {
    pub fn parse(text: &str) -> Result<LevelSpec> {
        let mut spec = LevelSpec::default();
        for directive in text.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((domain, level)) => {
                    let domain = domain.trim();
                    if domain.is_empty() {
                        return Err(Error::InvalidSpec(format!(
                            "missing domain in {directive:?}"
                        )));
                    }
                    validate_domain(domain)?;
                    let mask = parse_level(level)
                        .map_err(|e| Error::InvalidSpec(format!("{directive:?}: {e}")))?;
                    spec.domains.push((domain.to_string(), mask));
                }
                None => {
                    let mask = parse_level(directive)
                        .map_err(|e| Error::InvalidSpec(format!("{directive:?}: {e}")))?;
                    spec.global = Some(mask);
                }
            }
        }
        Ok(spec)
    }

    /// Reads and parses the variable `var`.  An unset or empty variable is `Ok(None)`.
    pub fn from_env(var: &str) -> Result<Option<LevelSpec>> {
        match std::env::var(var) {
            Ok(text) if !text.trim().is_empty() => LevelSpec::parse(&text).map(Some),
            _ => Ok(None),
        }
    }

    pub fn global(&self) -> Option<LevelMask> {
        self.global
    }

    /// Domain directives in the order they were written.  A later entry for the same
    /// domain wins when applied.
    pub fn domains(&self) -> &[(String, LevelMask)] {
        &self.domains
    }

    pub fn apply(&self, logging: &Logging) {
        if let Some(mask) = self.global {
            logging.set_level_mask(None, mask);
        }
        for (domain, mask) in &self.domains {
            logging.set_level_mask(Some(domain), *mask);
        }
    }
}

impl FromStr for LevelSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LevelSpec::parse(s)
    }
}

impl Display for LevelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        if let Some(mask) = self.global {
            write!(f, "{mask}")?;
            first = false;
        }
        for (domain, mask) in &self.domains {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{domain}={mask}")?;
            first = false;
        }
        Ok(())
    }
}
