// SPDX-License-Identifier: MIT OR Apache-2.0

//! Severities and severity masks.
//!
//! Every [`Severity`] owns one distinct bit.  The canonical stored form of any
//! level configuration is a [`LevelMask`]; "minimum level" configuration is sugar
//! that computes the mask of a severity and everything above it.

use crate::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

/// Ordered log importance level.
///
/// The discriminants are the bit values used inside a [`LevelMask`].
///
/// ```
/// use domainlog::Severity;
/// assert!(Severity::Debug < Severity::Fatal);
/// assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Severity {
    Debug = 1,
    Trace = 1 << 1,
    Message = 1 << 2,
    Warning = 1 << 3,
    Error = 1 << 4,
    /// A distinguished level value.  Logging at this level does not terminate anything.
    Fatal = 1 << 5,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Severity; 6] = [
        Severity::Debug,
        Severity::Trace,
        Severity::Message,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
    ];

    #[inline]
    pub const fn bit(self) -> u32 {
        self as u32
    }

    /// The mask selecting this severity and every severity above it.
    #[inline]
    pub const fn and_above(self) -> LevelMask {
        // bits >= self.bit(), clipped to the known severities
        LevelMask(!(self.bit() - 1) & LevelMask::ALL.0)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Trace => "trace",
            Severity::Message => "message",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "trace" => Ok(Severity::Trace),
            "message" | "info" | "normal" => Ok(Severity::Message),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            _ => Err(Error::InvalidLevel(s.to_string())),
        }
    }
}

/**
An arbitrary combination of severity bits.

A level check is "is this severity's bit set in the effective mask".  Masks built from
[`Severity::and_above`] express the usual "minimum level" mode, but any combination is
legal, including the empty mask which silences a domain entirely.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelMask(u32);

impl LevelMask {
    pub const NONE: LevelMask = LevelMask(0);
    pub const ALL: LevelMask = LevelMask((1 << 6) - 1);

    /// Builds a mask from raw bits.  Bits outside the six severities are discarded.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        LevelMask(bits & Self::ALL.0)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, severity: Severity) -> bool {
        self.0 & severity.bit() != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the severities set in this mask, lowest first.
    pub fn iter(self) -> impl Iterator<Item = Severity> {
        Severity::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl From<Severity> for LevelMask {
    fn from(value: Severity) -> Self {
        LevelMask(value.bit())
    }
}

impl BitOr for LevelMask {
    type Output = LevelMask;
    fn bitor(self, rhs: Self) -> Self::Output {
        LevelMask(self.0 | rhs.0)
    }
}

impl BitOr<Severity> for LevelMask {
    type Output = LevelMask;
    fn bitor(self, rhs: Severity) -> Self::Output {
        LevelMask(self.0 | rhs.bit())
    }
}

impl BitOr for Severity {
    type Output = LevelMask;
    fn bitor(self, rhs: Self) -> Self::Output {
        LevelMask(self.bit() | rhs.bit())
    }
}

impl BitOrAssign<Severity> for LevelMask {
    fn bitor_assign(&mut self, rhs: Severity) {
        self.0 |= rhs.bit();
    }
}

impl BitAnd for LevelMask {
    type Output = LevelMask;
    fn bitand(self, rhs: Self) -> Self::Output {
        LevelMask(self.0 & rhs.0)
    }
}

impl Display for LevelMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for severity in self.iter() {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(severity.name())?;
        }
        Ok(())
    }
}

impl FromStr for LevelMask {
    type Err = Error;

    /// Parses `"none"`, or one or more severity names joined by `|`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("none") {
            return Ok(LevelMask::NONE);
        }
        let mut mask = LevelMask::NONE;
        for part in s.split('|') {
            mask |= part.parse::<Severity>()?;
        }
        Ok(mask)
    }
}

/*
Boilerplate notes.

Severity: Copy, Ord (the enumeration is ordered), Hash, Display/FromStr via level names.
Default is not implemented; there is no obviously neutral severity.

LevelMask: Copy, Default (empty mask), Hash.  Ord makes no sense for a bit set.
*/
