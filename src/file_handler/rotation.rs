// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archive naming and the rename step of a rotation.

use super::fs::{Clock, FileSystem};
use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};

/// How rotated files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveNaming {
    /// `name_1.log` is the newest archive, `name_2.log` the one before, and so on.
    #[default]
    Numbered,
    /// `name_YYYYmmdd-HHMMSS.log`, stamped with the rotation time.
    Timestamped,
}

/// The paths one file handler works with.
#[derive(Debug, Clone)]
pub(crate) struct LogPaths {
    directory: PathBuf,
    stem: String,
}

impl LogPaths {
    /// `base_name` may be given with or without the `.log` extension.
    pub(crate) fn new(directory: PathBuf, base_name: &str) -> Self {
        let stem = base_name.strip_suffix(".log").unwrap_or(base_name);
        LogPaths {
            directory,
            stem: stem.to_string(),
        }
    }

    pub(crate) fn directory(&self) -> &Path {
        &self.directory
    }

    pub(crate) fn active(&self) -> PathBuf {
        self.directory.join(format!("{}.log", self.stem))
    }

    pub(crate) fn numbered(&self, index: usize) -> PathBuf {
        self.directory.join(format!("{}_{}.log", self.stem, index))
    }

    fn timestamped(&self, time: DateTime<Local>, attempt: usize) -> PathBuf {
        let stamp = time.format("%Y%m%d-%H%M%S");
        if attempt == 0 {
            self.directory.join(format!("{}_{}.log", self.stem, stamp))
        } else {
            self.directory
                .join(format!("{}_{}-{}.log", self.stem, stamp, attempt))
        }
    }
}

/// Moves the active file out of the way.  The caller has already closed it.
///
/// With numbered naming, existing archives shift up by one and the oldest beyond
/// `max_archives` is deleted; `max_archives == Some(0)` keeps no archive at all.
pub(crate) fn archive_active(
    paths: &LogPaths,
    naming: ArchiveNaming,
    max_archives: Option<usize>,
    fs: &dyn FileSystem,
    clock: &dyn Clock,
) -> io::Result<()> {
    let active = paths.active();
    if !fs.exists(&active) {
        return Ok(());
    }
    match naming {
        ArchiveNaming::Numbered => {
            if max_archives == Some(0) {
                return fs.remove(&active);
            }
            let mut highest = 0;
            while fs.exists(&paths.numbered(highest + 1)) {
                highest += 1;
            }
            if let Some(max) = max_archives {
                // drop everything that would land beyond the limit
                while highest >= max {
                    fs.remove(&paths.numbered(highest))?;
                    highest -= 1;
                }
            }
            for index in (1..=highest).rev() {
                fs.rename(&paths.numbered(index), &paths.numbered(index + 1))?;
            }
            fs.rename(&active, &paths.numbered(1))
        }
        ArchiveNaming::Timestamped => {
            let time: DateTime<Local> = clock.now().into();
            let mut attempt = 0;
            let mut target = paths.timestamped(time, attempt);
            while fs.exists(&target) {
                attempt += 1;
                target = paths.timestamped(time, attempt);
            }
            fs.rename(&active, &target)
        }
    }
}
