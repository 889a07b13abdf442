// SPDX-License-Identifier: MIT OR Apache-2.0

//! A file sink that rotates by size and can be asked to reopen its file.
//!
//! # States
//!
//! The sink is either *open* (it holds the active file) or *dropped* (the last open,
//! rotation or write failed).  A dropped sink tries to open the active file again on the
//! next write; there is no permanent failure latch, and nothing is ever reported to the
//! code that logged.  Failures are counted ([`FileSink::dropped_lines`]) and the most
//! recent one is kept ([`FileSink::last_error`]).
//!
//! # Rotation
//!
//! Before each line is written, the sink checks whether the line would push the active
//! file past `max_size`.  If so, the file is closed, archived (see [`ArchiveNaming`]), a
//! fresh file is opened, and the line goes into the fresh file.  Rotation therefore only
//! ever happens between whole lines.  A line larger than `max_size` written into an empty
//! file is written as is.
//!
//! # Reopen
//!
//! [`FileSink::request_reopen`] only sets a flag, so it never blocks and never interrupts a
//! writer in the middle of a line.  The next write (or the next flush, which is what the
//! designated output thread does) closes and reopens the active file under the same name,
//! which is what external log rotation tools expect.
//!
//! # Example
//!
//! ```rust,no_run
//! use domainlog::{FileHandlerConfig, FileSink, Logging, Severity};
//!
//! let logging = Logging::new();
//! let config = FileHandlerConfig::new("/var/log/myapp", "myapp").max_size(10 * 1024 * 1024);
//! let (handler, file) = FileSink::create_handler(config).unwrap();
//! logging.add_handler(handler);
//!
//! logging.log("myapp", Severity::Error, "written to /var/log/myapp/myapp.log");
//!
//! // from a SIGHUP handler thread, after logrotate moved the file away
//! file.request_reopen();
//! ```

mod fs;
mod rotation;


pub use fs::{Clock, FileSystem, StdFileSystem, SystemClock};
pub use rotation::ArchiveNaming;

use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::log_record::LogRecord;
use crate::sink::Sink;
use rotation::{LogPaths, archive_active};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Configuration of a [`FileSink`].
#[derive(Debug, Clone)]
pub struct FileHandlerConfig {
    directory: PathBuf,
    base_name: String,
    max_size: u64,
    max_archives: Option<usize>,
    naming: ArchiveNaming,
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
}

impl FileHandlerConfig {
    /// Logs to `<directory>/<base_name>.log` with no size limit.
    pub fn new(directory: impl Into<PathBuf>, base_name: &str) -> Self {
        FileHandlerConfig {
            directory: directory.into(),
            base_name: base_name.to_string(),
            max_size: 0,
            max_archives: None,
            naming: ArchiveNaming::default(),
            fs: Arc::new(StdFileSystem),
            clock: Arc::new(SystemClock),
        }
    }

    /// Rotate once the active file would exceed `bytes`.  `0` disables rotation.
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Keep at most `count` numbered archives.
    pub fn max_archives(mut self, count: usize) -> Self {
        self.max_archives = Some(count);
        self
    }

    pub fn naming(mut self, naming: ArchiveNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The path of the file currently written to.
    pub fn active_path(&self) -> PathBuf {
        self.paths().active()
    }

    fn paths(&self) -> LogPaths {
        LogPaths::new(self.directory.clone(), &self.base_name)
    }
}

struct FileState {
    file: Option<Box<dyn Write + Send>>,
    bytes_written: u64,
}

/// The rotating file sink.  See the [module documentation](self).
pub struct FileSink {
    config: FileHandlerConfig,
    paths: LogPaths,
    state: Mutex<FileState>,
    reopen_requested: AtomicBool,
    dropped: AtomicU64,
    rotations: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("path", &self.paths.active())
            .field("max_size", &self.config.max_size)
            .field(
                "bytes_written",
                &self.state.try_lock().ok().map(|s| s.bytes_written),
            )
            .finish()
    }
}

impl FileSink {
    /// Creates the directory if needed and opens (appending to) the active file.
    ///
    /// The byte counter starts at the size the active file already has.
    pub fn open(config: FileHandlerConfig) -> Result<FileSink> {
        let paths = config.paths();
        config
            .fs
            .create_dir_all(paths.directory())
            .map_err(|source| Error::CreateDirectory {
                path: paths.directory().to_path_buf(),
                source,
            })?;
        let active = paths.active();
        let file = config.fs.open_append(&active)?;
        let bytes_written = config.fs.file_len(&active).unwrap_or(0);
        Ok(FileSink {
            config,
            paths,
            state: Mutex::new(FileState {
                file: Some(file),
                bytes_written,
            }),
            reopen_requested: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            last_error: Mutex::new(None),
        })
    }

    /// Opens a file sink and wraps it in a handler.
    ///
    /// The returned `Arc<FileSink>` is how reopen is requested later.
    pub fn create_handler(config: FileHandlerConfig) -> Result<(Handler, Arc<FileSink>)> {
        let sink = Arc::new(FileSink::open(config)?);
        Ok((Handler::new(sink.clone()), sink))
    }

    /// Asks for the active file to be closed and reopened before the next write.
    ///
    /// Thread-safe and non-blocking; completion is not observable.
    pub fn request_reopen(&self) {
        self.reopen_requested.store(true, Ordering::Release);
    }

    pub fn active_path(&self) -> PathBuf {
        self.paths.active()
    }

    /// Bytes written to the active file since it was opened or rotated.
    pub fn bytes_written(&self) -> u64 {
        self.lock().bytes_written
    }

    /// Lines that could not be written.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// The most recent I/O failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn note_error(&self, context: &str, error: std::io::Error) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(format!("{context}: {error}"));
    }

    /// (Re)opens the active file, appending.  Leaves the sink dropped on failure.
    fn open_active(&self, state: &mut FileState) -> bool {
        state.file = None;
        let active = self.paths.active();
        match self.config.fs.open_append(&active) {
            Ok(file) => {
                state.file = Some(file);
                state.bytes_written = self.config.fs.file_len(&active).unwrap_or(0);
                true
            }
            Err(e) => {
                self.note_error("open", e);
                false
            }
        }
    }

    fn service_reopen(&self, state: &mut FileState) {
        if self.reopen_requested.swap(false, Ordering::AcqRel) {
            if let Some(file) = state.file.as_mut() {
                let _ = file.flush();
            }
            self.open_active(state);
        }
    }

    fn rotate(&self, state: &mut FileState) -> bool {
        if let Some(mut file) = state.file.take() {
            let _ = file.flush();
        }
        let config = &self.config;
        match archive_active(
            &self.paths,
            config.naming,
            config.max_archives,
            config.fs.as_ref(),
            config.clock.as_ref(),
        ) {
            Ok(()) => {
                self.rotations.fetch_add(1, Ordering::Relaxed);
            }
            // keep appending to the old file; the next write tries again
            Err(e) => self.note_error("rotate", e),
        }
        self.open_active(state)
    }

    fn write_line(&self, line: &[u8]) {
        let mut state = self.lock();
        self.service_reopen(&mut state);
        if state.file.is_none() && !self.open_active(&mut state) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let len = line.len() as u64;
        let max_size = self.config.max_size;
        if max_size != 0
            && state.bytes_written > 0
            && state.bytes_written + len > max_size
            && !self.rotate(&mut state)
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let Some(file) = state.file.as_mut() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        match file.write_all(line) {
            Ok(()) => state.bytes_written += len,
            Err(e) => {
                self.note_error("write", e);
                state.file = None;
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Sink for FileSink {
    fn write(&self, record: &LogRecord) {
        let mut line = record.render();
        line.push('\n');
        self.write_line(line.as_bytes());
    }

    fn flush(&self) {
        let mut state = self.lock();
        self.service_reopen(&mut state);
        if let Some(file) = state.file.as_mut() {
            if let Err(e) = file.flush() {
                self.note_error("flush", e);
            }
        }
    }

    fn close(&self) {
        let mut state = self.lock();
        if let Some(mut file) = state.file.take() {
            let _ = file.flush();
        }
    }
}
