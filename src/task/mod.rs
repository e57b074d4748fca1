//! # Import tasks
//!
//! An [`ImportTask`] turns one input file into a [`RawFile`]: it detects the
//! format, streams scans through the tree window into a [`RawFileWriter`] and
//! seals the result. Progress, status and cancellation are shared through an
//! [`Arc`] so another thread can watch or stop the import.
//!
//! Cancellation is checked between scans. A cancelled or failed import drops
//! its partial storage and never yields a [`RawFile`].
//!
//! ```rust,no_run
//! use mzingest::config::ImportConfig;
//! use mzingest::task::ImportTask;
//!
//! let handle = ImportTask::new("run.mzXML", ImportConfig::default()).spawn()?;
//! let monitor = handle.monitor();
//! let raw = handle.wait()?;
//! println!("{} scans, status {}", raw.scan_count(), monitor.status());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use log::{info, warn};
use serde::Serialize;

use crate::config::ImportConfig;
use crate::detect::{detect_format, RawDataFormat};
use crate::error::ImportError;
use crate::netcdf::NetCdfScanReader;
use crate::raw_file::{RawFile, RawFileWriter};
use crate::source::ScanSource;
use crate::tree::WindowedTreeBuilder;
use crate::xml::{MzDataReader, MzMlReader, MzXmlReader};

/// Lifecycle of an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, not started
    #[default]
    Waiting,
    /// Reading scans
    Processing,
    /// Completed with a sealed file
    Finished,
    /// Failed; see the error message
    Error,
    /// Stopped by [`ImportTask::cancel`]
    Canceled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Processing => "processing",
            TaskStatus::Finished => "finished",
            TaskStatus::Error => "error",
            TaskStatus::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct SharedState {
    status: Mutex<TaskStatus>,
    error: Mutex<Option<String>>,
    parsed: AtomicUsize,
    total: AtomicUsize,
    cancelled: AtomicBool,
}

/// Cloneable view of a running import
#[derive(Debug, Clone)]
pub struct TaskMonitor {
    shared: Arc<SharedState>,
}

impl TaskMonitor {
    /// Fraction of declared scans consumed, 0 while the total is unknown
    pub fn progress(&self) -> f64 {
        let total = self.shared.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let parsed = self.shared.parsed.load(Ordering::Relaxed);
        (parsed as f64 / total as f64).min(1.0)
    }

    /// Spectra consumed so far
    pub fn parsed_scans(&self) -> usize {
        self.shared.parsed.load(Ordering::Relaxed)
    }

    /// Scans declared by the input, if known yet
    pub fn total_scans(&self) -> Option<usize> {
        match self.shared.total.load(Ordering::Relaxed) {
            0 => None,
            total => Some(total),
        }
    }

    /// Current status
    pub fn status(&self) -> TaskStatus {
        self.shared
            .status
            .lock()
            .map(|status| *status)
            .unwrap_or(TaskStatus::Error)
    }

    /// Failure message once the task is in [`TaskStatus::Error`]
    pub fn error_message(&self) -> Option<String> {
        self.shared.error.lock().ok().and_then(|e| e.clone())
    }

    /// Request cancellation; takes effect before the next scan
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Relaxed)
    }

    fn set_status(&self, status: TaskStatus) {
        if let Ok(mut current) = self.shared.status.lock() {
            *current = status;
        }
    }

    fn set_error(&self, message: String) {
        if let Ok(mut error) = self.shared.error.lock() {
            *error = Some(message);
        }
    }

    fn record_progress(&self, parsed: usize, total: Option<usize>) {
        self.shared.parsed.fetch_max(parsed, Ordering::Relaxed);
        if let Some(total) = total {
            self.shared.total.store(total, Ordering::Relaxed);
        }
    }
}

/// Import of one raw data file
#[derive(Debug)]
pub struct ImportTask {
    path: PathBuf,
    config: ImportConfig,
    monitor: TaskMonitor,
}

impl ImportTask {
    /// Create a task for `path`
    pub fn new(path: impl Into<PathBuf>, config: ImportConfig) -> Self {
        Self {
            path: path.into(),
            config,
            monitor: TaskMonitor {
                shared: Arc::new(SharedState::default()),
            },
        }
    }

    /// Input path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Human readable description
    pub fn describe(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        format!("Opening file {}", name)
    }

    /// Shared view for other threads
    pub fn monitor(&self) -> TaskMonitor {
        self.monitor.clone()
    }

    /// See [`TaskMonitor::progress`]
    pub fn progress(&self) -> f64 {
        self.monitor.progress()
    }

    /// See [`TaskMonitor::status`]
    pub fn status(&self) -> TaskStatus {
        self.monitor.status()
    }

    /// See [`TaskMonitor::error_message`]
    pub fn error_message(&self) -> Option<String> {
        self.monitor.error_message()
    }

    /// See [`TaskMonitor::cancel`]
    pub fn cancel(&self) {
        self.monitor.cancel()
    }

    /// Detect the format, open the file and import it on this thread
    pub fn run(&self) -> Result<RawFile, ImportError> {
        self.track(|| {
            let format = detect_format(&self.path, self.config.sniff_lines)?;
            let source = open_source(&self.path, format)?;
            self.ingest(source)
        })
    }

    /// Import from an already opened source
    pub fn run_with_source<S: ScanSource>(&self, source: S) -> Result<RawFile, ImportError> {
        self.track(|| self.ingest(source))
    }

    /// Run on a named worker thread
    pub fn spawn(self) -> Result<TaskHandle, ImportError> {
        let monitor = self.monitor();
        let (sender, receiver) = bounded(1);
        let handle = thread::Builder::new()
            .name("mzingest-import".to_string())
            .spawn(move || {
                let result = self.run();
                // The receiver may already be gone; the outcome is then unobserved.
                let _ = sender.send(result);
            })?;
        Ok(TaskHandle {
            monitor,
            receiver,
            handle,
        })
    }

    fn track<F>(&self, import: F) -> Result<RawFile, ImportError>
    where
        F: FnOnce() -> Result<RawFile, ImportError>,
    {
        info!("{}", self.describe());
        self.monitor.set_status(TaskStatus::Processing);
        let result = import();
        match &result {
            Ok(raw) => {
                info!(
                    "Imported {} scans ({} data points) from {}",
                    raw.scan_count(),
                    raw.data_points(),
                    self.path.display()
                );
                self.monitor.set_status(TaskStatus::Finished);
            }
            Err(e) if e.is_cancellation() => {
                info!("Import of {} cancelled", self.path.display());
                self.monitor.set_status(TaskStatus::Canceled);
            }
            Err(e) => {
                warn!("Import of {} failed: {}", self.path.display(), e);
                self.monitor.set_error(e.to_string());
                self.monitor.set_status(TaskStatus::Error);
            }
        }
        result
    }

    fn ingest<S: ScanSource>(&self, mut source: S) -> Result<RawFile, ImportError> {
        let format = source.format();
        let window = self.config.window_sizes.for_format(format);
        let mut tree = WindowedTreeBuilder::new(window);
        let mut writer = RawFileWriter::new(&self.path, format, self.config.preload)?;
        let interval = self.config.progress_interval;
        info!("Reading {} with a window of {} scans", format, tree.capacity());

        loop {
            if self.monitor.is_cancelled() {
                return Err(ImportError::Cancelled);
            }
            let Some(scan) = source.next_scan()? else {
                break;
            };
            tree.push(scan, &mut writer)?;

            let parsed = source.parsed_scans();
            self.monitor.record_progress(parsed, source.total_scans());
            if interval > 0 && parsed % interval == 0 {
                info!(
                    "Parsed {} scans ({:.0}%)",
                    parsed,
                    self.monitor.progress() * 100.0
                );
            }
        }
        tree.finish(&mut writer)?;

        if writer.is_empty() {
            return Err(ImportError::NoScans);
        }
        Ok(writer.finish())
    }
}

/// Open the reader for an already detected format
pub fn open_source(path: &Path, format: RawDataFormat) -> Result<Box<dyn ScanSource + Send>, ImportError> {
    Ok(match format {
        RawDataFormat::MzXml => Box::new(MzXmlReader::<BufReader<File>>::open(path)?),
        RawDataFormat::MzData => Box::new(MzDataReader::<BufReader<File>>::open(path)?),
        RawDataFormat::MzMl => Box::new(MzMlReader::<BufReader<File>>::open(path)?),
        RawDataFormat::NetCdf => Box::new(NetCdfScanReader::open(path)?),
    })
}

/// An import running on its own thread
#[derive(Debug)]
pub struct TaskHandle {
    monitor: TaskMonitor,
    receiver: Receiver<Result<RawFile, ImportError>>,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Shared view of the task
    pub fn monitor(&self) -> TaskMonitor {
        self.monitor.clone()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.monitor.cancel()
    }

    /// Block until the import ends
    pub fn wait(self) -> Result<RawFile, ImportError> {
        let result = self.receiver.recv().unwrap_or_else(|_| {
            Err(ImportError::violation(None, "import thread exited without a result"))
        });
        if self.handle.join().is_err() {
            return Err(ImportError::violation(None, "import thread panicked"));
        }
        result
    }
}
