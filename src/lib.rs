//! # mzingest - Streaming Raw Data Import for Mass Spectrometry
//!
//! `mzingest` reads raw mass spectrometry files into an ordered, disk-backed
//! collection of scans while rebuilding the parent/fragment (MS1/MSn) tree.
//!
//! ## Supported Input Formats
//!
//! - **mzXML** (nested or flat scans, 32/64-bit, zlib)
//! - **mzData** 1.04 and 1.05
//! - **mzML** 1.0 and 1.1, plain or indexed
//! - **NetCDF** (ANDI-MS), classic and 64-bit offset containers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mzingest::config::{ImportConfig, PreloadPolicy};
//! use mzingest::task::ImportTask;
//!
//! let config = ImportConfig::default().with_preload(PreloadPolicy::PreloadAll);
//! let raw = ImportTask::new("run.mzML", config).run()?;
//!
//! for scan in raw.scans_at_level(2) {
//!     println!(
//!         "scan {} at {:.1}s, parent {:?}",
//!         scan.scan_number(),
//!         scan.retention_time(),
//!         scan.parent_scan_number()
//!     );
//! }
//! # Ok::<(), mzingest::error::ImportError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! file ─▶ detect ─▶ xml::XmlScanReader / netcdf::NetCdfScanReader
//!                          │  (binary decode, peak sanitizing)
//!                          ▼
//!                  tree::WindowedTreeBuilder ─▶ raw_file::RawFileWriter ─▶ RawFile
//!                                                     │
//!                                             storage::ScanStorage
//! ```
//!
//! - [`detect`]: format sniffing
//! - [`binary`]: base64 / zlib / endian-aware peak array codec
//! - [`peaks`]: zero-intensity pruning and centroid classification
//! - [`xml`]: rule-table driven streaming parsers for the XML dialects
//! - [`netcdf`]: NetCDF classic container and the ANDI-MS scan layout
//! - [`tree`]: bounded window linking fragments to their parents
//! - [`storage`]: temporary-file backing store for peak arrays
//! - [`raw_file`]: the sealed scan collection
//! - [`task`]: cancellable import with progress reporting

#![warn(missing_docs)]

pub mod binary;
pub mod config;
pub mod detect;
pub mod error;
pub mod netcdf;
pub mod peaks;
pub mod raw_file;
pub mod scan;
pub mod source;
pub mod storage;
pub mod task;
pub mod tree;
pub mod xml;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::binary::{
        ArrayFormat, BinaryDecoder, BinaryEncoder, BinaryEncoding, CompressionType, Endianness,
    };
    pub use crate::config::{ImportConfig, PreloadPolicy};
    pub use crate::detect::{detect_format, RawDataFormat};
    pub use crate::error::ImportError;
    pub use crate::raw_file::{RawFile, RawFileSummary, StoredScan};
    pub use crate::scan::{Polarity, ScanRecord};
    pub use crate::source::ScanSource;
    pub use crate::task::{ImportTask, TaskStatus};
}
