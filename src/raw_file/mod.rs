//! # Imported raw data files
//!
//! A [`RawFile`] is the sealed result of an import: every scan in the order
//! it left the tree window, addressable by scan number, with peak arrays
//! either resident or in the disk-backed [`ScanStorage`].
//!
//! ```rust,no_run
//! use mzingest::config::ImportConfig;
//! use mzingest::task::ImportTask;
//!
//! let raw = ImportTask::new("run.mzML", ImportConfig::default()).run()?;
//! for scan in raw.scans_at_level(2) {
//!     let peaks = raw.peaks(scan)?;
//!     println!("{} {} points", scan.scan_number(), peaks.0.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod stats;
mod types;
mod writer;

#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

pub use stats::{LevelSummary, RawFileSummary};
pub use types::StoredScan;
pub use writer::RawFileWriter;

use crate::detect::RawDataFormat;
use crate::error::ImportError;
use crate::scan::{min_max, ScanRecord};
use crate::storage::ScanStorage;

/// Read-only collection of imported scans
#[derive(Debug)]
pub struct RawFile {
    source: PathBuf,
    format: RawDataFormat,
    storage: ScanStorage,
    scans: Vec<StoredScan>,
    index: HashMap<u32, usize>,
}

impl RawFile {
    /// Path the file was imported from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Input format
    pub fn format(&self) -> RawDataFormat {
        self.format
    }

    /// Number of scans
    pub fn scan_count(&self) -> usize {
        self.scans.len()
    }

    /// All scans in storage order
    pub fn scans(&self) -> impl Iterator<Item = &StoredScan> {
        self.scans.iter()
    }

    /// Scan numbers in storage order
    pub fn scan_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.scans.iter().map(StoredScan::scan_number)
    }

    /// Look up a scan by number
    pub fn scan(&self, scan_number: u32) -> Option<&StoredScan> {
        self.index.get(&scan_number).map(|&i| &self.scans[i])
    }

    /// Scans at one MS level, in storage order
    pub fn scans_at_level(&self, ms_level: u8) -> impl Iterator<Item = &StoredScan> {
        self.scans.iter().filter(move |s| s.ms_level() == ms_level)
    }

    /// MS levels present, ascending
    pub fn ms_levels(&self) -> Vec<u8> {
        self.scans
            .iter()
            .map(StoredScan::ms_level)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Peak arrays of a scan, read from storage when not resident
    pub fn peaks(&self, scan: &StoredScan) -> Result<(Vec<f64>, Vec<f64>), ImportError> {
        match scan.slot() {
            Some(slot) => Ok(self.storage.read(slot)?),
            None => Ok((
                scan.record.mz_values.clone(),
                scan.record.intensity_values.clone(),
            )),
        }
    }

    /// Full scan record with its arrays materialized
    pub fn scan_record(&self, scan_number: u32) -> Result<Option<ScanRecord>, ImportError> {
        let Some(scan) = self.scan(scan_number) else {
            return Ok(None);
        };
        let (mz_values, intensity_values) = self.peaks(scan)?;
        Ok(Some(ScanRecord {
            mz_values,
            intensity_values,
            ..scan.record.clone()
        }))
    }

    /// Total data points across all scans
    pub fn data_points(&self) -> usize {
        self.scans.iter().map(StoredScan::point_count).sum()
    }

    /// Largest point count of any scan
    pub fn max_point_count(&self) -> usize {
        self.scans
            .iter()
            .map(StoredScan::point_count)
            .max()
            .unwrap_or(0)
    }

    /// Retention time range at `ms_level`
    pub fn rt_range(&self, ms_level: u8) -> Option<(f64, f64)> {
        let times: Vec<f64> = self
            .scans_at_level(ms_level)
            .map(StoredScan::retention_time)
            .collect();
        min_max(&times)
    }

    /// m/z range at `ms_level`
    pub fn mz_range(&self, ms_level: u8) -> Option<(f64, f64)> {
        self.scans_at_level(ms_level)
            .filter_map(StoredScan::mz_range)
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }

    /// Highest base peak intensity at `ms_level`
    pub fn max_base_peak_intensity(&self, ms_level: u8) -> f64 {
        self.scans_at_level(ms_level)
            .filter_map(|s| s.base_peak().map(|(_, intensity)| intensity))
            .fold(0.0, f64::max)
    }

    /// Highest total ion current at `ms_level`
    pub fn max_total_ion_current(&self, ms_level: u8) -> f64 {
        self.scans_at_level(ms_level)
            .map(StoredScan::total_ion_current)
            .fold(0.0, f64::max)
    }

    /// Scan at `ms_level` whose retention time is closest to `rt`
    pub fn scan_at_rt(&self, ms_level: u8, rt: f64) -> Option<&StoredScan> {
        self.scans_at_level(ms_level).min_by(|a, b| {
            (a.retention_time() - rt)
                .abs()
                .total_cmp(&(b.retention_time() - rt).abs())
        })
    }

    /// Number of parent to fragment links
    pub fn fragment_links(&self) -> usize {
        self.scans
            .iter()
            .map(|s| s.fragment_scan_numbers().len())
            .sum()
    }

    /// Summary of counts and ranges per MS level
    pub fn summary(&self) -> RawFileSummary {
        let levels = self
            .ms_levels()
            .into_iter()
            .map(|ms_level| LevelSummary {
                ms_level,
                scan_count: self.scans_at_level(ms_level).count(),
                data_points: self
                    .scans_at_level(ms_level)
                    .map(StoredScan::point_count)
                    .sum(),
                rt_range: self.rt_range(ms_level),
                mz_range: self.mz_range(ms_level),
                max_base_peak_intensity: self.max_base_peak_intensity(ms_level),
                max_total_ion_current: self.max_total_ion_current(ms_level),
            })
            .collect();

        RawFileSummary {
            source: self.source.display().to_string(),
            format: self.format,
            scan_count: self.scan_count(),
            data_points: self.data_points(),
            max_point_count: self.max_point_count(),
            fragment_links: self.fragment_links(),
            resident_scans: self.scans.iter().filter(|s| s.is_resident()).count(),
            storage_bytes: self.storage.len(),
            levels,
        }
    }
}
