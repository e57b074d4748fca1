use std::fmt;

use serde::Serialize;

use crate::detect::RawDataFormat;

/// Per-MS-level figures of a [`RawFile`](super::RawFile)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSummary {
    /// MS level
    pub ms_level: u8,
    /// Scans at this level
    pub scan_count: usize,
    /// Data points across those scans
    pub data_points: usize,
    /// Retention time range in seconds
    pub rt_range: Option<(f64, f64)>,
    /// m/z range
    pub mz_range: Option<(f64, f64)>,
    /// Highest base peak intensity
    pub max_base_peak_intensity: f64,
    /// Highest total ion current
    pub max_total_ion_current: f64,
}

/// Overview of an imported file, printable or serializable to JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawFileSummary {
    /// Input file
    pub source: String,
    /// Detected format
    pub format: RawDataFormat,
    /// Total scans
    pub scan_count: usize,
    /// Total data points
    pub data_points: usize,
    /// Largest point count of any scan
    pub max_point_count: usize,
    /// Parent to fragment links
    pub fragment_links: usize,
    /// Scans whose arrays are held in memory
    pub resident_scans: usize,
    /// Bytes written to the storage backend
    pub storage_bytes: u64,
    /// Figures per MS level, ascending
    pub levels: Vec<LevelSummary>,
}

fn range(range: Option<(f64, f64)>, precision: usize) -> String {
    match range {
        Some((lo, hi)) => format!("{:.*} - {:.*}", precision, lo, precision, hi),
        None => "n/a".to_string(),
    }
}

impl fmt::Display for RawFileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:            {}", self.source)?;
        writeln!(f, "Format:          {}", self.format)?;
        writeln!(f, "Scans:           {}", self.scan_count)?;
        writeln!(f, "Data points:     {}", self.data_points)?;
        writeln!(f, "Largest scan:    {} points", self.max_point_count)?;
        writeln!(f, "Fragment links:  {}", self.fragment_links)?;
        writeln!(
            f,
            "Resident scans:  {} ({} bytes on disk)",
            self.resident_scans, self.storage_bytes
        )?;
        for level in &self.levels {
            writeln!(f)?;
            writeln!(f, "MS{}: {} scans, {} points", level.ms_level, level.scan_count, level.data_points)?;
            writeln!(f, "  RT (s):        {}", range(level.rt_range, 2))?;
            writeln!(f, "  m/z:           {}", range(level.mz_range, 4))?;
            writeln!(f, "  Max base peak: {:.1}", level.max_base_peak_intensity)?;
            writeln!(f, "  Max TIC:       {:.1}", level.max_total_ion_current)?;
        }
        Ok(())
    }
}
