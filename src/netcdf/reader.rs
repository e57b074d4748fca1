//! Scan reader over the ANDI-MS NetCDF layout
//!
//! The file carries one `scan_index` entry (start offset into the
//! concatenated `mass_values`/`intensity_values` arrays) and one
//! `scan_acquisition_time` entry per scan. Some instruments write negative
//! offsets for scans they dropped; those gaps are repaired instead of
//! failing the import.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, warn};

use super::classic::{NetCdfFile, Variable};
use super::NetCdfError;
use crate::detect::RawDataFormat;
use crate::error::ImportError;
use crate::scan::{ScanBuilder, ScanRecord};
use crate::source::ScanSource;

const SCAN_INDEX: &str = "scan_index";
const SCAN_TIME: &str = "scan_acquisition_time";
const MASS_VALUES: &str = "mass_values";
const INTENSITY_VALUES: &str = "intensity_values";
const SCALE_FACTOR: &str = "scale_factor";

/// Streaming reader producing one MS1 scan per `scan_index` slot
pub struct NetCdfScanReader<R: Read + Seek> {
    file: NetCdfFile<R>,
    mass: Variable,
    intensity: Variable,
    mass_scale: f64,
    intensity_scale: f64,
    offsets: Vec<u64>,
    times: Vec<f64>,
    repaired: Vec<usize>,
    next_index: usize,
}

impl NetCdfScanReader<BufReader<File>> {
    /// Open a NetCDF file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImportError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> NetCdfScanReader<R> {
    /// Parse the header and the scan index of `reader`
    pub fn new(reader: R) -> Result<Self, ImportError> {
        let mut file = NetCdfFile::open(reader).map_err(|e| match e {
            NetCdfError::IoError(io) => ImportError::IoError(io),
            other => ImportError::DetectionFailure(other.to_string()),
        })?;

        let lookup = |file: &NetCdfFile<R>, name: &str| {
            file.variable(name)
                .map_err(|_| ImportError::violation(None, format!("missing variable {}", name)))
        };
        let index_var = lookup(&file, SCAN_INDEX)?;
        let time_var = lookup(&file, SCAN_TIME)?;
        let mass = lookup(&file, MASS_VALUES)?;
        let intensity = lookup(&file, INTENSITY_VALUES)?;

        let total_points = file.header().element_count(&mass);
        let intensity_points = file.header().element_count(&intensity);
        if total_points != intensity_points {
            return Err(ImportError::violation(
                None,
                format!(
                    "{} has {} values but {} has {}",
                    MASS_VALUES, total_points, INTENSITY_VALUES, intensity_points
                ),
            ));
        }

        let mut index: Vec<i64> = file
            .read_all(&index_var)?
            .into_iter()
            .map(|v| v as i64)
            .collect();
        let mut times = file.read_all(&time_var)?;
        if index.len() != times.len() {
            return Err(ImportError::violation(
                None,
                format!(
                    "{} has {} entries but {} has {}",
                    SCAN_INDEX,
                    index.len(),
                    SCAN_TIME,
                    times.len()
                ),
            ));
        }

        let repaired = repair_gaps(&mut index, &mut times, total_points as i64)?;
        for &slot in &repaired {
            warn!(
                "Repaired missing scan {} (offset {}, time {:.3}s)",
                slot + 1,
                index[slot],
                times[slot]
            );
        }

        let offsets = validate_offsets(&index, total_points)?;
        let mass_scale = scale_of(&mass);
        let intensity_scale = scale_of(&intensity);
        debug!(
            "NetCDF file with {} scans and {} data points",
            offsets.len(),
            total_points
        );

        Ok(Self {
            file,
            mass,
            intensity,
            mass_scale,
            intensity_scale,
            offsets,
            times,
            repaired,
            next_index: 0,
        })
    }

    /// Scan numbers whose index or time had to be reconstructed
    pub fn repaired_scans(&self) -> Vec<u32> {
        self.repaired.iter().map(|&i| i as u32 + 1).collect()
    }

    /// Read the next scan, or `None` after the last slot
    pub fn next_scan(&mut self) -> Result<Option<ScanRecord>, ImportError> {
        let slot = self.next_index;
        let Some(&start) = self.offsets.get(slot) else {
            return Ok(None);
        };
        self.next_index += 1;

        let number = slot as u32 + 1;
        let end = self
            .offsets
            .get(slot + 1)
            .copied()
            .unwrap_or_else(|| self.file.header().element_count(&self.mass));
        let count = end - start;

        let mass_scale = self.mass_scale;
        let intensity_scale = self.intensity_scale;
        let mz_values = self
            .file
            .read_slice(&self.mass, start, count)?
            .into_iter()
            .map(|v| v * mass_scale)
            .collect();
        let intensity_values = self
            .file
            .read_slice(&self.intensity, start, count)?
            .into_iter()
            .map(|v| v * intensity_scale)
            .collect();

        let mut scan = ScanBuilder::new(number);
        scan.retention_time = Some(self.times[slot]);
        scan.mz_values = mz_values;
        scan.intensity_values = intensity_values;
        scan.build().map(Some)
    }
}

impl<R: Read + Seek> ScanSource for NetCdfScanReader<R> {
    fn format(&self) -> RawDataFormat {
        RawDataFormat::NetCdf
    }

    fn next_scan(&mut self) -> Result<Option<ScanRecord>, ImportError> {
        NetCdfScanReader::next_scan(self)
    }

    fn total_scans(&self) -> Option<usize> {
        Some(self.offsets.len())
    }

    fn parsed_scans(&self) -> usize {
        self.next_index
    }
}

fn scale_of(variable: &Variable) -> f64 {
    variable
        .attribute(SCALE_FACTOR)
        .and_then(|v| v.as_f64())
        .filter(|s| s.is_finite() && *s != 0.0)
        .unwrap_or(1.0)
}

/// Fill scans with a negative start offset.
///
/// Missing times are extrapolated from the nearest present scan using the
/// mean per-scan time step between consecutive present scans. A missing
/// offset takes the next present offset (or `total_points` when none
/// follows), leaving that scan empty. Returns the repaired slot indices.
pub fn repair_gaps(
    index: &mut [i64],
    times: &mut [f64],
    total_points: i64,
) -> Result<Vec<usize>, ImportError> {
    let missing: Vec<usize> = (0..index.len()).filter(|&i| index[i] < 0).collect();
    if missing.is_empty() {
        return Ok(missing);
    }
    if missing.len() == index.len() {
        return Err(ImportError::violation(
            None,
            "every entry in scan_index is missing",
        ));
    }

    let present: Vec<usize> = (0..index.len()).filter(|&i| index[i] >= 0).collect();
    let deltas: Vec<f64> = present
        .windows(2)
        .map(|pair| (times[pair[1]] - times[pair[0]]) / (pair[1] - pair[0]) as f64)
        .collect();
    let average_delta = if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().sum::<f64>() / deltas.len() as f64
    };

    for &slot in &missing {
        let nearest = (1..index.len()).find_map(|distance| {
            if slot + distance < index.len() && index[slot + distance] >= 0 {
                Some(slot + distance)
            } else if distance <= slot && index[slot - distance] >= 0 {
                Some(slot - distance)
            } else {
                None
            }
        });
        if let Some(nearest) = nearest {
            times[slot] = times[nearest] + (slot as f64 - nearest as f64) * average_delta;
        }
    }

    for &slot in missing.iter().rev() {
        index[slot] = index
            .get(slot + 1)
            .copied()
            .filter(|&next| next >= 0)
            .unwrap_or(total_points);
    }
    Ok(missing)
}

fn validate_offsets(index: &[i64], total_points: u64) -> Result<Vec<u64>, ImportError> {
    let mut previous = 0u64;
    let mut offsets = Vec::with_capacity(index.len());
    for (slot, &offset) in index.iter().enumerate() {
        let number = Some(slot as u32 + 1);
        let offset = u64::try_from(offset)
            .map_err(|_| ImportError::violation(number, format!("negative scan offset {}", offset)))?;
        if offset > total_points {
            return Err(ImportError::violation(
                number,
                format!("scan offset {} beyond {} data points", offset, total_points),
            ));
        }
        if offset < previous {
            return Err(ImportError::violation(
                number,
                format!("scan offset {} precedes previous offset {}", offset, previous),
            ));
        }
        previous = offset;
        offsets.push(offset);
    }
    Ok(offsets)
}
