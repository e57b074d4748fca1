//! Scan records and the per-scan builder used by every reader
//!
//! A [`ScanBuilder`] is created when a spectrum opens, filled in by metadata
//! and binary-array events, and consumed by [`ScanBuilder::build`] when the
//! spectrum closes. The resulting [`ScanRecord`] is immutable except for
//! `fragment_scan_numbers`, which the windowed tree builder extends while the
//! record is still inside its window.

use serde::Serialize;

use crate::error::ImportError;
use crate::peaks;

/// Scan polarity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Positive ion mode
    Positive,
    /// Negative ion mode
    Negative,
    /// Not reported
    #[default]
    Unknown,
}

impl Polarity {
    /// Parse the single-character form used by mzXML (`+` / `-`)
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol.trim() {
            "+" => Polarity::Positive,
            "-" => Polarity::Negative,
            _ => Polarity::Unknown,
        }
    }

    /// Parse a free-text polarity value (mzData `Polarity` cvParam)
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.eq_ignore_ascii_case("positive") || name == "+" {
            Polarity::Positive
        } else if name.eq_ignore_ascii_case("negative") || name == "-" {
            Polarity::Negative
        } else {
            Polarity::Unknown
        }
    }

    /// Signed representation: 1, -1, or 0 when unknown
    pub fn as_sign(&self) -> i8 {
        match self {
            Polarity::Positive => 1,
            Polarity::Negative => -1,
            Polarity::Unknown => 0,
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Polarity::Positive => "+",
            Polarity::Negative => "-",
            Polarity::Unknown => "?",
        };
        f.write_str(symbol)
    }
}

/// One spectrum with its metadata and peak arrays
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRecord {
    /// Scan number, unique per file and positive
    pub scan_number: u32,

    /// MS level (1 = MS1, 2 = MS/MS, ...)
    pub ms_level: u8,

    /// Retention time in seconds
    pub retention_time: f64,

    /// Parent scan, only for MSn scans whose parent could be resolved
    pub parent_scan_number: Option<u32>,

    /// Fragment scans linked to this scan, in the order they were seen
    pub fragment_scan_numbers: Vec<u32>,

    /// Precursor m/z, only for MSn scans
    pub precursor_mz: Option<f64>,

    /// Precursor charge, only for MSn scans
    pub precursor_charge: Option<i32>,

    /// Whether the spectrum is centroided
    pub centroided: bool,

    /// Scan polarity
    pub polarity: Polarity,

    /// Instrument filter line or scan definition string
    pub scan_definition: Option<String>,

    /// m/z values
    #[serde(skip)]
    pub mz_values: Vec<f64>,

    /// Intensity values paired with `mz_values`
    #[serde(skip)]
    pub intensity_values: Vec<f64>,
}

impl ScanRecord {
    /// Number of data points in the scan
    pub fn point_count(&self) -> usize {
        self.mz_values.len()
    }

    /// Total ion current
    pub fn total_ion_current(&self) -> f64 {
        self.intensity_values.iter().sum()
    }

    /// Most intense point as `(mz, intensity)`
    pub fn base_peak(&self) -> Option<(f64, f64)> {
        self.mz_values
            .iter()
            .zip(&self.intensity_values)
            .fold(None, |best: Option<(f64, f64)>, (&mz, &intensity)| match best {
                Some((_, top)) if top >= intensity => best,
                _ => Some((mz, intensity)),
            })
    }

    /// Lowest and highest m/z in the scan
    pub fn mz_range(&self) -> Option<(f64, f64)> {
        min_max(&self.mz_values)
    }
}

pub(crate) fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// Mutable scratch for one spectrum while it is being parsed
#[derive(Debug, Clone, Default)]
pub struct ScanBuilder {
    /// Scan number assigned at spectrum open
    pub scan_number: u32,
    /// MS level, 1 unless the document says otherwise
    pub ms_level: u8,
    /// Retention time in seconds, if seen
    pub retention_time: Option<f64>,
    /// Resolved parent scan
    pub parent_scan_number: Option<u32>,
    /// Precursor m/z, 0 when not reported
    pub precursor_mz: f64,
    /// Precursor charge, 0 when not reported
    pub precursor_charge: i32,
    /// Scan polarity
    pub polarity: Polarity,
    /// Filter line or scan definition
    pub scan_definition: Option<String>,
    /// Decoded m/z values
    pub mz_values: Vec<f64>,
    /// Decoded intensity values
    pub intensity_values: Vec<f64>,
}

impl ScanBuilder {
    /// Fresh scratch for the given scan number
    pub fn new(scan_number: u32) -> Self {
        Self {
            scan_number,
            ms_level: 1,
            ..Default::default()
        }
    }

    /// Sanitize the peak arrays and produce the record.
    pub fn build(self) -> Result<ScanRecord, ImportError> {
        let retention_time = self
            .retention_time
            .ok_or(ImportError::MissingRetentionTime {
                scan_number: self.scan_number,
            })?;

        if self.mz_values.len() != self.intensity_values.len() {
            return Err(ImportError::violation(
                Some(self.scan_number),
                format!(
                    "m/z array has {} values but intensity array has {}",
                    self.mz_values.len(),
                    self.intensity_values.len()
                ),
            ));
        }

        let peaks = peaks::sanitize(self.mz_values, self.intensity_values);
        let is_fragment = self.ms_level > 1;

        Ok(ScanRecord {
            scan_number: self.scan_number,
            ms_level: self.ms_level,
            retention_time,
            parent_scan_number: self.parent_scan_number.filter(|_| is_fragment),
            fragment_scan_numbers: Vec::new(),
            precursor_mz: Some(self.precursor_mz).filter(|&mz| is_fragment && mz > 0.0),
            precursor_charge: Some(self.precursor_charge).filter(|&z| is_fragment && z != 0),
            centroided: peaks.centroided,
            polarity: self.polarity,
            scan_definition: self.scan_definition,
            mz_values: peaks.mz_values,
            intensity_values: peaks.intensity_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms2_builder() -> ScanBuilder {
        let mut builder = ScanBuilder::new(2);
        builder.ms_level = 2;
        builder.retention_time = Some(12.5);
        builder.parent_scan_number = Some(1);
        builder.precursor_mz = 445.12;
        builder.precursor_charge = 2;
        builder.mz_values = vec![100.0, 200.0];
        builder.intensity_values = vec![10.0, 30.0];
        builder
    }

    #[test]
    fn test_build_fragment() {
        let scan = ms2_builder().build().unwrap();
        assert_eq!(scan.parent_scan_number, Some(1));
        assert_eq!(scan.precursor_mz, Some(445.12));
        assert_eq!(scan.precursor_charge, Some(2));
        assert!(scan.centroided);
        assert_eq!(scan.base_peak(), Some((200.0, 30.0)));
        assert_eq!(scan.total_ion_current(), 40.0);
        assert_eq!(scan.mz_range(), Some((100.0, 200.0)));
    }

    #[test]
    fn test_ms1_drops_precursor_fields() {
        let mut builder = ms2_builder();
        builder.ms_level = 1;
        let scan = builder.build().unwrap();
        assert_eq!(scan.parent_scan_number, None);
        assert_eq!(scan.precursor_mz, None);
        assert_eq!(scan.precursor_charge, None);
    }

    #[test]
    fn test_unreported_precursor_values_are_absent() {
        let mut builder = ms2_builder();
        builder.precursor_mz = 0.0;
        builder.precursor_charge = 0;
        let scan = builder.build().unwrap();
        assert_eq!(scan.precursor_mz, None);
        assert_eq!(scan.precursor_charge, None);
    }

    #[test]
    fn test_missing_retention_time() {
        let mut builder = ms2_builder();
        builder.retention_time = None;
        match builder.build() {
            Err(ImportError::MissingRetentionTime { scan_number }) => assert_eq!(scan_number, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unequal_arrays() {
        let mut builder = ms2_builder();
        builder.intensity_values.pop();
        assert!(matches!(
            builder.build(),
            Err(ImportError::FormatViolation {
                scan_number: Some(2),
                ..
            })
        ));
    }

    #[test]
    fn test_profile_scan_is_pruned() {
        let mut builder = ScanBuilder::new(5);
        builder.retention_time = Some(1.0);
        builder.mz_values = vec![1.0, 2.0, 3.0, 4.0];
        builder.intensity_values = vec![0.0, 0.0, 50.0, 0.0];
        let scan = builder.build().unwrap();
        assert!(!scan.centroided);
        assert_eq!(scan.mz_values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_polarity_parsing() {
        assert_eq!(Polarity::from_symbol("+"), Polarity::Positive);
        assert_eq!(Polarity::from_symbol("-"), Polarity::Negative);
        assert_eq!(Polarity::from_symbol("any"), Polarity::Unknown);
        assert_eq!(Polarity::from_name("Negative"), Polarity::Negative);
        assert_eq!(Polarity::from_name("positive"), Polarity::Positive);
        assert_eq!(Polarity::Negative.as_sign(), -1);
    }
}
