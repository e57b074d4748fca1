//! The pull interface shared by every format reader

use crate::detect::RawDataFormat;
use crate::error::ImportError;
use crate::scan::ScanRecord;

/// A reader yielding scans in document order
pub trait ScanSource {
    /// Format being read
    fn format(&self) -> RawDataFormat;

    /// Next scan, or `None` at end of input
    fn next_scan(&mut self) -> Result<Option<ScanRecord>, ImportError>;

    /// Scan count declared by the input, if known
    fn total_scans(&self) -> Option<usize>;

    /// Spectra consumed so far, including skipped ones
    fn parsed_scans(&self) -> usize;
}

impl<S: ScanSource + ?Sized> ScanSource for Box<S> {
    fn format(&self) -> RawDataFormat {
        (**self).format()
    }

    fn next_scan(&mut self) -> Result<Option<ScanRecord>, ImportError> {
        (**self).next_scan()
    }

    fn total_scans(&self) -> Option<usize> {
        (**self).total_scans()
    }

    fn parsed_scans(&self) -> usize {
        (**self).parsed_scans()
    }
}
