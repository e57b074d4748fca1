use crate::scan::ScanRecord;
use crate::storage::StorageSlot;

/// A scan held by a [`RawFile`](super::RawFile)
///
/// Resident scans keep their arrays in `record`; the others carry empty
/// arrays and a storage slot. Peak statistics are computed once at import
/// so summaries never touch the disk.
#[derive(Debug, Clone)]
pub struct StoredScan {
    pub(crate) record: ScanRecord,
    pub(crate) slot: Option<StorageSlot>,
    pub(crate) point_count: usize,
    pub(crate) total_ion_current: f64,
    pub(crate) base_peak: Option<(f64, f64)>,
    pub(crate) mz_range: Option<(f64, f64)>,
}

impl StoredScan {
    pub(crate) fn new(record: ScanRecord) -> Self {
        Self {
            point_count: record.point_count(),
            total_ion_current: record.total_ion_current(),
            base_peak: record.base_peak(),
            mz_range: record.mz_range(),
            slot: None,
            record,
        }
    }

    /// Scan metadata. Arrays are empty unless the scan is resident.
    pub fn record(&self) -> &ScanRecord {
        &self.record
    }

    /// Scan number
    pub fn scan_number(&self) -> u32 {
        self.record.scan_number
    }

    /// MS level
    pub fn ms_level(&self) -> u8 {
        self.record.ms_level
    }

    /// Retention time in seconds
    pub fn retention_time(&self) -> f64 {
        self.record.retention_time
    }

    /// Parent scan number
    pub fn parent_scan_number(&self) -> Option<u32> {
        self.record.parent_scan_number
    }

    /// Fragment scan numbers
    pub fn fragment_scan_numbers(&self) -> &[u32] {
        &self.record.fragment_scan_numbers
    }

    /// Whether the peak arrays are held in memory
    pub fn is_resident(&self) -> bool {
        self.slot.is_none()
    }

    /// Storage location for non-resident scans
    pub fn slot(&self) -> Option<&StorageSlot> {
        self.slot.as_ref()
    }

    /// Number of data points
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Total ion current
    pub fn total_ion_current(&self) -> f64 {
        self.total_ion_current
    }

    /// Most intense point as `(mz, intensity)`
    pub fn base_peak(&self) -> Option<(f64, f64)> {
        self.base_peak
    }

    /// Lowest and highest m/z
    pub fn mz_range(&self) -> Option<(f64, f64)> {
        self.mz_range
    }
}
