use std::collections::HashMap;
use std::path::PathBuf;

use log::debug;

use super::{RawFile, StoredScan};
use crate::config::PreloadPolicy;
use crate::detect::RawDataFormat;
use crate::error::ImportError;
use crate::scan::ScanRecord;
use crate::storage::ScanStorage;
use crate::tree::ScanSink;

/// Collects scans leaving the tree window into a [`RawFile`]
///
/// Dropping the writer without calling [`finish`](Self::finish) discards
/// everything, including the temporary storage file.
#[derive(Debug)]
pub struct RawFileWriter {
    source: PathBuf,
    format: RawDataFormat,
    preload: PreloadPolicy,
    storage: ScanStorage,
    scans: Vec<StoredScan>,
    index: HashMap<u32, usize>,
}

impl RawFileWriter {
    /// Start a file backed by a fresh temporary store
    pub fn new(
        source: impl Into<PathBuf>,
        format: RawDataFormat,
        preload: PreloadPolicy,
    ) -> Result<Self, ImportError> {
        Ok(Self {
            source: source.into(),
            format,
            preload,
            storage: ScanStorage::new()?,
            scans: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Scans accepted so far
    pub fn len(&self) -> usize {
        self.scans.len()
    }

    /// Whether no scan has been accepted
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// Seal the collection
    pub fn finish(self) -> RawFile {
        debug!(
            "Sealed {} scans ({} bytes in storage)",
            self.scans.len(),
            self.storage.len()
        );
        RawFile {
            source: self.source,
            format: self.format,
            storage: self.storage,
            scans: self.scans,
            index: self.index,
        }
    }
}

impl ScanSink for RawFileWriter {
    fn accept(&mut self, scan: ScanRecord) -> Result<(), ImportError> {
        let number = scan.scan_number;
        if self.index.contains_key(&number) {
            return Err(ImportError::violation(Some(number), "duplicate scan number"));
        }

        let mut stored = StoredScan::new(scan);
        if !self.preload.keeps_resident(stored.ms_level()) {
            let mz_values = std::mem::take(&mut stored.record.mz_values);
            let intensity_values = std::mem::take(&mut stored.record.intensity_values);
            stored.slot = Some(self.storage.store(&mz_values, &intensity_values)?);
        }

        self.index.insert(number, self.scans.len());
        self.scans.push(stored);
        Ok(())
    }
}
