//! Disk-backed peak storage
//!
//! Scans that are not kept resident have their arrays appended to an
//! anonymous temporary file. The returned [`StorageSlot`] is all that is
//! needed to read them back. The file handle is shared by every reader, so
//! each seek and the read or write that follows it happen under one lock.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use byteorder::{ByteOrder, LittleEndian};

const VALUE_SIZE: usize = std::mem::size_of::<f64>();

/// Location of one scan's arrays in the backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSlot {
    /// Byte offset of the m/z array
    pub offset: u64,
    /// Bytes covering both arrays
    pub byte_length: u64,
    /// Number of (m/z, intensity) pairs
    pub point_count: usize,
}

/// Append-only store of peak arrays
#[derive(Debug)]
pub struct ScanStorage {
    inner: Mutex<StorageFile>,
}

#[derive(Debug)]
struct StorageFile {
    file: File,
    length: u64,
}

impl ScanStorage {
    /// Create storage backed by a fresh temporary file, deleted on drop
    pub fn new() -> io::Result<Self> {
        Ok(Self::with_file(tempfile::tempfile()?))
    }

    /// Use an already opened, empty, readable and writable file
    pub fn with_file(file: File) -> Self {
        Self {
            inner: Mutex::new(StorageFile { file, length: 0 }),
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> u64 {
        self.lock().map(|inner| inner.length).unwrap_or(0)
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append both arrays and return their slot
    pub fn store(&self, mz_values: &[f64], intensity_values: &[f64]) -> io::Result<StorageSlot> {
        if mz_values.len() != intensity_values.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "array lengths differ: {} m/z values, {} intensities",
                    mz_values.len(),
                    intensity_values.len()
                ),
            ));
        }

        let point_count = mz_values.len();
        let mut buffer = vec![0u8; point_count * 2 * VALUE_SIZE];
        let (mz_bytes, intensity_bytes) = buffer.split_at_mut(point_count * VALUE_SIZE);
        LittleEndian::write_f64_into(mz_values, mz_bytes);
        LittleEndian::write_f64_into(intensity_values, intensity_bytes);

        let mut inner = self.lock()?;
        let offset = inner.length;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(&buffer)?;
        inner.length += buffer.len() as u64;

        Ok(StorageSlot {
            offset,
            byte_length: buffer.len() as u64,
            point_count,
        })
    }

    /// Read back the arrays stored at `slot`
    pub fn read(&self, slot: &StorageSlot) -> io::Result<(Vec<f64>, Vec<f64>)> {
        let invalid = || {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "slot of {} bytes at offset {} cannot hold {} points",
                    slot.byte_length, slot.offset, slot.point_count
                ),
            )
        };
        let expected = slot
            .point_count
            .checked_mul(2 * VALUE_SIZE)
            .and_then(|bytes| u64::try_from(bytes).ok())
            .filter(|&bytes| bytes == slot.byte_length)
            .ok_or_else(invalid)?;
        let end = slot.offset.checked_add(expected).ok_or_else(invalid)?;

        let buffer = {
            let mut inner = self.lock()?;
            if end > inner.length {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "slot extends past the end of storage",
                ));
            }
            let mut buffer = vec![0u8; expected as usize];
            inner.file.seek(SeekFrom::Start(slot.offset))?;
            inner.file.read_exact(&mut buffer)?;
            buffer
        };

        let (mz_bytes, intensity_bytes) = buffer.split_at(slot.point_count * VALUE_SIZE);
        let mut mz_values = vec![0.0; slot.point_count];
        let mut intensity_values = vec![0.0; slot.point_count];
        LittleEndian::read_f64_into(mz_bytes, &mut mz_values);
        LittleEndian::read_f64_into(intensity_bytes, &mut intensity_values);
        Ok((mz_values, intensity_values))
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, StorageFile>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "scan storage lock poisoned"))
    }
}
