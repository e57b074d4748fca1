//! Scan-tree reconstruction over a bounded window
//!
//! Fragment scans follow their parent within a few scans in every supported
//! format. Recent scans are held back in a small window so that a fragment
//! arriving later can still be appended to its parent's
//! `fragment_scan_numbers` before the parent is written out. A parent that has
//! already left the window keeps its fragment list as is.

use std::collections::{HashSet, VecDeque};

use log::debug;

use crate::error::ImportError;
use crate::scan::ScanRecord;

/// Destination for scans leaving the window
pub trait ScanSink {
    /// Take ownership of a finished scan
    fn accept(&mut self, scan: ScanRecord) -> Result<(), ImportError>;
}

impl ScanSink for Vec<ScanRecord> {
    fn accept(&mut self, scan: ScanRecord) -> Result<(), ImportError> {
        self.push(scan);
        Ok(())
    }
}

/// Bounded FIFO that links fragments to parents before emission
#[derive(Debug)]
pub struct WindowedTreeBuilder {
    window: VecDeque<ScanRecord>,
    capacity: usize,
    seen: HashSet<u32>,
    last_number: Option<u32>,
    emitted: usize,
}

impl WindowedTreeBuilder {
    /// Create a builder holding at most `capacity` scans (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
            seen: HashSet::new(),
            last_number: None,
            emitted: 0,
        }
    }

    /// Window capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Scans currently held back
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Scans handed to the sink so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Accept the next scan in document order, evicting the oldest scan to
    /// `sink` once the window is over capacity.
    ///
    /// Scan numbers must increase; a repeated or smaller number is a format
    /// violation.
    pub fn push<S: ScanSink + ?Sized>(
        &mut self,
        scan: ScanRecord,
        sink: &mut S,
    ) -> Result<(), ImportError> {
        if !self.seen.insert(scan.scan_number) {
            return Err(ImportError::violation(
                Some(scan.scan_number),
                "duplicate scan number",
            ));
        }
        if let Some(last) = self.last_number.filter(|&last| scan.scan_number < last) {
            return Err(ImportError::violation(
                Some(scan.scan_number),
                format!("scan number decreases after scan {}", last),
            ));
        }
        self.last_number = Some(scan.scan_number);

        if let Some(parent_number) = scan.parent_scan_number {
            if let Some(parent) = self
                .window
                .iter_mut()
                .find(|candidate| candidate.scan_number == parent_number)
            {
                parent.fragment_scan_numbers.push(scan.scan_number);
            }
        }

        self.window.push_front(scan);
        while self.window.len() > self.capacity {
            if let Some(oldest) = self.window.pop_back() {
                self.emit(oldest, sink)?;
            }
        }
        Ok(())
    }

    /// Flush every remaining scan, oldest first
    pub fn finish<S: ScanSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), ImportError> {
        debug!("Flushing {} scans from the tree window", self.window.len());
        while let Some(oldest) = self.window.pop_back() {
            self.emit(oldest, sink)?;
        }
        Ok(())
    }

    fn emit<S: ScanSink + ?Sized>(
        &mut self,
        scan: ScanRecord,
        sink: &mut S,
    ) -> Result<(), ImportError> {
        self.emitted += 1;
        sink.accept(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ScanBuilder;

    fn scan(number: u32, ms_level: u8, parent: Option<u32>) -> ScanRecord {
        let mut builder = ScanBuilder::new(number);
        builder.ms_level = ms_level;
        builder.retention_time = Some(number as f64);
        builder.parent_scan_number = parent;
        builder.build().unwrap()
    }

    fn fragments_of(scans: &[ScanRecord], number: u32) -> Vec<u32> {
        scans
            .iter()
            .find(|s| s.scan_number == number)
            .map(|s| s.fragment_scan_numbers.clone())
            .unwrap()
    }

    #[test]
    fn test_three_scan_tree() {
        let mut builder = WindowedTreeBuilder::new(10);
        let mut out = Vec::new();
        builder.push(scan(1, 1, None), &mut out).unwrap();
        builder.push(scan(2, 2, Some(1)), &mut out).unwrap();
        builder.push(scan(3, 1, None), &mut out).unwrap();
        assert!(out.is_empty());

        builder.finish(&mut out).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(fragments_of(&out, 1), vec![2]);
        assert_eq!(out[1].parent_scan_number, Some(1));
        assert!(fragments_of(&out, 3).is_empty());
        assert_eq!(builder.emitted(), 3);
    }

    #[test]
    fn test_emission_order_follows_input() {
        let mut builder = WindowedTreeBuilder::new(2);
        let mut out = Vec::new();
        for n in 1..=6 {
            builder.push(scan(n, 1, None), &mut out).unwrap();
            assert!(builder.len() <= 2);
        }
        assert_eq!(out.len(), 4);
        builder.finish(&mut out).unwrap();
        let numbers: Vec<u32> = out.iter().map(|s| s.scan_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        assert!(builder.is_empty());
    }

    #[test]
    fn test_parent_outside_window_is_not_linked() {
        let mut builder = WindowedTreeBuilder::new(2);
        let mut out = Vec::new();
        builder.push(scan(1, 1, None), &mut out).unwrap();
        builder.push(scan(2, 2, Some(1)), &mut out).unwrap();
        builder.push(scan(3, 2, Some(1)), &mut out).unwrap();
        builder.push(scan(4, 2, Some(1)), &mut out).unwrap();
        builder.finish(&mut out).unwrap();

        // scan 1 is evicted right after scan 3 links to it
        assert_eq!(fragments_of(&out, 1), vec![2, 3]);
        assert_eq!(out[3].scan_number, 4);
        assert_eq!(out[3].parent_scan_number, Some(1));
    }

    #[test]
    fn test_multiple_fragments_keep_order() {
        let mut builder = WindowedTreeBuilder::new(10);
        let mut out = Vec::new();
        builder.push(scan(1, 1, None), &mut out).unwrap();
        for n in 2..=5 {
            builder.push(scan(n, 2, Some(1)), &mut out).unwrap();
        }
        builder.push(scan(6, 3, Some(5)), &mut out).unwrap();
        builder.finish(&mut out).unwrap();
        assert_eq!(fragments_of(&out, 1), vec![2, 3, 4, 5]);
        assert_eq!(fragments_of(&out, 5), vec![6]);
    }

    #[test]
    fn test_duplicate_scan_number() {
        let mut builder = WindowedTreeBuilder::new(10);
        let mut out = Vec::new();
        builder.push(scan(1, 1, None), &mut out).unwrap();
        let err = builder.push(scan(1, 1, None), &mut out).unwrap_err();
        assert!(matches!(
            err,
            ImportError::FormatViolation {
                scan_number: Some(1),
                ..
            }
        ));
    }

    #[test]
    fn test_decreasing_scan_number_is_rejected() {
        let mut builder = WindowedTreeBuilder::new(10);
        let mut out = Vec::new();
        builder.push(scan(5, 1, None), &mut out).unwrap();
        let err = builder.push(scan(3, 1, None), &mut out).unwrap_err();
        assert!(matches!(
            err,
            ImportError::FormatViolation {
                scan_number: Some(3),
                ..
            }
        ));

        // gaps are fine as long as numbers keep increasing
        builder.push(scan(9, 1, None), &mut out).unwrap();
        builder.finish(&mut out).unwrap();
        let numbers: Vec<u32> = out.iter().map(|s| s.scan_number).collect();
        assert_eq!(numbers, vec![5, 9]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let builder = WindowedTreeBuilder::new(0);
        assert_eq!(builder.capacity(), 1);
    }
}
