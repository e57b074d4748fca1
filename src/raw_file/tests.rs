use super::*;
use crate::config::PreloadPolicy;
use crate::scan::ScanBuilder;
use crate::tree::{ScanSink, WindowedTreeBuilder};

fn scan(number: u32, ms_level: u8, rt: f64, parent: Option<u32>, peaks: &[(f64, f64)]) -> ScanRecord {
    let mut builder = ScanBuilder::new(number);
    builder.ms_level = ms_level;
    builder.retention_time = Some(rt);
    builder.parent_scan_number = parent;
    builder.precursor_mz = if ms_level > 1 { 500.0 } else { 0.0 };
    builder.mz_values = peaks.iter().map(|p| p.0).collect();
    builder.intensity_values = peaks.iter().map(|p| p.1).collect();
    builder.build().unwrap()
}

fn build(preload: PreloadPolicy) -> RawFile {
    let mut writer = RawFileWriter::new("test.mzXML", RawDataFormat::MzXml, preload).unwrap();
    let mut tree = WindowedTreeBuilder::new(10);
    tree.push(scan(1, 1, 10.0, None, &[(100.0, 5.0), (200.0, 50.0)]), &mut writer)
        .unwrap();
    tree.push(scan(2, 2, 11.0, Some(1), &[(150.0, 7.0)]), &mut writer)
        .unwrap();
    tree.push(scan(3, 1, 12.0, None, &[(110.0, 9.0), (300.0, 1.0)]), &mut writer)
        .unwrap();
    tree.finish(&mut writer).unwrap();
    writer.finish()
}

#[test]
fn test_lookup_and_links() {
    let raw = build(PreloadPolicy::PreloadAll);
    assert_eq!(raw.scan_count(), 3);
    assert_eq!(raw.format(), RawDataFormat::MzXml);
    assert_eq!(raw.scan(1).unwrap().fragment_scan_numbers(), &[2]);
    assert_eq!(raw.scan(2).unwrap().parent_scan_number(), Some(1));
    assert!(raw.scan(3).unwrap().fragment_scan_numbers().is_empty());
    assert!(raw.scan(4).is_none());
    assert_eq!(raw.ms_levels(), vec![1, 2]);
    assert_eq!(raw.scan_numbers().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(raw.fragment_links(), 1);
}

#[test]
fn test_preload_full_scans_only() {
    let raw = build(PreloadPolicy::PreloadFullScansOnly);
    assert!(raw.scan(1).unwrap().is_resident());
    assert!(!raw.scan(2).unwrap().is_resident());
    assert!(raw.scan(2).unwrap().record().mz_values.is_empty());

    let fragment = raw.scan_record(2).unwrap().unwrap();
    assert_eq!(fragment.mz_values, vec![150.0]);
    assert_eq!(fragment.intensity_values, vec![7.0]);
    assert_eq!(fragment.precursor_mz, Some(500.0));
    assert!(raw.scan_record(9).unwrap().is_none());
}

#[test]
fn test_no_preload_materializes_everything() {
    let raw = build(PreloadPolicy::NoPreload);
    assert_eq!(raw.summary().resident_scans, 0);
    for number in 1..=3 {
        let stored = raw.scan(number).unwrap();
        let (mz, intensity) = raw.peaks(stored).unwrap();
        assert_eq!(mz.len(), stored.point_count());
        assert_eq!(intensity.len(), stored.point_count());
    }
    // statistics survive moving arrays to disk
    assert_eq!(raw.scan(1).unwrap().base_peak(), Some((200.0, 50.0)));
    assert_eq!(raw.scan(1).unwrap().total_ion_current(), 55.0);
}

#[test]
fn test_ranges() {
    let raw = build(PreloadPolicy::NoPreload);
    assert_eq!(raw.rt_range(1), Some((10.0, 12.0)));
    assert_eq!(raw.mz_range(1), Some((100.0, 300.0)));
    assert_eq!(raw.mz_range(2), Some((150.0, 150.0)));
    assert_eq!(raw.rt_range(3), None);
    assert_eq!(raw.max_base_peak_intensity(1), 50.0);
    assert_eq!(raw.max_total_ion_current(1), 55.0);
    assert_eq!(raw.max_point_count(), 2);
    assert_eq!(raw.data_points(), 5);
}

#[test]
fn test_scan_at_rt() {
    let raw = build(PreloadPolicy::PreloadAll);
    assert_eq!(raw.scan_at_rt(1, 11.9).map(StoredScan::scan_number), Some(3));
    assert_eq!(raw.scan_at_rt(1, 0.0).map(StoredScan::scan_number), Some(1));
    assert_eq!(raw.scan_at_rt(2, 100.0).map(StoredScan::scan_number), Some(2));
    assert!(raw.scan_at_rt(5, 1.0).is_none());
}

#[test]
fn test_summary() {
    let raw = build(PreloadPolicy::PreloadFullScansOnly);
    let summary = raw.summary();
    assert_eq!(summary.scan_count, 3);
    assert_eq!(summary.levels.len(), 2);
    assert_eq!(summary.levels[0].scan_count, 2);
    assert_eq!(summary.levels[1].data_points, 1);
    assert_eq!(summary.resident_scans, 2);
    assert_eq!(summary.storage_bytes, 16);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["format"], "mzXML");
    assert_eq!(json["fragment_links"], 1);

    let text = summary.to_string();
    assert!(text.contains("MS2: 1 scans"));
}

#[test]
fn test_duplicate_rejected() {
    let mut writer =
        RawFileWriter::new("dup.mzML", RawDataFormat::MzMl, PreloadPolicy::PreloadAll).unwrap();
    writer.accept(scan(1, 1, 1.0, None, &[])).unwrap();
    assert!(writer.accept(scan(1, 1, 2.0, None, &[])).is_err());
    assert_eq!(writer.len(), 1);
}
