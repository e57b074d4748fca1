use std::io::Cursor;

use super::*;
use crate::error::ImportError;

/// Three scans of 2, 0 and 3 points with a record-dimension point axis.
fn andi_fixture(index: Vec<f64>, version_2: bool) -> Vec<u8> {
    let mut writer = ClassicWriter::new();
    if version_2 {
        writer = writer.with_64bit_offsets();
    }
    let scans = writer.add_dimension("scan_number", index.len() as u64);
    let points = writer.add_record_dimension("point_number");
    writer.add_attribute("dataset_origin", AttributeValue::Text("unit test".into()));
    writer.add_variable("scan_index", &[scans], NcType::Int, index);
    writer.add_variable(
        "scan_acquisition_time",
        &[scans],
        NcType::Double,
        vec![0.5, 1.0, 1.5],
    );
    let mass = writer.add_variable(
        "mass_values",
        &[points],
        NcType::Float,
        vec![100.0, 101.0, 200.0, 201.0, 202.0],
    );
    writer.add_variable_attribute(mass, "units", AttributeValue::Text("M/Z".into()));
    let intensity = writer.add_variable(
        "intensity_values",
        &[points],
        NcType::Short,
        vec![10.0, 20.0, 30.0, 40.0, 50.0],
    );
    writer.add_variable_attribute(intensity, "scale_factor", AttributeValue::Doubles(vec![2.0]));
    writer.to_bytes().unwrap()
}

#[test]
fn test_header_round_trip() {
    let bytes = andi_fixture(vec![0.0, 2.0, 2.0], false);
    let file = NetCdfFile::open(Cursor::new(bytes)).unwrap();
    let header = file.header();

    assert_eq!(header.version, 1);
    assert_eq!(header.num_records, 5);
    assert_eq!(header.dimensions.len(), 2);
    assert!(header.dimensions[1].is_record());
    assert_eq!(
        header.attribute("dataset_origin").and_then(|v| v.as_text()),
        Some("unit test")
    );

    let mass = header.variable("mass_values").unwrap();
    assert!(mass.is_record);
    assert_eq!(mass.nc_type, NcType::Float);
    assert_eq!(
        mass.attribute("units").and_then(|v| v.as_text()),
        Some("M/Z")
    );
    assert_eq!(header.element_count(mass), 5);
}

#[test]
fn test_read_interleaved_record_variables() {
    for version_2 in [false, true] {
        let bytes = andi_fixture(vec![0.0, 2.0, 2.0], version_2);
        let mut file = NetCdfFile::open(Cursor::new(bytes)).unwrap();

        let mass = file.variable("mass_values").unwrap();
        assert_eq!(
            file.read_all(&mass).unwrap(),
            vec![100.0, 101.0, 200.0, 201.0, 202.0]
        );
        let intensity = file.variable("intensity_values").unwrap();
        assert_eq!(file.read_slice(&intensity, 2, 3).unwrap(), vec![30.0, 40.0, 50.0]);

        let times = file.variable("scan_acquisition_time").unwrap();
        assert_eq!(file.read_all(&times).unwrap(), vec![0.5, 1.0, 1.5]);
    }
}

#[test]
fn test_out_of_bounds_slice() {
    let bytes = andi_fixture(vec![0.0, 2.0, 2.0], false);
    let mut file = NetCdfFile::open(Cursor::new(bytes)).unwrap();
    let mass = file.variable("mass_values").unwrap();
    assert!(matches!(
        file.read_slice(&mass, 4, 2),
        Err(NetCdfError::OutOfBounds { length: 5, .. })
    ));
    assert!(matches!(
        file.variable("nope"),
        Err(NetCdfError::MissingVariable(_))
    ));
}

#[test]
fn test_invalid_magic() {
    let result = NetCdfFile::open(Cursor::new(b"HDF\x01\0\0\0\0".to_vec()));
    assert!(matches!(result, Err(NetCdfError::InvalidMagic)));

    let result = NetCdfFile::open(Cursor::new(b"CDF\x05\0\0\0\0".to_vec()));
    assert!(matches!(result, Err(NetCdfError::UnsupportedVersion(5))));
}

#[test]
fn test_scan_reader() {
    let bytes = andi_fixture(vec![0.0, 2.0, 2.0], false);
    let mut reader = NetCdfScanReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(crate::source::ScanSource::total_scans(&reader), Some(3));

    let first = reader.next_scan().unwrap().unwrap();
    assert_eq!(first.scan_number, 1);
    assert_eq!(first.ms_level, 1);
    assert_eq!(first.retention_time, 0.5);
    assert_eq!(first.mz_values, vec![100.0, 101.0]);
    assert_eq!(first.intensity_values, vec![20.0, 40.0]);

    let second = reader.next_scan().unwrap().unwrap();
    assert_eq!(second.scan_number, 2);
    assert_eq!(second.point_count(), 0);

    let third = reader.next_scan().unwrap().unwrap();
    assert_eq!(third.mz_values, vec![200.0, 201.0, 202.0]);
    assert_eq!(third.intensity_values, vec![60.0, 80.0, 100.0]);

    assert!(reader.next_scan().unwrap().is_none());
    assert!(reader.repaired_scans().is_empty());
}

#[test]
fn test_scan_reader_repairs_gap() {
    let bytes = andi_fixture(vec![0.0, -1.0, 2.0], false);
    let mut reader = NetCdfScanReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.repaired_scans(), vec![2]);

    reader.next_scan().unwrap().unwrap();
    let repaired = reader.next_scan().unwrap().unwrap();
    assert_eq!(repaired.point_count(), 0);
    // times 0.5 and 1.5 two scans apart give a step of 0.5
    assert!((repaired.retention_time - 1.0).abs() < 1e-9);
}

#[test]
fn test_missing_variable_is_violation() {
    let mut writer = ClassicWriter::new();
    let scans = writer.add_dimension("scan_number", 1);
    writer.add_variable("scan_index", &[scans], NcType::Int, vec![0.0]);
    let bytes = writer.to_bytes().unwrap();

    let result = NetCdfScanReader::new(Cursor::new(bytes));
    assert!(matches!(result, Err(ImportError::FormatViolation { .. })));
}

#[test]
fn test_garbage_is_detection_failure() {
    let result = NetCdfScanReader::new(Cursor::new(b"CDF\x01garbage".to_vec()));
    assert!(matches!(
        result,
        Err(ImportError::DetectionFailure(_)) | Err(ImportError::IoError(_))
    ));
}
