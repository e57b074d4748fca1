use std::io::Cursor;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use mzingest::binary::{
    ArrayFormat, BinaryDecoder, BinaryEncoder, BinaryEncoding, CompressionType, Endianness,
};
use mzingest::tree::WindowedTreeBuilder;
use mzingest::xml::MzMlReader;

fn generate_test_mzml(num_spectra: usize, peaks_per_spectrum: usize) -> Vec<u8> {
    let mz_format = ArrayFormat::new(BinaryEncoding::Float64, Endianness::Little)
        .with_compression(CompressionType::Zlib);
    let intensity_format = ArrayFormat::new(BinaryEncoding::Float32, Endianness::Little);

    let mut mzml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<mzML xmlns="http://psi.hupo.org/ms/mzml" version="1.1.0">
  <run id="bench_run">
    <spectrumList count="{}">"#,
        num_spectra
    );

    for i in 0..num_spectra {
        let ms_level = if i % 5 == 0 { 1 } else { 2 };
        let parent = i - i % 5;
        let mz_values: Vec<f64> = (0..peaks_per_spectrum)
            .map(|j| 100.0 + (j as f64) * 10.0 + (i as f64) * 0.1)
            .collect();
        let intensity_values: Vec<f64> = (0..peaks_per_spectrum)
            .map(|j| 1000.0 + (j as f64) * 50.0)
            .collect();
        let precursor = if ms_level == 2 {
            format!(
                r#"<precursorList count="1"><precursor spectrumRef="scan={}"><selectedIonList count="1"><selectedIon>
            <cvParam cvRef="MS" accession="MS:1000744" name="selected ion m/z" value="500.0"/>
          </selectedIon></selectedIonList></precursor></precursorList>"#,
                parent + 1
            )
        } else {
            String::new()
        };

        mzml.push_str(&format!(
            r#"
      <spectrum index="{}" id="scan={}" defaultArrayLength="{}">
        <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="{}"/>
        <scanList count="1">
          <scan>
            <cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="{}" unitCvRef="UO" unitAccession="UO:0000010" unitName="second"/>
          </scan>
        </scanList>
        {}
        <binaryDataArrayList count="2">
          <binaryDataArray>
            <cvParam cvRef="MS" accession="MS:1000523" name="64-bit float"/>
            <cvParam cvRef="MS" accession="MS:1000574" name="zlib compression"/>
            <cvParam cvRef="MS" accession="MS:1000514" name="m/z array"/>
            <binary>{}</binary>
          </binaryDataArray>
          <binaryDataArray>
            <cvParam cvRef="MS" accession="MS:1000521" name="32-bit float"/>
            <cvParam cvRef="MS" accession="MS:1000576" name="no compression"/>
            <cvParam cvRef="MS" accession="MS:1000515" name="intensity array"/>
            <binary>{}</binary>
          </binaryDataArray>
        </binaryDataArrayList>
      </spectrum>"#,
            i,
            i + 1,
            peaks_per_spectrum,
            ms_level,
            (i as f64) * 0.5,
            precursor,
            BinaryEncoder::encode(&mz_values, &mz_format).unwrap(),
            BinaryEncoder::encode(&intensity_values, &intensity_format).unwrap(),
        ));
    }

    mzml.push_str(
        r#"
    </spectrumList>
  </run>
</mzML>"#,
    );

    mzml.into_bytes()
}

fn bench_binary_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_decode");

    for num_values in [1_000, 10_000, 100_000] {
        let values: Vec<f64> = (0..num_values).map(|i| 100.0 + i as f64 * 0.01).collect();
        group.throughput(Throughput::Elements(num_values as u64));

        for (label, encoding, compression) in [
            ("f32", BinaryEncoding::Float32, CompressionType::None),
            ("f64", BinaryEncoding::Float64, CompressionType::None),
            ("f64_zlib", BinaryEncoding::Float64, CompressionType::Zlib),
        ] {
            let format = ArrayFormat::new(encoding, Endianness::Big).with_compression(compression);
            let text = BinaryEncoder::encode(&values, &format).unwrap();
            group.bench_with_input(BenchmarkId::new(label, num_values), &text, |b, text| {
                b.iter(|| {
                    let decoded = BinaryDecoder::decode(black_box(text), &format, Some(num_values)).unwrap();
                    black_box(decoded.len());
                });
            });
        }
    }

    group.finish();
}

fn bench_mzml_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("mzml_reader");

    for num_spectra in [100, 500, 1000] {
        let peaks_per_spectrum = 50;
        let total_peaks = num_spectra * peaks_per_spectrum;
        let mzml_bytes = Arc::new(generate_test_mzml(num_spectra, peaks_per_spectrum));

        group.throughput(Throughput::Elements(total_peaks as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_spectra),
            &mzml_bytes,
            |b, bytes| {
                b.iter_batched(
                    || MzMlReader::new(Cursor::new(bytes.as_ref().clone())),
                    |mut reader| {
                        let mut tree = WindowedTreeBuilder::new(20);
                        let mut scans = Vec::with_capacity(num_spectra);
                        while let Some(scan) = reader.next_scan().unwrap() {
                            tree.push(scan, &mut scans).unwrap();
                        }
                        tree.finish(&mut scans).unwrap();
                        black_box(scans.len());
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_binary_decode, bench_mzml_reader);
criterion_main!(benches);
