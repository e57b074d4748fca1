#![no_main]

use libfuzzer_sys::fuzz_target;
use mzingest::netcdf::NetCdfScanReader;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut reader) = NetCdfScanReader::new(Cursor::new(data)) {
        for _ in 0..100 {
            match reader.next_scan() {
                Ok(Some(_)) => {}
                _ => break,
            }
        }
    }
});
