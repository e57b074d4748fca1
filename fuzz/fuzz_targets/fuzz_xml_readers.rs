#![no_main]

use libfuzzer_sys::fuzz_target;
use mzingest::xml::{MzDataReader, MzMlReader, MzXmlReader};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut reader = MzXmlReader::new(Cursor::new(data));
    for _ in 0..100 {
        match reader.next_scan() {
            Ok(Some(_)) => {}
            _ => break,
        }
    }

    let mut reader = MzDataReader::new(Cursor::new(data));
    for _ in 0..100 {
        match reader.next_scan() {
            Ok(Some(_)) => {}
            _ => break,
        }
    }

    let mut reader = MzMlReader::new(Cursor::new(data));
    for _ in 0..100 {
        match reader.next_scan() {
            Ok(Some(_)) => {}
            _ => break,
        }
    }
});
