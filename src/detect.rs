//! Raw data format detection
//!
//! NetCDF files are recognised by their `CDF` magic. XML dialects are
//! recognised by matching the first lines of the document against the schema
//! URI or root element each dialect declares.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::error::ImportError;

/// Supported raw data formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RawDataFormat {
    /// mzXML (ISB / sashimi)
    #[serde(rename = "mzXML")]
    MzXml,
    /// PSI mzData 1.04 / 1.05
    #[serde(rename = "mzData")]
    MzData,
    /// PSI mzML 1.0 / 1.1, plain or indexed
    #[serde(rename = "mzML")]
    MzMl,
    /// ANDI-MS NetCDF
    #[serde(rename = "NetCDF")]
    NetCdf,
}

impl RawDataFormat {
    /// Human readable name
    pub fn name(&self) -> &'static str {
        match self {
            RawDataFormat::MzXml => "mzXML",
            RawDataFormat::MzData => "mzData",
            RawDataFormat::MzMl => "mzML",
            RawDataFormat::NetCdf => "NetCDF",
        }
    }
}

impl std::fmt::Display for RawDataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Default number of lines inspected before giving up
pub const DEFAULT_SNIFF_LINES: usize = 20;

const CDF_MAGIC: &[u8] = b"CDF";

fn dialect_patterns() -> &'static [(RawDataFormat, Regex)] {
    static PATTERNS: OnceLock<Vec<(RawDataFormat, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                RawDataFormat::MzMl,
                r"(?i)psi\.hupo\.org/(ms/mzml|schema_revision/mzml)|<(indexedmzML|mzML)[\s>]",
            ),
            (
                RawDataFormat::MzXml,
                r"(?i)sashimi\.sourceforge\.net/schema|<mzXML[\s>]",
            ),
            (
                RawDataFormat::MzData,
                r"(?i)psidev\.sourceforge\.net/ms/xml/mzdata|<mzData[\s>]",
            ),
        ]
        .into_iter()
        .map(|(format, pattern)| (format, Regex::new(pattern).expect("valid dialect pattern")))
        .collect()
    })
}

/// Detect the format of the file at `path`, inspecting at most `max_lines`
/// lines of an XML document.
pub fn detect_format(path: &Path, max_lines: usize) -> Result<RawDataFormat, ImportError> {
    let file = File::open(path)?;
    let format = detect_from_reader(&mut BufReader::new(file), max_lines)?;
    debug!("Detected {} for {}", format, path.display());
    Ok(format)
}

/// Detect the format of a buffered stream.
pub fn detect_from_reader<R: BufRead>(
    reader: &mut R,
    max_lines: usize,
) -> Result<RawDataFormat, ImportError> {
    let head = reader.fill_buf()?;
    if head.len() >= 4 && head.starts_with(CDF_MAGIC) && matches!(head[3], 1 | 2) {
        return Ok(RawDataFormat::NetCdf);
    }

    let mut line = Vec::new();
    for _ in 0..max_lines {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        for (format, pattern) in dialect_patterns() {
            if pattern.is_match(&text) {
                return Ok(*format);
            }
        }
    }

    Err(ImportError::DetectionFailure(format!(
        "no known format signature in the first {} lines",
        max_lines
    )))
}
