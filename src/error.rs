//! Error taxonomy for raw data import
//!
//! Every variant except [`ImportError::Cancelled`] ends an import in the
//! `Error` task state. No variant is retried internally.

use crate::binary::BinaryDecodeError;
use crate::netcdf::NetCdfError;

/// Errors that abort an import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The input format could not be determined
    #[error("Unable to detect raw data format: {0}")]
    DetectionFailure(String),

    /// The document violates its dialect, e.g. a malformed numeric attribute
    #[error("{}", describe_violation(.scan_number, .message))]
    FormatViolation {
        /// Scan being parsed when the violation was found, if any
        scan_number: Option<u32>,
        /// What was wrong
        message: String,
    },

    /// A binary peak array could not be decoded
    #[error("Corrupt peak data{}: {source}", scan_suffix(.scan_number))]
    CorruptPayload {
        /// Scan owning the array, if known
        scan_number: Option<u32>,
        /// Underlying decode error
        #[source]
        source: BinaryDecodeError,
    },

    /// A scan carries no retention time
    #[error("Scan {scan_number} does not contain a retention time")]
    MissingRetentionTime {
        /// Scan missing its retention time
        scan_number: u32,
    },

    /// The XML layer rejected the document
    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// The NetCDF container could not be read
    #[error("NetCDF error: {0}")]
    NetCdfError(#[from] NetCdfError),

    /// I/O error while reading input or writing scan storage
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The document parsed cleanly but held no scans
    #[error("No scans found")]
    NoScans,

    /// The import was cancelled before completion
    #[error("Import cancelled")]
    Cancelled,
}

impl ImportError {
    /// Shorthand for a [`ImportError::FormatViolation`]
    pub fn violation(scan_number: Option<u32>, message: impl Into<String>) -> Self {
        Self::FormatViolation {
            scan_number,
            message: message.into(),
        }
    }

    /// Shorthand for a [`ImportError::CorruptPayload`]
    pub fn corrupt(scan_number: Option<u32>, source: BinaryDecodeError) -> Self {
        Self::CorruptPayload {
            scan_number,
            source,
        }
    }

    /// Whether this outcome is a cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ImportError::Cancelled)
    }
}

impl From<quick_xml::events::attributes::AttrError> for ImportError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        ImportError::XmlError(error.into())
    }
}

fn describe_violation(scan_number: &Option<u32>, message: &str) -> String {
    match scan_number {
        Some(n) => format!("Format violation in scan {}: {}", n, message),
        None => format!("Format violation: {}", message),
    }
}

fn scan_suffix(scan_number: &Option<u32>) -> String {
    scan_number
        .map(|n| format!(" in scan {}", n))
        .unwrap_or_default()
}
