//! Controlled vocabulary (CV) parameters
//!
//! mzML and mzData describe spectra with `cvParam` elements from the PSI-MS
//! ontology (mzML) or the older PSI vocabulary (mzData).

use quick_xml::events::BytesStart;

use super::helpers::attribute;
use crate::error::ImportError;

/// A controlled vocabulary parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CvParam {
    /// Accession number (e.g., "MS:1000511")
    pub accession: String,

    /// Human-readable name
    pub name: String,

    /// Optional value
    pub value: Option<String>,

    /// Unit accession
    pub unit_accession: Option<String>,
}

impl CvParam {
    /// Read a `cvParam` element
    pub fn from_element(e: &BytesStart<'_>) -> Result<Self, ImportError> {
        Ok(CvParam {
            accession: attribute(e, "accession")?.unwrap_or_default(),
            name: attribute(e, "name")?.unwrap_or_default(),
            value: attribute(e, "value")?,
            unit_accession: attribute(e, "unitAccession")?,
        })
    }

    /// Whether this parameter has the given accession or name
    pub fn is(&self, accession: &str, name: &str) -> bool {
        self.accession == accession || self.name == name
    }

    /// Get the value as f64 if possible
    pub fn value_as_f64(&self) -> Option<f64> {
        self.value.as_ref()?.trim().parse().ok()
    }

    /// Get the value as i32 if possible
    pub fn value_as_i32(&self) -> Option<i32> {
        self.value.as_ref()?.trim().parse().ok()
    }

    /// Parse the value as a number, failing with a format violation
    pub fn require_f64(&self, scan_number: Option<u32>) -> Result<f64, ImportError> {
        self.value_as_f64().ok_or_else(|| self.invalid(scan_number))
    }

    /// Parse the value as an integer, failing with a format violation
    pub fn require_i32(&self, scan_number: Option<u32>) -> Result<i32, ImportError> {
        self.value_as_i32().ok_or_else(|| self.invalid(scan_number))
    }

    fn invalid(&self, scan_number: Option<u32>) -> ImportError {
        ImportError::violation(
            scan_number,
            format!(
                "invalid value {:?} for {} ({})",
                self.value.as_deref().unwrap_or(""),
                self.accession,
                self.name
            ),
        )
    }
}

/// PSI-MS accessions read from mzML
#[allow(non_snake_case)]
pub mod MS_CV_ACCESSIONS {
    /// MS level
    pub const MS_LEVEL: &str = "MS:1000511";

    /// Positive scan
    pub const POSITIVE_SCAN: &str = "MS:1000130";

    /// Negative scan
    pub const NEGATIVE_SCAN: &str = "MS:1000129";

    /// Electromagnetic radiation spectrum (not a mass spectrum)
    pub const EMR_SPECTRUM: &str = "MS:1000804";

    /// Scan start time (retention time)
    pub const SCAN_START_TIME: &str = "MS:1000016";

    /// Filter string
    pub const FILTER_STRING: &str = "MS:1000512";

    /// Selected ion m/z
    pub const SELECTED_ION_MZ: &str = "MS:1000744";

    /// m/z (used for the selected ion by mzML 1.0 writers)
    pub const MZ: &str = "MS:1000040";

    /// Charge state
    pub const CHARGE_STATE: &str = "MS:1000041";

    /// 32-bit float
    pub const FLOAT_32_BIT: &str = "MS:1000521";

    /// 64-bit float
    pub const FLOAT_64_BIT: &str = "MS:1000523";

    /// zlib compression
    pub const ZLIB_COMPRESSION: &str = "MS:1000574";

    /// No compression
    pub const NO_COMPRESSION: &str = "MS:1000576";

    /// MS-Numpress linear prediction
    pub const NUMPRESS_LINEAR: &str = "MS:1002312";

    /// MS-Numpress positive integer compression
    pub const NUMPRESS_PIC: &str = "MS:1002313";

    /// MS-Numpress short logged float compression
    pub const NUMPRESS_SLOF: &str = "MS:1002314";

    /// m/z array
    pub const MZ_ARRAY: &str = "MS:1000514";

    /// Intensity array
    pub const INTENSITY_ARRAY: &str = "MS:1000515";

    /// Minute, as written by mzML 1.0 converters
    pub const MINUTE: &str = "MS:1000038";

    /// Second (UO)
    pub const UNIT_SECOND: &str = "UO:0000010";

    /// Minute (UO)
    pub const UNIT_MINUTE: &str = "UO:0000031";

    /// Millisecond (UO)
    pub const UNIT_MILLISECOND: &str = "UO:0000028";
}

/// PSI accessions and names read from mzData
#[allow(non_snake_case)]
pub mod PSI_CV_ACCESSIONS {
    /// Polarity
    pub const POLARITY: &str = "PSI:1000037";
    /// Polarity, by name
    pub const POLARITY_NAME: &str = "Polarity";

    /// Retention time in minutes
    pub const TIME_IN_MINUTES: &str = "PSI:1000038";
    /// Retention time in minutes, mzData 1.04 name
    pub const TIME_MIN_NAME: &str = "time.min";

    /// Retention time in seconds
    pub const TIME_IN_SECONDS: &str = "PSI:1000039";
    /// Retention time in seconds, mzData 1.04 name
    pub const TIME_SEC_NAME: &str = "time.sec";

    /// Precursor m/z
    pub const MASS_TO_CHARGE_RATIO: &str = "PSI:1000040";
    /// Precursor m/z, mzData 1.04 name
    pub const MZ_NAME: &str = "mz";

    /// Precursor charge
    pub const CHARGE_STATE: &str = "PSI:1000041";
    /// Precursor charge, by name
    pub const CHARGE_STATE_NAME: &str = "ChargeState";
}

/// Convert retention time to seconds based on unit
pub fn normalize_retention_time(value: f64, unit_accession: Option<&str>) -> f64 {
    match unit_accession {
        Some(MS_CV_ACCESSIONS::UNIT_MINUTE) | Some(MS_CV_ACCESSIONS::MINUTE) => value * 60.0,
        Some(MS_CV_ACCESSIONS::UNIT_MILLISECOND) => value / 1000.0,
        _ => value,
    }
}
