//! mzXML transition table
//!
//! Fragment scans may be nested inside their parent `<scan>`. The most recent
//! scan number seen at each MS level is kept so that a fragment without an
//! explicit `precursorScanNum` links to the enclosing scan one level up.

use quick_xml::events::BytesStart;

use super::helpers::{attribute, numeric_attribute, parse_duration, parse_value};
use super::{Dialect, Outcome, ParserFlags, ParserState, Rule};
use crate::binary::{ArrayFormat, BinaryDecoder, BinaryEncoding, CompressionType, Endianness};
use crate::detect::RawDataFormat;
use crate::error::ImportError;
use crate::scan::{Polarity, ScanBuilder};

/// Highest MS level mzXML files may declare
pub const MAX_MS_LEVEL: u8 = 9;

/// Effects run by the mzXML rule table
#[derive(Debug, Clone, Copy)]
pub enum Effect {
    RunStart,
    OpenScan,
    CloseScan,
    PrecursorAttributes,
    PrecursorValue,
    PeaksAttributes,
    DecodePeaks,
}

static RULES: &[Rule<Effect>] = &[
    Rule {
        element: b"msRun",
        within: ParserFlags::empty(),
        enter: ParserFlags::RUN,
        open: Some(Effect::RunStart),
        close: None,
    },
    Rule {
        element: b"scan",
        within: ParserFlags::RUN,
        enter: ParserFlags::SPECTRUM,
        open: Some(Effect::OpenScan),
        close: Some(Effect::CloseScan),
    },
    Rule {
        element: b"precursorMz",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::PRECURSOR.union(ParserFlags::TEXT),
        open: Some(Effect::PrecursorAttributes),
        close: Some(Effect::PrecursorValue),
    },
    Rule {
        element: b"peaks",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::BINARY_DATA_ARRAY.union(ParserFlags::TEXT),
        open: Some(Effect::PeaksAttributes),
        close: Some(Effect::DecodePeaks),
    },
];

/// mzXML dialect state
#[derive(Debug, Default)]
pub struct MzXmlDialect {
    parent_tree: [u32; MAX_MS_LEVEL as usize + 1],
    peaks_count: Option<usize>,
}

impl Dialect for MzXmlDialect {
    type Effect = Effect;

    const FORMAT: RawDataFormat = RawDataFormat::MzXml;

    fn rules() -> &'static [Rule<Effect>] {
        RULES
    }

    fn apply(
        &mut self,
        effect: Effect,
        state: &mut ParserState,
        element: Option<&BytesStart<'_>>,
    ) -> Result<Outcome, ImportError> {
        match (effect, element) {
            (Effect::RunStart, Some(e)) => {
                state.total_scans = numeric_attribute(e, "scanCount", None)?;
                Ok(Outcome::Continue)
            }
            (Effect::OpenScan, Some(e)) => self.open_scan(state, e),
            (Effect::CloseScan, _) => Ok(Outcome::from_scan(state.complete_scan()?)),
            (Effect::PrecursorAttributes, Some(e)) => {
                let number = state.scan_number();
                let charge = numeric_attribute::<i32>(e, "precursorCharge", number)?;
                let parent = numeric_attribute::<u32>(e, "precursorScanNum", number)?;
                let scan = state.scan_mut()?;
                if let Some(charge) = charge {
                    scan.precursor_charge = charge;
                }
                if let Some(parent) = parent.filter(|&p| p > 0) {
                    scan.parent_scan_number = Some(parent);
                }
                Ok(Outcome::Continue)
            }
            (Effect::PrecursorValue, _) => {
                let text = std::mem::take(&mut state.text);
                let number = state.scan_number();
                state.scan_mut()?.precursor_mz = parse_value(&text, "precursorMz", number)?;
                Ok(Outcome::Continue)
            }
            (Effect::PeaksAttributes, Some(e)) => self.peaks_attributes(state, e),
            (Effect::DecodePeaks, _) => self.decode_peaks(state),
            (effect, None) => Err(ImportError::violation(
                state.scan_number(),
                format!("{:?} requires element attributes", effect),
            )),
        }
    }
}

impl MzXmlDialect {
    fn open_scan(
        &mut self,
        state: &mut ParserState,
        e: &BytesStart<'_>,
    ) -> Result<Outcome, ImportError> {
        // A nested scan opening means its enclosing scan had no peaks.
        let pending = state.complete_scan()?;

        let number: u32 = match attribute(e, "num")? {
            Some(value) => parse_value(&value, "scan num", None)?,
            None => return Err(ImportError::violation(None, "scan without a num attribute")),
        };
        if number == 0 {
            return Err(ImportError::violation(Some(0), "scan numbers must be positive"));
        }

        let ms_level = numeric_attribute::<u8>(e, "msLevel", Some(number))?.unwrap_or(1);
        if ms_level == 0 || ms_level > MAX_MS_LEVEL {
            return Err(ImportError::violation(
                Some(number),
                format!("msLevel {} is outside 1..={}", ms_level, MAX_MS_LEVEL),
            ));
        }

        let retention_time = match attribute(e, "retentionTime")? {
            Some(value) => Some(parse_duration(&value).ok_or_else(|| {
                ImportError::violation(Some(number), format!("invalid retentionTime \"{}\"", value))
            })?),
            None => None,
        };

        let mut scan = ScanBuilder::new(number);
        scan.ms_level = ms_level;
        scan.retention_time = retention_time;
        scan.polarity = attribute(e, "polarity")?
            .map(|p| Polarity::from_symbol(&p))
            .unwrap_or_default();
        scan.scan_definition = match attribute(e, "filterLine")? {
            Some(filter) => Some(filter),
            None => attribute(e, "scanType")?,
        };

        let level = ms_level as usize;
        if level > 1 {
            let parent = self.parent_tree[level - 1];
            scan.parent_scan_number = (parent > 0).then_some(parent);
        }
        self.parent_tree[level] = number;
        self.peaks_count = numeric_attribute(e, "peaksCount", Some(number))?;

        state.scan = Some(scan);
        Ok(Outcome::from_scan(pending))
    }

    fn peaks_attributes(
        &mut self,
        state: &mut ParserState,
        e: &BytesStart<'_>,
    ) -> Result<Outcome, ImportError> {
        let number = state.scan_number();

        let encoding = match attribute(e, "precision")? {
            Some(precision) => BinaryEncoding::from_precision(&precision).ok_or_else(|| {
                ImportError::violation(number, format!("unsupported precision \"{}\"", precision))
            })?,
            None => BinaryEncoding::Float32,
        };
        let endianness = match attribute(e, "byteOrder")? {
            Some(order) => Endianness::from_attribute(&order).ok_or_else(|| {
                ImportError::violation(number, format!("unsupported byteOrder \"{}\"", order))
            })?,
            None => Endianness::Big,
        };
        let compression = match attribute(e, "compressionType")?.as_deref() {
            Some("zlib") => CompressionType::Zlib,
            None | Some("") | Some("none") => CompressionType::None,
            Some(other) => {
                return Err(ImportError::violation(
                    number,
                    format!("unsupported compressionType \"{}\"", other),
                ))
            }
        };
        let compressed_length =
            numeric_attribute::<usize>(e, "compressedLen", number)?.filter(|&len| len > 0);

        let format = ArrayFormat::new(encoding, endianness)
            .with_compression(compression)
            .with_compressed_length(compressed_length);
        state.begin_array(format, self.peaks_count.map(|count| count.saturating_mul(2)));
        Ok(Outcome::Continue)
    }

    fn decode_peaks(&mut self, state: &mut ParserState) -> Result<Outcome, ImportError> {
        let number = state.scan_number();
        let values = state.decode_text()?;
        let (mz, intensity) = BinaryDecoder::split_interleaved(&values)
            .map_err(|e| ImportError::corrupt(number, e))?;

        let mut pairs: Vec<(f64, f64)> = mz.into_iter().zip(intensity).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (mz_values, intensity_values): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let scan = state.scan_mut()?;
        scan.mz_values = mz_values;
        scan.intensity_values = intensity_values;
        Ok(Outcome::from_scan(state.complete_scan()?))
    }
}
