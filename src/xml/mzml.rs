//! mzML 1.0 / 1.1 transition table
//!
//! Spectrum ids are native ids such as `controllerType=0 controllerNumber=1
//! scan=17`. The number after `scan=` becomes the scan number; ids without one
//! are numbered after the highest number assigned so far. The mapping is kept
//! so that `precursor@spectrumRef` can be resolved to a parent scan.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::warn;
use quick_xml::events::BytesStart;
use regex::Regex;

use super::cv::{normalize_retention_time, CvParam, MS_CV_ACCESSIONS as MS};
use super::helpers::{attribute, numeric_attribute};
use super::{Dialect, Outcome, ParserFlags, ParserState, Rule};
use crate::binary::{ArrayFormat, BinaryEncoding, CompressionType, Endianness};
use crate::detect::RawDataFormat;
use crate::error::ImportError;
use crate::scan::{Polarity, ScanBuilder};

/// Effects run by the mzML rule table
#[derive(Debug, Clone, Copy)]
pub enum Effect {
    RunStart,
    OpenSpectrum,
    CloseSpectrum,
    PrecursorRef,
    CvParam,
    GroupStart,
    GroupParam,
    GroupRef,
    ArrayStart,
    DecodeArray,
}

static RULES: &[Rule<Effect>] = &[
    Rule {
        element: b"referenceableParamGroup",
        within: ParserFlags::empty(),
        enter: ParserFlags::PARAM_GROUP,
        open: Some(Effect::GroupStart),
        close: None,
    },
    Rule {
        element: b"cvParam",
        within: ParserFlags::PARAM_GROUP,
        enter: ParserFlags::empty(),
        open: Some(Effect::GroupParam),
        close: None,
    },
    Rule {
        element: b"spectrumList",
        within: ParserFlags::empty(),
        enter: ParserFlags::RUN,
        open: Some(Effect::RunStart),
        close: None,
    },
    Rule {
        element: b"spectrum",
        within: ParserFlags::RUN,
        enter: ParserFlags::SPECTRUM,
        open: Some(Effect::OpenSpectrum),
        close: Some(Effect::CloseSpectrum),
    },
    Rule {
        element: b"scan",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::SCAN_METADATA,
        open: None,
        close: None,
    },
    Rule {
        element: b"precursor",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::PRECURSOR,
        open: Some(Effect::PrecursorRef),
        close: None,
    },
    Rule {
        element: b"selectedIon",
        within: ParserFlags::PRECURSOR,
        enter: ParserFlags::ION_SELECTION,
        open: None,
        close: None,
    },
    Rule {
        element: b"binaryDataArray",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::BINARY_DATA_ARRAY,
        open: Some(Effect::ArrayStart),
        close: Some(Effect::DecodeArray),
    },
    Rule {
        element: b"binary",
        within: ParserFlags::BINARY_DATA_ARRAY,
        enter: ParserFlags::TEXT,
        open: None,
        close: None,
    },
    Rule {
        element: b"cvParam",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::empty(),
        open: Some(Effect::CvParam),
        close: None,
    },
    Rule {
        element: b"referenceableParamGroupRef",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::empty(),
        open: Some(Effect::GroupRef),
        close: None,
    },
];

fn native_scan_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"scan=([0-9]+)").expect("valid native id pattern"))
}

/// mzML dialect state
#[derive(Debug, Default)]
pub struct MzMlDialect {
    id_table: HashMap<String, u32>,
    last_scan_number: u32,
    default_array_length: Option<usize>,
    skip_current: bool,
    param_groups: HashMap<String, Vec<CvParam>>,
    current_group: Option<String>,
}

impl Dialect for MzMlDialect {
    type Effect = Effect;

    const FORMAT: RawDataFormat = RawDataFormat::MzMl;

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
                state.total_scans = numeric_attribute(e, "count", None)?;
                Ok(Outcome::Continue)
            }
            (Effect::OpenSpectrum, Some(e)) => {
                let id = attribute(e, "id")?.unwrap_or_default();
                let native_id = attribute(e, "nativeID")?;
                let number = self.scan_number_for(&id, native_id.as_deref());
                self.default_array_length = numeric_attribute(e, "defaultArrayLength", Some(number))?;
                self.skip_current = false;

                let mut scan = ScanBuilder::new(number);
                scan.scan_definition = (!id.is_empty()).then_some(id);
                state.scan = Some(scan);
                Ok(Outcome::Continue)
            }
            (Effect::CloseSpectrum, _) => {
                if self.skip_current {
                    if let Some(scan) = state.scan.take() {
                        warn!("Skipping non-MS spectrum {}", scan.scan_number);
                    }
                    return Ok(Outcome::Skipped);
                }
                Ok(Outcome::from_scan(state.complete_scan()?))
            }
            (Effect::PrecursorRef, Some(e)) => {
                if let Some(reference) = attribute(e, "spectrumRef")? {
                    match self.id_table.get(&reference) {
                        Some(&parent) => state.scan_mut()?.parent_scan_number = Some(parent),
                        None => warn!(
                            "Spectrum {} references unknown precursor spectrum \"{}\"",
                            state.scan_number().unwrap_or_default(),
                            reference
                        ),
                    }
                }
                Ok(Outcome::Continue)
            }
            (Effect::CvParam, Some(e)) => {
                let param = CvParam::from_element(e)?;
                self.apply_cv_param(state, &param)?;
                Ok(Outcome::Continue)
            }
            (Effect::GroupStart, Some(e)) => {
                let id = attribute(e, "id")?.unwrap_or_default();
                self.param_groups.entry(id.clone()).or_default();
                self.current_group = Some(id);
                Ok(Outcome::Continue)
            }
            (Effect::GroupParam, Some(e)) => {
                let param = CvParam::from_element(e)?;
                if let Some(group) = self
                    .current_group
                    .as_ref()
                    .and_then(|id| self.param_groups.get_mut(id))
                {
                    group.push(param);
                }
                Ok(Outcome::Continue)
            }
            (Effect::GroupRef, Some(e)) => {
                let reference = attribute(e, "ref")?.unwrap_or_default();
                let params = self.param_groups.get(&reference).cloned().ok_or_else(|| {
                    ImportError::violation(
                        state.scan_number(),
                        format!("unknown referenceableParamGroup \"{}\"", reference),
                    )
                })?;
                for param in &params {
                    self.apply_cv_param(state, param)?;
                }
                Ok(Outcome::Continue)
            }
            (Effect::ArrayStart, Some(e)) => {
                let number = state.scan_number();
                let length = numeric_attribute::<usize>(e, "arrayLength", number)?
                    .or(self.default_array_length);
                let encoded_length = numeric_attribute::<usize>(e, "encodedLength", number)?;
                state.begin_array(
                    ArrayFormat::new(BinaryEncoding::Float64, Endianness::Little)
                        .with_encoded_length(encoded_length),
                    length,
                );
                state
                    .flags
                    .remove(ParserFlags::MZ_ARRAY | ParserFlags::INTENSITY_ARRAY);
                Ok(Outcome::Continue)
            }
            (Effect::DecodeArray, _) => {
                state.decode_array()?;
                Ok(Outcome::Continue)
            }
            (effect, None) => Err(ImportError::violation(
                state.scan_number(),
                format!("{:?} requires element attributes", effect),
            )),
        }
    }
}

impl MzMlDialect {
    /// Assign (or look up) the scan number for a spectrum id. mzML 1.0 files
    /// may carry the number in a separate `nativeID` attribute.
    fn scan_number_for(&mut self, id: &str, native_id: Option<&str>) -> u32 {
        if let Some(&number) = self.id_table.get(id) {
            return number;
        }

        let explicit = native_scan_pattern()
            .captures(id)
            .and_then(|c| c[1].parse::<u32>().ok())
            .or_else(|| native_id.and_then(|n| n.trim().parse::<u32>().ok()))
            .filter(|&n| n > 0);
        let number = explicit.unwrap_or(self.last_scan_number.saturating_add(1));
        self.last_scan_number = self.last_scan_number.max(number);
        self.id_table.insert(id.to_string(), number);
        number
    }

    fn apply_cv_param(&mut self, state: &mut ParserState, param: &CvParam) -> Result<(), ImportError> {
        let number = state.scan_number();
        let flags = state.flags;

        if flags.contains(ParserFlags::BINARY_DATA_ARRAY) {
            let array = &mut state.array;
            match param.accession.as_str() {
                MS::FLOAT_32_BIT => array.format.encoding = BinaryEncoding::Float32,
                MS::FLOAT_64_BIT => array.format.encoding = BinaryEncoding::Float64,
                MS::ZLIB_COMPRESSION => array.format.compression = CompressionType::Zlib,
                MS::NO_COMPRESSION => array.format.compression = CompressionType::None,
                MS::NUMPRESS_LINEAR | MS::NUMPRESS_PIC | MS::NUMPRESS_SLOF => {
                    return Err(ImportError::violation(
                        number,
                        format!("unsupported binary compression {}", param.name),
                    ));
                }
                MS::MZ_ARRAY => state.flags.insert(ParserFlags::MZ_ARRAY),
                MS::INTENSITY_ARRAY => state.flags.insert(ParserFlags::INTENSITY_ARRAY),
                _ => {}
            }
        } else if flags.contains(ParserFlags::ION_SELECTION) {
            match param.accession.as_str() {
                MS::SELECTED_ION_MZ | MS::MZ => {
                    state.scan_mut()?.precursor_mz = param.require_f64(number)?;
                }
                MS::CHARGE_STATE => {
                    state.scan_mut()?.precursor_charge = param.require_i32(number)?;
                }
                _ => {}
            }
        } else if !flags.contains(ParserFlags::PRECURSOR) {
            match param.accession.as_str() {
                MS::MS_LEVEL => {
                    let level = param.require_i32(number)?;
                    let level = u8::try_from(level).ok().filter(|&l| l > 0).ok_or_else(|| {
                        ImportError::violation(number, format!("invalid ms level {}", level))
                    })?;
                    state.scan_mut()?.ms_level = level;
                }
                MS::SCAN_START_TIME => {
                    let value = param.require_f64(number)?;
                    let seconds = normalize_retention_time(value, param.unit_accession.as_deref());
                    state.scan_mut()?.retention_time = Some(seconds);
                }
                MS::POSITIVE_SCAN => state.scan_mut()?.polarity = Polarity::Positive,
                MS::NEGATIVE_SCAN => state.scan_mut()?.polarity = Polarity::Negative,
                MS::FILTER_STRING => {
                    state.scan_mut()?.scan_definition = param.value.clone();
                }
                MS::EMR_SPECTRUM => self.skip_current = true,
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_id_numbering() {
        let mut dialect = MzMlDialect::default();
        assert_eq!(
            dialect.scan_number_for("controllerType=0 controllerNumber=1 scan=5", None),
            5
        );
        assert_eq!(dialect.scan_number_for("index=7", None), 6);
        assert_eq!(dialect.scan_number_for("index=8", None), 7);
        assert_eq!(
            dialect.scan_number_for("controllerType=0 controllerNumber=1 scan=5", None),
            5
        );
        assert_eq!(dialect.scan_number_for("scan=0", None), 8);
        assert_eq!(dialect.scan_number_for("S19", Some("19")), 19);
        assert_eq!(dialect.scan_number_for("S20", None), 20);
    }
}
