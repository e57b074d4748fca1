//! mzData 1.04 / 1.05 transition table

use quick_xml::events::BytesStart;

use super::cv::{CvParam, PSI_CV_ACCESSIONS as PSI};
use super::helpers::{attribute, numeric_attribute, parse_value};
use super::{Dialect, Outcome, ParserFlags, ParserState, Rule};
use crate::binary::{ArrayFormat, BinaryEncoding, Endianness};
use crate::detect::RawDataFormat;
use crate::error::ImportError;
use crate::scan::{Polarity, ScanBuilder};

/// Effects run by the mzData rule table
#[derive(Debug, Clone, Copy)]
pub enum Effect {
    RunStart,
    OpenSpectrum,
    CloseSpectrum,
    InstrumentAttributes,
    PrecursorRef,
    CvParam,
    ArrayAttributes,
    DecodeArray,
}

static RULES: &[Rule<Effect>] = &[
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
    // 1.05
    Rule {
        element: b"spectrumInstrument",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::INSTRUMENT_METADATA,
        open: Some(Effect::InstrumentAttributes),
        close: None,
    },
    // 1.04
    Rule {
        element: b"acqInstrument",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::INSTRUMENT_METADATA,
        open: Some(Effect::InstrumentAttributes),
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
        element: b"ionSelection",
        within: ParserFlags::PRECURSOR,
        enter: ParserFlags::ION_SELECTION,
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
        element: b"mzArrayBinary",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::BINARY_DATA_ARRAY.union(ParserFlags::MZ_ARRAY),
        open: None,
        close: None,
    },
    Rule {
        element: b"intenArrayBinary",
        within: ParserFlags::SPECTRUM,
        enter: ParserFlags::BINARY_DATA_ARRAY.union(ParserFlags::INTENSITY_ARRAY),
        open: None,
        close: None,
    },
    Rule {
        element: b"data",
        within: ParserFlags::BINARY_DATA_ARRAY,
        enter: ParserFlags::TEXT,
        open: Some(Effect::ArrayAttributes),
        close: Some(Effect::DecodeArray),
    },
];

/// mzData dialect state
#[derive(Debug, Default)]
pub struct MzDataDialect;

impl Dialect for MzDataDialect {
    type Effect = Effect;

    const FORMAT: RawDataFormat = RawDataFormat::MzData;

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
                let number: u32 = match attribute(e, "id")? {
                    Some(id) => parse_value(&id, "spectrum id", None)?,
                    None => {
                        return Err(ImportError::violation(None, "spectrum without an id"));
                    }
                };
                if number == 0 {
                    return Err(ImportError::violation(Some(0), "spectrum ids must be positive"));
                }
                state.scan = Some(ScanBuilder::new(number));
                Ok(Outcome::Continue)
            }
            (Effect::CloseSpectrum, _) => Ok(Outcome::from_scan(state.complete_scan()?)),
            (Effect::InstrumentAttributes, Some(e)) => {
                let number = state.scan_number();
                if let Some(level) = numeric_attribute::<u8>(e, "msLevel", number)? {
                    if level == 0 {
                        return Err(ImportError::violation(number, "msLevel must be positive"));
                    }
                    state.scan_mut()?.ms_level = level;
                }
                Ok(Outcome::Continue)
            }
            (Effect::PrecursorRef, Some(e)) => {
                let number = state.scan_number();
                let parent = numeric_attribute::<u32>(e, "spectrumRef", number)?;
                if let Some(parent) = parent.filter(|&p| p > 0) {
                    state.scan_mut()?.parent_scan_number = Some(parent);
                }
                Ok(Outcome::Continue)
            }
            (Effect::CvParam, Some(e)) => {
                apply_cv_param(state, &CvParam::from_element(e)?)?;
                Ok(Outcome::Continue)
            }
            (Effect::ArrayAttributes, Some(e)) => {
                let number = state.scan_number();
                let encoding = match attribute(e, "precision")? {
                    Some(precision) => BinaryEncoding::from_precision(&precision).ok_or_else(|| {
                        ImportError::violation(
                            number,
                            format!("unsupported precision \"{}\"", precision),
                        )
                    })?,
                    None => BinaryEncoding::Float32,
                };
                let endianness = match attribute(e, "endian")? {
                    Some(endian) => Endianness::from_attribute(&endian).ok_or_else(|| {
                        ImportError::violation(number, format!("unsupported endian \"{}\"", endian))
                    })?,
                    None => Endianness::Little,
                };
                let length = numeric_attribute::<usize>(e, "length", number)?;
                state.begin_array(ArrayFormat::new(encoding, endianness), length);
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

fn apply_cv_param(state: &mut ParserState, param: &CvParam) -> Result<(), ImportError> {
    let number = state.scan_number();

    if state.flags.contains(ParserFlags::INSTRUMENT_METADATA) {
        if param.is(PSI::TIME_IN_MINUTES, PSI::TIME_MIN_NAME) || param.name == "TimeInMinutes" {
            let minutes = param.require_f64(number)?;
            state.scan_mut()?.retention_time = Some(minutes * 60.0);
        } else if param.is(PSI::TIME_IN_SECONDS, PSI::TIME_SEC_NAME)
            || param.name == "TimeInSeconds"
        {
            state.scan_mut()?.retention_time = Some(param.require_f64(number)?);
        } else if param.is(PSI::POLARITY, PSI::POLARITY_NAME) {
            let polarity = Polarity::from_name(param.value.as_deref().unwrap_or_default());
            state.scan_mut()?.polarity = polarity;
        }
    } else if state.flags.contains(ParserFlags::PRECURSOR) {
        if param.is(PSI::MASS_TO_CHARGE_RATIO, PSI::MZ_NAME) {
            state.scan_mut()?.precursor_mz = param.require_f64(number)?;
        } else if param.is(PSI::CHARGE_STATE, PSI::CHARGE_STATE_NAME) {
            state.scan_mut()?.precursor_charge = param.require_i32(number)?;
        }
    }
    Ok(())
}
