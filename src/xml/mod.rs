//! Streaming XML scan readers
//!
//! All three XML dialects share one pull parser driven by a per-dialect rule
//! table. A [`Rule`] names an element, the context flags that must be set for
//! it to apply, the flags it sets while the element is open, and the effects
//! to run when it opens and closes. Elements without a matching rule are
//! skipped; their text is only kept when an enclosing rule asked for it.
//!
//! Flags are set before an open effect runs and cleared after a close effect
//! runs, so both effects observe the element's own context. The rule chosen
//! when an element opens is the one applied when it closes.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use bitflags::bitflags;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::binary::{ArrayFormat, BinaryDecoder, BinaryEncoding, Endianness};
use crate::detect::RawDataFormat;
use crate::error::ImportError;
use crate::scan::{ScanBuilder, ScanRecord};
use crate::source::ScanSource;

pub mod cv;
pub mod helpers;
mod mzdata;
mod mzml;
mod mzxml;


pub use mzdata::MzDataDialect;
pub use mzml::MzMlDialect;
pub use mzxml::MzXmlDialect;

/// mzXML reader
pub type MzXmlReader<R> = XmlScanReader<R, MzXmlDialect>;
/// mzData reader
pub type MzDataReader<R> = XmlScanReader<R, MzDataDialect>;
/// mzML reader
pub type MzMlReader<R> = XmlScanReader<R, MzMlDialect>;

bitflags! {
    /// Element context tracked while parsing
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParserFlags: u16 {
        /// Inside the spectrum list (`msRun` / `spectrumList`)
        const RUN = 1 << 0;
        /// Inside a spectrum or scan element
        const SPECTRUM = 1 << 1;
        /// Inside instrument settings for the spectrum
        const INSTRUMENT_METADATA = 1 << 2;
        /// Inside scan acquisition metadata
        const SCAN_METADATA = 1 << 3;
        /// Inside a precursor's selected ion
        const ION_SELECTION = 1 << 4;
        /// Inside a precursor
        const PRECURSOR = 1 << 5;
        /// Inside a binary data array
        const BINARY_DATA_ARRAY = 1 << 6;
        /// The current binary array holds m/z values
        const MZ_ARRAY = 1 << 7;
        /// The current binary array holds intensities
        const INTENSITY_ARRAY = 1 << 8;
        /// Character data is being collected
        const TEXT = 1 << 9;
        /// Inside a referenceable parameter group definition
        const PARAM_GROUP = 1 << 10;
    }
}

/// One row of a dialect's transition table
#[derive(Debug)]
pub struct Rule<E: 'static> {
    /// Local element name
    pub element: &'static [u8],
    /// Flags that must all be set for the rule to apply
    pub within: ParserFlags,
    /// Flags set while the element is open
    pub enter: ParserFlags,
    /// Effect run when the element opens
    pub open: Option<E>,
    /// Effect run when the element closes
    pub close: Option<E>,
}

/// What an effect produced
#[derive(Debug)]
pub enum Outcome {
    /// Nothing to report
    Continue,
    /// A scan completed
    Emit(ScanRecord),
    /// A spectrum was consumed but is not a mass spectrum
    Skipped,
}

impl Outcome {
    /// Emit `scan` if there is one
    pub fn from_scan(scan: Option<ScanRecord>) -> Self {
        match scan {
            Some(scan) => Outcome::Emit(scan),
            None => Outcome::Continue,
        }
    }
}

/// Behaviour of one XML dialect
pub trait Dialect: Default {
    /// Effect identifiers used in the rule table
    type Effect: Copy + Debug + 'static;

    /// Format handled by this dialect
    const FORMAT: RawDataFormat;

    /// Transition table, most specific rules first
    fn rules() -> &'static [Rule<Self::Effect>];

    /// Run one effect. `element` is set for open effects.
    fn apply(
        &mut self,
        effect: Self::Effect,
        state: &mut ParserState,
        element: Option<&BytesStart<'_>>,
    ) -> Result<Outcome, ImportError>;
}

/// Layout of the binary array currently being read
#[derive(Debug, Clone, Copy)]
pub struct PendingArray {
    /// Encoding, byte order and compression
    pub format: ArrayFormat,
    /// Number of values the document declares
    pub expected_length: Option<usize>,
}

impl Default for PendingArray {
    fn default() -> Self {
        Self {
            format: ArrayFormat::new(BinaryEncoding::Float64, Endianness::Little),
            expected_length: None,
        }
    }
}

/// Mutable context shared by a reader and its dialect
#[derive(Debug, Default)]
pub struct ParserState {
    /// Current element context
    pub flags: ParserFlags,
    /// Collected character data
    pub text: String,
    /// Scan under construction
    pub scan: Option<ScanBuilder>,
    /// Binary array under construction
    pub array: PendingArray,
    /// Scan count declared by the document
    pub total_scans: Option<usize>,
}

impl ParserState {
    /// Scan number of the scan under construction
    pub fn scan_number(&self) -> Option<u32> {
        self.scan.as_ref().map(|s| s.scan_number)
    }

    /// The scan under construction, or a format violation if none is open
    pub fn scan_mut(&mut self) -> Result<&mut ScanBuilder, ImportError> {
        self.scan
            .as_mut()
            .ok_or_else(|| ImportError::violation(None, "element found outside of a spectrum"))
    }

    /// Start a new binary array
    pub fn begin_array(&mut self, format: ArrayFormat, expected_length: Option<usize>) {
        self.array = PendingArray {
            format,
            expected_length,
        };
    }

    /// Decode the collected text with the pending layout
    pub fn decode_text(&mut self) -> Result<Vec<f64>, ImportError> {
        let text = std::mem::take(&mut self.text);
        let array = self.array;
        BinaryDecoder::decode(&text, &array.format, array.expected_length)
            .map_err(|e| ImportError::corrupt(self.scan_number(), e))
    }

    /// Decode the collected text into the m/z or intensity slot selected by
    /// the role flags. Arrays of any other role are discarded.
    pub fn decode_array(&mut self) -> Result<(), ImportError> {
        let is_mz = self.flags.contains(ParserFlags::MZ_ARRAY);
        let is_intensity = self.flags.contains(ParserFlags::INTENSITY_ARRAY);
        if !is_mz && !is_intensity {
            self.text.clear();
            return Ok(());
        }

        let values = self.decode_text()?;
        let scan = self.scan_mut()?;
        if is_mz {
            scan.mz_values = values;
        } else {
            scan.intensity_values = values;
        }
        self.flags
            .remove(ParserFlags::MZ_ARRAY | ParserFlags::INTENSITY_ARRAY);
        Ok(())
    }

    /// Build the scan under construction, if any
    pub fn complete_scan(&mut self) -> Result<Option<ScanRecord>, ImportError> {
        self.scan.take().map(ScanBuilder::build).transpose()
    }
}

/// Pull parser yielding one [`ScanRecord`] per spectrum
pub struct XmlScanReader<R: BufRead, D: Dialect> {
    reader: Reader<R>,
    dialect: D,
    state: ParserState,
    // rule matched by each open element, innermost last
    open_rules: Vec<Option<&'static Rule<D::Effect>>>,
    ready: VecDeque<ScanRecord>,
    parsed_scans: usize,
    finished: bool,
}

impl<D: Dialect> XmlScanReader<BufReader<File>, D> {
    /// Open a file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImportError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead, D: Dialect> XmlScanReader<R, D> {
    /// Create a reader over a buffered source
    pub fn new(reader: R) -> Self {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.config_mut().trim_text(true);

        Self {
            reader: xml_reader,
            dialect: D::default(),
            state: ParserState::default(),
            open_rules: Vec::new(),
            ready: VecDeque::new(),
            parsed_scans: 0,
            finished: false,
        }
    }

    /// Read the next scan from the stream
    pub fn next_scan(&mut self) -> Result<Option<ScanRecord>, ImportError> {
        let mut buf = Vec::new();
        loop {
            if let Some(scan) = self.ready.pop_front() {
                return Ok(Some(scan));
            }
            if self.finished {
                return Ok(None);
            }

            match self.reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let rule = self.handle_open(e)?;
                    self.open_rules.push(rule);
                }
                Event::Empty(ref e) => {
                    let rule = self.handle_open(e)?;
                    self.handle_close(rule)?;
                }
                Event::End(_) => {
                    let rule = self.open_rules.pop().flatten();
                    self.handle_close(rule)?;
                }
                Event::Text(ref t) => {
                    if self.state.flags.contains(ParserFlags::TEXT) {
                        self.state.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(ref c) => {
                    if self.state.flags.contains(ParserFlags::TEXT) {
                        self.state.text.push_str(&String::from_utf8_lossy(c));
                    }
                }
                Event::Eof => {
                    if let Some(number) = self.state.scan_number() {
                        return Err(ImportError::violation(
                            Some(number),
                            "document ended inside a spectrum",
                        ));
                    }
                    self.finished = true;
                }
                _ => {}
            }
            buf.clear();
        }
    }

    /// Scan count declared by the document
    pub fn total_scans(&self) -> Option<usize> {
        self.state.total_scans
    }

    /// Spectra consumed so far, including skipped ones
    pub fn parsed_scans(&self) -> usize {
        self.parsed_scans
    }

    fn find_rule(&self, element: &[u8]) -> Option<&'static Rule<D::Effect>> {
        let flags = self.state.flags;
        D::rules()
            .iter()
            .find(|rule| rule.element == element && flags.contains(rule.within))
    }

    fn handle_open(
        &mut self,
        e: &BytesStart<'_>,
    ) -> Result<Option<&'static Rule<D::Effect>>, ImportError> {
        let Some(rule) = self.find_rule(e.local_name().as_ref()) else {
            return Ok(None);
        };

        if rule.enter.contains(ParserFlags::TEXT) {
            self.state.text.clear();
        }
        self.state.flags.insert(rule.enter);

        if let Some(effect) = rule.open {
            let outcome = self.dialect.apply(effect, &mut self.state, Some(e))?;
            self.record(outcome);
        }
        Ok(Some(rule))
    }

    fn handle_close(&mut self, rule: Option<&'static Rule<D::Effect>>) -> Result<(), ImportError> {
        let Some(rule) = rule else {
            return Ok(());
        };

        if let Some(effect) = rule.close {
            let outcome = self.dialect.apply(effect, &mut self.state, None)?;
            self.record(outcome);
        }
        self.state.flags.remove(rule.enter);
        Ok(())
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Continue => {}
            Outcome::Emit(scan) => {
                self.parsed_scans += 1;
                self.ready.push_back(scan);
            }
            Outcome::Skipped => self.parsed_scans += 1,
        }
    }
}

impl<R: BufRead, D: Dialect> ScanSource for XmlScanReader<R, D> {
    fn format(&self) -> RawDataFormat {
        D::FORMAT
    }

    fn next_scan(&mut self) -> Result<Option<ScanRecord>, ImportError> {
        XmlScanReader::next_scan(self)
    }

    fn total_scans(&self) -> Option<usize> {
        XmlScanReader::total_scans(self)
    }

    fn parsed_scans(&self) -> usize {
        XmlScanReader::parsed_scans(self)
    }
}
