//! Binary payload decoding shared by all XML dialects
//!
//! Peak arrays are stored as Base64-encoded binary data, optionally compressed
//! with zlib. This module handles the decoding pipeline:
//!
//! 1. Base64 decode the text (embedded whitespace is ignored)
//! 2. Inflate if needed, bounded by the declared compressed length
//! 3. Interpret bytes as float32 or float64 in the declared byte order
//!
//! mzXML writes m/z and intensity interleaved in one array;
//! [`BinaryDecoder::split_interleaved`] separates the two.

use std::io::{Read, Write};

use base64::prelude::*;
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Compression applied to a binary array before Base64 encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    /// No compression (raw binary)
    #[default]
    None,
    /// zlib compression
    Zlib,
}

/// Binary encoding precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryEncoding {
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    #[default]
    Float64,
}

impl BinaryEncoding {
    /// Map a declared bit width ("32" / "64") to an encoding
    pub fn from_precision(precision: &str) -> Option<Self> {
        match precision.trim() {
            "32" => Some(BinaryEncoding::Float32),
            "64" => Some(BinaryEncoding::Float64),
            _ => None,
        }
    }

    /// Get the byte size per value
    pub fn byte_size(&self) -> usize {
        match self {
            BinaryEncoding::Float32 => 4,
            BinaryEncoding::Float64 => 8,
        }
    }
}

/// Byte order of the packed floats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Least significant byte first (mzML, most mzData files)
    #[default]
    Little,
    /// Most significant byte first ("network" order in mzXML)
    Big,
}

impl Endianness {
    /// Parse an endianness attribute value.
    ///
    /// Accepts the mzData spellings (`little`, `big`) and the mzXML one
    /// (`network`, which is big endian).
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "little" => Some(Endianness::Little),
            "big" | "network" => Some(Endianness::Big),
            _ => None,
        }
    }
}

/// Everything needed to interpret one encoded array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayFormat {
    /// Element precision
    pub encoding: BinaryEncoding,
    /// Element byte order
    pub endianness: Endianness,
    /// Compression applied before Base64 encoding
    pub compression: CompressionType,
    /// Declared number of compressed bytes, used as the inflater input bound
    pub compressed_length: Option<usize>,
    /// Declared number of Base64 characters, excluding whitespace
    pub encoded_length: Option<usize>,
}

impl ArrayFormat {
    /// Create a format with no compression
    pub fn new(encoding: BinaryEncoding, endianness: Endianness) -> Self {
        Self {
            encoding,
            endianness,
            ..Default::default()
        }
    }

    /// Set the compression type
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Set the declared compressed length
    pub fn with_compressed_length(mut self, length: Option<usize>) -> Self {
        self.compressed_length = length;
        self
    }

    /// Set the declared Base64 text length
    pub fn with_encoded_length(mut self, length: Option<usize>) -> Self {
        self.encoded_length = length;
        self
    }
}

/// Errors that can occur during binary decoding
#[derive(Debug, thiserror::Error)]
pub enum BinaryDecodeError {
    /// The text is not valid Base64
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// The inflater rejected the compressed stream
    #[error("Decompression error: {0}")]
    DecompressionError(#[source] std::io::Error),

    /// The decoded byte count does not divide into whole elements
    #[error("Byte count {actual} is not a multiple of the element width {width}")]
    MisalignedLength {
        /// Number of decoded bytes
        actual: usize,
        /// Element width in bytes
        width: usize,
    },

    /// Fewer values than the declared peak count
    #[error("Invalid data length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Declared number of values
        expected: usize,
        /// Number of values actually decoded
        actual: usize,
    },

    /// The Base64 text is not as long as the document declares
    #[error("Encoded length mismatch: declared {declared}, found {actual}")]
    EncodedLengthMismatch {
        /// Declared number of Base64 characters
        declared: usize,
        /// Characters found after removing whitespace
        actual: usize,
    },

    /// An interleaved (m/z, intensity) array has an odd number of values
    #[error("Interleaved peak array has odd length {0}")]
    OddInterleavedLength(usize),
}

/// Decoder for Base64 binary arrays
pub struct BinaryDecoder;

impl BinaryDecoder {
    /// Decode a Base64-encoded binary array
    ///
    /// # Arguments
    /// * `base64_data` - The Base64 text content of the binary element
    /// * `format` - Precision, byte order and compression of the array
    /// * `expected_length` - Declared number of values, if known
    ///
    /// # Returns
    /// A `Vec<f64>` containing the decoded values. When more values than
    /// declared are present the surplus is dropped; fewer is an error.
    pub fn decode(
        base64_data: &str,
        format: &ArrayFormat,
        expected_length: Option<usize>,
    ) -> Result<Vec<f64>, BinaryDecodeError> {
        let compact: String = base64_data
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if let Some(declared) = format.encoded_length {
            if declared != compact.len() {
                return Err(BinaryDecodeError::EncodedLengthMismatch {
                    declared,
                    actual: compact.len(),
                });
            }
        }
        if compact.is_empty() {
            return match expected_length {
                Some(expected) if expected > 0 => Err(BinaryDecodeError::InvalidLength {
                    expected,
                    actual: 0,
                }),
                _ => Ok(Vec::new()),
            };
        }

        let decoded_bytes = BASE64_STANDARD.decode(compact.as_bytes())?;
        Self::decode_bytes(&decoded_bytes, format, expected_length)
    }

    /// Decode already Base64-decoded bytes
    pub fn decode_bytes(
        bytes: &[u8],
        format: &ArrayFormat,
        expected_length: Option<usize>,
    ) -> Result<Vec<f64>, BinaryDecodeError> {
        let mut values = match format.compression {
            CompressionType::None => Self::bytes_to_floats(bytes, format)?,
            CompressionType::Zlib => {
                let uncompressed = Self::inflate(bytes, format.compressed_length)?;
                Self::bytes_to_floats(&uncompressed, format)?
            }
        };

        if let Some(expected) = expected_length {
            if values.len() < expected {
                return Err(BinaryDecodeError::InvalidLength {
                    expected,
                    actual: values.len(),
                });
            }
            values.truncate(expected);
        }

        Ok(values)
    }

    /// Split an interleaved `[mz0, int0, mz1, int1, ...]` array into two arrays
    pub fn split_interleaved(values: &[f64]) -> Result<(Vec<f64>, Vec<f64>), BinaryDecodeError> {
        if values.len() % 2 != 0 {
            return Err(BinaryDecodeError::OddInterleavedLength(values.len()));
        }
        let (mz, intensity) = values
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .unzip();
        Ok((mz, intensity))
    }

    fn inflate(bytes: &[u8], declared_length: Option<usize>) -> Result<Vec<u8>, BinaryDecodeError> {
        let input = match declared_length {
            Some(len) if len < bytes.len() => &bytes[..len],
            _ => bytes,
        };
        let mut decoder = ZlibDecoder::new(input);
        let mut uncompressed = Vec::with_capacity(input.len() * 2);
        decoder
            .read_to_end(&mut uncompressed)
            .map_err(BinaryDecodeError::DecompressionError)?;
        Ok(uncompressed)
    }

    /// Convert raw bytes to f64 values based on encoding and byte order
    fn bytes_to_floats(bytes: &[u8], format: &ArrayFormat) -> Result<Vec<f64>, BinaryDecodeError> {
        let width = format.encoding.byte_size();

        if bytes.len() % width != 0 {
            return Err(BinaryDecodeError::MisalignedLength {
                actual: bytes.len(),
                width,
            });
        }

        let chunks = bytes.chunks_exact(width);
        let values: Vec<f64> = match (format.encoding, format.endianness) {
            (BinaryEncoding::Float32, Endianness::Little) => {
                chunks.map(|c| LittleEndian::read_f32(c) as f64).collect()
            }
            (BinaryEncoding::Float32, Endianness::Big) => {
                chunks.map(|c| BigEndian::read_f32(c) as f64).collect()
            }
            (BinaryEncoding::Float64, Endianness::Little) => {
                chunks.map(LittleEndian::read_f64).collect()
            }
            (BinaryEncoding::Float64, Endianness::Big) => chunks.map(BigEndian::read_f64).collect(),
        };

        Ok(values)
    }
}

/// Encoder producing the text form [`BinaryDecoder`] reads back
pub struct BinaryEncoder;

impl BinaryEncoder {
    /// Encode values into Base64 text in the given format.
    ///
    /// `compressed_length` in `format` is ignored; use [`Self::encode_with_length`]
    /// when the compressed byte count must be declared alongside the text.
    pub fn encode(values: &[f64], format: &ArrayFormat) -> std::io::Result<String> {
        Self::encode_with_length(values, format).map(|(text, _)| text)
    }

    /// Encode values and also return the number of bytes before Base64 encoding
    pub fn encode_with_length(
        values: &[f64],
        format: &ArrayFormat,
    ) -> std::io::Result<(String, usize)> {
        let mut raw = Vec::with_capacity(values.len() * format.encoding.byte_size());
        for &v in values {
            match (format.encoding, format.endianness) {
                (BinaryEncoding::Float32, Endianness::Little) => {
                    raw.write_f32::<LittleEndian>(v as f32)?
                }
                (BinaryEncoding::Float32, Endianness::Big) => raw.write_f32::<BigEndian>(v as f32)?,
                (BinaryEncoding::Float64, Endianness::Little) => raw.write_f64::<LittleEndian>(v)?,
                (BinaryEncoding::Float64, Endianness::Big) => raw.write_f64::<BigEndian>(v)?,
            }
        }

        let payload = match format.compression {
            CompressionType::None => raw,
            CompressionType::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&raw)?;
                encoder.finish()?
            }
        };

        Ok((BASE64_STANDARD.encode(&payload), payload.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_float64_uncompressed() {
        // 100.0 and 200.0 as little-endian doubles
        let bytes: [u8; 16] = [
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x59, 0x40, // 100.0
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x69, 0x40, // 200.0
        ];
        let base64_data = BASE64_STANDARD.encode(bytes);

        let result = BinaryDecoder::decode(
            &base64_data,
            &ArrayFormat::new(BinaryEncoding::Float64, Endianness::Little),
            Some(2),
        )
        .unwrap();

        assert_eq!(result, vec![100.0, 200.0]);
    }

    #[test]
    fn test_decode_float32_big_endian() {
        // 100.0 and 200.0 as big-endian floats
        let bytes: [u8; 8] = [0x42, 0xc8, 0x00, 0x00, 0x43, 0x48, 0x00, 0x00];
        let base64_data = BASE64_STANDARD.encode(bytes);

        let result = BinaryDecoder::decode(
            &base64_data,
            &ArrayFormat::new(BinaryEncoding::Float32, Endianness::Big),
            Some(2),
        )
        .unwrap();

        assert_eq!(result, vec![100.0, 200.0]);
    }

    #[test]
    fn test_decode_empty() {
        let result = BinaryDecoder::decode("", &ArrayFormat::default(), None).unwrap();
        assert!(result.is_empty());

        let result = BinaryDecoder::decode("  \n ", &ArrayFormat::default(), Some(0)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_decode_ignores_line_breaks() {
        let values = vec![1.5, 2.5, 3.5, 4.5, 5.5, 6.5];
        let format = ArrayFormat::new(BinaryEncoding::Float64, Endianness::Little);
        let text = BinaryEncoder::encode(&values, &format).unwrap();
        let wrapped: String = text
            .as_bytes()
            .chunks(16)
            .map(|c| format!("{}\n  ", std::str::from_utf8(c).unwrap()))
            .collect();

        let result = BinaryDecoder::decode(&wrapped, &format, Some(values.len())).unwrap();
        assert_eq!(result, values);
    }

    #[test]
    fn test_decode_zlib_big_endian_doubles() {
        let values: Vec<f64> = vec![100.125, 200.25, 300.5, 400.0, 1.0e-7, 12345.678];
        let format = ArrayFormat::new(BinaryEncoding::Float64, Endianness::Big)
            .with_compression(CompressionType::Zlib);
        let (text, compressed_len) = BinaryEncoder::encode_with_length(&values, &format).unwrap();

        let result = BinaryDecoder::decode(
            &text,
            &format.with_compressed_length(Some(compressed_len)),
            Some(values.len()),
        )
        .unwrap();

        assert_eq!(result, values);
    }

    #[test]
    fn test_decode_zlib_without_declared_length() {
        let values: Vec<f64> = (0..64).map(|i| i as f64 * 0.5).collect();
        let format = ArrayFormat::new(BinaryEncoding::Float32, Endianness::Little)
            .with_compression(CompressionType::Zlib);
        let text = BinaryEncoder::encode(&values, &format).unwrap();

        let result = BinaryDecoder::decode(&text, &format, None).unwrap();
        assert_eq!(result, values);
    }

    #[test]
    fn test_corrupt_zlib_stream_fails() {
        let text = BASE64_STANDARD.encode(b"definitely not zlib");
        let format = ArrayFormat::default().with_compression(CompressionType::Zlib);

        let err = BinaryDecoder::decode(&text, &format, None).unwrap_err();
        assert!(matches!(err, BinaryDecodeError::DecompressionError(_)));
    }

    #[test]
    fn test_misaligned_bytes_fail() {
        let text = BASE64_STANDARD.encode([0u8; 7]);
        let format = ArrayFormat::new(BinaryEncoding::Float32, Endianness::Little);

        let err = BinaryDecoder::decode(&text, &format, None).unwrap_err();
        assert!(matches!(
            err,
            BinaryDecodeError::MisalignedLength { actual: 7, width: 4 }
        ));
    }

    #[test]
    fn test_fewer_values_than_declared_fail() {
        let format = ArrayFormat::new(BinaryEncoding::Float64, Endianness::Little);
        let text = BinaryEncoder::encode(&[1.0, 2.0], &format).unwrap();

        let err = BinaryDecoder::decode(&text, &format, Some(3)).unwrap_err();
        assert!(matches!(
            err,
            BinaryDecodeError::InvalidLength { expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_declared_encoded_length_is_checked() {
        let format = ArrayFormat::new(BinaryEncoding::Float64, Endianness::Little);
        let text = BinaryEncoder::encode(&[1.0, 2.0], &format).unwrap();

        let wrapped = format!("{}\n{}", &text[..8], &text[8..]);
        let exact = format.with_encoded_length(Some(text.len()));
        let result = BinaryDecoder::decode(&wrapped, &exact, Some(2)).unwrap();
        assert_eq!(result, vec![1.0, 2.0]);

        let short = format.with_encoded_length(Some(text.len() - 4));
        let err = BinaryDecoder::decode(&text, &short, Some(2)).unwrap_err();
        assert!(matches!(
            err,
            BinaryDecodeError::EncodedLengthMismatch { actual, .. } if actual == text.len()
        ));
    }

    #[test]
    fn test_surplus_values_are_truncated() {
        let format = ArrayFormat::new(BinaryEncoding::Float64, Endianness::Little);
        let text = BinaryEncoder::encode(&[1.0, 2.0, 3.0], &format).unwrap();

        let result = BinaryDecoder::decode(&text, &format, Some(2)).unwrap();
        assert_eq!(result, vec![1.0, 2.0]);
    }

    #[test]
    fn test_split_interleaved() {
        let (mz, intensity) =
            BinaryDecoder::split_interleaved(&[100.0, 1.0, 200.0, 2.0, 300.0, 3.0]).unwrap();
        assert_eq!(mz, vec![100.0, 200.0, 300.0]);
        assert_eq!(intensity, vec![1.0, 2.0, 3.0]);

        assert!(matches!(
            BinaryDecoder::split_interleaved(&[1.0, 2.0, 3.0]),
            Err(BinaryDecodeError::OddInterleavedLength(3))
        ));
    }

    #[test]
    fn test_endianness_attribute() {
        assert_eq!(Endianness::from_attribute("network"), Some(Endianness::Big));
        assert_eq!(Endianness::from_attribute("Little"), Some(Endianness::Little));
        assert_eq!(Endianness::from_attribute("middle"), None);
    }
}
