//! NetCDF classic container (CDF-1 and CDF-2)
//!
//! All numbers are big-endian. The header lists dimensions, global
//! attributes and variables; each variable records its type, its padded
//! per-record size (`vsize`) and the file offset of its data (`begin`).
//! Record variables interleave one slab per record, so element `r` of a
//! record variable lives at `begin + r * record_size`.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use super::NetCdfError;

pub(crate) const MAGIC: &[u8; 3] = b"CDF";
pub(crate) const TAG_ABSENT: u32 = 0x00;
pub(crate) const TAG_DIMENSION: u32 = 0x0A;
pub(crate) const TAG_VARIABLE: u32 = 0x0B;
pub(crate) const TAG_ATTRIBUTE: u32 = 0x0C;
pub(crate) const STREAMING: u32 = 0xFFFF_FFFF;

// Upper bound on any list or name length read from a header.
const MAX_HEADER_ELEMENTS: u32 = 1 << 24;

/// External data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcType {
    /// 8-bit signed integer
    Byte,
    /// 8-bit character
    Char,
    /// 16-bit signed integer
    Short,
    /// 32-bit signed integer
    Int,
    /// 32-bit IEEE float
    Float,
    /// 64-bit IEEE float
    Double,
}

impl NcType {
    /// Decode a header type code
    pub fn from_code(code: u32) -> Result<Self, NetCdfError> {
        match code {
            1 => Ok(NcType::Byte),
            2 => Ok(NcType::Char),
            3 => Ok(NcType::Short),
            4 => Ok(NcType::Int),
            5 => Ok(NcType::Float),
            6 => Ok(NcType::Double),
            other => Err(NetCdfError::UnknownType(other)),
        }
    }

    /// Header type code
    pub fn code(&self) -> u32 {
        match self {
            NcType::Byte => 1,
            NcType::Char => 2,
            NcType::Short => 3,
            NcType::Int => 4,
            NcType::Float => 5,
            NcType::Double => 6,
        }
    }

    /// Size of one element in bytes
    pub fn size(&self) -> usize {
        match self {
            NcType::Byte | NcType::Char => 1,
            NcType::Short => 2,
            NcType::Int | NcType::Float => 4,
            NcType::Double => 8,
        }
    }
}

/// A named dimension. Length 0 marks the record dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    /// Dimension name
    pub name: String,
    /// Fixed length, 0 for the record dimension
    pub length: u64,
}

impl Dimension {
    /// Whether this is the unlimited (record) dimension
    pub fn is_record(&self) -> bool {
        self.length == 0
    }
}

/// Attribute values, one vector per external type
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// `NC_BYTE` values
    Bytes(Vec<i8>),
    /// `NC_CHAR` text
    Text(String),
    /// `NC_SHORT` values
    Shorts(Vec<i16>),
    /// `NC_INT` values
    Ints(Vec<i32>),
    /// `NC_FLOAT` values
    Floats(Vec<f32>),
    /// `NC_DOUBLE` values
    Doubles(Vec<f64>),
}

impl AttributeValue {
    /// First value as f64, or the text parsed as a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Bytes(v) => v.first().map(|&x| x as f64),
            AttributeValue::Text(s) => s.trim_end_matches('\0').trim().parse().ok(),
            AttributeValue::Shorts(v) => v.first().map(|&x| x as f64),
            AttributeValue::Ints(v) => v.first().map(|&x| x as f64),
            AttributeValue::Floats(v) => v.first().map(|&x| x as f64),
            AttributeValue::Doubles(v) => v.first().copied(),
        }
    }

    /// The value as text, if it is `NC_CHAR`
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s.trim_end_matches('\0')),
            _ => None,
        }
    }
}

/// A named attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Attribute values
    pub value: AttributeValue,
}

/// A variable declared in the header
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Variable name
    pub name: String,
    /// Indices into the header's dimension list
    pub dimension_ids: Vec<usize>,
    /// Variable attributes
    pub attributes: Vec<Attribute>,
    /// External type
    pub nc_type: NcType,
    /// Padded size of one record slab (or the whole variable)
    pub vsize: u64,
    /// File offset of the data
    pub begin: u64,
    /// Whether the first dimension is the record dimension
    pub is_record: bool,
    /// Elements per record slab (or in the whole variable)
    pub slab_length: u64,
}

impl Variable {
    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}

/// Parsed header
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Format version, 1 or 2
    pub version: u8,
    /// Number of records
    pub num_records: u64,
    /// Dimensions
    pub dimensions: Vec<Dimension>,
    /// Global attributes
    pub attributes: Vec<Attribute>,
    /// Variables
    pub variables: Vec<Variable>,
    /// Bytes per record across all record variables
    pub record_size: u64,
}

impl Header {
    /// Look up a variable by name
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Look up a global attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// Total number of elements stored for `variable`
    pub fn element_count(&self, variable: &Variable) -> u64 {
        if variable.is_record {
            variable.slab_length.saturating_mul(self.num_records)
        } else {
            variable.slab_length
        }
    }
}

/// Random-access reader over a NetCDF classic file
pub struct NetCdfFile<R: Read + Seek> {
    reader: R,
    header: Header,
    file_length: u64,
}

impl<R: Read + Seek> NetCdfFile<R> {
    /// Parse the header of `reader`
    pub fn open(mut reader: R) -> Result<Self, NetCdfError> {
        reader.seek(SeekFrom::Start(0))?;
        let file_length = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let header = read_header(&mut reader, file_length)?;
        Ok(Self {
            reader,
            header,
            file_length,
        })
    }

    /// Parsed header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Look up a variable by name
    pub fn variable(&self, name: &str) -> Result<Variable, NetCdfError> {
        self.header
            .variable(name)
            .cloned()
            .ok_or_else(|| NetCdfError::MissingVariable(name.to_string()))
    }

    /// Read every element of a numeric variable as f64
    pub fn read_all(&mut self, variable: &Variable) -> Result<Vec<f64>, NetCdfError> {
        let count = self.header.element_count(variable);
        self.read_slice(variable, 0, count)
    }

    /// Read `count` elements starting at flat index `start`
    pub fn read_slice(
        &mut self,
        variable: &Variable,
        start: u64,
        count: u64,
    ) -> Result<Vec<f64>, NetCdfError> {
        if variable.nc_type == NcType::Char {
            return Err(NetCdfError::NonNumeric(variable.name.clone()));
        }
        let length = self.header.element_count(variable);
        if start.checked_add(count).map_or(true, |end| end > length) {
            return Err(NetCdfError::OutOfBounds {
                name: variable.name.clone(),
                start,
                count,
                length,
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let size = variable.nc_type.size() as u64;
        let last = start + count - 1;
        let last_byte = if variable.is_record {
            let slab = variable.slab_length.max(1);
            (last / slab)
                .checked_mul(self.header.record_size)
                .and_then(|offset| offset.checked_add((last % slab + 1) * size))
        } else {
            (last + 1).checked_mul(size)
        }
        .and_then(|end| end.checked_add(variable.begin));
        if last_byte.map_or(true, |end| end > self.file_length) {
            return Err(NetCdfError::MalformedHeader(format!(
                "variable {} extends past the end of the file",
                variable.name
            )));
        }

        if !variable.is_record {
            self.reader
                .seek(SeekFrom::Start(variable.begin + start * size))?;
            return read_values(&mut self.reader, variable.nc_type, count as usize);
        }

        // Record variables: walk the records covering [start, start + count).
        let slab = variable.slab_length.max(1);
        let mut values = Vec::with_capacity(count as usize);
        let mut index = start;
        let end = start + count;
        while index < end {
            let record = index / slab;
            let within = index % slab;
            let take = (slab - within).min(end - index);
            let offset = variable.begin + record * self.header.record_size + within * size;
            self.reader.seek(SeekFrom::Start(offset))?;
            values.extend(read_values(&mut self.reader, variable.nc_type, take as usize)?);
            index += take;
        }
        Ok(values)
    }
}

fn read_values<R: Read>(reader: &mut R, nc_type: NcType, count: usize) -> Result<Vec<f64>, NetCdfError> {
    let mut bytes = vec![0u8; count * nc_type.size()];
    reader.read_exact(&mut bytes)?;
    let values = match nc_type {
        NcType::Byte | NcType::Char => bytes.iter().map(|&b| b as i8 as f64).collect(),
        NcType::Short => bytes.chunks_exact(2).map(|c| BigEndian::read_i16(c) as f64).collect(),
        NcType::Int => bytes.chunks_exact(4).map(|c| BigEndian::read_i32(c) as f64).collect(),
        NcType::Float => bytes.chunks_exact(4).map(|c| BigEndian::read_f32(c) as f64).collect(),
        NcType::Double => bytes.chunks_exact(8).map(BigEndian::read_f64).collect(),
    };
    Ok(values)
}

pub(crate) fn padding(length: usize) -> usize {
    (4 - length % 4) % 4
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<usize, NetCdfError> {
    let count = reader.read_u32::<BigEndian>()?;
    if count > MAX_HEADER_ELEMENTS {
        return Err(NetCdfError::MalformedHeader(format!(
            "{} count {} is implausibly large",
            what, count
        )));
    }
    Ok(count as usize)
}

fn read_padded<R: Read>(reader: &mut R, length: usize) -> Result<Vec<u8>, NetCdfError> {
    let mut bytes = vec![0u8; length + padding(length)];
    reader.read_exact(&mut bytes)?;
    bytes.truncate(length);
    Ok(bytes)
}

fn read_name<R: Read>(reader: &mut R) -> Result<String, NetCdfError> {
    let length = read_count(reader, "name length")?;
    let bytes = read_padded(reader, length)?;
    String::from_utf8(bytes).map_err(|_| NetCdfError::MalformedHeader("name is not UTF-8".into()))
}

/// Read a list tag and its element count; ABSENT yields zero elements.
fn read_list_header<R: Read>(reader: &mut R, expected_tag: u32) -> Result<usize, NetCdfError> {
    let tag = reader.read_u32::<BigEndian>()?;
    let count = read_count(reader, "list")?;
    match tag {
        TAG_ABSENT if count == 0 => Ok(0),
        tag if tag == expected_tag => Ok(count),
        other => Err(NetCdfError::MalformedHeader(format!(
            "unexpected list tag {:#x}",
            other
        ))),
    }
}

fn read_attributes<R: Read>(reader: &mut R) -> Result<Vec<Attribute>, NetCdfError> {
    let count = read_list_header(reader, TAG_ATTRIBUTE)?;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let name = read_name(reader)?;
        let nc_type = NcType::from_code(reader.read_u32::<BigEndian>()?)?;
        let length = read_count(reader, "attribute length")?;
        let bytes = read_padded(reader, length * nc_type.size())?;
        let value = match nc_type {
            NcType::Byte => AttributeValue::Bytes(bytes.iter().map(|&b| b as i8).collect()),
            NcType::Char => AttributeValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
            NcType::Short => {
                AttributeValue::Shorts(bytes.chunks_exact(2).map(BigEndian::read_i16).collect())
            }
            NcType::Int => {
                AttributeValue::Ints(bytes.chunks_exact(4).map(BigEndian::read_i32).collect())
            }
            NcType::Float => {
                AttributeValue::Floats(bytes.chunks_exact(4).map(BigEndian::read_f32).collect())
            }
            NcType::Double => {
                AttributeValue::Doubles(bytes.chunks_exact(8).map(BigEndian::read_f64).collect())
            }
        };
        attributes.push(Attribute { name, value });
    }
    Ok(attributes)
}

fn read_header<R: Read>(reader: &mut R, file_length: u64) -> Result<Header, NetCdfError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic[..3] != MAGIC {
        return Err(NetCdfError::InvalidMagic);
    }
    let version = magic[3];
    if version != 1 && version != 2 {
        return Err(NetCdfError::UnsupportedVersion(version));
    }

    let raw_records = reader.read_u32::<BigEndian>()?;

    let dimension_count = read_list_header(reader, TAG_DIMENSION)?;
    let mut dimensions = Vec::with_capacity(dimension_count);
    for _ in 0..dimension_count {
        let name = read_name(reader)?;
        let length = reader.read_u32::<BigEndian>()? as u64;
        dimensions.push(Dimension { name, length });
    }

    let attributes = read_attributes(reader)?;

    let variable_count = read_list_header(reader, TAG_VARIABLE)?;
    let mut variables = Vec::with_capacity(variable_count);
    for _ in 0..variable_count {
        let name = read_name(reader)?;
        let rank = read_count(reader, "dimension id")?;
        let mut dimension_ids = Vec::with_capacity(rank);
        for _ in 0..rank {
            let id = reader.read_u32::<BigEndian>()? as usize;
            if id >= dimensions.len() {
                return Err(NetCdfError::MalformedHeader(format!(
                    "variable {} uses undefined dimension {}",
                    name, id
                )));
            }
            dimension_ids.push(id);
        }
        let var_attributes = read_attributes(reader)?;
        let nc_type = NcType::from_code(reader.read_u32::<BigEndian>()?)?;
        let vsize = reader.read_u32::<BigEndian>()? as u64;
        let begin = match version {
            1 => reader.read_u32::<BigEndian>()? as u64,
            _ => reader.read_u64::<BigEndian>()?,
        };

        let is_record = dimension_ids
            .first()
            .map_or(false, |&id| dimensions[id].is_record());
        let slab_length = dimension_ids
            .iter()
            .skip(usize::from(is_record))
            .try_fold(1u64, |acc, &id| acc.checked_mul(dimensions[id].length))
            .ok_or_else(|| {
                NetCdfError::MalformedHeader(format!("variable {} is too large", name))
            })?;

        variables.push(Variable {
            name,
            dimension_ids,
            attributes: var_attributes,
            nc_type,
            vsize,
            begin,
            is_record,
            slab_length,
        });
    }

    let record_variables: Vec<&Variable> = variables.iter().filter(|v| v.is_record).collect();
    let record_size = match record_variables.as_slice() {
        [] => 0,
        // A lone record variable is stored without padding.
        [only] => only.slab_length.saturating_mul(only.nc_type.size() as u64),
        many => many.iter().fold(0u64, |acc, v| acc.saturating_add(v.vsize)),
    };

    let num_records = if raw_records == STREAMING {
        match record_variables.iter().map(|v| v.begin).min() {
            Some(first) if record_size > 0 => file_length.saturating_sub(first) / record_size,
            _ => 0,
        }
    } else {
        raw_records as u64
    };

    Ok(Header {
        version,
        num_records,
        dimensions,
        attributes,
        variables,
        record_size,
    })
}
