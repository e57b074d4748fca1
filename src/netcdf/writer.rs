//! Minimal NetCDF classic writer
//!
//! Produces CDF-1 or CDF-2 files with fixed and record variables. Used to
//! build fixtures for tests, benchmarks and round-trip checks of the reader.

use std::io::{Cursor, Write};

use byteorder::{BigEndian, WriteBytesExt};

use super::classic::{
    padding, Attribute, AttributeValue, Dimension, NcType, MAGIC, TAG_ABSENT, TAG_ATTRIBUTE,
    TAG_DIMENSION, TAG_VARIABLE,
};
use super::NetCdfError;

#[derive(Debug, Clone)]
struct PendingVariable {
    name: String,
    dimension_ids: Vec<usize>,
    attributes: Vec<Attribute>,
    nc_type: NcType,
    data: Vec<f64>,
}

/// Builder for an in-memory NetCDF classic file
#[derive(Debug, Clone)]
pub struct ClassicWriter {
    version: u8,
    dimensions: Vec<Dimension>,
    attributes: Vec<Attribute>,
    variables: Vec<PendingVariable>,
}

impl Default for ClassicWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Computed placement of every variable
struct Layout {
    num_records: u64,
    vsizes: Vec<u64>,
    begins: Vec<u64>,
    slabs: Vec<u64>,
}

impl ClassicWriter {
    /// Create a CDF-1 (32-bit offset) writer
    pub fn new() -> Self {
        Self {
            version: 1,
            dimensions: Vec::new(),
            attributes: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Use the CDF-2 (64-bit offset) layout
    pub fn with_64bit_offsets(mut self) -> Self {
        self.version = 2;
        self
    }

    /// Declare a fixed-length dimension and return its id
    pub fn add_dimension(&mut self, name: &str, length: u64) -> usize {
        self.dimensions.push(Dimension {
            name: name.to_string(),
            length,
        });
        self.dimensions.len() - 1
    }

    /// Declare the unlimited record dimension and return its id
    pub fn add_record_dimension(&mut self, name: &str) -> usize {
        self.add_dimension(name, 0)
    }

    /// Add a global attribute
    pub fn add_attribute(&mut self, name: &str, value: AttributeValue) {
        self.attributes.push(Attribute {
            name: name.to_string(),
            value,
        });
    }

    /// Declare a variable over `dimension_ids` holding `data` (row-major)
    pub fn add_variable(
        &mut self,
        name: &str,
        dimension_ids: &[usize],
        nc_type: NcType,
        data: Vec<f64>,
    ) -> usize {
        self.variables.push(PendingVariable {
            name: name.to_string(),
            dimension_ids: dimension_ids.to_vec(),
            attributes: Vec::new(),
            nc_type,
            data,
        });
        self.variables.len() - 1
    }

    /// Attach an attribute to a previously declared variable
    pub fn add_variable_attribute(&mut self, variable: usize, name: &str, value: AttributeValue) {
        if let Some(var) = self.variables.get_mut(variable) {
            var.attributes.push(Attribute {
                name: name.to_string(),
                value,
            });
        }
    }

    /// Serialize into a byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>, NetCdfError> {
        let mut out = Cursor::new(Vec::new());
        self.write(&mut out)?;
        Ok(out.into_inner())
    }

    /// Serialize into `writer`
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), NetCdfError> {
        let layout = self.layout()?;
        let header = self.header_bytes(&layout)?;
        writer.write_all(&header)?;

        for var in &self.variables {
            if !self.is_record(var) {
                write_values(writer, var.nc_type, &var.data)?;
                write_padding(writer, var.data.len() * var.nc_type.size())?;
            }
        }

        let record_vars: Vec<(usize, &PendingVariable)> = self
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| self.is_record(v))
            .collect();
        let pad_records = record_vars.len() > 1;
        for record in 0..layout.num_records as usize {
            for &(index, var) in &record_vars {
                let slab = layout.slabs[index] as usize;
                let chunk = &var.data[record * slab..(record + 1) * slab];
                write_values(writer, var.nc_type, chunk)?;
                if pad_records {
                    write_padding(writer, chunk.len() * var.nc_type.size())?;
                }
            }
        }
        Ok(())
    }

    fn is_record(&self, var: &PendingVariable) -> bool {
        var.dimension_ids
            .first()
            .and_then(|&id| self.dimensions.get(id))
            .map_or(false, Dimension::is_record)
    }

    fn layout(&self) -> Result<Layout, NetCdfError> {
        let mut slabs = Vec::with_capacity(self.variables.len());
        let mut vsizes = Vec::with_capacity(self.variables.len());
        let mut num_records: Option<u64> = None;

        for var in &self.variables {
            let is_record = self.is_record(var);
            let mut slab = 1u64;
            for (position, &id) in var.dimension_ids.iter().enumerate() {
                let dimension = self.dimensions.get(id).ok_or_else(|| {
                    NetCdfError::MalformedHeader(format!(
                        "variable {} uses undefined dimension {}",
                        var.name, id
                    ))
                })?;
                if dimension.is_record() && position > 0 {
                    return Err(NetCdfError::MalformedHeader(format!(
                        "record dimension must come first in {}",
                        var.name
                    )));
                }
                if !dimension.is_record() {
                    slab *= dimension.length;
                }
            }

            let len = var.data.len() as u64;
            if is_record {
                let records = if slab == 0 { 0 } else { len / slab };
                if records * slab != len {
                    return Err(NetCdfError::MalformedHeader(format!(
                        "{} values do not fill whole records of {}",
                        len, slab
                    )));
                }
                match num_records {
                    Some(existing) if existing != records => {
                        return Err(NetCdfError::MalformedHeader(format!(
                            "record variable {} has {} records, expected {}",
                            var.name, records, existing
                        )));
                    }
                    _ => num_records = Some(records),
                }
            } else if len != slab {
                return Err(NetCdfError::MalformedHeader(format!(
                    "variable {} holds {} values but its shape needs {}",
                    var.name, len, slab
                )));
            }

            let bytes = (slab as usize) * var.nc_type.size();
            vsizes.push((bytes + padding(bytes)) as u64);
            slabs.push(slab);
        }

        let mut layout = Layout {
            num_records: num_records.unwrap_or(0),
            vsizes,
            begins: vec![0; self.variables.len()],
            slabs,
        };

        // Offsets have a fixed width, so the header length does not depend on them.
        let header_length = self.header_bytes(&layout)?.len() as u64;
        let mut offset = header_length;
        for (index, var) in self.variables.iter().enumerate() {
            if !self.is_record(var) {
                layout.begins[index] = offset;
                offset += layout.vsizes[index];
            }
        }
        for (index, var) in self.variables.iter().enumerate() {
            if self.is_record(var) {
                layout.begins[index] = offset;
                offset += layout.vsizes[index];
            }
        }
        if self.version == 1 && offset > u32::MAX as u64 {
            return Err(NetCdfError::MalformedHeader(
                "data exceeds 32-bit offsets; use 64-bit offsets".into(),
            ));
        }
        Ok(layout)
    }

    fn header_bytes(&self, layout: &Layout) -> Result<Vec<u8>, NetCdfError> {
        let mut out = Vec::new();
        out.write_all(MAGIC)?;
        out.write_u8(self.version)?;
        out.write_u32::<BigEndian>(layout.num_records as u32)?;

        write_list_header(&mut out, TAG_DIMENSION, self.dimensions.len())?;
        for dimension in &self.dimensions {
            write_name(&mut out, &dimension.name)?;
            out.write_u32::<BigEndian>(dimension.length as u32)?;
        }

        write_attributes(&mut out, &self.attributes)?;

        write_list_header(&mut out, TAG_VARIABLE, self.variables.len())?;
        for (index, var) in self.variables.iter().enumerate() {
            write_name(&mut out, &var.name)?;
            out.write_u32::<BigEndian>(var.dimension_ids.len() as u32)?;
            for &id in &var.dimension_ids {
                out.write_u32::<BigEndian>(id as u32)?;
            }
            write_attributes(&mut out, &var.attributes)?;
            out.write_u32::<BigEndian>(var.nc_type.code())?;
            out.write_u32::<BigEndian>(layout.vsizes[index] as u32)?;
            match self.version {
                1 => out.write_u32::<BigEndian>(layout.begins[index] as u32)?,
                _ => out.write_u64::<BigEndian>(layout.begins[index])?,
            }
        }
        Ok(out)
    }
}

fn write_list_header<W: Write>(out: &mut W, tag: u32, count: usize) -> Result<(), NetCdfError> {
    if count == 0 {
        out.write_u32::<BigEndian>(TAG_ABSENT)?;
        out.write_u32::<BigEndian>(0)?;
    } else {
        out.write_u32::<BigEndian>(tag)?;
        out.write_u32::<BigEndian>(count as u32)?;
    }
    Ok(())
}

fn write_padding<W: Write>(out: &mut W, length: usize) -> Result<(), NetCdfError> {
    out.write_all(&[0u8; 3][..padding(length)])?;
    Ok(())
}

fn write_name<W: Write>(out: &mut W, name: &str) -> Result<(), NetCdfError> {
    out.write_u32::<BigEndian>(name.len() as u32)?;
    out.write_all(name.as_bytes())?;
    write_padding(out, name.len())
}

fn write_attributes<W: Write>(out: &mut W, attributes: &[Attribute]) -> Result<(), NetCdfError> {
    write_list_header(out, TAG_ATTRIBUTE, attributes.len())?;
    for attribute in attributes {
        write_name(out, &attribute.name)?;
        let (nc_type, length) = match &attribute.value {
            AttributeValue::Bytes(v) => (NcType::Byte, v.len()),
            AttributeValue::Text(s) => (NcType::Char, s.len()),
            AttributeValue::Shorts(v) => (NcType::Short, v.len()),
            AttributeValue::Ints(v) => (NcType::Int, v.len()),
            AttributeValue::Floats(v) => (NcType::Float, v.len()),
            AttributeValue::Doubles(v) => (NcType::Double, v.len()),
        };
        out.write_u32::<BigEndian>(nc_type.code())?;
        out.write_u32::<BigEndian>(length as u32)?;
        match &attribute.value {
            AttributeValue::Bytes(v) => {
                for &x in v {
                    out.write_i8(x)?;
                }
            }
            AttributeValue::Text(s) => out.write_all(s.as_bytes())?,
            AttributeValue::Shorts(v) => {
                for &x in v {
                    out.write_i16::<BigEndian>(x)?;
                }
            }
            AttributeValue::Ints(v) => {
                for &x in v {
                    out.write_i32::<BigEndian>(x)?;
                }
            }
            AttributeValue::Floats(v) => {
                for &x in v {
                    out.write_f32::<BigEndian>(x)?;
                }
            }
            AttributeValue::Doubles(v) => {
                for &x in v {
                    out.write_f64::<BigEndian>(x)?;
                }
            }
        }
        write_padding(out, length * nc_type.size())?;
    }
    Ok(())
}

fn write_values<W: Write>(out: &mut W, nc_type: NcType, values: &[f64]) -> Result<(), NetCdfError> {
    for &value in values {
        match nc_type {
            NcType::Byte | NcType::Char => out.write_i8(value as i8)?,
            NcType::Short => out.write_i16::<BigEndian>(value as i16)?,
            NcType::Int => out.write_i32::<BigEndian>(value as i32)?,
            NcType::Float => out.write_f32::<BigEndian>(value as f32)?,
            NcType::Double => out.write_f64::<BigEndian>(value)?,
        }
    }
    Ok(())
}
