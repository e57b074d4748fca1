//! NetCDF (ANDI-MS) input
//!
//! [`NetCdfFile`] decodes the classic container; [`NetCdfScanReader`] maps
//! its `scan_index` layout onto scans.

mod classic;
mod error;
mod reader;
mod writer;

#[cfg(test)]
mod tests;

pub use classic::{
    Attribute, AttributeValue, Dimension, Header, NcType, NetCdfFile, Variable,
};
pub use error::NetCdfError;
pub use reader::{repair_gaps, NetCdfScanReader};
pub use writer::ClassicWriter;
