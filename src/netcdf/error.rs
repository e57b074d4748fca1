/// Errors that can occur while reading a NetCDF classic file
#[derive(Debug, thiserror::Error)]
pub enum NetCdfError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file does not start with the `CDF` magic
    #[error("Not a NetCDF classic file")]
    InvalidMagic,

    /// The format version is not 1 (classic) or 2 (64-bit offset)
    #[error("Unsupported NetCDF format version {0}")]
    UnsupportedVersion(u8),

    /// The header is structurally invalid
    #[error("Malformed NetCDF header: {0}")]
    MalformedHeader(String),

    /// A type code outside 1..=6
    #[error("Unknown NetCDF type code {0}")]
    UnknownType(u32),

    /// A variable name that is not present in the file
    #[error("Variable not found: {0}")]
    MissingVariable(String),

    /// A character variable was read as numbers
    #[error("Variable {0} is not numeric")]
    NonNumeric(String),

    /// A slice request outside the variable's extent
    #[error("Read of {count} values at {start} exceeds variable {name} of length {length}")]
    OutOfBounds {
        /// Variable name
        name: String,
        /// First element requested
        start: u64,
        /// Number of elements requested
        count: u64,
        /// Total elements in the variable
        length: u64,
    },
}
