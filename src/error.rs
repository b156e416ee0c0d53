//! The error type shared by the image I/O layer and
//! the table engine. Every fallible operation in the
//! crate returns `Result<_, EmError>`.

use std::path::{Path, PathBuf};

use crate::data::image::ArrayDim;
use crate::table::ColumnId;
use crate::types::DataType;

/// Errors that can occur while resolving, reading or
/// writing image files, or while manipulating the
/// schema and rows of a `Table`.
#[derive(Debug)]
pub enum EmError {
    /// No driver is registered for this extension or format id
    UnsupportedFormat(String),
    /// The driver for this format cannot write files
    UnsupportedWrite(String),
    /// The format cannot store elements of this type
    UnsupportedDataType{format : String, data_type : DataType},
    /// The path (or a required companion file) does not exist
    NotFound(PathBuf),
    /// The bytes on disk do not follow the expected layout
    CorruptHeader{path : PathBuf, reason : String},
    /// Requested image index is outside `1..=bound`
    IndexOutOfRange{index : usize, bound : usize},
    /// The extent of an image does not match the extent required
    DimensionMismatch{required : ArrayDim, requested : ArrayDim},
    /// A column with this name already exists in the schema
    DuplicateName(String),
    /// A column with this id already exists in the schema
    DuplicateId(ColumnId),
    /// No column id is left after the largest one in use
    IdsExhausted,
    /// The name does not correspond to any `DataType`
    UnknownType(String),
    /// A value (or buffer) cannot be stored as or read as the requested type
    TypeMismatch{expected : DataType, found : DataType},
    /// No column matches the given position, name or id
    UnknownColumn(String),
    /// A row was built from a schema different from the table's
    SchemaMismatch,
    IOError(std::io::Error),
}

impl EmError {
    pub(crate) fn corrupt_header<P : AsRef<Path>, S : ToString>(path : P, reason : S) -> Self {
        EmError::CorruptHeader {
            path : path.as_ref().to_path_buf(),
            reason : reason.to_string(),
        }
    }

    /// Maps an `std::io::Error` raised while touching `path`,
    /// turning `ErrorKind::NotFound` into `EmError::NotFound`.
    pub(crate) fn from_io<P : AsRef<Path>>(path : P, err : std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => EmError::NotFound(path.as_ref().to_path_buf()),
            _ => EmError::IOError(err),
        }
    }

    /// Maps a `binrw::Error` raised while parsing the header of `path`.
    /// Short reads mean the file is too small to hold a header.
    pub(crate) fn from_binrw<P : AsRef<Path>>(path : P, err : binrw::Error) -> Self {
        match err {
            binrw::Error::Io(io_err) => {
                match io_err.kind() {
                    std::io::ErrorKind::UnexpectedEof => {
                        EmError::corrupt_header(path, "file is too short for its header")
                    },
                    _ => EmError::from_io(path, io_err),
                }
            },
            other => EmError::corrupt_header(path, other),
        }
    }
}

impl From<std::io::Error> for EmError {
    fn from(err : std::io::Error) -> Self {
        EmError::IOError(err)
    }
}

impl From<binrw::Error> for EmError {
    fn from(err : binrw::Error) -> Self {
        match err {
            binrw::Error::Io(io_err) => EmError::IOError(io_err),
            other => EmError::IOError(
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    other.to_string()
                )
            ),
        }
    }
}

impl From<bytemuck::PodCastError> for EmError {
    fn from(err : bytemuck::PodCastError) -> Self {
        EmError::IOError(
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{:?}", err))
        )
    }
}

impl std::error::Error for EmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EmError::IOError(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for EmError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EmError::UnsupportedFormat(key) => {
                write!(f, "UnsupportedFormat: no image format registered for '{}'", key)
            },
            EmError::UnsupportedWrite(format) => {
                write!(f, "UnsupportedWrite: format '{}' is read-only", format)
            },
            EmError::UnsupportedDataType{format, data_type} => {
                write!(f, "UnsupportedDataType: format '{}' cannot store {} data", format, data_type)
            },
            EmError::NotFound(path) => {
                write!(f, "NotFound: {}", path.display())
            },
            EmError::CorruptHeader{path, reason} => {
                write!(f, "CorruptHeader: {}: {}", path.display(), reason)
            },
            EmError::IndexOutOfRange{index, bound} => {
                write!(f, "IndexOutOfRange: index {} is not in 1..={}", index, bound)
            },
            EmError::DimensionMismatch{required, requested} => {
                write!(f, "Mismatched dimensions. Requested: {}, Required: {}", requested, required)
            },
            EmError::DuplicateName(name) => {
                write!(f, "DuplicateName: a column named '{}' already exists", name)
            },
            EmError::DuplicateId(id) => {
                write!(f, "DuplicateId: a column with id {} already exists", id)
            },
            EmError::IdsExhausted => {
                write!(f, "IdsExhausted: no column id follows {}", u64::MAX)
            },
            EmError::UnknownType(name) => {
                write!(f, "UnknownType: '{}' is not a data type name", name)
            },
            EmError::TypeMismatch{expected, found} => {
                write!(f, "TypeMismatch: expected {}, found {}", expected, found)
            },
            EmError::UnknownColumn(key) => {
                write!(f, "UnknownColumn: {}", key)
            },
            EmError::SchemaMismatch => {
                write!(f, "SchemaMismatch: row columns differ from the table columns")
            },
            EmError::IOError(err) => {
                write!(f, "IOError: {}", err)
            },
        }
    }
}
