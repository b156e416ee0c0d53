//! Pluggable image file formats.
//!
//! Each on-disk format is a stateless driver implementing
//! `ImageFormat`. Drivers are held by a `FormatRegistry`,
//! keyed by the file extensions they claim and by their
//! format id, and `ImageFile` dispatches on a path's
//! extension. Adding a format means adding a driver and
//! registering it; nothing else changes.

pub mod registry;
mod layout;
mod mrc;
mod spider;
mod imagic;

use std::path::Path;

use crate::data::image::{ArrayDim, Image};
use crate::error::EmError;
use crate::types::DataType;

pub use registry::FormatRegistry;
pub use mrc::MrcFormat;
pub use spider::SpiderFormat;
pub use imagic::ImagicFormat;

/// What a driver learns about a file from its header alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Extent of the file contents. `n` counts every item
    /// in the stack.
    pub dim : ArrayDim,
    pub data_type : DataType,
}

/// The driver contract for a single file format.
///
/// Implementations must not hold mutable state between
/// calls: the same driver is shared by every thread
/// reading through a registry.
pub trait ImageFormat : Send + Sync {
    /// Canonical format id, e.g. `"mrc"` or `"imagic"`
    fn name(&self) -> &'static str;

    /// Lowercase file extensions (without the dot) this
    /// driver claims
    fn extensions(&self) -> &'static [&'static str];

    /// Element types the format can store
    fn data_types(&self) -> &'static [DataType];

    /// True if this driver reads files with the given
    /// extension. Case-insensitive, a leading dot is ignored.
    fn can_handle(&self, extension : &str) -> bool {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.extensions().iter().any(|ext| *ext == extension)
    }

    fn can_write(&self) -> bool {
        false
    }

    /// Reads the header of `path` without loading pixels.
    fn probe(&self, path : &Path) -> Result<ImageInfo, EmError>;

    /// Reads item `index` (1-based) of the file. The returned
    /// image always has `dim.n == 1`.
    ///
    /// ## Errors
    ///
    /// * `EmError::NotFound` - `path` does not exist
    /// * `EmError::CorruptHeader` - the header can't be parsed
    /// * `EmError::IndexOutOfRange` - `index` is not in `1..=n`
    fn read_slice(&self, path : &Path, index : usize) -> Result<Image, EmError>;

    /// Writes every item of `image` into `path`, the first one
    /// at `index`. Read-only formats keep this default.
    fn write_slice(
        &self,
        _path : &Path,
        _index : usize,
        _image : &Image,
        _options : &WriteOptions,
    ) -> Result<(), EmError> {
        Err(EmError::UnsupportedWrite(self.name().to_string()))
    }
}

/// Controls what `ImageFile::write` may do to the file
/// system.
///
/// ## Example
///
/// ```rust, ignore
/// let options = WriteOptions::new()
///     .create_dirs(true)
///     .truncate(true);
/// ImageFile::new().with_options(options).write("out/stack.mrcs", &image)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create the file if it does not exist yet
    pub create_file : bool,
    /// Create missing parent directories
    pub create_dirs : bool,
    /// Discard the contents of an existing file instead
    /// of writing into it
    pub truncate : bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            create_file : true,
            create_dirs : false,
            truncate : false,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_file(mut self, create : bool) -> Self {
        self.create_file = create;
        self
    }

    pub fn create_dirs(mut self, create : bool) -> Self {
        self.create_dirs = create;
        self
    }

    pub fn truncate(mut self, truncate : bool) -> Self {
        self.truncate = truncate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnly;

    impl ImageFormat for ReadOnly {
        fn name(&self) -> &'static str { "readonly" }
        fn extensions(&self) -> &'static [&'static str] { &["ro", "rox"] }
        fn data_types(&self) -> &'static [DataType] { &[DataType::UInt8] }
        fn probe(&self, path : &Path) -> Result<ImageInfo, EmError> {
            Err(EmError::NotFound(path.to_path_buf()))
        }
        fn read_slice(&self, path : &Path, _index : usize) -> Result<Image, EmError> {
            Err(EmError::NotFound(path.to_path_buf()))
        }
    }

    #[test]
    fn driver_defaults() {
        let format = ReadOnly;
        assert!(format.can_handle("ro"));
        assert!(format.can_handle(".RO"));
        assert!(!format.can_handle("r"));
        assert!(!format.can_write());
        assert!(matches!(
            format.write_slice(Path::new("a.ro"), 1, &Image::new(), &WriteOptions::new()),
            Err(EmError::UnsupportedWrite(name)) if name == "readonly"
        ));
    }

    #[test]
    fn write_option_builder() {
        let options = WriteOptions::new();
        assert!(options.create_file);
        assert!(!options.create_dirs);
        assert!(!options.truncate);

        let options = options.create_file(false).create_dirs(true).truncate(true);
        assert_eq!(options, WriteOptions { create_file : false, create_dirs : true, truncate : true });
    }
}
