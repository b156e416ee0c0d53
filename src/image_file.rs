//! The `ImageFile` is the entry point for image I/O. It
//! resolves a location to a format driver through a
//! `FormatRegistry` and reads or writes whole `Image`s.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;

use crate::data::image::{Image, ImageLocation};
use crate::error::EmError;
use crate::formats::{FormatRegistry, ImageFormat, ImageInfo, WriteOptions};
use crate::types::DataType;

/// Reads and writes images through the drivers of a
/// `FormatRegistry`. Holds no per-file state, so one
/// `ImageFile` may serve any number of threads.
///
/// ## Example
///
/// ```rust, ignore
/// let io = ImageFile::new();
/// let first = io.read("/data/particles.mrcs")?;
/// let tenth = io.read(ImageLocation::new("/data/particles.mrcs", 10))?;
/// assert_eq!(tenth.dim().n, 1);
/// ```
#[derive(Debug, Clone)]
pub struct ImageFile {
    registry : Arc<FormatRegistry>,
    options : WriteOptions,
}

impl Default for ImageFile {
    fn default() -> Self {
        ImageFile::new()
    }
}

impl ImageFile {
    /// An `ImageFile` over the built-in formats with default
    /// `WriteOptions`
    pub fn new() -> Self {
        ImageFile::with_registry(FormatRegistry::builtin())
    }

    pub fn with_registry(registry : Arc<FormatRegistry>) -> Self {
        ImageFile { registry, options : WriteOptions::default() }
    }

    /// Replaces the `WriteOptions` used by `write`
    pub fn with_options(mut self, options : WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    fn driver(&self, path : &Path) -> Result<&Arc<dyn ImageFormat>, EmError> {
        let driver = self.registry.for_path(path)?;
        log::debug!("{} -> format '{}'", path.display(), driver.name());
        Ok(driver)
    }

    /// Reads the image at `location`. A bare path reads the
    /// first image. The returned image always has `dim.n == 1`.
    ///
    /// ## Arguments
    ///
    /// * `location` - An `ImageLocation`, or anything convertible
    /// into one (`&str`, `&Path`, `PathBuf`...)
    ///
    /// ## Errors
    ///
    /// * `EmError::UnsupportedFormat` - no driver for the extension
    /// * `EmError::NotFound` - the file does not exist
    /// * `EmError::CorruptHeader` - the header can't be parsed
    /// * `EmError::IndexOutOfRange` - `location.index` is not in `1..=n`
    pub fn read<L : Into<ImageLocation>>(&self, location : L) -> Result<Image, EmError> {
        let location = location.into();
        let driver = self.driver(location.path())?;
        if !location.path().exists() {
            return Err(EmError::NotFound(location.path.clone()));
        }
        log::debug!("Reading {}", location);
        driver.read_slice(location.path(), location.index)
    }

    /// Reads `location` into an existing image. An image that
    /// already has a type keeps it and the file data are
    /// converted. A `Null`-typed image takes the file's type.
    pub fn read_into<L : Into<ImageLocation>>(
        &self,
        location : L,
        image : &mut Image
    ) -> Result<(), EmError> {
        let read = self.read(location)?;
        *image = if image.data_type().is_null() || image.data_type() == read.data_type() {
            read
        } else {
            read.cast(image.data_type())?
        };
        Ok(())
    }

    /// Reads many locations in parallel. Each read goes
    /// through its own driver call, so locations may point
    /// into the same or different files.
    ///
    /// ## Errors
    ///
    /// The first error encountered, if any read fails
    pub fn read_many(&self, locations : &[ImageLocation]) -> Result<Vec<Image>, EmError> {
        log::debug!("Reading {} locations", locations.len());
        locations.par_iter()
            .map(|location| self.read(location))
            .collect()
    }

    /// Reads the header of `path` only.
    pub fn probe<P : AsRef<Path>>(&self, path : P) -> Result<ImageInfo, EmError> {
        let path = path.as_ref();
        let driver = self.driver(path)?;
        if !path.exists() {
            return Err(EmError::NotFound(path.to_path_buf()));
        }
        driver.probe(path)
    }

    /// Writes `image` at `location`. An image with `dim.n > 1`
    /// fills consecutive items starting at `location.index`,
    /// and writing past the end of a stack grows it.
    ///
    /// ## Errors
    ///
    /// As `read`, plus
    ///
    /// * `EmError::UnsupportedWrite` - the driver is read-only
    /// * `EmError::UnsupportedDataType` - a new file can't store
    /// the image's type
    /// * `EmError::DimensionMismatch` - the image does not match
    /// the items already in the file
    /// * `EmError::NotFound` - the file or its directory is missing
    /// and `WriteOptions` forbid creating it
    pub fn write<L : Into<ImageLocation>>(
        &self,
        location : L,
        image : &Image
    ) -> Result<(), EmError> {
        let location = location.into();
        let driver = self.driver(location.path())?;
        if !driver.can_write() {
            return Err(EmError::UnsupportedWrite(driver.name().to_string()));
        }
        log::debug!("Writing {} with {:?}", location, self.options);
        driver.write_slice(location.path(), location.index, image, &self.options)
    }

    /// True if a built-in driver handles `extension`
    pub fn has_impl(extension : &str) -> bool {
        FormatRegistry::builtin().has_impl(extension)
    }

    /// Element types of every built-in format, by format id
    pub fn format_types() -> BTreeMap<String, BTreeSet<DataType>> {
        FormatRegistry::builtin().format_types()
    }

    /// Element types of the built-in driver for an extension
    /// or format id
    pub fn impl_types(key : &str) -> Result<BTreeSet<DataType>, EmError> {
        FormatRegistry::builtin().impl_types(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::image::ArrayDim;

    #[test]
    fn static_queries() {
        for ext in ["mrc", "mrcs", "spi", "spider"] {
            assert!(ImageFile::has_impl(ext));
        }
        let format_types = ImageFile::format_types();
        assert_eq!(ImageFile::impl_types("spider").unwrap(), format_types["spider"]);
        assert_eq!(ImageFile::impl_types("mrc").unwrap(), format_types["mrc"]);
        assert_eq!(ImageFile::impl_types("img").unwrap(), format_types["imagic"]);
    }

    #[test]
    fn dispatch_errors() {
        let dir = assert_fs::TempDir::new().unwrap();
        let io = ImageFile::new();

        assert!(matches!(
            io.read(dir.path().join("image.xyz")),
            Err(EmError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            io.read(dir.path().join("missing.mrc")),
            Err(EmError::NotFound(_))
        ));
        assert!(matches!(
            io.probe(dir.path().join("missing.spi")),
            Err(EmError::NotFound(_))
        ));
    }

    #[test]
    fn read_into_converts() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("ints.mrc");
        let io = ImageFile::new();
        let image = Image::from_vec(ArrayDim::from_xy(3, 2), vec![1i16, 2, 3, 4, 5, 6]).unwrap();
        io.write(&path, &image).unwrap();

        let mut floats = Image::with_dim(ArrayDim::from_xy(1, 1), DataType::Float32).unwrap();
        io.read_into(&path, &mut floats).unwrap();
        assert_eq!(floats.dim(), ArrayDim::from_xy(3, 2));
        assert_eq!(floats.as_slice::<f32>().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let mut untyped = Image::new();
        io.read_into(&path, &mut untyped).unwrap();
        assert_eq!(untyped.data_type(), DataType::Int16);
    }
}
