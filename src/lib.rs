//! `emcore` reads and writes electron microscopy images
//! (MRC, Spider and IMAGIC files and stacks) and keeps
//! per-image metadata in typed, schema-driven tables.
//!
//! Most callers need only `read_image` and `write_image`,
//! or an `ImageFile` when write options or a custom
//! `FormatRegistry` are involved.

pub mod types;
mod error;
mod utils;
pub mod data;
pub mod formats;
mod image_file;
pub mod table;

use std::path::Path;

pub use error::EmError;
pub use types::{DataType, Element, FromValue, Value, cast_buffer, swap_bytes};
pub use data::image::{ArrayDim, Header, Image, ImageLocation, ImageStats, PixelBuffer};
pub use formats::{
    FormatRegistry,
    ImageFormat,
    ImageInfo,
    ImagicFormat,
    MrcFormat,
    SpiderFormat,
    WriteOptions,
};
pub use image_file::ImageFile;
pub use table::{Column, ColumnId, ColumnKey, Field, Row, Schema, Table};

/// `read_image(location)` reads one image from an MRC,
/// Spider or IMAGIC file. A bare path reads the first
/// image of a stack, `"index@path"` or an `ImageLocation`
/// reads any other.
///
/// ## Arguments
///
/// * `location` - The image to read: an `ImageLocation`,
/// a path, or a `&str` path
///
/// ## Returns
///
/// An `Image` with `dim.n == 1`, in the file's element type
///
/// ## Errors
///
/// * `EmError::UnsupportedFormat` - the extension has no driver
/// * `EmError::NotFound` - the file does not exist
/// * `EmError::CorruptHeader` - the header can't be parsed
/// * `EmError::IndexOutOfRange` - the index is past the last image
///
/// ## Example
///
/// ```rust, ignore
/// let image = emcore::read_image("/data/particles.mrcs")?;
/// let tenth = emcore::read_image(emcore::ImageLocation::new("/data/particles.mrcs", 10))?;
/// println!("{}", tenth);
/// ```
pub fn read_image<L : Into<ImageLocation>>(location : L) -> Result<Image, EmError> {
    ImageFile::new().read(location)
}

/// `write_image(location, image)` writes `image` with the
/// default `WriteOptions`: missing files are created,
/// existing files are updated in place.
///
/// ## Arguments
///
/// * `location` - Where to write. An index past the end of a
/// stack grows the stack.
/// * `image` - The image (or consecutive images, if `dim.n > 1`)
///
/// ## Errors
///
/// See `ImageFile::write`
///
/// ## Example
///
/// ```rust, ignore
/// let image = Image::from_vec(ArrayDim::new(64, 64, 1, 1), vec![0.0f32; 64 * 64])?;
/// emcore::write_image("/data/blank.mrc", &image)?;
/// emcore::write_image(ImageLocation::new("/data/stack.mrcs", 3), &image)?;
/// ```
pub fn write_image<L : Into<ImageLocation>>(location : L, image : &Image) -> Result<(), EmError> {
    ImageFile::new().write(location, image)
}

/// `probe_image(path)` reads only the header of `path` and
/// returns the dimensions and element type of the file.
///
/// ## Example
///
/// ```rust, ignore
/// let info = emcore::probe_image("/data/particles.mrcs")?;
/// println!("{} images of {}x{}", info.dim.n, info.dim.x, info.dim.y);
/// ```
pub fn probe_image<P : AsRef<Path>>(path : P) -> Result<ImageInfo, EmError> {
    ImageFile::new().probe(path)
}
