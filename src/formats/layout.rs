//! Byte layout shared by the stack formats: a fixed file
//! header followed by `n` equally sized items, each item
//! optionally preceded by its own header (the "pad").
//!
//! Item `i` (1-based) starts at
//! `header_size + (pad_size + item_bytes) * (i - 1) + pad_size`.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use binrw::Endian;

use crate::data::image::{ArrayDim, Image, PixelBuffer};
use crate::error::EmError;
use crate::formats::{ImageInfo, WriteOptions};
use crate::types::{swap_bytes, DataType};

/// Byte order of the running machine
pub (crate) fn native_endian() -> Endian {
    if cfg!(target_endian = "little") { Endian::Little } else { Endian::Big }
}

/// Where the items of a stack file live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub (crate) struct StackLayout {
    pub dim : ArrayDim,
    pub data_type : DataType,
    pub endian : Endian,
    pub header_size : u64,
    pub pad_size : u64,
}

impl StackLayout {
    /// Bytes of pixel data in one item
    pub fn item_bytes(&self) -> u64 {
        (self.dim.item_size() * self.data_type.size()) as u64
    }

    /// Offset of the first pixel of item `index` (1-based)
    pub fn item_offset(&self, index : usize) -> u64 {
        self.header_size
        + (self.pad_size + self.item_bytes()) * (index as u64 - 1)
        + self.pad_size
    }

    /// Total size of a file holding `dim.n` items
    pub fn file_size(&self) -> u64 {
        self.header_size + (self.pad_size + self.item_bytes()) * self.dim.n as u64
    }

    /// `file_size`, or `None` if it does not fit in a `u64`
    pub fn checked_file_size(&self) -> Option<u64> {
        let item_bytes = [self.dim.x, self.dim.y, self.dim.z, self.data_type.size()]
            .iter()
            .try_fold(1u64, |bytes, &v| bytes.checked_mul(v as u64))?;
        self.pad_size.checked_add(item_bytes)?
            .checked_mul(self.dim.n as u64)?
            .checked_add(self.header_size)
    }

    /// Rejects a layout read from the header of `path` whose
    /// extent can't be addressed. Offsets and sizes of a layout
    /// that passes never overflow.
    pub fn checked(self, path : &Path) -> Result<Self, EmError> {
        match self.checked_file_size() {
            Some(_) => Ok(self),
            None => Err(EmError::corrupt_header(
                path,
                format!("extent {} of {} is too large to address", self.dim, self.data_type)
            )),
        }
    }

    pub fn check_index(&self, index : usize) -> Result<(), EmError> {
        if index < 1 || index > self.dim.n {
            return Err(EmError::IndexOutOfRange { index, bound : self.dim.n });
        }
        Ok(())
    }

    pub fn needs_swap(&self) -> bool {
        self.endian != native_endian()
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo { dim : self.dim, data_type : self.data_type }
    }
}

/// Reads the first `len` bytes of `path`.
///
/// ## Errors
///
/// * `EmError::NotFound` - `path` does not exist
/// * `EmError::CorruptHeader` - the file is shorter than `len`
pub (crate) fn read_header_bytes(path : &Path, len : usize) -> Result<Vec<u8>, EmError> {
    let mut file = File::open(path).map_err(|err| EmError::from_io(path, err))?;
    let mut bytes = vec![0u8; len];
    file.read_exact(&mut bytes).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => EmError::corrupt_header(
            path,
            format!("file is shorter than its {}-byte header", len)
        ),
        _ => EmError::from_io(path, err),
    })?;
    Ok(bytes)
}

/// Checks the file is large enough to hold what the header claims.
pub (crate) fn validate_size(path : &Path, layout : &StackLayout) -> Result<(), EmError> {
    let actual = std::fs::metadata(path)
        .map_err(|err| EmError::from_io(path, err))?
        .len();
    if actual < layout.file_size() {
        return Err(EmError::corrupt_header(
            path,
            format!(
                "header describes {} bytes of data but the file holds {}",
                layout.file_size(), actual
            )
        ));
    }
    Ok(())
}

/// Loads `len` bytes of elements `elem_size` wide starting
/// at `offset`, converting them to native byte order.
#[binrw::parser(reader, endian)]
fn load_item(offset : u64, len : usize, elem_size : usize) -> binrw::BinResult<PixelBuffer> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buffer = PixelBuffer::zeroed(len);
    reader.read_exact(buffer.as_bytes_mut())?;
    if endian != native_endian() {
        swap_bytes(buffer.as_bytes_mut(), elem_size);
    }
    Ok(buffer)
}

/// Reads item `index` of the file at `path` (which may be
/// a companion data file rather than the header file).
pub (crate) fn read_item(
    path : &Path,
    layout : &StackLayout,
    index : usize
) -> Result<PixelBuffer, EmError> {
    layout.check_index(index)?;
    validate_size(path, layout)?;

    let file = File::open(path).map_err(|err| EmError::from_io(path, err))?;
    let mut reader = BufReader::new(file);
    let offset = layout.item_offset(index);
    log::trace!(
        "Reading item {} of {} from {} at offset {}",
        index, layout.dim.n, path.display(), offset
    );
    load_item(
        &mut reader,
        layout.endian,
        (offset, layout.item_bytes() as usize, layout.data_type.size())
    ).map_err(|err| EmError::from_binrw(path, err))
}

/// Writes one item's native-endian bytes at its slot,
/// swapping to the file's byte order when they differ.
pub (crate) fn write_item<W : Write + Seek>(
    writer : &mut W,
    layout : &StackLayout,
    index : usize,
    bytes : &[u8],
) -> std::io::Result<()> {
    let offset = layout.item_offset(index);
    log::trace!("Writing item {} at offset {}", index, offset);
    writer.seek(SeekFrom::Start(offset))?;
    if layout.needs_swap() {
        let mut swapped = bytes.to_vec();
        swap_bytes(&mut swapped, layout.data_type.size());
        writer.write_all(&swapped)
    } else {
        writer.write_all(bytes)
    }
}

/// Writes every item of `image` in sequence, the first at `index`.
pub (crate) fn write_items<W : Write + Seek>(
    writer : &mut W,
    layout : &StackLayout,
    index : usize,
    image : &Image,
) -> std::io::Result<()> {
    let item_bytes = layout.item_bytes() as usize;
    image.data()
        .chunks_exact(item_bytes)
        .enumerate()
        .try_for_each(|(offset, item)| write_item(writer, layout, index + offset, item))
}

/// Works out how `image` lands in a file currently laid out
/// as `current` when written starting at `index`. A file that
/// does not exist yet is passed as a layout with `dim.n == 0`
/// in the image's own type.
///
/// Returns the layout after the write and the image converted
/// to the file's type.
///
/// ## Errors
///
/// * `EmError::UnsupportedDataType` - the file's type is not one
/// `supported` lists
/// * `EmError::DimensionMismatch` - the image items differ in
/// `x`, `y` or `z` from the file's items
/// * `EmError::IndexOutOfRange` - `index` is 0
pub (crate) fn plan_write<'a>(
    format : &str,
    supported : &[DataType],
    current : &StackLayout,
    image : &'a Image,
    index : usize,
) -> Result<(StackLayout, Cow<'a, Image>), EmError> {
    if index < 1 {
        return Err(EmError::IndexOutOfRange { index, bound : current.dim.n });
    }
    if !supported.contains(&current.data_type) {
        return Err(EmError::UnsupportedDataType {
            format : format.to_string(),
            data_type : current.data_type,
        });
    }
    if image.dim().size() == 0 || !current.dim.same_item(&image.dim()) {
        return Err(EmError::DimensionMismatch {
            required : current.dim.with_n(image.dim().n.max(1)),
            requested : image.dim(),
        });
    }

    let image = if image.data_type() == current.data_type {
        Cow::Borrowed(image)
    } else {
        log::debug!(
            "Converting {} image to {} to match the existing file",
            image.data_type(), current.data_type
        );
        Cow::Owned(image.cast(current.data_type)?)
    };

    let out_of_range = || EmError::IndexOutOfRange { index, bound : current.dim.n };
    let last = (index - 1).checked_add(image.dim().n).ok_or_else(out_of_range)?;
    let after = StackLayout { dim : current.dim.with_n(current.dim.n.max(last)), ..*current };
    if after.checked_file_size().is_none() {
        return Err(out_of_range());
    }
    Ok((after, image))
}

/// Prepares `path` for writing under `options`, creating
/// parent directories when allowed.
///
/// Returns `true` if the existing contents of the file are to
/// be kept and written into, `false` if the file is (re)created.
pub (crate) fn prepare_target(path : &Path, options : &WriteOptions) -> Result<bool, EmError> {
    if path.exists() {
        return Ok(!options.truncate);
    }
    if !options.create_file {
        return Err(EmError::NotFound(path.to_path_buf()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            if !options.create_dirs {
                return Err(EmError::NotFound(parent.to_path_buf()));
            }
            log::debug!("Creating directory {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|err| EmError::from_io(parent, err))?;
        }
    }
    Ok(false)
}

/// Opens `path` for writing, emptying it unless `keep` is set.
pub (crate) fn open_for_write(path : &Path, keep : bool) -> Result<File, EmError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(!keep)
        .truncate(!keep)
        .open(path)
        .map_err(|err| EmError::from_io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn layout(n : usize, pad_size : u64) -> StackLayout {
        StackLayout {
            dim : ArrayDim::new(4, 2, 1, n),
            data_type : DataType::Int16,
            endian : native_endian(),
            header_size : 100,
            pad_size,
        }
    }

    #[test]
    fn offsets() {
        let plain = layout(3, 0);
        assert_eq!(plain.item_bytes(), 16);
        assert_eq!(plain.item_offset(1), 100);
        assert_eq!(plain.item_offset(3), 132);
        assert_eq!(plain.file_size(), 148);

        let padded = layout(3, 20);
        assert_eq!(padded.item_offset(1), 120);
        assert_eq!(padded.item_offset(2), 156);
        assert_eq!(padded.file_size(), 208);

        assert!(plain.check_index(3).is_ok());
        assert!(matches!(plain.check_index(4), Err(EmError::IndexOutOfRange{index : 4, bound : 3})));
        assert!(plain.check_index(0).is_err());
    }

    #[test]
    fn swapped_round_trip() {
        let foreign = match native_endian() {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        };
        let layout = StackLayout { endian : foreign, ..layout(2, 0) };
        let values : Vec<i16> = (0..8).map(|v| v * 300).collect();

        let mut cursor = Cursor::new(vec![0u8; layout.file_size() as usize]);
        write_item(&mut cursor, &layout, 2, bytemuck::cast_slice(&values)).unwrap();

        let raw = &cursor.get_ref()[118..120];
        assert_eq!(i16::from_ne_bytes([raw[1], raw[0]]), 300);

        let buffer = load_item(&mut cursor, foreign, (116, 16, 2)).unwrap();
        assert_eq!(buffer.as_slice::<i16>().unwrap(), values.as_slice());
    }

    #[test]
    fn write_plans() {
        let supported = [DataType::Int16, DataType::Float32];
        let current = layout(2, 0);

        let image = Image::from_vec(ArrayDim::new(4, 2, 1, 3), vec![1.5f32; 24]).unwrap();
        let (after, converted) = plan_write("test", &supported, &current, &image, 2).unwrap();
        assert_eq!(after.dim.n, 4);
        assert_eq!(converted.data_type(), DataType::Int16);
        assert_eq!(converted.as_slice::<i16>().unwrap()[0], 1);

        let (after, _) = plan_write("test", &supported, &current, &image.item(1).unwrap(), 1).unwrap();
        assert_eq!(after.dim.n, 2);

        let wrong = Image::with_dim(ArrayDim::from_xy(2, 4), DataType::Int16).unwrap();
        assert!(matches!(
            plan_write("test", &supported, &current, &wrong, 1),
            Err(EmError::DimensionMismatch{..})
        ));

        let bytes = Image::with_dim(ArrayDim::from_xy(4, 2), DataType::UInt8).unwrap();
        let fresh = StackLayout {
            dim : bytes.dim().with_n(0),
            data_type : bytes.data_type(),
            ..current
        };
        assert!(matches!(
            plan_write("test", &supported, &fresh, &bytes, 1),
            Err(EmError::UnsupportedDataType{data_type : DataType::UInt8, ..})
        ));
        assert!(plan_write("test", &supported, &current, &image, 0).is_err());
        assert!(matches!(
            plan_write("test", &supported, &current, &image, usize::MAX),
            Err(EmError::IndexOutOfRange{bound : 2, ..})
        ));
        assert!(matches!(
            plan_write("test", &supported, &current, &image, usize::MAX / 4),
            Err(EmError::IndexOutOfRange{bound : 2, ..})
        ));
    }

    #[test]
    fn oversized_extents() {
        let path = Path::new("huge.mrc");
        let side = 1usize << 21;
        let huge = StackLayout { dim : ArrayDim::new(side, side, side, 1), ..layout(1, 0) };
        assert_eq!(huge.checked_file_size(), None);
        assert!(matches!(huge.checked(path), Err(EmError::CorruptHeader{..})));

        let many = StackLayout { dim : ArrayDim::new(4, 2, 1, usize::MAX), ..layout(1, 0) };
        assert!(many.checked(path).is_err());

        let fine = layout(3, 20);
        assert_eq!(fine.checked_file_size(), Some(fine.file_size()));
        assert_eq!(fine.checked(path).unwrap(), fine);
    }

    #[test]
    fn write_targets() {
        let dir = assert_fs::TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b").join("image.mrc");

        assert!(matches!(
            prepare_target(&nested, &WriteOptions::new()),
            Err(EmError::NotFound(_))
        ));
        assert!(matches!(
            prepare_target(&nested, &WriteOptions::new().create_file(false).create_dirs(true)),
            Err(EmError::NotFound(_))
        ));
        assert!(!prepare_target(&nested, &WriteOptions::new().create_dirs(true)).unwrap());
        assert!(nested.parent().unwrap().is_dir());

        open_for_write(&nested, false).unwrap();
        assert!(prepare_target(&nested, &WriteOptions::new()).unwrap());
        assert!(!prepare_target(&nested, &WriteOptions::new().truncate(true)).unwrap());
    }
}
