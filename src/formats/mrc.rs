//! MRC (MRC2014) files: `.mrc`, `.mrcs`, `.map`, `.st`, `.ali`.
//!
//! A 1024-byte header, an optional extended header of
//! `nsymbt` bytes, then the sections. Stacks of 2D images
//! are marked by space group 0 with `nz > 1` (or by the
//! `.mrcs` extension), stacks of volumes by space group 401
//! with `mz` sections per volume.

use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use binrw::{BinRead, BinWrite, Endian};

use crate::data::image::{ArrayDim, Header, Image};
use crate::error::EmError;
use crate::formats::layout::{
    native_endian, open_for_write, plan_write, prepare_target,
    read_header_bytes, read_item, write_items, StackLayout,
};
use crate::formats::{ImageFormat, ImageInfo, WriteOptions};
use crate::types::{DataType, Value};
use crate::utils::extension_of;

const HEADER_SIZE : usize = 1024;
/// Byte offset of the machine stamp
const STAMP_OFFSET : usize = 212;
const LITTLE_STAMP : [u8; 4] = [0x44, 0x44, 0, 0];
const BIG_STAMP : [u8; 4] = [0x11, 0x11, 0, 0];
const VOLUME_STACK_GROUP : i32 = 401;
const MRC2014 : i32 = 20140;

/// The 1024-byte MRC header, in file order
#[derive(BinRead, BinWrite, Debug, Clone)]
struct MrcHeader {
    nx : i32,
    ny : i32,
    nz : i32,
    mode : i32,
    nxstart : i32,
    nystart : i32,
    nzstart : i32,
    mx : i32,
    my : i32,
    mz : i32,
    /// Cell dimensions in angstroms
    cella : [f32; 3],
    /// Cell angles in degrees
    cellb : [f32; 3],
    mapc : i32,
    mapr : i32,
    maps : i32,
    dmin : f32,
    dmax : f32,
    dmean : f32,
    ispg : i32,
    nsymbt : i32,
    extra : [u8; 100],
    origin : [f32; 3],
    map : [u8; 4],
    machst : [u8; 4],
    rms : f32,
    nlabl : i32,
    labels : [[u8; 80]; 10],
}

impl MrcHeader {
    /// A header for a new native-endian file
    fn blank() -> Self {
        let mut extra = [0u8; 100];
        // nversion lives in word 28
        extra[12..16].copy_from_slice(&MRC2014.to_ne_bytes());
        MrcHeader {
            nx : 0, ny : 0, nz : 0, mode : 0,
            nxstart : 0, nystart : 0, nzstart : 0,
            mx : 0, my : 0, mz : 0,
            cella : [0.0; 3],
            cellb : [90.0; 3],
            mapc : 1, mapr : 2, maps : 3,
            dmin : 0.0, dmax : 0.0, dmean : 0.0,
            ispg : 0,
            nsymbt : 0,
            extra,
            origin : [0.0; 3],
            map : *b"MAP ",
            machst : match native_endian() {
                Endian::Little => LITTLE_STAMP,
                Endian::Big => BIG_STAMP,
            },
            rms : 0.0,
            nlabl : 0,
            labels : [[b' '; 80]; 10],
        }
    }

    fn data_type(&self) -> Option<DataType> {
        match self.mode {
            0 => Some(DataType::Int8),
            1 => Some(DataType::Int16),
            2 => Some(DataType::Float32),
            6 => Some(DataType::UInt16),
            _ => None,
        }
    }

    fn mode_for(data_type : DataType) -> Option<i32> {
        match data_type {
            DataType::Int8 => Some(0),
            DataType::Int16 => Some(1),
            DataType::Float32 => Some(2),
            DataType::UInt16 => Some(6),
            _ => None,
        }
    }

    /// Used only when the machine stamp is unreadable
    fn is_plausible(&self) -> bool {
        const LIMIT : i32 = 1 << 20;
        self.data_type().is_some()
        && [self.nx, self.ny, self.nz].iter().all(|&v| v > 0 && v < LIMIT)
        && self.nsymbt >= 0
    }

    fn pixel_size(&self) -> [f32; 3] {
        let sampling = [self.mx, self.my, self.mz];
        let mut size = [1.0f32; 3];
        for axis in 0..3 {
            if sampling[axis] > 0 && self.cella[axis] > 0.0 {
                size[axis] = self.cella[axis] / sampling[axis] as f32;
            }
        }
        size
    }

    /// Interprets `nz` as sections of a volume or items of a stack.
    fn dim(&self, stack_file : bool) -> ArrayDim {
        let (x, y, nz) = (self.nx as usize, self.ny as usize, self.nz as usize);
        let mz = self.mz.max(0) as usize;
        let stacked = stack_file
            || (self.ispg == 0 && nz > 1)
            || self.ispg >= VOLUME_STACK_GROUP;

        if !stacked {
            ArrayDim::new(x, y, nz, 1)
        } else if !stack_file && mz > 1 && mz <= nz && nz % mz == 0 {
            ArrayDim::new(x, y, mz, nz / mz)
        } else {
            ArrayDim::new(x, y, 1, nz)
        }
    }

    /// Rewrites the extent fields for `dim`, keeping the pixel size.
    fn set_dim(&mut self, dim : ArrayDim) {
        let pixel = self.pixel_size();
        self.nx = dim.x as i32;
        self.ny = dim.y as i32;
        self.nz = (dim.z * dim.n) as i32;
        self.mx = dim.x as i32;
        self.my = dim.y as i32;
        self.mz = dim.z as i32;
        self.cella = [
            pixel[0] * dim.x as f32,
            pixel[1] * dim.y as f32,
            pixel[2] * dim.z as f32,
        ];
        self.ispg = match (dim.z > 1, dim.n > 1) {
            (true, true) => VOLUME_STACK_GROUP,
            (true, false) => 1,
            (false, _) => 0,
        };
    }

    fn values(&self) -> Header {
        let pixel = self.pixel_size();
        let mut header = Header::new();
        header.insert("mode".to_string(), Value::Int32(self.mode));
        header.insert("space_group".to_string(), Value::Int32(self.ispg));
        header.insert("extended_header_bytes".to_string(), Value::Int32(self.nsymbt));
        header.insert("min".to_string(), Value::Float32(self.dmin));
        header.insert("max".to_string(), Value::Float32(self.dmax));
        header.insert("mean".to_string(), Value::Float32(self.dmean));
        header.insert("rms".to_string(), Value::Float32(self.rms));
        header.insert("pixel_size_x".to_string(), Value::Float32(pixel[0]));
        header.insert("pixel_size_y".to_string(), Value::Float32(pixel[1]));
        header.insert("pixel_size_z".to_string(), Value::Float32(pixel[2]));
        header
    }
}

/// Reads the machine stamp, falling back to whichever byte
/// order yields a sensible header.
fn detect_endian(path : &Path, bytes : &[u8]) -> Result<Endian, EmError> {
    match bytes[STAMP_OFFSET] {
        0x44 => return Ok(Endian::Little),
        0x11 => return Ok(Endian::Big),
        _ => {},
    }
    let guess = [Endian::Little, Endian::Big].into_iter().find(|&endian| {
        MrcHeader::read_options(&mut Cursor::new(bytes), endian, ())
            .map(|header| header.is_plausible())
            .unwrap_or(false)
    });
    match guess {
        Some(endian) => {
            log::warn!(
                "{}: unrecognised machine stamp {:?}, assuming {:?} byte order",
                path.display(), &bytes[STAMP_OFFSET..STAMP_OFFSET + 4], endian
            );
            Ok(endian)
        },
        None => Err(EmError::corrupt_header(path, "not a valid MRC header in either byte order")),
    }
}

fn is_stack_path(path : &Path) -> bool {
    extension_of(path) == "mrcs"
}

/// Driver for MRC files
#[derive(Debug, Clone, Copy, Default)]
pub struct MrcFormat;

impl MrcFormat {
    fn layout(&self, path : &Path) -> Result<(MrcHeader, StackLayout), EmError> {
        let bytes = read_header_bytes(path, HEADER_SIZE)?;
        let endian = detect_endian(path, &bytes)?;
        let header = MrcHeader::read_options(&mut Cursor::new(&bytes), endian, ())
            .map_err(|err| EmError::from_binrw(path, err))?;

        let data_type = header.data_type().ok_or_else(|| {
            EmError::corrupt_header(path, format!("unsupported MRC mode {}", header.mode))
        })?;
        if header.nx <= 0 || header.ny <= 0 || header.nz <= 0 || header.nsymbt < 0 {
            return Err(EmError::corrupt_header(
                path,
                format!(
                    "invalid extent ({}, {}, {}) or extended header size {}",
                    header.nx, header.ny, header.nz, header.nsymbt
                )
            ));
        }

        let layout = StackLayout {
            dim : header.dim(is_stack_path(path)),
            data_type,
            endian,
            header_size : (HEADER_SIZE + header.nsymbt as usize) as u64,
            pad_size : 0,
        }.checked(path)?;
        log::trace!("{}: {:?}", path.display(), layout);
        Ok((header, layout))
    }
}

impl ImageFormat for MrcFormat {
    fn name(&self) -> &'static str {
        "mrc"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["mrc", "mrcs", "map", "st", "ali"]
    }

    fn data_types(&self) -> &'static [DataType] {
        &[DataType::Int8, DataType::Int16, DataType::UInt16, DataType::Float32]
    }

    fn can_write(&self) -> bool {
        true
    }

    fn probe(&self, path : &Path) -> Result<ImageInfo, EmError> {
        self.layout(path).map(|(_, layout)| layout.info())
    }

    fn read_slice(&self, path : &Path, index : usize) -> Result<Image, EmError> {
        let (header, layout) = self.layout(path)?;
        let buffer = read_item(path, &layout, index)?;
        Image::from_parts(layout.dim.with_n(1), layout.data_type, buffer, header.values())
    }

    fn write_slice(
        &self,
        path : &Path,
        index : usize,
        image : &Image,
        options : &WriteOptions,
    ) -> Result<(), EmError> {
        if is_stack_path(path) && image.dim().z > 1 {
            return Err(EmError::DimensionMismatch {
                required : ArrayDim { z : 1, ..image.dim() },
                requested : image.dim(),
            });
        }

        let keep = prepare_target(path, options)?;
        let (mut header, current) = if keep {
            self.layout(path)?
        } else {
            (
                MrcHeader::blank(),
                StackLayout {
                    dim : image.dim().with_n(0),
                    data_type : image.data_type(),
                    endian : native_endian(),
                    header_size : HEADER_SIZE as u64,
                    pad_size : 0,
                }
            )
        };

        let (layout, image) = plan_write(self.name(), self.data_types(), &current, image, index)?;
        header.mode = MrcHeader::mode_for(layout.data_type).ok_or_else(|| {
            EmError::UnsupportedDataType {
                format : self.name().to_string(),
                data_type : layout.data_type,
            }
        })?;
        header.set_dim(layout.dim);
        if !keep {
            if let Some(stats) = image.stats() {
                header.dmin = stats.min as f32;
                header.dmax = stats.max as f32;
                header.dmean = stats.mean as f32;
                header.rms = stats.std as f32;
            }
        }

        let file = open_for_write(path, keep)?;
        let on_disk = file.metadata().map_err(|err| EmError::from_io(path, err))?.len();
        if on_disk < layout.file_size() {
            // zero-fills any items skipped over
            file.set_len(layout.file_size()).map_err(|err| EmError::from_io(path, err))?;
        }

        log::debug!(
            "Writing {} item(s) to {} at index {} ({} items after write)",
            image.dim().n, path.display(), index, layout.dim.n
        );
        let mut writer = BufWriter::new(file);
        writer.seek(SeekFrom::Start(0))?;
        header.write_options(&mut writer, layout.endian, ())?;
        write_items(&mut writer, &layout, index, &image)?;
        writer.flush()?;
        Ok(())
    }
}
