//! Spider files: `.spi`, `.spider`, `.stk`, `.vol`, `.xmp`.
//!
//! Every value of a Spider header is a 32-bit float and the
//! header fills whole records of `nx * 4` bytes. Stacks have
//! an overall header followed, for each image, by a header
//! of the same size and the image data. There is no byte
//! order marker, so endianness is whichever order gives a
//! sensible header.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
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

/// Bytes of the header we parse. The on-disk header is this
/// rounded up to a whole number of records.
const HEADER_SIZE : usize = 1024;
const IFORM_IMAGE : f32 = 1.0;
const IFORM_VOLUME : f32 = 3.0;
/// Fourier formats, recognised but not readable
const IFORM_FOURIER : [f32; 4] = [-11.0, -12.0, -21.0, -22.0];
const STACK_MARKER : f32 = 2.0;

#[derive(BinRead, BinWrite, Debug, Clone)]
struct SpiderHeader {
    nz : f32,
    ny : f32,
    irec : f32,
    _unused4 : f32,
    iform : f32,
    imami : f32,
    fmax : f32,
    fmin : f32,
    av : f32,
    sig : f32,
    _unused11 : f32,
    nx : f32,
    labrec : f32,
    iangle : f32,
    phi : f32,
    theta : f32,
    gamma : f32,
    xoff : f32,
    yoff : f32,
    zoff : f32,
    scale : f32,
    labbyt : f32,
    lenbyt : f32,
    istack : f32,
    _unused25 : f32,
    maxim : f32,
    imgnum : f32,
    lastindx : f32,
    _unused29 : [f32; 2],
    kangle : f32,
    phi1 : f32,
    theta1 : f32,
    psi1 : f32,
    phi2 : f32,
    theta2 : f32,
    psi2 : f32,
    _reserved : [f32; 174],
    cdat : [u8; 12],
    ctim : [u8; 8],
    ctit : [u8; 160],
}

/// Header bytes for images `nx` pixels wide: whole records
/// of `nx` floats, at least 256 floats in total.
fn label_bytes(nx : usize) -> usize {
    let record = nx.max(1) * 4;
    (HEADER_SIZE + record - 1) / record * record
}

fn is_whole(value : f32) -> bool {
    value.is_finite() && value.fract() == 0.0
}

impl SpiderHeader {
    fn new(dim : ArrayDim, stacked : bool) -> Self {
        let lenbyt = dim.x * 4;
        let labbyt = label_bytes(dim.x);
        let labrec = labbyt / lenbyt.max(1);
        SpiderHeader {
            nz : dim.z as f32,
            ny : dim.y as f32,
            irec : (labrec + dim.y * dim.z) as f32,
            _unused4 : 0.0,
            iform : if dim.z > 1 { IFORM_VOLUME } else { IFORM_IMAGE },
            imami : 0.0,
            fmax : 0.0,
            fmin : 0.0,
            av : 0.0,
            sig : -1.0,
            _unused11 : 0.0,
            nx : dim.x as f32,
            labrec : labrec as f32,
            iangle : 0.0,
            phi : 0.0,
            theta : 0.0,
            gamma : 0.0,
            xoff : 0.0,
            yoff : 0.0,
            zoff : 0.0,
            scale : 1.0,
            labbyt : labbyt as f32,
            lenbyt : lenbyt as f32,
            istack : if stacked { STACK_MARKER } else { 0.0 },
            _unused25 : 0.0,
            maxim : if stacked { dim.n as f32 } else { 0.0 },
            imgnum : 0.0,
            lastindx : 0.0,
            _unused29 : [0.0; 2],
            kangle : 0.0,
            phi1 : 0.0,
            theta1 : 0.0,
            psi1 : 0.0,
            phi2 : 0.0,
            theta2 : 0.0,
            psi2 : 0.0,
            _reserved : [0.0; 174],
            cdat : [b' '; 12],
            ctim : [b' '; 8],
            ctit : [b' '; 160],
        }
    }

    fn is_plausible(&self) -> bool {
        const LIMIT : f32 = 1.0e8;
        let extent_ok = [self.nx, self.ny, self.nz]
            .iter()
            .all(|&v| is_whole(v) && v >= 1.0 && v < LIMIT);
        let form_ok = self.iform == IFORM_IMAGE
            || self.iform == IFORM_VOLUME
            || IFORM_FOURIER.contains(&self.iform);
        extent_ok && form_ok && is_whole(self.labbyt) && self.labbyt >= HEADER_SIZE as f32
    }

    fn is_stack(&self) -> bool {
        self.istack > 0.0
    }

    fn dim(&self) -> ArrayDim {
        let n = if self.is_stack() { self.maxim.max(0.0) as usize } else { 1 };
        ArrayDim::new(self.nx as usize, self.ny as usize, self.nz as usize, n)
    }

    /// Header of a single image inside a stack
    fn for_item(&self, index : usize, image : &Image) -> Self {
        let mut item = self.clone();
        item.istack = 0.0;
        item.maxim = 0.0;
        item.imgnum = index as f32;
        item.set_stats(image);
        item
    }

    fn set_stats(&mut self, image : &Image) {
        match image.stats() {
            Some(stats) => {
                self.imami = 1.0;
                self.fmin = stats.min as f32;
                self.fmax = stats.max as f32;
                self.av = stats.mean as f32;
                self.sig = stats.std as f32;
            },
            None => {
                self.imami = 0.0;
            },
        }
    }

    fn values(&self) -> Header {
        let mut header = Header::new();
        header.insert("iform".to_string(), Value::Float32(self.iform));
        header.insert("phi".to_string(), Value::Float32(self.phi));
        header.insert("theta".to_string(), Value::Float32(self.theta));
        header.insert("psi".to_string(), Value::Float32(self.gamma));
        header.insert("shift_x".to_string(), Value::Float32(self.xoff));
        header.insert("shift_y".to_string(), Value::Float32(self.yoff));
        header.insert("shift_z".to_string(), Value::Float32(self.zoff));
        header.insert("scale".to_string(), Value::Float32(self.scale));
        if self.imami > 0.0 {
            header.insert("min".to_string(), Value::Float32(self.fmin));
            header.insert("max".to_string(), Value::Float32(self.fmax));
            header.insert("mean".to_string(), Value::Float32(self.av));
            header.insert("std".to_string(), Value::Float32(self.sig));
        }
        header
    }
}

fn parse_header(path : &Path, bytes : &[u8], endian : Endian) -> Result<SpiderHeader, EmError> {
    SpiderHeader::read_options(&mut Cursor::new(bytes), endian, ())
        .map_err(|err| EmError::from_binrw(path, err))
}

/// Driver for Spider files
#[derive(Debug, Clone, Copy, Default)]
pub struct SpiderFormat;

impl SpiderFormat {
    fn layout(&self, path : &Path) -> Result<(SpiderHeader, StackLayout), EmError> {
        let bytes = read_header_bytes(path, HEADER_SIZE)?;

        let mut found = None;
        for endian in [Endian::Little, Endian::Big] {
            let header = parse_header(path, &bytes, endian)?;
            if header.is_plausible() {
                found = Some((header, endian));
                break;
            }
        }
        let (header, endian) = found.ok_or_else(|| {
            EmError::corrupt_header(path, "not a valid Spider header in either byte order")
        })?;
        log::debug!("{}: {:?} byte order", path.display(), endian);

        if header.iform != IFORM_IMAGE && header.iform != IFORM_VOLUME {
            return Err(EmError::corrupt_header(
                path,
                format!("Fourier Spider files (iform {}) are not supported", header.iform)
            ));
        }

        let labbyt = header.labbyt as u64;
        let layout = StackLayout {
            dim : header.dim(),
            data_type : DataType::Float32,
            endian,
            header_size : labbyt,
            pad_size : if header.is_stack() { labbyt } else { 0 },
        }.checked(path)?;
        log::trace!("{}: {:?}", path.display(), layout);
        Ok((header, layout))
    }

    /// Reads the header in front of item `index` of a stack.
    fn item_header(
        &self,
        path : &Path,
        layout : &StackLayout,
        index : usize
    ) -> Result<SpiderHeader, EmError> {
        let mut file = File::open(path).map_err(|err| EmError::from_io(path, err))?;
        file.seek(SeekFrom::Start(layout.item_offset(index) - layout.pad_size))?;
        let mut bytes = vec![0u8; HEADER_SIZE];
        file.read_exact(&mut bytes)?;
        parse_header(path, &bytes, layout.endian)
    }
}

impl ImageFormat for SpiderFormat {
    fn name(&self) -> &'static str {
        "spider"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["spi", "spider", "stk", "vol", "xmp"]
    }

    fn data_types(&self) -> &'static [DataType] {
        &[DataType::Float32]
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
        let values = if header.is_stack() {
            self.item_header(path, &layout, index)?.values()
        } else {
            header.values()
        };
        Image::from_parts(layout.dim.with_n(1), layout.data_type, buffer, values)
    }

    fn write_slice(
        &self,
        path : &Path,
        index : usize,
        image : &Image,
        options : &WriteOptions,
    ) -> Result<(), EmError> {
        let keep = prepare_target(path, options)?;
        let (mut header, current) = if keep {
            self.layout(path)?
        } else {
            let stacked = extension_of(path) == "stk" || index > 1 || image.dim().n > 1;
            let header = SpiderHeader::new(image.dim(), stacked);
            let labbyt = header.labbyt as u64;
            let layout = StackLayout {
                dim : image.dim().with_n(0),
                data_type : image.data_type(),
                endian : native_endian(),
                header_size : labbyt,
                pad_size : if stacked { labbyt } else { 0 },
            };
            (header, layout)
        };

        let (layout, image) = plan_write(self.name(), self.data_types(), &current, image, index)?;
        if !header.is_stack() && layout.dim.n > 1 {
            return Err(EmError::IndexOutOfRange {
                index : index + image.dim().n - 1,
                bound : 1,
            });
        }

        let file = open_for_write(path, keep)?;
        let on_disk = file.metadata().map_err(|err| EmError::from_io(path, err))?.len();
        if on_disk < layout.file_size() {
            file.set_len(layout.file_size()).map_err(|err| EmError::from_io(path, err))?;
        }
        log::debug!(
            "Writing {} item(s) to {} at index {} ({} items after write)",
            image.dim().n, path.display(), index, layout.dim.n
        );
        let mut writer = BufWriter::new(file);

        if header.is_stack() {
            let blank = Image::with_dim(layout.dim.with_n(1), layout.data_type)?;
            // gap items get a header too, so every slot in the stack is valid
            for item in (current.dim.n + 1)..index {
                writer.seek(SeekFrom::Start(layout.item_offset(item) - layout.pad_size))?;
                header.for_item(item, &blank).write_options(&mut writer, layout.endian, ())?;
            }
            for offset in 0..image.dim().n {
                let item = image.item(offset + 1)?;
                writer.seek(SeekFrom::Start(layout.item_offset(index + offset) - layout.pad_size))?;
                header.for_item(index + offset, &item).write_options(&mut writer, layout.endian, ())?;
            }
            header.maxim = layout.dim.n as f32;
            header.lastindx = layout.dim.n as f32;
        } else {
            header.set_stats(&image);
        }

        writer.seek(SeekFrom::Start(0))?;
        header.write_options(&mut writer, layout.endian, ())?;
        write_items(&mut writer, &layout, index, &image)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_records() {
        assert_eq!(label_bytes(16), 1024);
        assert_eq!(label_bytes(100), 1200);
        assert_eq!(label_bytes(1000), 4000);

        let mut cursor = Cursor::new(Vec::new());
        SpiderHeader::new(ArrayDim::from_xy(100, 50), false)
            .write_options(&mut cursor, Endian::Little, ())
            .unwrap();
        assert_eq!(cursor.get_ref().len(), HEADER_SIZE);
        // nx is word 12
        assert_eq!(&cursor.get_ref()[44..48], &100.0f32.to_le_bytes());
    }

    #[test]
    fn single_image_round_trip() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("image.spi");
        let values : Vec<f32> = (0..100 * 50).map(|v| v as f32 * 0.5).collect();
        let image = Image::from_vec(ArrayDim::from_xy(100, 50), values.clone()).unwrap();

        SpiderFormat.write_slice(&path, 1, &image, &WriteOptions::new()).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1200 + 100 * 50 * 4);

        let read = SpiderFormat.read_slice(&path, 1).unwrap();
        assert_eq!(read.dim(), ArrayDim::from_xy(100, 50));
        assert_eq!(read.as_slice::<f32>().unwrap(), values.as_slice());
        assert_eq!(read.header()["max"], Value::Float32(2499.5));

        // a single image file can't become a stack
        assert!(matches!(
            SpiderFormat.write_slice(&path, 2, &image, &WriteOptions::new()),
            Err(EmError::IndexOutOfRange{index : 2, bound : 1})
        ));
        assert!(matches!(
            SpiderFormat.read_slice(&path, 2),
            Err(EmError::IndexOutOfRange{index : 2, bound : 1})
        ));
    }

    #[test]
    fn stacks_with_gaps() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("particles.stk");
        let image = Image::from_vec(ArrayDim::from_xy(8, 8), vec![3.0f32; 64]).unwrap();

        SpiderFormat.write_slice(&path, 1, &image, &WriteOptions::new()).unwrap();
        SpiderFormat.write_slice(&path, 4, &image, &WriteOptions::new()).unwrap();

        let info = SpiderFormat.probe(&path).unwrap();
        assert_eq!(info.dim, ArrayDim::new(8, 8, 1, 4));
        assert_eq!(info.data_type, DataType::Float32);
        // 8-pixel records: 1024 bytes of header per image
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1024 + 4 * (1024 + 256));

        let gap = SpiderFormat.read_slice(&path, 2).unwrap();
        assert!(gap.as_slice::<f32>().unwrap().iter().all(|&v| v == 0.0));
        let last = SpiderFormat.read_slice(&path, 4).unwrap();
        assert_eq!(last.as_slice::<f32>().unwrap()[10], 3.0);
        assert_eq!(last.header()["mean"], Value::Float32(3.0));

        let ints = Image::from_vec(ArrayDim::from_xy(8, 8), vec![7i16; 64]).unwrap();
        SpiderFormat.write_slice(&path, 2, &ints, &WriteOptions::new()).unwrap();
        assert_eq!(SpiderFormat.read_slice(&path, 2).unwrap().as_slice::<f32>().unwrap()[0], 7.0);
    }

    #[test]
    fn byte_order_by_plausibility() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("big.spi");
        let mut cursor = Cursor::new(Vec::new());
        SpiderHeader::new(ArrayDim::from_xy(16, 4), false)
            .write_options(&mut cursor, Endian::Big, ())
            .unwrap();
        let mut bytes = cursor.into_inner();
        for v in 0..64 {
            bytes.extend_from_slice(&(v as f32).to_be_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();

        let image = SpiderFormat.read_slice(&path, 1).unwrap();
        assert_eq!(image.as_slice::<f32>().unwrap()[63], 63.0);
    }

    #[test]
    fn rejects_extents_too_large_to_address() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("huge.spi");
        let side = 50_000_000;
        let mut cursor = Cursor::new(Vec::new());
        SpiderHeader::new(ArrayDim::new(side, side, side, 1), false)
            .write_options(&mut cursor, Endian::Little, ())
            .unwrap();
        std::fs::write(&path, cursor.into_inner()).unwrap();

        assert!(matches!(SpiderFormat.probe(&path), Err(EmError::CorruptHeader{..})));
        assert!(matches!(SpiderFormat.read_slice(&path, 1), Err(EmError::CorruptHeader{..})));
    }

    #[test]
    fn rejects_other_types_for_new_files() {
        let dir = assert_fs::TempDir::new().unwrap();
        let image = Image::from_vec(ArrayDim::from_xy(4, 4), vec![1u8; 16]).unwrap();
        assert!(matches!(
            SpiderFormat.write_slice(&dir.path().join("bytes.spi"), 1, &image, &WriteOptions::new()),
            Err(EmError::UnsupportedDataType{data_type : DataType::UInt8, ..})
        ));
    }
}
