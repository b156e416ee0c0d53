//! IMAGIC-5 files, a pair of `.hed` and `.img` files with
//! the same stem. The `.hed` file holds one 256-word header
//! per section, the `.img` file the raw sections back to back.

use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::fs::File;
use std::path::{Path, PathBuf};

use binrw::{BinRead, BinWrite, Endian};

use crate::data::image::{ArrayDim, Header, Image};
use crate::error::EmError;
use crate::formats::layout::{
    native_endian, open_for_write, plan_write, prepare_target,
    read_header_bytes, read_item, write_items, StackLayout,
};
use crate::formats::{ImageFormat, ImageInfo, WriteOptions};
use crate::types::{DataType, Value};

const HEADER_SIZE : usize = 1024;
const LITTLE_STAMP : [u8; 4] = [0x02; 4];
const BIG_STAMP : [u8; 4] = [0x04; 4];
/// Byte offset of `ifol` in a header
const IFOL_OFFSET : u64 = 4;

#[derive(BinRead, BinWrite, Debug, Clone)]
struct ImagicHeader {
    imn : i32,
    ifol : i32,
    ierror : i32,
    nhfr : i32,
    nmonth : i32,
    nday : i32,
    nyear : i32,
    nhour : i32,
    nminut : i32,
    nsec : i32,
    npix2 : i32,
    npixel : i32,
    /// Lines per section (y)
    ixlp1 : i32,
    /// Pixels per line (x)
    iylp1 : i32,
    type_code : [u8; 4],
    ixold : i32,
    iyold : i32,
    avdens : f32,
    sigma : f32,
    varian : f32,
    oldavd : f32,
    densmax : f32,
    densmin : f32,
    _reserved1 : [i32; 6],
    name : [u8; 80],
    _reserved2 : [i32; 11],
    izlp : i32,
    i4lp : i32,
    _reserved3 : [i32; 5],
    realtype : [u8; 4],
    _reserved4 : [i32; 188],
}

impl ImagicHeader {
    fn new(dim : ArrayDim, type_code : [u8; 4]) -> Self {
        let pixels = (dim.x * dim.y) as i32;
        ImagicHeader {
            imn : 1,
            ifol : 0,
            ierror : 0,
            nhfr : 1,
            nmonth : 0,
            nday : 0,
            nyear : 0,
            nhour : 0,
            nminut : 0,
            nsec : 0,
            npix2 : pixels,
            npixel : pixels,
            ixlp1 : dim.y as i32,
            iylp1 : dim.x as i32,
            type_code,
            ixold : 0,
            iyold : 0,
            avdens : 0.0,
            sigma : 0.0,
            varian : 0.0,
            oldavd : 0.0,
            densmax : 0.0,
            densmin : 0.0,
            _reserved1 : [0; 6],
            name : [b' '; 80],
            _reserved2 : [0; 11],
            izlp : dim.z.max(1) as i32,
            i4lp : 1,
            _reserved3 : [0; 5],
            realtype : match native_endian() {
                Endian::Little => LITTLE_STAMP,
                Endian::Big => BIG_STAMP,
            },
            _reserved4 : [0; 188],
        }
    }

    fn data_type(&self) -> Option<DataType> {
        match &self.type_code {
            b"PACK" => Some(DataType::UInt8),
            b"INTG" => Some(DataType::Int16),
            b"REAL" => Some(DataType::Float32),
            _ => None,
        }
    }

    fn type_code(data_type : DataType) -> Option<[u8; 4]> {
        match data_type {
            DataType::UInt8 => Some(*b"PACK"),
            DataType::Int16 => Some(*b"INTG"),
            DataType::Float32 => Some(*b"REAL"),
            _ => None,
        }
    }

    fn is_plausible(&self) -> bool {
        const LIMIT : i32 = 1 << 20;
        self.data_type().is_some()
        && [self.ixlp1, self.iylp1].iter().all(|&v| v > 0 && v < LIMIT)
        && self.ifol >= 0
    }

    /// The header of section `imn` (1-based, counting every
    /// section of every item), carrying the statistics of `item`
    fn for_section(&self, imn : usize, item : &Image) -> Self {
        let mut header = self.clone();
        header.imn = imn as i32;
        header.ifol = 0;
        match item.stats() {
            Some(stats) => {
                header.avdens = stats.mean as f32;
                header.sigma = stats.std as f32;
                header.varian = (stats.std * stats.std) as f32;
                header.densmax = stats.max as f32;
                header.densmin = stats.min as f32;
            },
            None => {
                header.avdens = 0.0;
                header.sigma = 0.0;
                header.varian = 0.0;
                header.densmax = 0.0;
                header.densmin = 0.0;
            },
        }
        header
    }

    fn values(&self) -> Header {
        let name = String::from_utf8_lossy(&self.name)
            .trim_end_matches(|c : char| c == ' ' || c == '\0')
            .to_string();
        let mut header = Header::new();
        header.insert("name".to_string(), Value::String(name));
        header.insert("mean".to_string(), Value::Float32(self.avdens));
        header.insert("std".to_string(), Value::Float32(self.sigma));
        header.insert("min".to_string(), Value::Float32(self.densmin));
        header.insert("max".to_string(), Value::Float32(self.densmax));
        header
    }
}

/// The `.hed` and `.img` paths for either member of a pair
fn paired_paths(path : &Path) -> (PathBuf, PathBuf) {
    (path.with_extension("hed"), path.with_extension("img"))
}

fn detect_endian(path : &Path, bytes : &[u8]) -> Result<Endian, EmError> {
    let stamp = &bytes[268..272];
    if stamp == LITTLE_STAMP {
        return Ok(Endian::Little);
    }
    if stamp == BIG_STAMP {
        return Ok(Endian::Big);
    }
    let guess = [Endian::Little, Endian::Big].into_iter().find(|&endian| {
        ImagicHeader::read_options(&mut Cursor::new(bytes), endian, ())
            .map(|header| header.is_plausible())
            .unwrap_or(false)
    });
    match guess {
        Some(endian) => {
            log::warn!(
                "{}: unrecognised realtype {:?}, assuming {:?} byte order",
                path.display(), stamp, endian
            );
            Ok(endian)
        },
        None => Err(EmError::corrupt_header(path, "not a valid IMAGIC header in either byte order")),
    }
}

/// Driver for IMAGIC `.hed`/`.img` pairs
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagicFormat;

impl ImagicFormat {
    /// Parses the first header of the `.hed` file. The layout
    /// returned describes the `.img` file.
    fn layout(&self, hed : &Path) -> Result<(ImagicHeader, StackLayout), EmError> {
        let bytes = read_header_bytes(hed, HEADER_SIZE)?;
        let endian = detect_endian(hed, &bytes)?;
        let header = ImagicHeader::read_options(&mut Cursor::new(&bytes), endian, ())
            .map_err(|err| EmError::from_binrw(hed, err))?;

        let data_type = header.data_type().ok_or_else(|| {
            EmError::corrupt_header(
                hed,
                format!("unsupported IMAGIC type '{}'", String::from_utf8_lossy(&header.type_code))
            )
        })?;
        let sections = header.ifol.max(0) as usize + 1;
        let z = header.izlp.max(1) as usize;
        if header.ixlp1 <= 0 || header.iylp1 <= 0 || sections % z != 0 {
            return Err(EmError::corrupt_header(
                hed,
                format!(
                    "invalid extent ({}, {}, {}) for {} sections",
                    header.iylp1, header.ixlp1, z, sections
                )
            ));
        }

        let layout = StackLayout {
            dim : ArrayDim::new(header.iylp1 as usize, header.ixlp1 as usize, z, sections / z),
            data_type,
            endian,
            header_size : 0,
            pad_size : 0,
        }.checked(hed)?;
        log::trace!("{}: {:?}", hed.display(), layout);
        Ok((header, layout))
    }

    /// Reads the header of the first section of item `index`
    fn item_header(
        &self,
        hed : &Path,
        layout : &StackLayout,
        index : usize
    ) -> Result<ImagicHeader, EmError> {
        let mut file = File::open(hed).map_err(|err| EmError::from_io(hed, err))?;
        let section = (index - 1) * layout.dim.z;
        file.seek(SeekFrom::Start((section * HEADER_SIZE) as u64))?;
        let mut bytes = vec![0u8; HEADER_SIZE];
        file.read_exact(&mut bytes).map_err(|_| {
            EmError::corrupt_header(hed, format!("missing header for item {}", index))
        })?;
        ImagicHeader::read_options(&mut Cursor::new(&bytes), layout.endian, ())
            .map_err(|err| EmError::from_binrw(hed, err))
    }
}

impl ImageFormat for ImagicFormat {
    fn name(&self) -> &'static str {
        "imagic"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["img", "hed"]
    }

    fn data_types(&self) -> &'static [DataType] {
        &[DataType::UInt8, DataType::Int16, DataType::Float32]
    }

    fn can_write(&self) -> bool {
        true
    }

    fn probe(&self, path : &Path) -> Result<ImageInfo, EmError> {
        let (hed, _) = paired_paths(path);
        self.layout(&hed).map(|(_, layout)| layout.info())
    }

    fn read_slice(&self, path : &Path, index : usize) -> Result<Image, EmError> {
        let (hed, img) = paired_paths(path);
        let (_, layout) = self.layout(&hed)?;
        let buffer = read_item(&img, &layout, index)?;
        let values = self.item_header(&hed, &layout, index)?.values();
        Image::from_parts(layout.dim.with_n(1), layout.data_type, buffer, values)
    }

    fn write_slice(
        &self,
        path : &Path,
        index : usize,
        image : &Image,
        options : &WriteOptions,
    ) -> Result<(), EmError> {
        let (hed, img) = paired_paths(path);
        let keep = prepare_target(&hed, options)?;
        if keep && !img.exists() {
            return Err(EmError::NotFound(img));
        }

        let (template, current) = if keep {
            self.layout(&hed)?
        } else {
            let type_code = ImagicHeader::type_code(image.data_type()).ok_or_else(|| {
                EmError::UnsupportedDataType {
                    format : self.name().to_string(),
                    data_type : image.data_type(),
                }
            })?;
            let layout = StackLayout {
                dim : image.dim().with_n(0),
                data_type : image.data_type(),
                endian : native_endian(),
                header_size : 0,
                pad_size : 0,
            };
            (ImagicHeader::new(image.dim(), type_code), layout)
        };

        let (layout, image) = plan_write(self.name(), self.data_types(), &current, image, index)?;
        let z = layout.dim.z.max(1);
        let written = index..index + image.dim().n;
        log::debug!(
            "Writing {} item(s) to {} at index {} ({} items after write)",
            image.dim().n, img.display(), index, layout.dim.n
        );

        let hed_file = open_for_write(&hed, keep)?;
        let mut headers = BufWriter::new(hed_file);
        let blank = Image::with_dim(layout.dim.with_n(1), layout.data_type)?;
        for item in 1..=layout.dim.n {
            let stats_source = if written.contains(&item) {
                image.item(item - index + 1)?
            } else if item > current.dim.n {
                blank.clone()
            } else {
                continue;
            };
            for section in 0..z {
                let imn = (item - 1) * z + section + 1;
                headers.seek(SeekFrom::Start(((imn - 1) * HEADER_SIZE) as u64))?;
                template.for_section(imn, &stats_source)
                    .write_options(&mut headers, layout.endian, ())?;
            }
        }
        let sections = (layout.dim.n * z) as i32;
        headers.seek(SeekFrom::Start(IFOL_OFFSET))?;
        (sections - 1).write_options(&mut headers, layout.endian, ())?;
        headers.flush()?;

        let img_file = open_for_write(&img, keep)?;
        let on_disk = img_file.metadata().map_err(|err| EmError::from_io(&img, err))?.len();
        if on_disk < layout.file_size() {
            img_file.set_len(layout.file_size()).map_err(|err| EmError::from_io(&img, err))?;
        }
        let mut data = BufWriter::new(img_file);
        write_items(&mut data, &layout, index, &image)?;
        data.flush()?;
        Ok(())
    }
}
