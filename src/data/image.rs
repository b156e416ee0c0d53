//! `Image`
//!
//! An owned, typed, multi-dimensional pixel array together
//! with the header values a format driver found for it.

mod buffer;
mod dimensions;
mod location;

use std::collections::BTreeMap;

use ndarray::prelude::*;

pub use buffer::PixelBuffer;
pub use dimensions::ArrayDim;
pub use location::ImageLocation;

use crate::error::EmError;
use crate::types::{cast_buffer, DataType, Element, Value};
use crate::utils::with_pod_type;

/// Named header values attached to an image, e.g. `"mode"`
/// or `"pixel_size_x"` for an MRC file.
pub type Header = BTreeMap<String, Value>;

/// Summary statistics over every element of an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    pub min : f64,
    pub max : f64,
    pub mean : f64,
    pub std : f64,
}

/// An image, stack or volume held in memory.
///
/// A freshly built `Image` has `DataType::Null`, a null
/// `ArrayDim` and no buffer. Reading a file replaces all
/// three. Elements are laid out `x` fastest, then `y`,
/// then `z`, then `n`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    dim : ArrayDim,
    data_type : DataType,
    buffer : PixelBuffer,
    header : Header,
}

impl Image {
    /// An empty image of type `Null`
    pub fn new() -> Self {
        Image::default()
    }

    /// A zero-filled image of the given extent and type.
    ///
    /// ## Errors
    ///
    /// * `EmError::UnsupportedDataType` - if `data_type` is
    /// not a numeric type
    pub fn with_dim(dim : ArrayDim, data_type : DataType) -> Result<Self, EmError> {
        let mut image = Image::new();
        image.resize(dim, data_type)?;
        Ok(image)
    }

    /// Builds an image that takes ownership of `values`.
    ///
    /// ## Example
    ///
    /// ```
    /// use emcore::{ArrayDim, DataType, Image};
    ///
    /// let image = Image::from_vec(ArrayDim::from_xy(3, 2), vec![0u16; 6]).unwrap();
    /// assert_eq!(image.data_type(), DataType::UInt16);
    /// assert_eq!(image.data_size(), 12);
    /// ```
    pub fn from_vec<T : Element>(dim : ArrayDim, values : Vec<T>) -> Result<Self, EmError> {
        if values.len() != dim.size() {
            return Err(EmError::DimensionMismatch {
                required : dim,
                requested : ArrayDim::new(values.len(), 1, 1, 1),
            });
        }
        Ok(Image {
            dim,
            data_type : T::DATA_TYPE,
            buffer : PixelBuffer::from_vec(values),
            header : Header::new(),
        })
    }

    /// Assembles an image from a buffer produced by a driver.
    /// The buffer length must match `dim` and `data_type`.
    pub (crate) fn from_parts(
        dim : ArrayDim,
        data_type : DataType,
        buffer : PixelBuffer,
        header : Header,
    ) -> Result<Self, EmError> {
        if buffer.len() != dim.size() * data_type.size() {
            return Err(EmError::DimensionMismatch {
                required : dim,
                requested : ArrayDim::new(buffer.len() / data_type.size().max(1), 1, 1, 1),
            });
        }
        Ok(Image { dim, data_type, buffer, header })
    }

    pub fn dim(&self) -> ArrayDim {
        self.dim
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Size of the pixel buffer in bytes
    /// (`dim.size() * data_type.size()`)
    pub fn data_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn data(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.buffer.as_bytes_mut()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Reallocates the buffer (zero-filled) for a new extent
    /// and type. Keeps the existing buffer if the byte size
    /// does not change.
    pub fn resize(&mut self, dim : ArrayDim, data_type : DataType) -> Result<(), EmError> {
        if !data_type.is_pod() {
            return Err(EmError::UnsupportedDataType {
                format : "image".to_string(),
                data_type,
            });
        }
        let len = dim.size() * data_type.size();
        if len != self.buffer.len() {
            self.buffer = PixelBuffer::zeroed(len);
        }
        self.dim = dim;
        self.data_type = data_type;
        Ok(())
    }

    fn check_type<T : Element>(&self) -> Result<(), EmError> {
        if T::DATA_TYPE != self.data_type {
            return Err(EmError::TypeMismatch {
                expected : self.data_type,
                found : T::DATA_TYPE,
            });
        }
        Ok(())
    }

    /// The pixels as a flat typed slice.
    ///
    /// ## Errors
    ///
    /// * `EmError::TypeMismatch` - if `T` is not the image's type
    pub fn as_slice<T : Element>(&self) -> Result<&[T], EmError> {
        self.check_type::<T>()?;
        self.buffer.as_slice::<T>()
    }

    pub fn as_mut_slice<T : Element>(&mut self) -> Result<&mut [T], EmError> {
        self.check_type::<T>()?;
        self.buffer.as_mut_slice::<T>()
    }

    /// A read-only 4D view of the pixels with shape `(n, z, y, x)`,
    /// for handing to numeric code.
    ///
    /// ## Example
    ///
    /// ```
    /// use emcore::{ArrayDim, Image};
    ///
    /// let image = Image::from_vec(ArrayDim::new(4, 3, 2, 1), vec![1.0f32; 24]).unwrap();
    /// let view = image.view::<f32>().unwrap();
    /// assert_eq!(view.shape(), &[1, 2, 3, 4]);
    /// ```
    pub fn view<T : Element>(&self) -> Result<ArrayView4<'_, T>, EmError> {
        let dim = self.dim;
        ArrayView4::from_shape(dim.shape(), self.as_slice::<T>()?)
            .map_err(|_| EmError::DimensionMismatch { required : dim, requested : dim })
    }

    pub fn view_mut<T : Element>(&mut self) -> Result<ArrayViewMut4<'_, T>, EmError> {
        let dim = self.dim;
        ArrayViewMut4::from_shape(dim.shape(), self.as_mut_slice::<T>()?)
            .map_err(|_| EmError::DimensionMismatch { required : dim, requested : dim })
    }

    /// An owned `f64` copy of the pixels, shape `(n, z, y, x)`
    pub fn to_array_f64(&self) -> Result<Array4<f64>, EmError> {
        let converted = cast_buffer(self.data(), self.data_type, DataType::Float64)?;
        let values = crate::types::read_elements::<f64>(&converted);
        Array4::from_shape_vec(self.dim.shape(), values)
            .map_err(|_| EmError::DimensionMismatch { required : self.dim, requested : self.dim })
    }

    /// A copy of this image with every element converted to
    /// `data_type`. The header is carried over.
    pub fn cast(&self, data_type : DataType) -> Result<Image, EmError> {
        let bytes = cast_buffer(self.data(), self.data_type, data_type)?;
        Image::from_parts(self.dim, data_type, PixelBuffer::from_bytes(&bytes), self.header.clone())
    }

    /// Copies out item `index` (1-based) of a stack as a
    /// single image with `n = 1`.
    pub fn item(&self, index : usize) -> Result<Image, EmError> {
        if index < 1 || index > self.dim.n {
            return Err(EmError::IndexOutOfRange { index, bound : self.dim.n });
        }
        let item_bytes = self.dim.item_size() * self.data_type.size();
        let start = (index - 1) * item_bytes;
        Image::from_parts(
            self.dim.with_n(1),
            self.data_type,
            PixelBuffer::from_bytes(&self.data()[start..start + item_bytes]),
            self.header.clone(),
        )
    }

    /// Minimum, maximum, mean and standard deviation of all
    /// elements, or `None` for an empty or untyped image.
    pub fn stats(&self) -> Option<ImageStats> {
        if self.buffer.is_empty() {
            return None;
        }
        with_pod_type!(self.data_type, T => {
            let values = self.buffer.as_slice::<T>().ok()?;
            let count = values.len() as f64;
            let (min, max, sum) = values.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY, 0.0),
                |(min, max, sum), &v| {
                    let v = v.to_f64();
                    (min.min(v), max.max(v), sum + v)
                }
            );
            let mean = sum / count;
            let variance = values.iter()
                .map(|&v| (v.to_f64() - mean).powi(2))
                .sum::<f64>() / count;
            Some(ImageStats { min, max, mean, std : variance.sqrt() })
        }, None)
    }
}

impl std::fmt::Display for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "Dimensions: {}", self.dim)?;
        writeln!(f, "Type: {}", self.data_type)?;
        writeln!(f, "Header: ")?;
        for (key, value) in &self.header {
            writeln!(f, "  {}: {}", key, value)?;
        }
        Ok(())
    }
}
