//! An owned, 8-byte aligned byte buffer. Every numeric
//! `Element` has an alignment of at most 8, so the bytes
//! can always be viewed as a typed slice in place.

use crate::error::EmError;
use crate::types::Element;

const WORD : usize = std::mem::size_of::<u64>();

#[derive(Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    words : Vec<u64>,
    len : usize,
}

impl PixelBuffer {
    /// A zero-filled buffer of `len` bytes
    pub fn zeroed(len : usize) -> Self {
        PixelBuffer {
            words : vec![0; (len + WORD - 1) / WORD],
            len,
        }
    }

    pub fn from_bytes(bytes : &[u8]) -> Self {
        let mut buffer = PixelBuffer::zeroed(bytes.len());
        buffer.as_bytes_mut().copy_from_slice(bytes);
        buffer
    }

    pub fn from_vec<T : Element>(values : Vec<T>) -> Self {
        PixelBuffer::from_bytes(bytemuck::cast_slice::<T, u8>(&values))
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.len]
    }

    pub fn as_slice<T : Element>(&self) -> Result<&[T], EmError> {
        Ok(bytemuck::try_cast_slice::<u8, T>(self.as_bytes())?)
    }

    pub fn as_mut_slice<T : Element>(&mut self) -> Result<&mut [T], EmError> {
        Ok(bytemuck::try_cast_slice_mut::<u8, T>(self.as_bytes_mut())?)
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "PixelBuffer({} bytes)", self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_views() {
        let mut buffer = PixelBuffer::zeroed(6);
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.as_bytes(), &[0; 6]);

        buffer.as_mut_slice::<u16>().unwrap()[1] = 0x0102;
        assert_eq!(buffer.as_slice::<u16>().unwrap(), &[0, 0x0102, 0]);

        // 6 bytes can't hold whole f64s
        assert!(buffer.as_slice::<f64>().is_err());

        let floats = PixelBuffer::from_vec(vec![1.5f32, -2.0, 3.25]);
        assert_eq!(floats.len(), 12);
        assert_eq!(floats.as_slice::<f32>().unwrap(), &[1.5, -2.0, 3.25]);
        assert!(PixelBuffer::default().is_empty());
    }
}
