//! Element types shared by image pixels and table fields.
//!
//! `DataType` is a closed set of tags. The numeric tags are
//! plain-old-data and map onto Rust primitives through the
//! `Element` trait; `String` only exists as a table field
//! type, and `Null` marks something not yet typed.

mod value;

pub use value::{Value, FromValue};

use crate::error::EmError;
use crate::utils::with_pod_type;

/// Closed enumeration of pixel and field element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DataType {
    #[default]
    Null,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
    String,
}

impl DataType {
    /// All non-null tags, in declaration order.
    pub const ALL : [DataType; 9] = [
        DataType::Int8, DataType::UInt8, DataType::Int16, DataType::UInt16,
        DataType::Int32, DataType::UInt32, DataType::Float32, DataType::Float64,
        DataType::String,
    ];

    /// Short lowercase name of the type, e.g. `"int16"` or `"float"`
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Null => "null",
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::UInt16 => "uint16",
            DataType::Int32 => "int32",
            DataType::UInt32 => "uint32",
            DataType::Float32 => "float",
            DataType::Float64 => "double",
            DataType::String => "string",
        }
    }

    /// Size in bytes of one element. `Null` and `String`
    /// have no fixed element size and report 0.
    pub fn size(&self) -> usize {
        with_pod_type!(self, T => { std::mem::size_of::<T>() }, 0)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataType::Null)
    }

    /// True for every numeric type, i.e. those that can
    /// live in a pixel buffer
    pub fn is_pod(&self) -> bool {
        !matches!(self, DataType::Null | DataType::String)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::UInt8 | DataType::Int16 | DataType::UInt16
            | DataType::Int32 | DataType::UInt32
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Guesses the narrowest type able to hold the text `s`.
    ///
    /// * `Int32` - if the trimmed text parses as an `i32`
    /// * `Float32` - if it parses as a floating point number
    /// written with digits. `"nan"` and `"inf"` are words.
    /// * `String` - otherwise
    ///
    /// ## Example
    ///
    /// ```
    /// use emcore::DataType;
    ///
    /// assert_eq!(DataType::infer_from_string("100"), DataType::Int32);
    /// assert_eq!(DataType::infer_from_string("100.00"), DataType::Float32);
    /// assert_eq!(DataType::infer_from_string("192.168.100.1"), DataType::String);
    /// ```
    pub fn infer_from_string(s : &str) -> DataType {
        let s = s.trim();
        if s.parse::<i32>().is_ok() {
            DataType::Int32
        } else if starts_with_digit(s) && s.parse::<f64>().is_ok() {
            DataType::Float32
        } else {
            DataType::String
        }
    }
}

fn starts_with_digit(s : &str) -> bool {
    s.trim_start_matches(|c| c == '+' || c == '-')
        .starts_with(|c : char| c.is_ascii_digit() || c == '.')
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DataType {
    type Err = EmError;

    fn from_str(s : &str) -> Result<Self, Self::Err> {
        std::iter::once(DataType::Null)
            .chain(DataType::ALL)
            .find(|dt| dt.name() == s)
            .ok_or_else(|| EmError::UnknownType(s.to_string()))
    }
}

/// Rust primitives that can be stored in a pixel buffer.
pub trait Element : bytemuck::Pod + Send + Sync + 'static {
    const DATA_TYPE : DataType;

    fn to_f64(self) -> f64;

    /// Converts with `as` semantics: floats going to integers
    /// truncate toward zero and saturate at the type bounds,
    /// NaN becomes 0.
    fn from_f64(value : f64) -> Self;
}

macro_rules! impl_element {
    ($($t : ty => $dt : ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DATA_TYPE : DataType = DataType::$dt;

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value : f64) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_element!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
);

/// Reads the elements of type `T` out of a byte slice
/// of any alignment.
pub (crate) fn read_elements<T : Element>(bytes : &[u8]) -> Vec<T> {
    bytes.chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect()
}

/// Converts a buffer of `from` elements into a freshly
/// allocated buffer of `to` elements, element by element.
///
/// ## Arguments
///
/// * `bytes` - Native-endian elements of type `from`
/// * `from` - Type of the elements in `bytes`
/// * `to` - Type of the elements to produce
///
/// ## Errors
///
/// * `EmError::TypeMismatch` - if either type is not POD
pub fn cast_buffer(bytes : &[u8], from : DataType, to : DataType) -> Result<Vec<u8>, EmError> {
    let mismatch = EmError::TypeMismatch { expected : to, found : from };
    if !to.is_pod() {
        return Err(mismatch);
    }
    if from == to {
        return Ok(bytes.to_vec());
    }
    with_pod_type!(from, S => {
        let values = read_elements::<S>(bytes);
        with_pod_type!(to, D => {
            let converted : Vec<D> = values.iter()
                .map(|&v| D::from_f64(v.to_f64()))
                .collect();
            Ok(bytemuck::cast_slice::<D, u8>(&converted).to_vec())
        }, Err(mismatch))
    }, Err(mismatch))
}

/// Reverses the byte order of every `elem_size`-byte
/// element in `bytes`, in place.
pub fn swap_bytes(bytes : &mut [u8], elem_size : usize) {
    if elem_size < 2 {
        return;
    }
    bytes.chunks_exact_mut(elem_size).for_each(|elem| elem.reverse());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_properties() {
        assert_eq!(DataType::Int32.name(), "int32");
        assert!(DataType::Int32.is_pod());
        assert_eq!(DataType::Int32.size(), std::mem::size_of::<i32>());

        assert_eq!(DataType::Float32.name(), "float");
        assert_eq!(DataType::Float32.size(), 4);
        assert_eq!(DataType::Float64.name(), "double");
        assert_eq!(DataType::Float64.size(), 8);
        assert_eq!(DataType::Int8.size(), 1);

        assert!(DataType::Null.is_null());
        assert!(!DataType::String.is_pod());
        assert!(!DataType::Float32.is_null());
        assert_eq!(DataType::default(), DataType::Null);
        assert_ne!(DataType::Int16, DataType::UInt16);
    }

    #[test]
    fn names_round_trip() {
        for dt in DataType::ALL {
            assert_eq!(dt.name().parse::<DataType>().unwrap(), dt);
        }
        assert!("complex".parse::<DataType>().is_err());
    }

    #[test]
    fn infer_types() {
        assert_eq!(DataType::infer_from_string("100"), DataType::Int32);
        assert_eq!(DataType::infer_from_string("100.00"), DataType::Float32);
        assert_eq!(DataType::infer_from_string("192.168.100.1"), DataType::String);
        assert_eq!(DataType::infer_from_string("/this/is/a/path"), DataType::String);
        assert_eq!(DataType::infer_from_string("100 3.4 4.5 abc"), DataType::String);
        assert_eq!(DataType::infer_from_string(" 3.4 "), DataType::Float32);
        assert_eq!(DataType::infer_from_string("-.5e3"), DataType::Float32);
        assert_eq!(DataType::infer_from_string("1e999"), DataType::Float32);
        for word in ["nan", "NaN", "inf", "-inf", "+Infinity", "infinity"] {
            assert_eq!(DataType::infer_from_string(word), DataType::String, "{}", word);
        }
    }

    #[test]
    fn cast_float_to_int() {
        let floats : Vec<f32> = (0..10).map(|i| i as f32 * 10.0 + 0.25).collect();
        let ints = cast_buffer(
            bytemuck::cast_slice(&floats),
            DataType::Float32,
            DataType::Int32
        ).unwrap();
        let ints = read_elements::<i32>(&ints);
        for (f, i) in floats.iter().zip(ints.iter()) {
            assert_eq!(f.trunc(), *i as f32);
        }

        // saturates rather than wrapping
        let big = cast_buffer(
            bytemuck::cast_slice(&[300.0f64, -5.0]),
            DataType::Float64,
            DataType::UInt8
        ).unwrap();
        assert_eq!(big, vec![255, 0]);

        assert!(cast_buffer(&[0, 0], DataType::Int16, DataType::String).is_err());
    }

    #[test]
    fn swapping() {
        let mut bytes = vec![1, 2, 3, 4, 5, 6, 7, 8];
        swap_bytes(&mut bytes, 4);
        assert_eq!(bytes, vec![4, 3, 2, 1, 8, 7, 6, 5]);
        swap_bytes(&mut bytes, 1);
        assert_eq!(bytes, vec![4, 3, 2, 1, 8, 7, 6, 5]);
    }
}
