//! `Value` holds exactly one element of any `DataType`.
//! It is the payload of every table field and of the
//! per-image header entries filled in by format drivers.

use crate::error::EmError;
use crate::types::DataType;

/// A single `DataType`-tagged value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
    String(String),
}

/// Dispatches over the numeric variants of a `Value`,
/// binding the contained primitive to `$v`.
macro_rules! numeric_value {
    ($value : expr, $v : ident => $body : expr, $other : pat => $fallback : expr) => {
        match $value {
            Value::Int8($v) => $body,
            Value::UInt8($v) => $body,
            Value::Int16($v) => $body,
            Value::UInt16($v) => $body,
            Value::Int32($v) => $body,
            Value::UInt32($v) => $body,
            Value::Float32($v) => $body,
            Value::Float64($v) => $body,
            $other => $fallback,
        }
    };
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Int8(_) => DataType::Int8,
            Value::UInt8(_) => DataType::UInt8,
            Value::Int16(_) => DataType::Int16,
            Value::UInt16(_) => DataType::UInt16,
            Value::Int32(_) => DataType::Int32,
            Value::UInt32(_) => DataType::UInt32,
            Value::Float32(_) => DataType::Float32,
            Value::Float64(_) => DataType::Float64,
            Value::String(_) => DataType::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value as an `f64`, if it is numeric. Exact for
    /// every numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        numeric_value!(self, v => Some(*v as f64), _ => None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts the value to `target`.
    ///
    /// * Numeric to integer - allowed when the value is finite and
    /// fits the target range; fractional parts truncate toward zero.
    /// * Numeric to float - always allowed (`Float64` to `Float32`
    /// rounds to the nearest representable value).
    /// * `String` only converts to `String`, `Null` only to `Null`.
    ///
    /// ## Errors
    ///
    /// * `EmError::TypeMismatch` - for any other combination, or
    /// when a number does not fit the target integer type.
    ///
    /// ## Example
    ///
    /// ```
    /// use emcore::{DataType, Value};
    ///
    /// assert_eq!(Value::Int32(300).cast(DataType::Int16).unwrap(), Value::Int16(300));
    /// assert!(Value::Int32(70000).cast(DataType::Int16).is_err());
    /// assert!(Value::from("abc").cast(DataType::Float32).is_err());
    /// ```
    pub fn cast(&self, target : DataType) -> Result<Value, EmError> {
        let mismatch = || EmError::TypeMismatch {
            expected : target,
            found : self.data_type(),
        };

        if self.data_type() == target {
            return Ok(self.clone());
        }

        let number = match self.as_f64() {
            Some(number) => number,
            None => return Err(mismatch()),
        };

        macro_rules! checked_int {
            ($t : ty, $variant : ident) => {{
                if number.is_finite()
                    && number.trunc() >= <$t>::MIN as f64
                    && number.trunc() <= <$t>::MAX as f64 {
                    Ok(Value::$variant(number as $t))
                } else {
                    Err(mismatch())
                }
            }};
        }

        match target {
            DataType::Int8 => checked_int!(i8, Int8),
            DataType::UInt8 => checked_int!(u8, UInt8),
            DataType::Int16 => checked_int!(i16, Int16),
            DataType::UInt16 => checked_int!(u16, UInt16),
            DataType::Int32 => checked_int!(i32, Int32),
            DataType::UInt32 => checked_int!(u32, UInt32),
            DataType::Float32 => Ok(Value::Float32(number as f32)),
            DataType::Float64 => Ok(Value::Float64(number)),
            DataType::Null | DataType::String => Err(mismatch()),
        }
    }

    /// Parses `text` as a value of type `data_type`.
    ///
    /// ## Errors
    ///
    /// * `EmError::TypeMismatch` - if the text is not a valid
    /// literal of that type.
    pub fn parse(text : &str, data_type : DataType) -> Result<Value, EmError> {
        let text = text.trim();
        let mismatch = || EmError::TypeMismatch {
            expected : data_type,
            found : DataType::String,
        };

        macro_rules! parse_as {
            ($t : ty, $variant : ident) => {
                text.parse::<$t>().map(Value::$variant).map_err(|_| mismatch())
            };
        }

        match data_type {
            DataType::Null => Ok(Value::Null),
            DataType::Int8 => parse_as!(i8, Int8),
            DataType::UInt8 => parse_as!(u8, UInt8),
            DataType::Int16 => parse_as!(i16, Int16),
            DataType::UInt16 => parse_as!(u16, UInt16),
            DataType::Int32 => parse_as!(i32, Int32),
            DataType::UInt32 => parse_as!(u32, UInt32),
            DataType::Float32 => parse_as!(f32, Float32),
            DataType::Float64 => parse_as!(f64, Float64),
            DataType::String => Ok(Value::String(text.to_string())),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            other => numeric_value!(other, v => write!(f, "{}", v), _ => Ok(())),
        }
    }
}

macro_rules! value_from {
    ($($t : ty => $variant : ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v : $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
    String => String,
);

impl From<&str> for Value {
    fn from(v : &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v : &String) -> Self {
        Value::String(v.clone())
    }
}

/// Extraction of a Rust value out of a `Value`, applying
/// the conversion rules of `Value::cast`.
pub trait FromValue : Sized {
    fn from_value(value : &Value) -> Result<Self, EmError>;
}

macro_rules! from_value {
    ($($t : ty => $variant : ident),* $(,)?) => {
        $(
            impl FromValue for $t {
                fn from_value(value : &Value) -> Result<Self, EmError> {
                    match value.cast(DataType::$variant)? {
                        Value::$variant(v) => Ok(v),
                        other => Err(EmError::TypeMismatch {
                            expected : DataType::$variant,
                            found : other.data_type(),
                        }),
                    }
                }
            }
        )*
    };
}

from_value!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
    String => String,
);

impl FromValue for Value {
    fn from_value(value : &Value) -> Result<Self, EmError> {
        Ok(value.clone())
    }
}
