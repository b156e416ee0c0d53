use std::path::Path;

/// `with_pod_type!(data_type, T => { body }, fallback)`
///
/// Dispatches on a runtime `DataType`, binding the matching
/// Rust primitive to the type alias `T` inside `body`. Non-POD
/// tags (`Null`, `String`) evaluate `fallback` instead.
///
/// ```rust, ignore
/// let bytes = with_pod_type!(dtype, T => {
///     std::mem::size_of::<T>()
/// }, 0);
/// ```
macro_rules! with_pod_type {
    ($dtype : expr, $T : ident => $body : block, $fallback : expr) => {
        match $dtype {
            $crate::types::DataType::Int8 => { #[allow(dead_code)] type $T = i8; $body },
            $crate::types::DataType::UInt8 => { #[allow(dead_code)] type $T = u8; $body },
            $crate::types::DataType::Int16 => { #[allow(dead_code)] type $T = i16; $body },
            $crate::types::DataType::UInt16 => { #[allow(dead_code)] type $T = u16; $body },
            $crate::types::DataType::Int32 => { #[allow(dead_code)] type $T = i32; $body },
            $crate::types::DataType::UInt32 => { #[allow(dead_code)] type $T = u32; $body },
            $crate::types::DataType::Float32 => { #[allow(dead_code)] type $T = f32; $body },
            $crate::types::DataType::Float64 => { #[allow(dead_code)] type $T = f64; $body },
            $crate::types::DataType::Null | $crate::types::DataType::String => $fallback,
        }
    };
}

pub (crate) use with_pod_type;

/// Returns the lowercase extension of `path`, or an
/// empty string if it has none.
///
/// ```rust, ignore
/// assert_eq!(extension_of("path/to.from/kk.BINARY"), "binary");
/// assert_eq!(extension_of("a.b.c"), "c");
/// assert_eq!(extension_of("binary"), "");
/// ```
pub (crate) fn extension_of<P : AsRef<Path>>(path : P) -> String {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn extensions() {
        assert_eq!(extension_of("path/to.from/there/kk.binary"), "binary");
        assert_eq!(extension_of("kk.binary"), "binary");
        assert_eq!(extension_of("binary"), "");
        assert_eq!(extension_of("a.b.c"), "c");
        assert_eq!(extension_of("/data/STACK.MRCS"), "mrcs");
    }

    #[test]
    fn pod_dispatch() {
        let sizes : Vec<usize> = [
            DataType::Int8, DataType::UInt16, DataType::Float32,
            DataType::Float64, DataType::String
        ].iter().map(|dt| with_pod_type!(dt, T => {
            std::mem::size_of::<T>()
        }, 0)).collect();
        assert_eq!(sizes, vec![1, 2, 4, 8, 0]);
    }
}
