use std::path::{Path, PathBuf};

use crate::error::EmError;

/// Identifies one addressable image inside a file: the
/// path plus a 1-based index into a stack. No I/O happens
/// when a location is built.
///
/// ## Example
///
/// ```
/// use emcore::ImageLocation;
///
/// let first = ImageLocation::from_path("/path/to/stack.mrcs");
/// let mut second = ImageLocation::new("/path/to/stack.mrcs", 2);
/// assert_ne!(first, second);
///
/// second.index = ImageLocation::FIRST;
/// assert_eq!(first, second);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageLocation {
    pub path : PathBuf,
    pub index : usize,
}

impl ImageLocation {
    /// Index of the first image in a stack, or of a standalone image
    pub const FIRST : usize = 1;

    pub fn new<P : Into<PathBuf>>(path : P, index : usize) -> Self {
        ImageLocation { path : path.into(), index }
    }

    /// The location of the first (or only) image in `path`
    pub fn from_path<P : Into<PathBuf>>(path : P) -> Self {
        ImageLocation::new(path, ImageLocation::FIRST)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A bare path names its first image
impl From<&str> for ImageLocation {
    fn from(path : &str) -> Self {
        ImageLocation::from_path(path)
    }
}

impl From<String> for ImageLocation {
    fn from(path : String) -> Self {
        ImageLocation::from_path(path)
    }
}

impl From<&Path> for ImageLocation {
    fn from(path : &Path) -> Self {
        ImageLocation::from_path(path)
    }
}

impl From<PathBuf> for ImageLocation {
    fn from(path : PathBuf) -> Self {
        ImageLocation::from_path(path)
    }
}

impl From<&PathBuf> for ImageLocation {
    fn from(path : &PathBuf) -> Self {
        ImageLocation::from_path(path.clone())
    }
}

impl From<&ImageLocation> for ImageLocation {
    fn from(location : &ImageLocation) -> Self {
        location.clone()
    }
}

/// Formats as `index@path`
impl std::fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}@{}", self.index, self.path.display())
    }
}

/// Parses either `index@path` or a bare path (index `FIRST`).
impl std::str::FromStr for ImageLocation {
    type Err = EmError;

    fn from_str(s : &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((index, path)) => {
                let index = index.trim().parse::<usize>().map_err(|_| {
                    EmError::IOError(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("invalid image index '{}' in '{}'", index, s)
                    ))
                })?;
                if index < ImageLocation::FIRST {
                    return Err(EmError::IndexOutOfRange { index, bound : 0 });
                }
                Ok(ImageLocation::new(path, index))
            },
            None => Ok(ImageLocation::from_path(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_equality() {
        let path = "/path/to/image";
        let loc2 = ImageLocation::from_path(path);
        assert_eq!(loc2.index, ImageLocation::FIRST);
        assert_eq!(loc2.path(), Path::new(path));

        let mut loc3 = ImageLocation::new(path, 2);
        assert_eq!(loc3.path, PathBuf::from(path));
        assert_ne!(loc2, loc3);
        loc3.index = ImageLocation::FIRST;
        assert_eq!(loc2, loc3);

        loc3.path = PathBuf::from("/path/to/other");
        assert_ne!(loc2, loc3);
    }

    #[test]
    fn bare_paths() {
        let from_str : ImageLocation = "/data/image.spi".into();
        let from_path : ImageLocation = Path::new("/data/image.spi").into();
        assert_eq!(from_str, from_path);
        assert_eq!(from_str.index, ImageLocation::FIRST);
    }

    #[test]
    fn parse_locations() {
        let loc : ImageLocation = "12@/data/particles.mrcs".parse().unwrap();
        assert_eq!(loc, ImageLocation::new("/data/particles.mrcs", 12));
        assert_eq!(loc.to_string(), "12@/data/particles.mrcs");

        let bare : ImageLocation = "/data/volume.map".parse().unwrap();
        assert_eq!(bare.index, ImageLocation::FIRST);

        assert!("x@/data/particles.mrcs".parse::<ImageLocation>().is_err());
        assert!("0@/data/particles.mrcs".parse::<ImageLocation>().is_err());
    }
}
