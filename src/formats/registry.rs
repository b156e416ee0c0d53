//! Lookup of format drivers by extension or format id.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::EmError;
use crate::formats::{ImageFormat, ImagicFormat, MrcFormat, SpiderFormat};
use crate::types::DataType;
use crate::utils::extension_of;

/// Registry of available image formats.
///
/// Every driver is reachable through its format id and
/// through each extension it claims. Keys are matched
/// case-insensitively and a leading dot is ignored, so
/// `"MRCS"`, `".mrcs"` and `"mrcs"` are the same key.
pub struct FormatRegistry {
    formats : Vec<Arc<dyn ImageFormat>>,
    by_key : HashMap<String, usize>,
}

fn normalize(key : &str) -> String {
    key.trim().trim_start_matches('.').to_ascii_lowercase()
}

impl FormatRegistry {
    /// A registry holding the built-in MRC, Spider and
    /// IMAGIC drivers.
    pub fn new() -> Self {
        let mut registry = FormatRegistry::empty();
        registry.register(Arc::new(MrcFormat));
        registry.register(Arc::new(SpiderFormat));
        registry.register(Arc::new(ImagicFormat));
        registry
    }

    /// A registry with no drivers at all
    pub fn empty() -> Self {
        FormatRegistry {
            formats : Vec::new(),
            by_key : HashMap::new(),
        }
    }

    /// The process-wide registry of built-in drivers, shared
    /// by every `ImageFile::new()`.
    pub fn builtin() -> Arc<FormatRegistry> {
        static BUILTIN : OnceLock<Arc<FormatRegistry>> = OnceLock::new();
        BUILTIN.get_or_init(|| Arc::new(FormatRegistry::new())).clone()
    }

    /// Registers `format` under its id and every extension it
    /// claims. A key already taken by another driver is moved
    /// to the new one.
    pub fn register(&mut self, format : Arc<dyn ImageFormat>) {
        let position = self.formats.len();
        log::debug!(
            "Registering image format '{}' for extensions {:?}",
            format.name(), format.extensions()
        );
        std::iter::once(format.name())
            .chain(format.extensions().iter().copied())
            .for_each(|key| {
                if let Some(previous) = self.by_key.insert(normalize(key), position) {
                    log::debug!(
                        "'{}' now resolves to '{}' instead of '{}'",
                        key, format.name(), self.formats[previous].name()
                    );
                }
            });
        self.formats.push(format);
    }

    /// True if a driver is registered for `key`, an extension
    /// or format id.
    pub fn has_impl(&self, key : &str) -> bool {
        self.get(key).is_some()
    }

    /// The driver registered for `key`, an extension or
    /// format id. Falls back on asking each driver whether it
    /// can handle `key`.
    pub fn get(&self, key : &str) -> Option<&Arc<dyn ImageFormat>> {
        let key = normalize(key);
        if key.is_empty() {
            return None;
        }
        match self.by_key.get(&key) {
            Some(&position) => self.formats.get(position),
            None => self.formats.iter().rev().find(|format| format.can_handle(&key)),
        }
    }

    /// The driver for `path`, chosen by its extension.
    ///
    /// ## Errors
    ///
    /// * `EmError::UnsupportedFormat` - no driver handles the extension
    pub fn for_path(&self, path : &Path) -> Result<&Arc<dyn ImageFormat>, EmError> {
        let extension = extension_of(path);
        self.get(&extension).ok_or_else(|| {
            EmError::UnsupportedFormat(
                if extension.is_empty() { path.display().to_string() } else { extension }
            )
        })
    }

    /// The element types of every registered format, one entry
    /// per format id however many extensions alias it.
    pub fn format_types(&self) -> BTreeMap<String, BTreeSet<DataType>> {
        self.formats.iter()
            .map(|format| {
                (format.name().to_string(), format.data_types().iter().copied().collect())
            })
            .collect()
    }

    /// The element types supported by the driver for `key`.
    /// An alias extension gives the same set as its format id.
    ///
    /// ## Errors
    ///
    /// * `EmError::UnsupportedFormat` - `key` resolves to no driver
    pub fn impl_types(&self, key : &str) -> Result<BTreeSet<DataType>, EmError> {
        self.get(key)
            .map(|format| format.data_types().iter().copied().collect())
            .ok_or_else(|| EmError::UnsupportedFormat(key.to_string()))
    }

    /// Every registered extension and format id
    pub fn keys(&self) -> BTreeSet<String> {
        self.by_key.keys().cloned().collect()
    }

    pub fn formats(&self) -> impl Iterator<Item = &Arc<dyn ImageFormat>> {
        self.formats.iter()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        FormatRegistry::new()
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.formats.iter().map(|format| format.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::image::Image;
    use crate::formats::ImageInfo;

    #[test]
    fn builtin_extensions() {
        let registry = FormatRegistry::new();
        for ext in ["mrc", "mrcs", "map", "spi", "spider", "stk", "img", "hed", "imagic"] {
            assert!(registry.has_impl(ext), "{} should be registered", ext);
        }
        assert!(registry.has_impl(".MRC"));
        assert!(!registry.has_impl("tiff"));
        assert!(!registry.has_impl(""));
        assert_eq!(registry.get("mrcs").unwrap().name(), "mrc");
        assert_eq!(registry.for_path(Path::new("/a/b/vol.MAP")).unwrap().name(), "mrc");
        assert!(matches!(
            registry.for_path(Path::new("/a/b/image.tif")),
            Err(EmError::UnsupportedFormat(ext)) if ext == "tif"
        ));
    }

    #[test]
    fn types_by_alias() {
        let registry = FormatRegistry::new();
        let format_types = registry.format_types();
        assert_eq!(format_types.len(), 3);
        assert_eq!(registry.impl_types("img").unwrap(), format_types["imagic"]);
        assert_eq!(registry.impl_types("spi").unwrap(), format_types["spider"]);
        assert_eq!(registry.impl_types("mrcs").unwrap(), format_types["mrc"]);
        assert!(format_types["spider"].contains(&DataType::Float32));
        assert!(matches!(registry.impl_types("xyz"), Err(EmError::UnsupportedFormat(_))));
    }

    struct Custom;

    impl ImageFormat for Custom {
        fn name(&self) -> &'static str { "custom" }
        fn extensions(&self) -> &'static [&'static str] { &["cst", "map"] }
        fn data_types(&self) -> &'static [DataType] { &[DataType::Float64] }
        fn probe(&self, path : &Path) -> Result<ImageInfo, EmError> {
            Err(EmError::NotFound(path.to_path_buf()))
        }
        fn read_slice(&self, path : &Path, _index : usize) -> Result<Image, EmError> {
            Err(EmError::NotFound(path.to_path_buf()))
        }
    }

    #[test]
    fn registering_more_formats() {
        let mut registry = FormatRegistry::empty();
        assert!(!registry.has_impl("mrc"));

        registry.register(Arc::new(MrcFormat));
        registry.register(Arc::new(Custom));
        assert_eq!(registry.get("map").unwrap().name(), "custom");
        assert_eq!(registry.get("mrc").unwrap().name(), "mrc");
        assert!(registry.keys().contains("cst"));
        assert_eq!(registry.formats().count(), 2);
        assert_eq!(registry.format_types().len(), 2);
    }
}
