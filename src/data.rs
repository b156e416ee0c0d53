//! In-memory image data.

pub mod image;
