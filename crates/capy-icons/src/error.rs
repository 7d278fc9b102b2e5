//! Error types for capy-icons

use std::path::PathBuf;

/// Icon engine errors
#[derive(Debug, thiserror::Error)]
pub enum IconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Malformed XPM data: {0}")]
    Xpm(String),

    #[error("Unsupported icon extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("Not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    #[error("Image is not square: {width}x{height}")]
    NonSquare { width: u32, height: u32 },

    #[error("Pixel buffer of {len} bytes does not match {width}x{height}")]
    PixelDataLength { width: u32, height: u32, len: usize },

    #[error("Unusable image data: {0}")]
    ImageData(String),

    #[error("Data is not a PNG image")]
    NotPng,

    #[error("Icon name {name} is already registered for {}", .path.display())]
    NameTaken { name: String, path: PathBuf },

    #[error("No usable images in icon")]
    NoUsableImages,

    #[error("Invalid index.theme: {0}")]
    Theme(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IconError>;
