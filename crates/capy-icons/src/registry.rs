//! Runtime icon registry.
//!
//! Icons handed over by live processes (window icons, tray pixmaps, files)
//! get a stable name and a file on disk, so they resolve exactly like theme
//! icons. Pixel icons are named by the SHA-256 of their pixel data.

use crate::error::{IconError, Result};
use crate::theme::{FALLBACK_THEME, size_distance};
use image::{ImageOutputFormat, RgbaImage};
use log::warn;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Extensions accepted for icon files, in lookup order.
pub const ICON_EXTENSIONS: [&str; 3] = ["png", "svg", "xpm"];

/// A raw image with pixels in ARGB byte order, row by row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgbImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ArgbImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Split an X11 `_NET_WM_ICON` value (width, height, then width*height
    /// ARGB words, repeated) into images. A truncated tail is dropped.
    pub fn from_x11_icon(data: &[u32]) -> Vec<ArgbImage> {
        let mut images = Vec::new();
        let mut rest = data;

        while let [width, height, tail @ ..] = rest {
            let len = (*width as usize).saturating_mul(*height as usize);
            if len == 0 || len > tail.len() {
                break;
            }
            let (words, next) = tail.split_at(len);
            let pixels = words.iter().flat_map(|w| w.to_be_bytes()).collect();
            images.push(ArgbImage::new(*width, *height, pixels));
            rest = next;
        }

        images
    }

    /// PNG encoding of a square image.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        if self.width != self.height {
            return Err(IconError::NonSquare {
                width: self.width,
                height: self.height,
            });
        }
        let expected = (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4);
        if self.width == 0 || self.pixels.len() != expected {
            return Err(IconError::PixelDataLength {
                width: self.width,
                height: self.height,
                len: self.pixels.len(),
            });
        }

        let rgba = self
            .pixels
            .chunks_exact(4)
            .flat_map(|p| [p[1], p[2], p[3], p[0]])
            .collect();
        encode_png(self.width, self.height, rgba)
    }
}

/// A raw image as carried by the notification `image-data` hint: rows of
/// `rowstride` bytes, each pixel `channels` samples of 8 bits, RGB or RGBA.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rowstride: u32,
    pub has_alpha: bool,
    pub bits_per_sample: u32,
    pub channels: u32,
    pub data: Vec<u8>,
}

impl ImageData {
    /// Icon name: hex SHA-256 over the geometry and the sample data.
    pub fn hash_name(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [self.width, self.height, self.rowstride, self.channels] {
            hasher.update(field.to_le_bytes());
        }
        hasher.update([u8::from(self.has_alpha)]);
        hasher.update(&self.data);
        hex::encode(hasher.finalize())
    }

    /// PNG encoding, dropping any row padding.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let bad = |what: String| IconError::ImageData(what);

        if self.bits_per_sample != 8 {
            return Err(bad(format!("{} bits per sample", self.bits_per_sample)));
        }
        match (self.channels, self.has_alpha) {
            (3, false) | (4, true) => {}
            (channels, has_alpha) => {
                return Err(bad(format!(
                    "{} channels with has_alpha={}",
                    channels, has_alpha
                )));
            }
        }
        if self.width == 0 || self.height == 0 {
            return Err(bad(format!("empty image {}x{}", self.width, self.height)));
        }

        let channels = self.channels as usize;
        let rowstride = self.rowstride as usize;
        let row_len = (self.width as usize)
            .checked_mul(channels)
            .filter(|len| *len <= rowstride)
            .ok_or_else(|| bad(format!("rowstride {} too small", self.rowstride)))?;
        // The last row may omit its padding.
        let needed = (self.height as usize - 1)
            .checked_mul(rowstride)
            .and_then(|n| n.checked_add(row_len))
            .filter(|n| *n <= self.data.len())
            .ok_or_else(|| bad(format!("{} bytes of data is too short", self.data.len())))?;

        let mut rgba = Vec::with_capacity(needed / channels * 4);
        for row in 0..self.height as usize {
            let start = row * rowstride;
            for pixel in self.data[start..start + row_len].chunks_exact(channels) {
                let alpha = if self.has_alpha { pixel[3] } else { 0xff };
                rgba.extend_from_slice(&[pixel[0], pixel[1], pixel[2], alpha]);
            }
        }
        encode_png(self.width, self.height, rgba)
    }
}

/// Encode an RGBA buffer as PNG.
pub(crate) fn encode_png(width: u32, height: u32, rgba: Vec<u8>) -> Result<Vec<u8>> {
    let len = rgba.len();
    let img = RgbaImage::from_raw(width, height, rgba).ok_or(IconError::PixelDataLength {
        width,
        height,
        len,
    })?;
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
    Ok(png)
}

/// Icon name for a set of images: hex SHA-256 over all pixel data.
pub fn content_hash(images: &[ArgbImage]) -> String {
    let mut hasher = Sha256::new();
    for image in images {
        hasher.update(&image.pixels);
    }
    hex::encode(hasher.finalize())
}

fn bytes_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Length of the path hash suffix in file icon names.
const PATH_HASH_LEN: usize = 16;

/// Flat icon name for a file path, e.g. `/opt/app/My Icon.png` ->
/// `opt.app.My_Icon.png.<hash>`.
///
/// Flattening is lossy (`a b` and `a_b`, `a/b` and `a.b`), so the name ends
/// with a hash of the full path to keep distinct files apart.
pub fn file_icon_name(path: &Path) -> String {
    let flat: String = path
        .to_string_lossy()
        .trim_start_matches('/')
        .chars()
        .map(|c| match c {
            '/' => '.',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '_',
        })
        .collect();
    let hash = bytes_hash(path.as_os_str().as_encoded_bytes());
    format!("{}.{}", flat, &hash[..PATH_HASH_LEN])
}

/// Check that `path` is a regular file with an icon extension.
pub fn validate_icon_file(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if !ext.is_some_and(|e| ICON_EXTENSIONS.contains(&e.as_str())) {
        return Err(IconError::UnsupportedExtension(path.to_path_buf()));
    }
    let meta = fs::metadata(path)?;
    if !meta.is_file() {
        return Err(IconError::NotRegularFile(path.to_path_buf()));
    }
    Ok(())
}

/// One size bucket of a registered pixel icon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SizedIcon {
    pub size: u32,
    pub path: PathBuf,
}

impl SizedIcon {
    pub fn distance(&self, size: u32) -> u32 {
        size_distance(self.size, self.size, size)
    }
}

/// Published runtime icons. Pixel icons live in the fallback theme, files
/// and PNG blobs in the loose namespace.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    themed: HashMap<String, Vec<SizedIcon>>,
    loose: HashMap<String, PathBuf>,
}

impl Registry {
    pub fn contains_themed(&self, name: &str) -> bool {
        self.themed.contains_key(name)
    }

    pub fn themed(&self, name: &str) -> &[SizedIcon] {
        self.themed.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains_loose(&self, name: &str) -> bool {
        self.loose.contains_key(name)
    }

    pub fn loose(&self, name: &str) -> Option<&Path> {
        self.loose.get(name).map(PathBuf::as_path)
    }

    /// Returns false if `name` was already registered.
    pub fn insert_themed(&mut self, name: String, icons: Vec<SizedIcon>) -> bool {
        if self.themed.contains_key(&name) {
            return false;
        }
        self.themed.insert(name, icons);
        true
    }

    /// Returns false if `name` already maps to `path`. A name is never
    /// moved to a different file.
    pub fn insert_loose(&mut self, name: String, path: PathBuf) -> Result<bool> {
        match self.loose.get(&name) {
            Some(existing) if *existing == path => Ok(false),
            Some(existing) => Err(IconError::NameTaken {
                name,
                path: existing.clone(),
            }),
            None => {
                self.loose.insert(name, path);
                Ok(true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.themed.len() + self.loose.len()
    }
}

/// Encode and persist the square images of a pixel icon under
/// `<session>/hicolor/<N>x<N>/apps/<name>.png`. Unusable images are logged
/// and skipped.
pub(crate) fn write_pixel_icon(
    session_dir: &Path,
    name: &str,
    images: &[ArgbImage],
) -> Vec<SizedIcon> {
    let mut written: Vec<SizedIcon> = Vec::new();

    for image in images {
        if image.width == image.height && written.iter().any(|s| s.size == image.width) {
            continue;
        }
        let png = match image.to_png() {
            Ok(png) => png,
            Err(e) => {
                warn!("Ignoring image of icon {}: {}", name, e);
                continue;
            }
        };

        let dir = session_dir
            .join(FALLBACK_THEME)
            .join(format!("{0}x{0}", image.width))
            .join("apps");
        let path = dir.join(format!("{}.png", name));
        if let Err(e) = fs::create_dir_all(&dir).and_then(|_| fs::write(&path, png)) {
            warn!("Could not write {}: {}", path.display(), e);
            continue;
        }
        written.push(SizedIcon {
            size: image.width,
            path,
        });
    }

    written
}

/// Persist an encoded PNG blob under `<session>/loose/<hash>.png`.
pub(crate) fn write_png_blob(session_dir: &Path, png: &[u8]) -> Result<(String, PathBuf)> {
    if !png.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Err(IconError::NotPng);
    }
    let name = bytes_hash(png);
    let path = write_loose_png(session_dir, &name, png)?;
    Ok((name, path))
}

/// Persist PNG bytes as `<session>/loose/<name>.png` unless already there.
pub(crate) fn write_loose_png(session_dir: &Path, name: &str, png: &[u8]) -> Result<PathBuf> {
    let dir = session_dir.join("loose");
    let path = dir.join(format!("{}.png", name));
    if !path.is_file() {
        fs::create_dir_all(&dir)?;
        fs::write(&path, png)?;
    }
    Ok(path)
}
