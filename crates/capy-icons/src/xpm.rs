//! XPM decoding and the converted-icon store.
//!
//! XPM files are found in themes and pixmap directories but are not servable
//! as-is, so every XPM hit is converted to PNG once and the PNG is served.

use crate::error::{IconError, Result};
use crate::registry::encode_png;
use log::warn;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Header limits. Anything larger is not an icon.
const MAX_DIMENSION: usize = 4096;
const MAX_CHARS_PER_PIXEL: usize = 8;
const MAX_COLORS: usize = 1 << 16;

/// Decode XPM source into `(width, height, rgba)`.
pub fn decode(source: &str) -> Result<(u32, u32, Vec<u8>)> {
    let mut strings = source.lines().filter_map(quoted);

    let header = strings.next().ok_or_else(|| malformed("missing values line"))?;
    let values: Vec<usize> = header
        .split_whitespace()
        .take(4)
        .map(|v| v.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| malformed("bad values line"))?;
    let [width, height, ncolors, cpp] = values[..] else {
        return Err(malformed("values line needs four numbers"));
    };
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(malformed(&format!("unsupported size {}x{}", width, height)));
    }
    if cpp == 0 || cpp > MAX_CHARS_PER_PIXEL {
        return Err(malformed(&format!("unsupported {} characters per pixel", cpp)));
    }
    if ncolors == 0 || ncolors > MAX_COLORS {
        return Err(malformed(&format!("unsupported color count {}", ncolors)));
    }
    let row_len = width
        .checked_mul(cpp)
        .ok_or_else(|| malformed("row length overflows"))?;

    let mut palette: HashMap<&str, [u8; 4]> = HashMap::new();
    for _ in 0..ncolors {
        let line = strings.next().ok_or_else(|| malformed("truncated colors"))?;
        if line.len() < cpp || !line.is_char_boundary(cpp) {
            return Err(malformed("short color line"));
        }
        let (key, spec) = line.split_at(cpp);
        palette.insert(key, parse_color_spec(spec)?);
    }

    let mut rgba = Vec::new();
    for _ in 0..height {
        let row = strings.next().ok_or_else(|| malformed("truncated pixels"))?;
        if row.len() < row_len {
            return Err(malformed("short pixel row"));
        }
        for start in (0..row_len).step_by(cpp) {
            let key = row
                .get(start..start + cpp)
                .ok_or_else(|| malformed("non-ascii pixel row"))?;
            let color = palette
                .get(key)
                .ok_or_else(|| malformed(&format!("unknown color key '{}'", key)))?;
            rgba.extend_from_slice(color);
        }
    }

    let width = u32::try_from(width).map_err(|_| malformed("width out of range"))?;
    let height = u32::try_from(height).map_err(|_| malformed("height out of range"))?;
    Ok((width, height, rgba))
}

/// Decode XPM source and encode it as PNG.
pub fn to_png(source: &str) -> Result<Vec<u8>> {
    let (width, height, rgba) = decode(source)?;
    encode_png(width, height, rgba)
}

fn malformed(what: &str) -> IconError {
    IconError::Xpm(what.to_string())
}

fn quoted(line: &str) -> Option<&str> {
    let start = line.find('"')?;
    let end = line.rfind('"')?;
    (end > start).then(|| &line[start + 1..end])
}

fn parse_color_spec(spec: &str) -> Result<[u8; 4]> {
    const KEYS: [&str; 5] = ["c", "m", "g", "g4", "s"];

    let mut by_key: Vec<(&str, Vec<&str>)> = Vec::new();
    for token in spec.split_whitespace() {
        match by_key.last_mut() {
            Some((_, words)) if !KEYS.contains(&token) || words.is_empty() => words.push(token),
            _ => by_key.push((token, Vec::new())),
        }
    }

    let value = ["c", "g", "g4", "m"]
        .iter()
        .find_map(|k| by_key.iter().find(|(key, _)| key == k))
        .map(|(_, words)| words.join(" "))
        .ok_or_else(|| malformed(&format!("no color in '{}'", spec.trim())))?;

    parse_color(&value).ok_or_else(|| malformed(&format!("unknown color '{}'", value)))
}

fn parse_color(value: &str) -> Option<[u8; 4]> {
    if let Some(hex) = value.strip_prefix('#') {
        let channel = |i: usize, digits: usize| -> Option<u8> {
            let v = u16::from_str_radix(hex.get(i * digits..(i + 1) * digits)?, 16).ok()?;
            Some(match digits {
                1 => (v * 17) as u8,
                2 => v as u8,
                _ => (v >> (4 * (digits - 2))) as u8,
            })
        };
        let digits = match hex.len() {
            3 => 1,
            6 => 2,
            12 => 4,
            _ => return None,
        };
        return Some([channel(0, digits)?, channel(1, digits)?, channel(2, digits)?, 0xff]);
    }

    let rgb: [u8; 3] = match value.to_ascii_lowercase().replace(' ', "").as_str() {
        "none" | "transparent" => return Some(TRANSPARENT),
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" => [0, 255, 255],
        "magenta" => [255, 0, 255],
        "gray" | "grey" => [190, 190, 190],
        "darkgray" | "darkgrey" => [169, 169, 169],
        "lightgray" | "lightgrey" => [211, 211, 211],
        "dimgray" | "dimgrey" => [105, 105, 105],
        "orange" => [255, 165, 0],
        "brown" => [165, 42, 42],
        "navy" => [0, 0, 128],
        _ => return None,
    };
    Some([rgb[0], rgb[1], rgb[2], 0xff])
}

/// Converted PNGs for XPM files, memoized by source path.
#[derive(Debug)]
pub(crate) struct XpmStore {
    dir: PathBuf,
    converted: Mutex<HashMap<PathBuf, Option<PathBuf>>>,
}

impl XpmStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            converted: Mutex::new(HashMap::new()),
        }
    }

    /// PNG path for the XPM at `xpm`, converting on first use.
    /// Failed conversions are remembered and yield `None`.
    pub fn png_for(&self, xpm: &Path) -> Option<PathBuf> {
        let mut converted = self.converted.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = converted.get(xpm) {
            return cached.clone();
        }

        let result = match self.convert(xpm) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Error converting {}: {}", xpm.display(), e);
                None
            }
        };
        converted.insert(xpm.to_path_buf(), result.clone());
        result
    }

    fn convert(&self, xpm: &Path) -> Result<PathBuf> {
        let mut hasher = Sha256::new();
        hasher.update(xpm.as_os_str().as_encoded_bytes());
        let target = self.dir.join(format!("{}.png", hex::encode(hasher.finalize())));

        if !target.is_file() {
            let source = String::from_utf8_lossy(&fs::read(xpm)?).into_owned();
            let png = to_png(&source)?;
            fs::create_dir_all(&self.dir)?;
            fs::write(&target, png)?;
        }
        Ok(target)
    }
}
