//! Icon theme parsing and the theme catalog.

use crate::error::{IconError, Result};
use crate::ini::{IniGroup, parse_groups, split_list};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Id of the theme every search order ends with.
pub const FALLBACK_THEME: &str = "hicolor";

const THEME_GROUP: &str = "Icon Theme";
const DEFAULT_THRESHOLD: u32 = 2;

/// A size-typed icon directory of a theme, e.g. `32x32/apps`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IconDirectory {
    pub relative_path: String,
    pub min_size: u32,
    pub max_size: u32,
    pub context: String,
}

impl IconDirectory {
    /// Distance from `size` to this directory's size range, 0 when inside.
    pub fn distance(&self, size: u32) -> u32 {
        size_distance(self.min_size, self.max_size, size)
    }
}

pub(crate) fn size_distance(min_size: u32, max_size: u32, size: u32) -> u32 {
    if size < min_size {
        min_size - size
    } else if size > max_size {
        size - max_size
    } else {
        0
    }
}

/// A parsed `index.theme`.
#[derive(Clone, Debug, Serialize)]
pub struct Theme {
    pub id: String,
    pub title: String,
    pub comment: String,
    pub inherits: Vec<String>,
    pub directories: Vec<IconDirectory>,
}

impl Theme {
    /// Parse the content of an `index.theme` file for the theme `id`.
    pub fn parse(id: &str, content: &str) -> Result<Theme> {
        let groups = parse_groups(content);
        let Some((head, rest)) = groups.split_first() else {
            return Err(IconError::Theme(format!("{}: empty file", id)));
        };
        if head.name != THEME_GROUP {
            return Err(IconError::Theme(format!(
                "{}: expected '[{}]' at start, found '[{}]'",
                id, THEME_GROUP, head.name
            )));
        }

        let mut declared = Vec::new();
        for dir in split_list(head.get("Directories").unwrap_or_default()) {
            if declared.contains(&dir) {
                warn!("Theme {}: directory {} declared twice", id, dir);
            } else {
                declared.push(dir);
            }
        }

        let mut groups_by_name: HashMap<&str, &IniGroup> = HashMap::new();
        for group in rest {
            if !declared.contains(&group.name) {
                warn!("Theme {}: ignoring undeclared directory {}", id, group.name);
                continue;
            }
            if groups_by_name.contains_key(group.name.as_str()) {
                warn!("Theme {}: duplicate group {}, keeping the first", id, group.name);
                continue;
            }
            groups_by_name.insert(group.name.as_str(), group);
        }

        let directories: Vec<IconDirectory> = declared
            .iter()
            .filter_map(|name| match groups_by_name.get(name.as_str()) {
                Some(group) => parse_directory(id, group),
                None => {
                    debug!("Theme {}: no group for declared directory {}", id, name);
                    None
                }
            })
            .collect();

        if directories.is_empty() {
            return Err(IconError::Theme(format!("{}: no usable directories", id)));
        }

        Ok(Theme {
            id: id.to_string(),
            title: head.get("Name").unwrap_or_default().to_string(),
            comment: head.get("Comment").unwrap_or_default().to_string(),
            inherits: split_list(head.get("Inherits").unwrap_or_default()),
            directories,
        })
    }
}

fn parse_directory(theme_id: &str, group: &IniGroup) -> Option<IconDirectory> {
    let read = |key: &str| group.get(key).and_then(|v| v.parse::<u32>().ok());

    let Some(size) = read("Size") else {
        warn!("Theme {}: skipping {}, no usable Size", theme_id, group.name);
        return None;
    };

    let size_type = group.get("Type").unwrap_or("Threshold");
    let (min_size, max_size) = if size_type.eq_ignore_ascii_case("Fixed") {
        (size, size)
    } else if size_type.eq_ignore_ascii_case("Scalable") {
        (read("MinSize").unwrap_or(size), read("MaxSize").unwrap_or(size))
    } else if size_type.eq_ignore_ascii_case("Threshold") {
        let threshold = read("Threshold").unwrap_or(DEFAULT_THRESHOLD);
        (size.saturating_sub(threshold), size.saturating_add(threshold))
    } else {
        warn!(
            "Theme {}: skipping {}, unknown Type '{}'",
            theme_id, group.name, size_type
        );
        return None;
    };

    if min_size > max_size {
        warn!(
            "Theme {}: skipping {}, MinSize {} above MaxSize {}",
            theme_id, group.name, min_size, max_size
        );
        return None;
    }

    Some(IconDirectory {
        relative_path: group.name.clone(),
        min_size,
        max_size,
        context: group.get("Context").unwrap_or_default().to_string(),
    })
}

/// All themes found under a set of roots.
///
/// `locations` lists, per theme id, every root holding a directory of that
/// name, in root precedence order. Only the first root defines the theme, but
/// icon files are looked up under all of them.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    themes: HashMap<String, Theme>,
    locations: HashMap<String, Vec<PathBuf>>,
}

impl Catalog {
    /// Scan `roots` (highest precedence first) for `*/index.theme`.
    pub fn scan(roots: &[PathBuf]) -> Catalog {
        let mut themes: HashMap<String, Theme> = HashMap::new();

        for root in roots {
            for index_path in index_files(root) {
                let Some(id) = theme_id(&index_path) else {
                    continue;
                };
                if themes.contains_key(&id) {
                    debug!("Theme {} already defined, ignoring {}", id, index_path.display());
                    continue;
                }
                match read_theme(&id, &index_path) {
                    Ok(theme) => {
                        themes.insert(id, theme);
                    }
                    Err(e) => warn!("Skipping {}: {}", index_path.display(), e),
                }
            }
        }

        let mut locations: HashMap<String, Vec<PathBuf>> = HashMap::new();
        let mut seen = HashSet::new();
        for root in roots {
            if !seen.insert(root) {
                continue;
            }
            for id in themes.keys() {
                if root.join(id).is_dir() {
                    locations.entry(id.clone()).or_default().push(root.clone());
                }
            }
        }

        info!("Icon theme scan found {} themes", themes.len());
        Catalog { themes, locations }
    }

    pub fn get(&self, id: &str) -> Option<&Theme> {
        self.themes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.themes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// Roots holding icon files for `id`.
    pub fn locations(&self, id: &str) -> &[PathBuf] {
        self.locations.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Themes sorted by id.
    pub fn themes(&self) -> Vec<&Theme> {
        let mut list: Vec<&Theme> = self.themes.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Find a theme by id, falling back to its human readable title.
    pub fn find(&self, name: &str) -> Option<&Theme> {
        self.themes
            .get(name)
            .or_else(|| self.themes().into_iter().find(|t| t.title == name))
    }
}

fn index_files(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        debug!("Skipping missing icon root {}", root.display());
        return Vec::new();
    }

    walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path().join("index.theme"))
        .filter(|p| p.is_file())
        .collect()
}

fn theme_id(index_path: &Path) -> Option<String> {
    let id = index_path.parent()?.file_name()?.to_str()?;
    Some(id.to_string())
}

fn read_theme(id: &str, index_path: &Path) -> Result<Theme> {
    let content = fs::read_to_string(index_path)?;
    Theme::parse(id, &content)
}
