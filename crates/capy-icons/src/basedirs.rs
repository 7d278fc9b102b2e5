//! The set of filesystem roots scanned for themes and loose icons.

use crate::paths;
use std::path::{Path, PathBuf};

/// What a root is searched for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootKind {
    /// Holds theme directories and loose icons.
    Themes,
    /// Holds loose icons only, like `/usr/share/pixmaps`.
    Pixmaps,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseDir {
    pub path: PathBuf,
    pub kind: RootKind,
}

/// Ordered, duplicate free list of base directories, highest precedence first.
#[derive(Clone, Debug, Default)]
pub struct BaseDirs {
    dirs: Vec<BaseDir>,
}

impl BaseDirs {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard XDG roots that exist on this system.
    pub fn standard() -> Self {
        let mut dirs = Self::new();
        for path in paths::icon_theme_roots() {
            if path.is_dir() {
                dirs.push(path, RootKind::Themes);
            }
        }
        let pixmaps = paths::pixmaps_dir();
        if pixmaps.is_dir() {
            dirs.push(pixmaps, RootKind::Pixmaps);
        }
        dirs
    }

    /// Append `path` at lowest precedence. Returns false if already present.
    pub fn push(&mut self, path: PathBuf, kind: RootKind) -> bool {
        if self.contains(&path) {
            return false;
        }
        self.dirs.push(BaseDir { path, kind });
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.dirs.iter().any(|d| d.path == path)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BaseDir> {
        self.dirs.iter()
    }

    /// Roots scanned for `*/index.theme`.
    pub fn theme_roots(&self) -> Vec<PathBuf> {
        self.dirs
            .iter()
            .filter(|d| d.kind == RootKind::Themes)
            .map(|d| d.path.clone())
            .collect()
    }

    /// Roots searched for loose `<name>.<ext>` files.
    pub fn loose_roots(&self) -> Vec<PathBuf> {
        self.dirs.iter().map(|d| d.path.clone()).collect()
    }
}
