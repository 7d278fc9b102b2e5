//! Engine configuration, read from `~/.config/capyshell/icons.json`.

use crate::error::{IconError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ICON_SIZE: u32 = 32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconConfig {
    /// Preferred icon theme id or name. `$CAPY_ICON_THEME` overrides it.
    pub theme: Option<String>,
    /// Extra roots appended after the standard XDG roots.
    pub extra_dirs: Vec<PathBuf>,
    /// Where generated icons are written. Defaults to a per-process
    /// directory under `$XDG_RUNTIME_DIR`.
    pub session_dir: Option<PathBuf>,
    /// Size used when a caller does not ask for one.
    pub default_size: u32,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            theme: None,
            extra_dirs: Vec::new(),
            session_dir: None,
            default_size: DEFAULT_ICON_SIZE,
        }
    }
}

impl IconConfig {
    /// Load from config file, or return default if missing or invalid.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring invalid icon config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save to config file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| IconError::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}
