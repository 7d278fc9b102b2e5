//! Path helpers for XDG directories and config files.

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the icon theme to use.
pub const THEME_ENV: &str = "CAPY_ICON_THEME";

const APP_DIR: &str = "capyshell";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(std::env::var("HOME").unwrap_or_default()))
}

fn data_home() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| home_dir().join(".local/share"))
}

fn config_home() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| home_dir().join(".config"))
}

/// `$XDG_DATA_DIRS`, in precedence order.
fn data_dirs() -> Vec<PathBuf> {
    let value = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());

    value
        .split(':')
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Icon roots searched for themes and loose icons, most local first.
pub fn icon_theme_roots() -> Vec<PathBuf> {
    let mut dirs = vec![home_dir().join(".icons"), data_home().join("icons")];
    for data_dir in data_dirs() {
        dirs.push(data_dir.join("icons"));
    }
    dirs
}

/// Root searched for loose icons only.
pub fn pixmaps_dir() -> PathBuf {
    PathBuf::from("/usr/share/pixmaps")
}

/// GTK settings files that may name an icon theme, in lookup order.
pub fn gtk_settings_files() -> Vec<PathBuf> {
    let config = config_home();
    vec![
        config.join("gtk-4.0/settings.ini"),
        PathBuf::from("/etc/gtk-4.0/settings.ini"),
        config.join("gtk-3.0/settings.ini"),
        PathBuf::from("/etc/gtk-3.0/settings.ini"),
        config.join("gtk-2.0/settings.ini"),
        PathBuf::from("/etc/gtk-2.0/settings.ini"),
        home_dir().join(".gtkrc-2.0"),
        PathBuf::from("/etc/gtk-2.0/gtkrc"),
    ]
}

/// Extract the value of a `gtk-icon-theme-name` setting.
pub fn parse_gtk_icon_theme(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if key.trim() != "gtk-icon-theme-name" {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Pick the preferred icon theme name.
///
/// The environment override wins, then the configured name, then the first
/// GTK settings file that names one.
pub fn preferred_theme(
    env_value: Option<String>,
    configured: Option<&str>,
    gtk_files: &[PathBuf],
) -> Option<String> {
    if let Some(name) = env_value.filter(|v| !v.is_empty()) {
        info!("Icon theme taken from ${}: {}", THEME_ENV, name);
        return Some(name);
    }
    if let Some(name) = configured.filter(|v| !v.is_empty()) {
        info!("Icon theme taken from config: {}", name);
        return Some(name.to_string());
    }

    for file in gtk_files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        if let Some(name) = parse_gtk_icon_theme(&content) {
            info!("Icon theme taken from {}: {}", file.display(), name);
            return Some(name);
        }
    }
    None
}

/// Preferred theme from the process environment and the standard GTK files.
pub fn determine_default_theme(configured: Option<&str>) -> Option<String> {
    preferred_theme(std::env::var(THEME_ENV).ok(), configured, &gtk_settings_files())
}

/// Default location of the engine config file.
pub fn config_path() -> PathBuf {
    config_home().join(APP_DIR).join("icons.json")
}

/// Per-process directory for generated and converted icons.
pub fn default_session_dir() -> PathBuf {
    let base = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir);
    base.join(APP_DIR)
        .join(format!("icons-{}", std::process::id()))
}

/// Create `path` and any parents, owner-only where supported.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
