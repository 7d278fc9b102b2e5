//! capy-icons: Icon theme resolver and runtime icon cache for Linux desktops.
//!
//! Provides a single engine for:
//! - Icon theme discovery with inheritance, per the freedesktop icon theme spec
//! - Size-aware icon lookup with specificity fallback and a lookup cache
//! - Runtime icons (window icons, tray pixmaps, notification images, files)
//!   published next to theme icons, deduplicated by content hash
//! - XPM to PNG conversion so every result is servable

mod cache;
mod ini;
mod xpm;

pub mod basedirs;
pub mod config;
pub mod engine;
pub mod error;
pub mod paths;
pub mod registry;
pub mod resolver;
pub mod search_order;
pub mod theme;

pub use basedirs::{BaseDir, BaseDirs, RootKind};
pub use config::IconConfig;
pub use engine::{EngineOptions, IconEngine, IconEvent, ThemeInfo};
pub use error::{IconError, Result};
pub use registry::{ArgbImage, ImageData};
pub use resolver::ResolvedIcon;
pub use search_order::build_search_order;
pub use theme::{Catalog, FALLBACK_THEME, IconDirectory, Theme};
