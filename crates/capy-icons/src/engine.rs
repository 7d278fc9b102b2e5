//! The icon engine: owns all state and exposes the operations other
//! services call.
//!
//! State lives behind one `RwLock`. Lookups hold the read lock from the cache
//! check until their result is cached; every change takes the write lock and
//! clears the cache before releasing it, so a cached result always belongs
//! to the current configuration.

use crate::basedirs::{BaseDirs, RootKind};
use crate::cache::ResolutionCache;
use crate::config::IconConfig;
use crate::error::{IconError, Result};
use crate::paths;
use crate::registry::{
    ArgbImage, ImageData, Registry, content_hash, file_icon_name, validate_icon_file,
    write_loose_png, write_pixel_icon, write_png_blob,
};
use crate::resolver::{Lookup, ResolvedIcon};
use crate::search_order::build_search_order;
use crate::theme::Catalog;
use crate::xpm::XpmStore;
use log::{debug, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Events emitted when the engine's content changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IconEvent {
    /// Themes were re-read.
    Rescanned { themes: usize },
    BaseDirAdded(PathBuf),
    /// A runtime icon was published under this name.
    Registered(String),
}

/// Theme metadata for listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ThemeInfo {
    pub id: String,
    pub title: String,
    pub comment: String,
    pub inherits: Vec<String>,
}

/// Startup settings for an [`IconEngine`].
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub basedirs: BaseDirs,
    pub preferred_theme: Option<String>,
    pub session_dir: PathBuf,
}

impl EngineOptions {
    /// Standard XDG roots plus configured extras, theme from env/config/GTK.
    pub fn from_config(config: &IconConfig) -> Self {
        let mut basedirs = BaseDirs::standard();
        for dir in &config.extra_dirs {
            basedirs.push(dir.clone(), RootKind::Themes);
        }

        Self {
            basedirs,
            preferred_theme: paths::determine_default_theme(config.theme.as_deref()),
            session_dir: config
                .session_dir
                .clone()
                .unwrap_or_else(paths::default_session_dir),
        }
    }
}

struct EngineState {
    basedirs: BaseDirs,
    catalog: Catalog,
    preferred_theme: Option<String>,
    search_order: Vec<String>,
    registry: Registry,
    /// Bumped whenever the roots or the catalog change.
    generation: u64,
}

impl EngineState {
    fn install_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
        self.generation += 1;
        self.rebuild_search_order();
    }

    fn rebuild_search_order(&mut self) {
        let default_theme = self
            .preferred_theme
            .as_deref()
            .and_then(|name| self.catalog.find(name))
            .map(|theme| theme.id.clone())
            .unwrap_or_default();
        self.search_order = build_search_order(&default_theme, &self.catalog);
        debug!("Icon theme search order: {:?}", self.search_order);
    }
}

/// Icon theme lookup plus runtime-registered icons, shared between threads.
pub struct IconEngine {
    state: RwLock<EngineState>,
    cache: ResolutionCache,
    xpm: XpmStore,
    session_dir: PathBuf,
    events: broadcast::Sender<IconEvent>,
}

impl IconEngine {
    /// Create the session directory and scan the initial roots.
    pub fn new(options: EngineOptions) -> Result<Self> {
        paths::ensure_dir(&options.session_dir)?;
        let catalog = Catalog::scan(&options.basedirs.theme_roots());
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);

        let mut state = EngineState {
            basedirs: options.basedirs,
            catalog: Catalog::default(),
            preferred_theme: options.preferred_theme,
            search_order: Vec::new(),
            registry: Registry::default(),
            generation: 0,
        };
        state.install_catalog(catalog);
        info!(
            "Icon engine ready: {} roots, {} themes, search order {:?}",
            state.basedirs.len(),
            state.catalog.len(),
            state.search_order
        );

        Ok(Self {
            state: RwLock::new(state),
            cache: ResolutionCache::default(),
            xpm: XpmStore::new(options.session_dir.join("converted")),
            session_dir: options.session_dir,
            events: tx,
        })
    }

    /// Engine over the standard roots, configured from `config`.
    pub fn from_config(config: &IconConfig) -> Result<Self> {
        Self::new(EngineOptions::from_config(config))
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: IconEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Subscribe to engine changes.
    pub fn subscribe(&self) -> broadcast::Receiver<IconEvent> {
        self.events.subscribe()
    }

    /// Find the best icon for `name` at `size` pixels. Results, including
    /// misses, are cached until the configuration changes.
    pub fn resolve(&self, name: &str, size: u32) -> Option<ResolvedIcon> {
        let state = self.read();
        if let Some(cached) = self.cache.get(name, size) {
            return cached;
        }

        let lookup = Lookup {
            catalog: &state.catalog,
            search_order: &state.search_order,
            basedirs: &state.basedirs,
            registry: &state.registry,
            xpm: &self.xpm,
        };
        let outcome = lookup.resolve(name, size);
        self.cache.insert(name, size, outcome.clone());
        outcome
    }

    /// Add a root at lowest precedence and re-scan themes.
    /// Returns false, doing nothing, if the root is already known.
    pub fn add_base_dir(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();

        let (mut roots, generation) = {
            let state = self.read();
            if state.basedirs.contains(&path) {
                return false;
            }
            (state.basedirs.theme_roots(), state.generation)
        };
        roots.push(path.clone());
        let mut catalog = Catalog::scan(&roots);

        let themes = {
            let mut state = self.write();
            if !state.basedirs.push(path.clone(), RootKind::Themes) {
                return false;
            }
            if state.generation != generation {
                // Someone else changed the roots while we scanned.
                catalog = Catalog::scan(&state.basedirs.theme_roots());
            }
            state.install_catalog(catalog);
            self.cache.clear();
            state.catalog.len()
        };

        info!("Added icon root {} ({} themes)", path.display(), themes);
        self.emit(IconEvent::BaseDirAdded(path));
        self.emit(IconEvent::Rescanned { themes });
        true
    }

    /// Re-read all themes from the current roots.
    pub fn rescan(&self) {
        let (roots, generation) = {
            let state = self.read();
            (state.basedirs.theme_roots(), state.generation)
        };
        let mut catalog = Catalog::scan(&roots);

        let themes = {
            let mut state = self.write();
            if state.generation != generation {
                catalog = Catalog::scan(&state.basedirs.theme_roots());
            }
            state.install_catalog(catalog);
            self.cache.clear();
            state.catalog.len()
        };
        self.emit(IconEvent::Rescanned { themes });
    }

    /// Change the preferred theme (id or title). `None` searches only the
    /// fallback theme.
    pub fn set_preferred_theme(&self, theme: Option<String>) {
        let mut state = self.write();
        state.preferred_theme = theme;
        state.rebuild_search_order();
        self.cache.clear();
    }

    /// Register an icon given as raw ARGB images, one per size.
    ///
    /// The name is the content hash of the pixel data, so registering the
    /// same pixels again returns the same name without redoing any work.
    /// Non-square or malformed images are logged and skipped; if none is
    /// usable, nothing is registered.
    pub fn register_pixel_images(&self, images: &[ArgbImage]) -> Result<String> {
        let name = content_hash(images);
        if self.read().registry.contains_themed(&name) {
            return Ok(name);
        }

        let written = write_pixel_icon(&self.session_dir, &name, images);
        if written.is_empty() {
            return Err(IconError::NoUsableImages);
        }

        let inserted = {
            let mut state = self.write();
            let inserted = state.registry.insert_themed(name.clone(), written);
            if inserted {
                self.cache.clear();
            }
            inserted
        };
        if inserted {
            debug!("Registered pixel icon {}", name);
            self.emit(IconEvent::Registered(name.clone()));
        }
        Ok(name)
    }

    /// Register an icon file by path. The file is served in place.
    pub fn register_file_path(&self, path: &Path) -> Result<String> {
        validate_icon_file(path)?;
        let name = file_icon_name(path);
        self.publish_loose(name.clone(), path.to_path_buf())?;
        Ok(name)
    }

    /// Register an already encoded PNG image.
    pub fn register_png(&self, png: &[u8]) -> Result<String> {
        let (name, path) = write_png_blob(&self.session_dir, png)?;
        self.publish_loose(name.clone(), path)?;
        Ok(name)
    }

    /// Register a raw RGB(A) image, such as a notification's `image-data`.
    /// Named by content hash; registering the same data again is free.
    pub fn register_image_data(&self, image: &ImageData) -> Result<String> {
        let name = image.hash_name();
        if self.read().registry.contains_loose(&name) {
            return Ok(name);
        }

        let png = image.to_png()?;
        let path = write_loose_png(&self.session_dir, &name, &png)?;
        self.publish_loose(name.clone(), path)?;
        Ok(name)
    }

    fn publish_loose(&self, name: String, path: PathBuf) -> Result<()> {
        let inserted = {
            let mut state = self.write();
            let inserted = state.registry.insert_loose(name.clone(), path)?;
            if inserted {
                self.cache.clear();
            }
            inserted
        };
        if inserted {
            debug!("Registered loose icon {}", name);
            self.emit(IconEvent::Registered(name));
        }
        Ok(())
    }

    /// All known themes, sorted by id.
    pub fn list_themes(&self) -> Vec<ThemeInfo> {
        self.read()
            .catalog
            .themes()
            .into_iter()
            .map(|theme| ThemeInfo {
                id: theme.id.clone(),
                title: theme.title.clone(),
                comment: theme.comment.clone(),
                inherits: theme.inherits.clone(),
            })
            .collect()
    }

    /// Theme ids in the order they are searched.
    pub fn search_order(&self) -> Vec<String> {
        self.read().search_order.clone()
    }

    /// All roots, highest precedence first.
    pub fn base_dirs(&self) -> Vec<PathBuf> {
        self.read().basedirs.loose_roots()
    }

    /// Roots scanned for themes.
    pub fn theme_roots(&self) -> Vec<PathBuf> {
        self.read().basedirs.theme_roots()
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Number of runtime-registered icons.
    pub fn registered_count(&self) -> usize {
        self.read().registry.len()
    }

    /// Number of cached lookups.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    struct Setup {
        icons: TempDir,
        session: TempDir,
        engine: IconEngine,
    }

    fn setup(theme: Option<&str>) -> Setup {
        let icons = tempdir().unwrap();
        let session = tempdir().unwrap();
        let mut basedirs = BaseDirs::new();
        basedirs.push(icons.path().to_path_buf(), RootKind::Themes);
        let engine = IconEngine::new(EngineOptions {
            basedirs,
            preferred_theme: theme.map(String::from),
            session_dir: session.path().join("session"),
        })
        .unwrap();
        Setup {
            icons,
            session,
            engine,
        }
    }

    fn write_theme(root: &Path, id: &str, title: &str, inherits: &str) {
        fs::create_dir_all(root.join(id).join("32x32/apps")).unwrap();
        fs::write(
            root.join(id).join("index.theme"),
            format!(
                "[Icon Theme]\nName={title}\nComment={title} icons\nInherits={inherits}\nDirectories=32x32/apps\n\n[32x32/apps]\nSize=32\nType=Fixed\n"
            ),
        )
        .unwrap();
    }

    fn write_icon(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"icon").unwrap();
        path
    }

    fn solid(size: u32) -> ArgbImage {
        ArgbImage::new(size, size, [255, 10, 20, 30].repeat((size * size) as usize))
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let s = setup(Some("Foo"));
        write_theme(s.icons.path(), "Foo", "Foo", "");
        s.engine.rescan();
        let path = write_icon(s.icons.path(), "Foo/32x32/apps/term.png");

        let first = s.engine.resolve("term", 32).unwrap();
        assert_eq!(first.path, path);

        fs::remove_file(&path).unwrap();
        assert_eq!(s.engine.resolve("term", 32), Some(first));
        assert_eq!(s.engine.cached_count(), 1);
    }

    #[test]
    fn new_base_dir_invalidates_cached_miss() {
        let s = setup(Some("Extra"));
        assert_eq!(s.engine.resolve("battery", 32), None);
        assert_eq!(s.engine.search_order(), vec!["hicolor"]);

        let extra = tempdir().unwrap();
        write_theme(extra.path(), "Extra", "Extra Icons", "");
        let battery = write_icon(extra.path(), "Extra/32x32/apps/battery.png");

        assert!(s.engine.add_base_dir(extra.path()));
        assert_eq!(s.engine.search_order(), vec!["Extra", "hicolor"]);
        assert_eq!(s.engine.resolve("battery", 32).unwrap().path, battery);

        assert!(!s.engine.add_base_dir(extra.path()));
        assert_eq!(s.engine.base_dirs().len(), 2);
    }

    #[test]
    fn preferred_theme_matches_title_and_can_change() {
        let s = setup(Some("Pretty Name"));
        write_theme(s.icons.path(), "pretty", "Pretty Name", "Base,Missing");
        write_theme(s.icons.path(), "Base", "Base", "pretty");
        s.engine.rescan();
        assert_eq!(s.engine.search_order(), vec!["pretty", "Base", "hicolor"]);

        let icon = write_icon(s.icons.path(), "Base/32x32/apps/a.png");
        assert_eq!(s.engine.resolve("a", 32).unwrap().path, icon);

        s.engine.set_preferred_theme(None);
        assert_eq!(s.engine.search_order(), vec!["hicolor"]);
        assert_eq!(s.engine.cached_count(), 0);
        assert_eq!(s.engine.resolve("a", 32), None);
    }

    #[test]
    fn pixel_icons_are_idempotent_and_resolvable() {
        let s = setup(None);
        let images = vec![
            solid(16),
            ArgbImage::new(16, 8, vec![0; 16 * 8 * 4]),
            solid(48),
        ];

        let name = s.engine.register_pixel_images(&images).unwrap();
        let persisted = s.engine.session_dir().join(format!("hicolor/48x48/apps/{}.png", name));
        assert!(persisted.is_file());
        assert_eq!(s.engine.resolve(&name, 48).unwrap().path, persisted);
        let small = s.engine.session_dir().join(format!("hicolor/16x16/apps/{}.png", name));
        assert_eq!(s.engine.resolve(&name, 20).unwrap().path, small);

        // a second registration must not convert again
        fs::remove_file(&persisted).unwrap();
        assert_eq!(s.engine.register_pixel_images(&images).unwrap(), name);
        assert!(!persisted.exists());
        assert_eq!(s.engine.registered_count(), 1);
        let buckets = fs::read_dir(s.session.path().join("session/hicolor")).unwrap().count();
        assert_eq!(buckets, 2);
    }

    #[test]
    fn pixel_icon_without_square_images_is_rejected() {
        let s = setup(None);
        let images = vec![ArgbImage::new(4, 2, vec![0; 32])];
        assert!(matches!(
            s.engine.register_pixel_images(&images),
            Err(IconError::NoUsableImages)
        ));
        assert_eq!(s.engine.registered_count(), 0);
    }

    #[test]
    fn registration_clears_cached_misses() {
        let s = setup(None);
        let images = vec![solid(32)];
        let name = content_hash(&images);
        assert_eq!(s.engine.resolve(&name, 32), None);

        s.engine.register_pixel_images(&images).unwrap();
        assert!(s.engine.resolve(&name, 32).is_some());
    }

    #[test]
    fn file_paths_register_in_loose_namespace() {
        let s = setup(None);
        let dir = tempdir().unwrap();
        let svg = dir.path().join("tray-logo.svg");
        fs::write(&svg, "<svg/>").unwrap();

        let name = s.engine.register_file_path(&svg).unwrap();
        assert_eq!(name, file_icon_name(&svg));
        let icon = s.engine.resolve(&name, 64).unwrap();
        assert_eq!(icon.path, svg);
        assert_eq!(icon.content_type, "image/svg+xml");

        let txt = dir.path().join("notes.txt");
        fs::write(&txt, "x").unwrap();
        assert!(matches!(
            s.engine.register_file_path(&txt),
            Err(IconError::UnsupportedExtension(_))
        ));
        assert!(s.engine.register_file_path(dir.path()).is_err());
        assert_eq!(s.engine.registered_count(), 1);
    }

    #[test]
    fn png_blobs_register_by_hash() {
        let s = setup(None);
        let png = solid(8).to_png().unwrap();

        let name = s.engine.register_png(&png).unwrap();
        assert_eq!(s.engine.register_png(&png).unwrap(), name);
        assert_eq!(s.engine.resolve(&name, 8).unwrap().read_bytes().unwrap(), png);
        assert!(matches!(
            s.engine.register_png(b"GIF89a"),
            Err(IconError::NotPng)
        ));
    }

    #[test]
    fn image_data_registers_once_in_loose_namespace() {
        let s = setup(None);
        let image = ImageData {
            width: 2,
            height: 1,
            rowstride: 8,
            has_alpha: false,
            bits_per_sample: 8,
            channels: 3,
            data: vec![1, 2, 3, 4, 5, 6, 0, 0],
        };

        let name = s.engine.register_image_data(&image).unwrap();
        assert_eq!(name, image.hash_name());
        let icon = s.engine.resolve(&name, 48).unwrap();
        assert_eq!(icon.path, s.engine.session_dir().join(format!("loose/{}.png", name)));
        assert_eq!(icon.content_type, "image/png");

        fs::remove_file(&icon.path).unwrap();
        assert_eq!(s.engine.register_image_data(&image).unwrap(), name);
        assert!(!icon.path.exists());
        assert_eq!(s.engine.registered_count(), 1);

        let broken = ImageData { channels: 5, ..image };
        assert!(matches!(
            s.engine.register_image_data(&broken),
            Err(IconError::ImageData(_))
        ));
        assert_eq!(s.engine.registered_count(), 1);
    }

    #[test]
    fn same_stem_files_keep_their_own_names() {
        let s = setup(None);
        let dir = tempdir().unwrap();
        let png = dir.path().join("app.png");
        let svg = dir.path().join("app.svg");
        fs::write(&png, b"png").unwrap();
        fs::write(&svg, "<svg/>").unwrap();

        let png_name = s.engine.register_file_path(&png).unwrap();
        let svg_name = s.engine.register_file_path(&svg).unwrap();
        assert_ne!(png_name, svg_name);
        assert_eq!(s.engine.resolve(&png_name, 32).unwrap().path, png);
        assert_eq!(s.engine.resolve(&svg_name, 32).unwrap().path, svg);
        assert_eq!(s.engine.register_file_path(&png).unwrap(), png_name);
        assert_eq!(s.engine.registered_count(), 2);
    }

    #[test]
    fn themes_are_listed_with_metadata() {
        let s = setup(None);
        write_theme(s.icons.path(), "b", "Bee", "a");
        write_theme(s.icons.path(), "a", "Ay", "");
        s.engine.rescan();

        let themes = s.engine.list_themes();
        assert_eq!(themes.len(), 2);
        assert_eq!(themes[0].id, "a");
        assert_eq!(
            themes[1],
            ThemeInfo {
                id: "b".into(),
                title: "Bee".into(),
                comment: "Bee icons".into(),
                inherits: vec!["a".into()],
            }
        );
    }

    #[test]
    fn changes_are_broadcast() {
        let s = setup(None);
        let mut rx = s.engine.subscribe();
        let extra = tempdir().unwrap();

        s.engine.add_base_dir(extra.path());
        let name = s.engine.register_pixel_images(&[solid(4)]).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            IconEvent::BaseDirAdded(extra.path().to_path_buf())
        );
        assert_eq!(rx.try_recv().unwrap(), IconEvent::Rescanned { themes: 0 });
        assert_eq!(rx.try_recv().unwrap(), IconEvent::Registered(name));
    }

    #[test]
    fn concurrent_lookups_see_new_roots() {
        let s = setup(Some("Late"));
        let engine = Arc::new(s.engine);
        let late = tempdir().unwrap();
        write_theme(late.path(), "Late", "Late", "");
        let icon = write_icon(late.path(), "Late/32x32/apps/late.png");

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let engine = Arc::clone(&engine);
                scope.spawn(move || {
                    for _ in 0..50 {
                        engine.resolve("late", 32);
                    }
                });
            }
            scope.spawn(|| engine.add_base_dir(late.path()));
        });

        assert_eq!(engine.resolve("late", 32).unwrap().path, icon);
    }
}
