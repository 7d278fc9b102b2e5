//! Icon lookup: theme search with best size match, loose icons, and
//! specificity fallback.
//!
//! Roughly the lookup algorithm of the freedesktop icon theme spec:
//! - themes are searched in search order, directories in declaration order
//! - an icon whose directory covers the requested size ends the search
//! - otherwise the closest size seen anywhere wins, first found on ties
//! - loose icons (no size) are only consulted if no theme has the name
//! - `input-mouse-usb` falls back to `input-mouse`, then `input`

use crate::basedirs::BaseDirs;
use crate::registry::{ICON_EXTENSIONS, Registry};
use crate::theme::{Catalog, FALLBACK_THEME};
use crate::xpm::XpmStore;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// A resolved icon file and the content type it should be served with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedIcon {
    pub path: PathBuf,
    pub content_type: &'static str,
}

impl ResolvedIcon {
    pub fn new(path: PathBuf) -> Self {
        let is_svg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("svg"));
        let content_type = if is_svg { "image/svg+xml" } else { "image/png" };
        Self { path, content_type }
    }

    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// Read-only view of everything a lookup consults.
pub(crate) struct Lookup<'a> {
    pub catalog: &'a Catalog,
    pub search_order: &'a [String],
    pub basedirs: &'a BaseDirs,
    pub registry: &'a Registry,
    pub xpm: &'a XpmStore,
}

impl Lookup<'_> {
    /// Resolve `name` at `size`, trimming dash separated suffixes until
    /// something is found.
    pub fn resolve(&self, name: &str, size: u32) -> Option<ResolvedIcon> {
        if !is_valid_name(name) {
            return None;
        }

        let mut name = name;
        loop {
            if let Some(found) = self
                .find_themed(name, size)
                .or_else(|| self.find_loose(name))
            {
                return Some(found);
            }
            name = match name.rfind('-') {
                Some(0) | None => return None,
                Some(dash) => &name[..dash],
            };
        }
    }

    fn find_themed(&self, name: &str, size: u32) -> Option<ResolvedIcon> {
        let mut best = Best::default();

        for theme_id in self.search_order {
            if let Some(theme) = self.catalog.get(theme_id) {
                for dir in &theme.directories {
                    for root in self.catalog.locations(theme_id) {
                        let base = root.join(theme_id).join(&dir.relative_path);
                        for path in probe(&base, name) {
                            let Some(icon) = self.servable(path) else {
                                continue;
                            };
                            if best.offer(dir.distance(size), icon) {
                                return best.into_icon();
                            }
                        }
                    }
                }
            }

            if theme_id == FALLBACK_THEME {
                for sized in self.registry.themed(name) {
                    if best.offer(sized.distance(size), ResolvedIcon::new(sized.path.clone())) {
                        return best.into_icon();
                    }
                }
            }
        }

        best.into_icon()
    }

    fn find_loose(&self, name: &str) -> Option<ResolvedIcon> {
        if let Some(path) = self.registry.loose(name) {
            if let Some(icon) = self.servable(path.to_path_buf()) {
                return Some(icon);
            }
        }

        self.basedirs
            .iter()
            .flat_map(|dir| probe(&dir.path, name))
            .find_map(|path| self.servable(path))
    }

    fn servable(&self, path: PathBuf) -> Option<ResolvedIcon> {
        let is_xpm = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xpm"));
        if is_xpm {
            self.xpm.png_for(&path).map(ResolvedIcon::new)
        } else {
            Some(ResolvedIcon::new(path))
        }
    }
}

/// Closest candidate seen so far; earlier candidates win ties.
#[derive(Default)]
struct Best {
    found: Option<(u32, ResolvedIcon)>,
}

impl Best {
    /// Returns true on an exact match, which ends the search.
    fn offer(&mut self, distance: u32, icon: ResolvedIcon) -> bool {
        let closer = match &self.found {
            Some((best, _)) => distance < *best,
            None => true,
        };
        if closer {
            self.found = Some((distance, icon));
        }
        distance == 0
    }

    fn into_icon(self) -> Option<ResolvedIcon> {
        self.found.map(|(_, icon)| icon)
    }
}

/// Existing `<dir>/<name>.<ext>` files, in extension order.
fn probe<'a>(dir: &'a Path, name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    ICON_EXTENSIONS
        .iter()
        .map(move |ext| dir.join(format!("{}.{}", name, ext)))
        .filter(|path| path.is_file())
}

/// Names that cannot escape the icon directories they are joined onto.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basedirs::RootKind;
    use crate::registry::SizedIcon;
    use crate::search_order::build_search_order;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        root: TempDir,
        pixmaps: TempDir,
        session: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: tempdir().unwrap(),
                pixmaps: tempdir().unwrap(),
                session: tempdir().unwrap(),
            }
        }

        fn theme(&self, id: &str, inherits: &str, dirs: &[(&str, &str)]) {
            let names: Vec<&str> = dirs.iter().map(|(n, _)| *n).collect();
            let mut index = format!(
                "[Icon Theme]\nName={}\nInherits={}\nDirectories={}\n",
                id,
                inherits,
                names.join(",")
            );
            for (name, body) in dirs {
                index.push_str(&format!("\n[{}]\n{}\n", name, body));
                fs::create_dir_all(self.root.path().join(id).join(name)).unwrap();
            }
            fs::write(self.root.path().join(id).join("index.theme"), index).unwrap();
        }

        fn icon(&self, rel: &str) -> PathBuf {
            let path = self.root.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"icon").unwrap();
            path
        }

        fn run<T>(&self, default: &str, registry: &Registry, f: impl FnOnce(&Lookup) -> T) -> T {
            let catalog = Catalog::scan(&[self.root.path().to_path_buf()]);
            let order = build_search_order(default, &catalog);
            let mut basedirs = BaseDirs::new();
            basedirs.push(self.root.path().to_path_buf(), RootKind::Themes);
            basedirs.push(self.pixmaps.path().to_path_buf(), RootKind::Pixmaps);
            let xpm = XpmStore::new(self.session.path().join("converted"));
            let lookup = Lookup {
                catalog: &catalog,
                search_order: &order,
                basedirs: &basedirs,
                registry,
                xpm: &xpm,
            };
            f(&lookup)
        }
    }

    const FIXED_16: &str = "Size=16\nType=Fixed";
    const FIXED_32: &str = "Size=32\nType=Fixed";
    const FIXED_48: &str = "Size=48\nType=Fixed";

    #[test]
    fn cyclic_inheritance_scenario() {
        let fx = Fixture::new();
        fx.theme("Foo", "Bar", &[("16x16/apps", FIXED_16)]);
        fx.theme("Bar", "Foo", &[("32x32/apps", FIXED_32)]);
        let battery = fx.icon("Bar/32x32/apps/battery.png");

        let found = fx.run("Foo", &Registry::default(), |l| l.resolve("battery", 32));
        assert_eq!(found, Some(ResolvedIcon::new(battery)));
    }

    #[test]
    fn first_exact_match_in_search_order_wins() {
        let fx = Fixture::new();
        fx.theme("Child", "Parent", &[("48x48/apps", FIXED_48)]);
        fx.theme("Parent", "", &[("32x32/apps", FIXED_32)]);
        fx.theme("hicolor", "", &[("32x32/apps", FIXED_32)]);
        fx.icon("Child/48x48/apps/app.png");
        let parent = fx.icon("Parent/32x32/apps/app.png");
        fx.icon("hicolor/32x32/apps/app.png");

        let found = fx.run("Child", &Registry::default(), |l| l.resolve("app", 32));
        assert_eq!(found.unwrap().path, parent);
    }

    #[test]
    fn closest_size_wins_and_ties_keep_first_found() {
        let fx = Fixture::new();
        fx.theme(
            "T",
            "",
            &[("16x16/apps", FIXED_16), ("48x48/apps", FIXED_48), ("20x20/apps", "Size=20\nType=Fixed")],
        );
        let small = fx.icon("T/16x16/apps/app.png");
        let large = fx.icon("T/48x48/apps/app.svg");
        fx.icon("T/20x20/apps/app.png");

        fx.run("T", &Registry::default(), |l| {
            assert_eq!(l.resolve("app", 44).unwrap().path, large);
            assert_eq!(l.resolve("app", 44).unwrap().content_type, "image/svg+xml");
            assert_eq!(l.resolve("app", 12).unwrap().path, small);
            // 34 is 14 away from both 20 and 48; 20x20 is declared last but
            // the 48x48 candidate came first
            assert_eq!(l.resolve("app", 34).unwrap().path, large);
        });
    }

    #[test]
    fn icons_are_found_under_every_root_holding_the_theme() {
        let fx = Fixture::new();
        fx.theme("T", "", &[("32x32/apps", FIXED_32), ("48x48/apps", FIXED_48)]);
        let second = tempdir().unwrap();
        fs::create_dir_all(second.path().join("T/32x32/apps")).unwrap();
        fs::write(
            second.path().join("T/index.theme"),
            "[Icon Theme]\nName=Shadowed\nDirectories=32x32/apps\n[32x32/apps]\nSize=32\nType=Fixed\n",
        )
        .unwrap();
        let only_second = second.path().join("T/32x32/apps/extra.png");
        fs::write(&only_second, b"x").unwrap();
        let first_wins = fx.icon("T/48x48/apps/extra.png");

        let roots = vec![fx.root.path().to_path_buf(), second.path().to_path_buf()];
        let catalog = Catalog::scan(&roots);
        assert_eq!(catalog.get("T").unwrap().title, "T");
        let order = build_search_order("T", &catalog);
        let mut basedirs = BaseDirs::new();
        for root in &roots {
            basedirs.push(root.clone(), RootKind::Themes);
        }
        let xpm = XpmStore::new(fx.session.path().join("converted"));
        let registry = Registry::default();
        let lookup = Lookup {
            catalog: &catalog,
            search_order: &order,
            basedirs: &basedirs,
            registry: &registry,
            xpm: &xpm,
        };

        assert_eq!(lookup.resolve("extra", 32).unwrap().path, only_second);
        assert_eq!(lookup.resolve("extra", 48).unwrap().path, first_wins);
    }

    #[test]
    fn png_is_preferred_over_svg_in_the_same_directory() {
        let fx = Fixture::new();
        fx.theme("T", "", &[("32x32/apps", FIXED_32)]);
        let png = fx.icon("T/32x32/apps/app.png");
        fx.icon("T/32x32/apps/app.svg");

        let found = fx.run("T", &Registry::default(), |l| l.resolve("app", 32));
        assert_eq!(found.unwrap().path, png);
    }

    #[test]
    fn specificity_fallback_trims_dash_components() {
        let fx = Fixture::new();
        fx.theme("T", "", &[("32x32/devices", FIXED_32)]);
        let mouse = fx.icon("T/32x32/devices/input-mouse.png");

        fx.run("T", &Registry::default(), |l| {
            assert_eq!(l.resolve("input-mouse-usb", 32).unwrap().path, mouse);
            assert_eq!(l.resolve("input", 32), None);
            assert_eq!(l.resolve("keyboard-usb", 32), None);
        });
    }

    #[test]
    fn loose_icons_only_when_no_theme_has_the_name() {
        let fx = Fixture::new();
        fx.theme("T", "", &[("32x32/apps", FIXED_32)]);
        let themed = fx.icon("T/32x32/apps/app.png");
        fs::write(fx.pixmaps.path().join("app.png"), b"x").unwrap();
        let loose = fx.pixmaps.path().join("other.svg");
        fs::write(&loose, b"x").unwrap();

        fx.run("T", &Registry::default(), |l| {
            assert_eq!(l.resolve("app", 16).unwrap().path, themed);
            assert_eq!(l.resolve("other", 16).unwrap().path, loose);
        });
    }

    #[test]
    fn xpm_hits_are_served_as_png() {
        let fx = Fixture::new();
        fs::write(
            fx.pixmaps.path().join("old.xpm"),
            "\"1 1 1 1\",\n\"a c #00ff00\",\n\"a\"\n",
        )
        .unwrap();
        fs::write(fx.pixmaps.path().join("broken.xpm"), "nope").unwrap();
        fs::write(
            fx.pixmaps.path().join("huge.xpm"),
            "\"1 1 99999999999999999 1\",\n\"a c #000\",\n\"a\"\n",
        )
        .unwrap();

        fx.run("", &Registry::default(), |l| {
            let icon = l.resolve("old", 32).unwrap();
            assert_eq!(icon.content_type, "image/png");
            assert!(icon.path.starts_with(fx.session.path()));
            assert_eq!(&icon.read_bytes().unwrap()[1..4], b"PNG");
            assert_eq!(l.resolve("broken", 32), None);
            assert_eq!(l.resolve("huge", 32), None);
        });
    }

    #[test]
    fn registered_icons_resolve_in_fallback_theme() {
        let fx = Fixture::new();
        let mut registry = Registry::default();
        let path16 = fx.session.path().join("h16.png");
        let path32 = fx.session.path().join("h32.png");
        fs::write(&path16, b"x").unwrap();
        fs::write(&path32, b"x").unwrap();
        registry.insert_themed(
            "abc".into(),
            vec![
                SizedIcon { size: 16, path: path16.clone() },
                SizedIcon { size: 32, path: path32.clone() },
            ],
        );
        let loose = fx.session.path().join("some.svg");
        fs::write(&loose, b"x").unwrap();
        registry.insert_loose("opt.some".into(), loose.clone()).unwrap();

        fx.run("", &registry, |l| {
            assert_eq!(l.resolve("abc", 20).unwrap().path, path16);
            assert_eq!(l.resolve("abc", 30).unwrap().path, path32);
            assert_eq!(l.resolve("opt.some", 30).unwrap().path, loose);
        });
    }

    #[test]
    fn path_like_names_are_not_found() {
        let fx = Fixture::new();
        fx.run("", &Registry::default(), |l| {
            assert_eq!(l.resolve("", 32), None);
            assert_eq!(l.resolve("..", 32), None);
            assert_eq!(l.resolve("../../etc/passwd", 32), None);
        });
    }
}
