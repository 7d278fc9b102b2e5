//! Theme root watching.
//!
//! Watches each theme root and the theme directories directly below it, and
//! re-scans the engine when an `index.theme` or a theme directory changes.
//! Events are debounced, so a package install re-scans once per batch.

use capy_icons::IconEngine;
use log::{debug, info, warn};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, DebouncedEvent, Debouncer, new_debouncer};
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

const DEBOUNCE_TIMEOUT: Duration = Duration::from_millis(500);
const ROOT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct ThemeWatcher {
    engine: Arc<IconEngine>,
    debouncer: Debouncer<RecommendedWatcher>,
    rx: Receiver<DebounceEventResult>,
    watched: HashSet<PathBuf>,
}

impl ThemeWatcher {
    pub fn new(engine: Arc<IconEngine>) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let debouncer = new_debouncer(DEBOUNCE_TIMEOUT, tx)?;
        let mut this = Self {
            engine,
            debouncer,
            rx,
            watched: HashSet::new(),
        };
        this.watch_roots();
        Ok(this)
    }

    /// Start watching roots and theme directories not yet watched.
    fn watch_roots(&mut self) {
        for root in self.engine.theme_roots() {
            let mut dirs = vec![root.clone()];
            if let Ok(entries) = std::fs::read_dir(&root) {
                dirs.extend(
                    entries
                        .filter_map(|e| e.ok())
                        .map(|e| e.path())
                        .filter(|p| p.is_dir()),
                );
            }

            for dir in dirs {
                if self.watched.contains(&dir) {
                    continue;
                }
                match self
                    .debouncer
                    .watcher()
                    .watch(&dir, RecursiveMode::NonRecursive)
                {
                    Ok(()) => {
                        self.watched.insert(dir);
                    }
                    Err(e) => debug!("Not watching {}: {}", dir.display(), e),
                }
            }
        }
    }

    fn is_relevant(&self, events: &[DebouncedEvent]) -> bool {
        let roots = self.engine.theme_roots();
        events.iter().any(|event| touches_theme(&event.path, &roots))
    }

    pub fn run(mut self) {
        info!("Watching {} icon directories", self.watched.len());
        loop {
            match self.rx.recv_timeout(ROOT_POLL_INTERVAL) {
                Ok(Ok(events)) => {
                    if !self.is_relevant(&events) {
                        continue;
                    }
                    info!("Icon themes changed, re-scanning");
                    self.engine.rescan();
                    self.watch_roots();
                }
                Ok(Err(e)) => warn!("Watch error: {}", e),
                // Roots may have been added through the engine meanwhile.
                Err(RecvTimeoutError::Timeout) => self.watch_roots(),
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Theme watcher channel closed");
                    return;
                }
            }
        }
    }
}

/// An `index.theme` file, or a directory directly inside a root.
fn touches_theme(path: &Path, roots: &[PathBuf]) -> bool {
    path.file_name().is_some_and(|n| n == "index.theme")
        || path.parent().is_some_and(|p| roots.iter().any(|r| r == p))
}

/// Start the watcher on its own thread.
pub fn start(engine: Arc<IconEngine>) -> Result<(), Box<dyn Error>> {
    let watcher = ThemeWatcher::new(engine)?;
    std::thread::Builder::new()
        .name("icon-theme-watcher".to_string())
        .spawn(move || watcher.run())?;
    Ok(())
}
