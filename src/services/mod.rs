//! Background services for the icon daemon.
//!
//! - `watcher` - Re-scans themes when icon roots change on disk
//! - `events` - Logs engine events
//! - `query` - Answers lookups on stdin

pub mod events;
pub mod query;
pub mod watcher;

use capy_icons::IconEngine;
use log::{info, warn};
use std::sync::Arc;

/// Start the background services. A failed watcher is not fatal: lookups
/// still work, theme changes just need an explicit re-scan.
pub fn start_all(engine: &Arc<IconEngine>) {
    info!("Starting icon services...");

    if let Err(e) = events::start_logger(engine) {
        warn!("Event logger not started: {}", e);
    }
    if let Err(e) = watcher::start(Arc::clone(engine)) {
        warn!("Theme watcher not started: {}", e);
    }
}
