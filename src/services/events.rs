//! Logs engine events as they happen.

use capy_icons::{IconEngine, IconEvent};
use log::{info, warn};
use std::io;
use tokio::sync::broadcast::error::RecvError;

/// Subscribe to the engine and log its events on a background thread.
pub fn start_logger(engine: &IconEngine) -> io::Result<()> {
    let mut rx = engine.subscribe();
    std::thread::Builder::new()
        .name("icon-events".to_string())
        .spawn(move || {
            loop {
                match rx.blocking_recv() {
                    Ok(event) => info!("{}", describe(&event)),
                    Err(RecvError::Lagged(n)) => warn!("Missed {} icon events", n),
                    Err(RecvError::Closed) => break,
                }
            }
        })?;
    Ok(())
}

fn describe(event: &IconEvent) -> String {
    match event {
        IconEvent::Rescanned { themes } => format!("Icon themes re-scanned: {} themes", themes),
        IconEvent::BaseDirAdded(path) => format!("Icon root added: {}", path.display()),
        IconEvent::Registered(name) => format!("Icon registered: {}", name),
    }
}
