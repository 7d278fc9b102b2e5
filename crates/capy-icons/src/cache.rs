//! Memoized resolutions keyed by requested name and size.

use crate::resolver::ResolvedIcon;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// `None` values are cached misses.
#[derive(Debug, Default)]
pub(crate) struct ResolutionCache {
    entries: Mutex<HashMap<(String, u32), Option<ResolvedIcon>>>,
}

impl ResolutionCache {
    fn entries(&self) -> MutexGuard<'_, HashMap<(String, u32), Option<ResolvedIcon>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Outer `None` means not cached.
    pub fn get(&self, name: &str, size: u32) -> Option<Option<ResolvedIcon>> {
        self.entries().get(&(name.to_string(), size)).cloned()
    }

    pub fn insert(&self, name: &str, size: u32, outcome: Option<ResolvedIcon>) {
        self.entries().insert((name.to_string(), size), outcome);
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }
}
