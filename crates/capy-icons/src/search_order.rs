//! Linearizes theme inheritance into the order themes are searched in.

use crate::theme::{Catalog, FALLBACK_THEME};
use std::collections::{HashSet, VecDeque};

/// Build the theme search order starting at `default_theme`.
///
/// Inherited themes are visited breadth first, each at most once, so cycles
/// in `Inherits` terminate. Unknown ids are skipped. The fallback theme is
/// always last, whether or not anything inherits it.
pub fn build_search_order(default_theme: &str, catalog: &Catalog) -> Vec<String> {
    let mut order = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    if default_theme != FALLBACK_THEME && catalog.contains(default_theme) {
        queue.push_back(default_theme);
    }

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        order.push(id.to_string());

        let Some(theme) = catalog.get(id) else {
            continue;
        };
        for parent in &theme.inherits {
            let parent = parent.as_str();
            if parent != FALLBACK_THEME && !visited.contains(parent) && catalog.contains(parent) {
                queue.push_back(parent);
            }
        }
    }

    order.push(FALLBACK_THEME.to_string());
    order
}
