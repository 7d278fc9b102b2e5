//! Minimal reader for the INI dialect used by `index.theme` files.

use std::collections::HashMap;

/// A `[Group]` with its key/value entries.
#[derive(Clone, Debug, Default)]
pub struct IniGroup {
    pub name: String,
    pub entries: HashMap<String, String>,
}

impl IniGroup {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }
}

/// Parse INI content into groups, in file order.
///
/// Entries before the first group header are dropped. A repeated key inside
/// one group keeps its first value.
pub fn parse_groups(content: &str) -> Vec<IniGroup> {
    let mut groups: Vec<IniGroup> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            groups.push(IniGroup {
                name: line[1..line.len() - 1].trim().to_string(),
                entries: HashMap::new(),
            });
            continue;
        }

        if let (Some(group), Some((key, value))) = (groups.last_mut(), line.split_once('=')) {
            group
                .entries
                .entry(key.trim().to_string())
                .or_insert_with(|| value.trim().to_string());
        }
    }

    groups
}

/// Split a comma separated list, dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
