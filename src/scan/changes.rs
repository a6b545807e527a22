//! Classify discovered files against the stored ledger.

use crate::domain::{DiscoveredFile, FileRecord};
use std::collections::{HashMap, HashSet};

/// Four disjoint file sets produced by comparing a discovery pass with stored state.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub new: Vec<DiscoveredFile>,
    pub changed: Vec<DiscoveredFile>,
    /// Paths whose stored hash matches, or that could not be read this
    /// pass; skipped entirely
    pub unchanged: Vec<String>,
    /// Stored paths that were not discovered this pass
    pub removed: Vec<String>,
}

impl ChangeSet {
    /// Files that must flow into chunking and embedding.
    pub fn to_process(&self) -> impl Iterator<Item = &DiscoveredFile> {
        self.new.iter().chain(self.changed.iter())
    }

    pub fn process_count(&self) -> usize {
        self.new.len() + self.changed.len()
    }
}

/// Compare discovered files with stored records.
///
/// With `force`, every discovered file is classified as changed regardless of
/// its hash. Stored paths at or under an entry of `unreadable` keep their
/// chunks and count as unchanged rather than removed. Output order follows
/// discovery order; the retained and `removed` paths are sorted.
pub fn classify_changes(
    discovered: Vec<DiscoveredFile>,
    stored: &HashMap<String, FileRecord>,
    unreadable: &[String],
    force: bool,
) -> ChangeSet {
    let mut set = ChangeSet::default();
    let mut seen: HashSet<String> = HashSet::with_capacity(discovered.len());

    for file in discovered {
        seen.insert(file.relative_path.clone());
        match stored.get(&file.relative_path) {
            None => set.new.push(file),
            Some(_) if force => set.changed.push(file),
            Some(record) if record.content_hash != file.content_hash => set.changed.push(file),
            Some(_) => set.unchanged.push(file.relative_path),
        }
    }

    let (mut retained, mut removed): (Vec<String>, Vec<String>) = stored
        .keys()
        .filter(|path| !seen.contains(*path))
        .cloned()
        .partition(|path| unreadable.iter().any(|skipped| covers(skipped, path)));
    retained.sort();
    removed.sort();
    set.unchanged.extend(retained);
    set.removed = removed;
    set
}

fn covers(skipped: &str, path: &str) -> bool {
    skipped.is_empty()
        || path == skipped
        || path.strip_prefix(skipped).is_some_and(|rest| rest.starts_with('/'))
}
