use std::collections::{HashMap, HashSet};

use crate::{file_id::FileId, index::IndexState, walker::DiscoveredFile};

/// What the index remembers about a file for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedFile {
    pub id: FileId,
    pub mtime: u64,
    pub size: u64,
}

/// Result of comparing discovered files against the index.
#[derive(Debug, Default)]
pub struct DiffResult {
    /// Files that are not indexed yet.
    pub new_files: Vec<DiscoveredFile>,
    /// Indexed files whose mtime or size changed.
    pub changed_files: Vec<DiscoveredFile>,
    /// Indexed files that are no longer on disk.
    pub deleted_ids: Vec<FileId>,
    pub unchanged: usize,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty()
            && self.changed_files.is_empty()
            && self.deleted_ids.is_empty()
    }

    /// Files that need to be read and tokenized.
    pub fn files_to_index(&self) -> Vec<DiscoveredFile> {
        self.new_files
            .iter()
            .chain(&self.changed_files)
            .cloned()
            .collect()
    }
}

/// Snapshot of the change-detection fields of every indexed file, keyed by
/// normalized path.
pub fn known_files(state: &IndexState) -> HashMap<String, IndexedFile> {
    state
        .documents()
        .map(|doc| {
            (
                doc.meta.path.clone(),
                IndexedFile {
                    id: doc.id,
                    mtime: doc.meta.mtime,
                    size: doc.meta.size_bytes,
                },
            )
        })
        .collect()
}

/// Compare discovered files against what the index knows.
///
/// A file is stale when its mtime or its size differs; either alone is
/// enough because coarse filesystem timestamps can miss quick edits.
pub fn diff_files(
    known: &HashMap<String, IndexedFile>,
    discovered: &[DiscoveredFile],
) -> DiffResult {
    let mut result = DiffResult::default();
    let mut seen_paths = HashSet::new();

    for file in discovered {
        let key = file.path_key();
        match known.get(&key) {
            None => result.new_files.push(file.clone()),
            Some(stored) => {
                if stored.mtime != file.mtime || stored.size != file.size {
                    result.changed_files.push(file.clone());
                } else {
                    result.unchanged += 1;
                }
            }
        }
        seen_paths.insert(key);
    }

    for (path, stored) in known {
        if !seen_paths.contains(path) {
            result.deleted_ids.push(stored.id);
        }
    }
    result.deleted_ids.sort_unstable();

    result
}
