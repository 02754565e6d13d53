use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    path::Path,
};

use serde::{Deserialize, Serialize};

/// A stable file identifier derived from the normalized relative path.
///
/// The same path always maps to the same id, so a file keeps its id across
/// rebuilds and edits.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct FileId(pub u64);

impl FileId {
    /// Derive the id for a path relative to the indexed root.
    pub fn for_path(relative_path: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        normalize_path(relative_path).hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Hex prefix of the id for human display, clamped to 6..=16 chars.
    pub fn short(&self, len: usize) -> String {
        let len = len.clamp(6, 16);
        let full = format!("{:016x}", self.0);
        full[..len].to_string()
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.short(6))
    }
}

/// Normalize a relative path: forward slashes, no leading `./` or `/`,
/// no empty segments.
pub fn normalize_path(relative_path: &str) -> String {
    relative_path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalized string form of a relative [`Path`].
pub fn path_key(relative_path: &Path) -> String {
    normalize_path(&relative_path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = FileId::for_path("guide/intro.md");
        let b = FileId::for_path("guide/intro.md");
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_differ() {
        let a = FileId::for_path("hello.md");
        let b = FileId::for_path("world.md");
        assert_ne!(a, b);
    }

    #[test]
    fn equivalent_spellings_share_an_id() {
        let plain = FileId::for_path("docs/api.md");
        assert_eq!(FileId::for_path("./docs/api.md"), plain);
        assert_eq!(FileId::for_path("docs//api.md"), plain);
        assert_eq!(FileId::for_path("docs\\api.md"), plain);
    }

    #[test]
    fn display_has_hash_prefix() {
        let s = FileId::for_path("hello.md").to_string();
        assert!(s.starts_with('#'));
        assert_eq!(s.len(), 7);
    }

    #[test]
    fn short_clamps() {
        let id = FileId::for_path("hello.md");
        assert_eq!(id.short(2).len(), 6);
        assert_eq!(id.short(100).len(), 16);
        assert!(id.short(10).starts_with(&id.short(6)));
    }
}
