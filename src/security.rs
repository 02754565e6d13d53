//! Containment checks for every path the engine reads.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Decides whether a path may be read.
pub trait PathValidator: Send + Sync {
    /// Resolve `path` and confirm it is readable under the permitted root.
    ///
    /// Relative paths are taken relative to the root. The returned path is
    /// canonical.
    fn validate(&self, path: &Path) -> Result<PathBuf>;
}

/// Permits only paths that resolve inside a single root directory.
#[derive(Debug, Clone)]
pub struct RootValidator {
    root: PathBuf,
}

impl RootValidator {
    pub fn new(root: &Path) -> Result<Self> {
        let root = root.canonicalize().map_err(|e| {
            Error::Config(format!(
                "cannot resolve root {}: {e}",
                root.display()
            ))
        })?;
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PathValidator for RootValidator {
    fn validate(&self, path: &Path) -> Result<PathBuf> {
        let violation = |reason| Error::PathViolation {
            path: path.to_path_buf(),
            reason,
        };

        if path.as_os_str().as_encoded_bytes().contains(&0) {
            return Err(violation("contains a NUL byte"));
        }

        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            if path.components().any(|c| matches!(c, Component::ParentDir)) {
                return Err(violation("climbs out of the root"));
            }
            self.root.join(path)
        };

        let resolved = candidate.canonicalize()?;
        if !resolved.starts_with(&self.root) {
            return Err(violation("resolves outside the root"));
        }
        Ok(resolved)
    }
}
